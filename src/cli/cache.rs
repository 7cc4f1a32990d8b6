//! Cache commands - inspect, clear and fingerprint

use super::CacheCommand;
use anyhow::{Context, Result};
use auditgate::cache::{
    collect_fingerprints, resolve_cache_dir, CollectOptions, FingerprintMap, HashWorkers, RunCache,
};
use auditgate::config::{load_project_config, CacheConfig};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub fn run(project: &Path, command: CacheCommand) -> Result<i32> {
    let config = load_project_config(project)?.cache;
    let cache_dir = resolve_cache_dir(project, config.dir.as_deref());

    match command {
        CacheCommand::Status => status(&cache_dir),
        CacheCommand::Clear => clear(&cache_dir),
        CacheCommand::Fingerprint {
            targets,
            respect_gitignore,
            max_files,
            max_bytes,
            hash_workers,
            extensions,
            baseline,
        } => {
            let overrides = FingerprintOverrides {
                respect_gitignore,
                max_files,
                max_bytes,
                hash_workers,
                extensions,
            };
            fingerprint(project, &config, &targets, overrides, baseline.as_deref())
        }
    }
}

fn status(cache_dir: &Path) -> Result<i32> {
    let cache = RunCache::load(cache_dir);
    let stats = cache.stats();

    println!("\nauditgate run cache\n");
    println!("  Store: {}", style(stats.store_path.display()).dim());
    if stats.entries == 0 {
        println!("  {} No cached runs", style("[--]").dim());
    } else {
        println!(
            "  {} {} cached runs, {} diagnostics, {} tracked files",
            style("[OK]").green(),
            style(stats.entries).cyan(),
            style(stats.total_diagnostics).cyan(),
            style(stats.tracked_files).cyan()
        );
    }
    println!();
    Ok(0)
}

fn clear(cache_dir: &Path) -> Result<i32> {
    let mut cache = RunCache::load(cache_dir);
    let removed = cache.len();
    cache.clear();
    cache.persist()?;
    println!(
        "Cleared {} cached run{}.",
        removed,
        if removed == 1 { "" } else { "s" }
    );
    Ok(0)
}

/// CLI values that take precedence over `[cache]` in auditgate.toml
struct FingerprintOverrides {
    respect_gitignore: Option<bool>,
    max_files: Option<usize>,
    max_bytes: Option<u64>,
    hash_workers: Option<HashWorkers>,
    extensions: Vec<String>,
}

impl FingerprintOverrides {
    /// Layer CLI flags over `[cache]`. Hash workers: flag, then
    /// `AUDITGATE_HASH_WORKERS`, then the config value.
    fn apply(self, config: &CacheConfig) -> CacheConfig {
        let mut effective = config.clone();
        if let Some(respect) = self.respect_gitignore {
            effective.respect_gitignore = respect;
        }
        if let Some(n) = self.max_files {
            effective.max_files = n;
        }
        if let Some(n) = self.max_bytes {
            effective.max_bytes = n;
        }
        if !self.extensions.is_empty() {
            effective.extensions = self.extensions;
        }
        effective.hash_workers = match self.hash_workers {
            Some(workers) => workers,
            None => config.hash_workers.with_env_override(),
        };
        effective
    }
}

fn fingerprint(
    project: &Path,
    config: &CacheConfig,
    targets: &[PathBuf],
    overrides: FingerprintOverrides,
    baseline: Option<&Path>,
) -> Result<i32> {
    let baseline: Option<FingerprintMap> = match baseline {
        Some(path) => Some(load_baseline(path)?),
        None => None,
    };

    let effective = overrides.apply(config);
    let options = CollectOptions {
        extensions: effective.extensions.clone(),
        respect_ignore: effective.respect_gitignore,
        max_files: effective.max_files_limit(),
        max_bytes: effective.max_bytes_limit(),
        baseline: baseline.as_ref(),
        hash_workers: effective.hash_workers,
    };
    info!("Hash workers: {:?}", options.hash_workers);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .context("Invalid spinner template")?,
    );
    spinner.set_message("Fingerprinting source files...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = collect_fingerprints(project, targets, &options);

    spinner.finish_and_clear();
    if result.truncated {
        eprintln!(
            "{} Budget reached after {} files; coverage is incomplete",
            style("Warning:").yellow().bold(),
            result.fingerprints.len()
        );
    }

    let output = json!({
        "fingerprints": result.fingerprints,
        "truncated": result.truncated,
        "hashed": result.hashed,
        "reused": result.reused,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(0)
}

/// Read a baseline from a previous `cache fingerprint` output, or a bare map.
fn load_baseline(path: &Path) -> Result<FingerprintMap> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read baseline {}", path.display()))?;
    let mut value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse baseline {}", path.display()))?;
    if let Some(inner) = value.get_mut("fingerprints") {
        value = inner.take();
    }
    serde_json::from_value(value)
        .with_context(|| format!("Baseline {} is not a fingerprint map", path.display()))
}
