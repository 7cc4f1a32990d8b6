//! Workspace fingerprint collection
//!
//! Walks the analysis targets, filters to source files, optionally restricts
//! them to what git would track, and fingerprints everything that fits in
//! the file/byte budget. Unchanged files are recognized from a baseline map
//! by size and mtime alone.

use super::fingerprint::{fingerprint_stat, FileFingerprint, Probe};
use ignore::WalkBuilder;
use rayon::prelude::*;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, Metadata};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Environment variable overriding the hash worker count (integer or `auto`).
pub const HASH_WORKERS_ENV: &str = "AUDITGATE_HASH_WORKERS";

/// Below this many candidates hashing stays on the calling thread.
const PARALLEL_THRESHOLD: usize = 64;

/// Fingerprints keyed by root-relative path with `/` separators.
pub type FingerprintMap = BTreeMap<String, FileFingerprint>;

/// Size of the hashing worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "RawWorkers")]
pub enum HashWorkers {
    #[default]
    Sequential,
    Fixed(usize),
    /// One worker per available CPU
    Auto,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawWorkers {
    Count(usize),
    Name(String),
}

impl TryFrom<RawWorkers> for HashWorkers {
    type Error = String;

    fn try_from(raw: RawWorkers) -> Result<Self, Self::Error> {
        match raw {
            RawWorkers::Count(n) => Ok(HashWorkers::from_count(n)),
            RawWorkers::Name(s) => s.parse(),
        }
    }
}

impl FromStr for HashWorkers {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(HashWorkers::Auto);
        }
        s.parse::<usize>()
            .map(HashWorkers::from_count)
            .map_err(|_| format!("'{}' is not a worker count or \"auto\"", s))
    }
}

impl HashWorkers {
    fn from_count(n: usize) -> Self {
        if n <= 1 {
            HashWorkers::Sequential
        } else {
            HashWorkers::Fixed(n)
        }
    }

    /// Apply the `AUDITGATE_HASH_WORKERS` override, if set and valid.
    pub fn with_env_override(self) -> Self {
        self.with_override(std::env::var(HASH_WORKERS_ENV).ok().as_deref())
    }

    /// Replace with `value` when it parses; an invalid value is logged and
    /// ignored.
    pub fn with_override(self, value: Option<&str>) -> Self {
        match value.map(str::parse::<HashWorkers>) {
            Some(Ok(workers)) => workers,
            Some(Err(e)) => {
                warn!("Ignoring {}: {}", HASH_WORKERS_ENV, e);
                self
            }
            None => self,
        }
    }

    /// Number of threads this setting resolves to on this host.
    pub fn resolve(self) -> usize {
        match self {
            HashWorkers::Sequential => 1,
            HashWorkers::Fixed(n) => n.max(1),
            HashWorkers::Auto => std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(1),
        }
    }
}

/// Options for [`collect_fingerprints`].
#[derive(Debug, Clone, Default)]
pub struct CollectOptions<'a> {
    /// File extensions (without the dot) to include; empty means every file.
    pub extensions: Vec<String>,
    /// Restrict to files git tracks or would track (not ignored).
    pub respect_ignore: bool,
    /// Stop after this many files.
    pub max_files: Option<usize>,
    /// Stop before cumulative file size exceeds this many bytes.
    pub max_bytes: Option<u64>,
    /// Previous fingerprints to reuse for files whose size and mtime match.
    pub baseline: Option<&'a FingerprintMap>,
    pub hash_workers: HashWorkers,
}

/// Result of a collection pass.
#[derive(Debug, Clone, Default)]
pub struct CollectResult {
    pub fingerprints: FingerprintMap,
    /// A file or byte budget cut the walk short; coverage is incomplete.
    pub truncated: bool,
    /// Files whose bytes were read and hashed
    pub hashed: usize,
    /// Files whose baseline fingerprint was reused from stat alone
    pub reused: usize,
}

/// A candidate file that made it past filtering and budgets.
struct Planned {
    key: String,
    path: PathBuf,
    stat: io::Result<Metadata>,
}

/// Collect fingerprints for all source files under `targets`.
///
/// Relative targets are resolved against `root`. The returned map is
/// independent of hashing order and worker count.
pub fn collect_fingerprints(
    root: &Path,
    targets: &[PathBuf],
    options: &CollectOptions<'_>,
) -> CollectResult {
    let (mut candidates, named) = enumerate(root, targets, &options.extensions);

    if options.respect_ignore {
        match git_listing(root) {
            Some(listed) => {
                let before = candidates.len();
                candidates.retain(|key, _| listed.contains(key) || named.contains(key));
                debug!(
                    "git listing kept {}/{} candidate files",
                    candidates.len(),
                    before
                );
            }
            None => {
                debug!(
                    "git listing unavailable under {}, not restricting candidates",
                    root.display()
                );
            }
        }
    }

    let (planned, truncated) = apply_budgets(candidates, options.max_files, options.max_bytes);
    if truncated {
        info!(
            "Fingerprint collection truncated at {} files (max_files={:?}, max_bytes={:?})",
            planned.len(),
            options.max_files,
            options.max_bytes
        );
    }

    let workers = options.hash_workers.resolve();
    let probed = hash_planned(planned, options.baseline, workers);

    let mut result = CollectResult {
        truncated,
        ..Default::default()
    };
    for (key, fp, probe) in probed {
        match probe {
            Probe::Hashed => result.hashed += 1,
            Probe::Reused => result.reused += 1,
            Probe::Terminal => {}
        }
        result.fingerprints.insert(key, fp);
    }

    debug!(
        "Collected {} fingerprints ({} hashed, {} reused)",
        result.fingerprints.len(),
        result.hashed,
        result.reused
    );
    result
}

/// Enumerate candidate files, keyed by root-relative path.
///
/// Also returns the keys of targets named directly rather than found by
/// walking; those bypass the git listing.
fn enumerate(
    root: &Path,
    targets: &[PathBuf],
    extensions: &[String],
) -> (BTreeMap<String, PathBuf>, HashSet<String>) {
    let mut candidates = BTreeMap::new();
    let mut named = HashSet::new();

    for target in targets {
        let abs = if target.is_absolute() {
            target.clone()
        } else {
            root.join(target)
        };

        match fs::metadata(&abs) {
            Ok(meta) if meta.is_dir() => {
                let walker = WalkBuilder::new(&abs)
                    .standard_filters(false)
                    .hidden(true)
                    .follow_links(false)
                    .build();
                for entry in walker.flatten() {
                    // Symlinks count when they resolve to a regular file
                    let is_file = match entry.file_type() {
                        Some(t) if t.is_symlink() => {
                            fs::metadata(entry.path()).map(|m| m.is_file()).unwrap_or(false)
                        }
                        Some(t) => t.is_file(),
                        None => false,
                    };
                    if is_file && has_extension(entry.path(), extensions) {
                        candidates.insert(path_key(root, entry.path()), entry.path().to_path_buf());
                    }
                }
            }
            // Explicitly named files are kept regardless of extension, and
            // a named target that is gone still gets a `missing` fingerprint.
            _ => {
                let key = path_key(root, &abs);
                named.insert(key.clone());
                candidates.insert(key, abs);
            }
        }
    }

    (candidates, named)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Root-relative key with `/` separators; paths outside `root` keep their
/// full form.
pub fn path_key(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let mut key = String::new();
    for component in rel.components() {
        let part = match component {
            Component::CurDir => continue,
            Component::RootDir => {
                key.push('/');
                continue;
            }
            Component::Prefix(p) => {
                key.push_str(&p.as_os_str().to_string_lossy());
                continue;
            }
            Component::ParentDir => "..".into(),
            Component::Normal(s) => s.to_string_lossy(),
        };
        if !key.is_empty() && !key.ends_with('/') {
            key.push('/');
        }
        key.push_str(&part);
    }
    key
}

/// Files git tracks plus untracked files that are not ignored, relative to `root`.
///
/// Returns `None` when git is unavailable or `root` is not inside a work tree.
fn git_listing(root: &Path) -> Option<HashSet<String>> {
    let output = Command::new("git")
        .args(["ls-files", "-z", "--cached", "--others", "--exclude-standard"])
        .current_dir(root)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    Some(
        output
            .stdout
            .split(|b| *b == 0)
            .filter(|s| !s.is_empty())
            .map(|s| String::from_utf8_lossy(s).to_string())
            .collect(),
    )
}

/// Take candidates in key order until the next one would break a budget.
fn apply_budgets(
    candidates: BTreeMap<String, PathBuf>,
    max_files: Option<usize>,
    max_bytes: Option<u64>,
) -> (Vec<Planned>, bool) {
    let mut planned = Vec::with_capacity(candidates.len());
    let mut total_bytes: u64 = 0;

    for (key, path) in candidates {
        if let Some(limit) = max_files {
            if planned.len() >= limit {
                return (planned, true);
            }
        }

        let stat = fs::metadata(&path);
        let size = stat.as_ref().map(|m| m.len()).unwrap_or(0);
        if let Some(limit) = max_bytes {
            if total_bytes.saturating_add(size) > limit {
                return (planned, true);
            }
        }
        total_bytes = total_bytes.saturating_add(size);

        planned.push(Planned { key, path, stat });
    }

    (planned, false)
}

fn probe(planned: Planned, baseline: Option<&FingerprintMap>) -> (String, FileFingerprint, Probe) {
    let base = baseline.and_then(|b| b.get(&planned.key));
    let (fp, probe) = fingerprint_stat(&planned.path, planned.stat, base);
    (planned.key, fp, probe)
}

/// Fingerprint every planned file, on a rayon pool when worthwhile.
///
/// Output order matches input order regardless of completion order.
fn hash_planned(
    planned: Vec<Planned>,
    baseline: Option<&FingerprintMap>,
    workers: usize,
) -> Vec<(String, FileFingerprint, Probe)> {
    if workers <= 1 || planned.len() < PARALLEL_THRESHOLD {
        return planned.into_iter().map(|p| probe(p, baseline)).collect();
    }

    match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
        Ok(pool) => {
            debug!("Hashing {} files on {} workers", planned.len(), workers);
            pool.install(|| {
                planned
                    .into_par_iter()
                    .map(|p| probe(p, baseline))
                    .collect()
            })
        }
        Err(e) => {
            warn!("Failed to build hash worker pool ({}), hashing sequentially", e);
            planned.into_iter().map(|p| probe(p, baseline)).collect()
        }
    }
}
