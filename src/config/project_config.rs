//! Project-level configuration support
//!
//! Loads per-project configuration from `auditgate.toml` in the project root.
//!
//! # Configuration Format
//!
//! ```toml
//! # auditgate.toml
//!
//! [cache]
//! dir = ".auditgate/cache"
//! max_files = 0          # 0 = unlimited
//! max_bytes = 0          # 0 = unlimited
//! hash_workers = "auto"  # or an integer; 1 = sequential
//! respect_gitignore = true
//! extensions = ["py", "pyi"]
//!
//! [ratchet]
//! budget = "ratchet_budget.json"
//! severities = ["error", "warning"]
//!
//! [ratchet.targets]
//! error = 0
//! ```
//!
//! CLI flags override anything set here.

use crate::cache::HashWorkers;
use crate::models::{ParseSeverityError, Severity};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config file name looked up in the project root
pub const CONFIG_FILE: &str = "auditgate.toml";

/// Default budget file name, relative to the project root
pub const DEFAULT_BUDGET_FILE: &str = "ratchet_budget.json";

/// Project-level configuration loaded from auditgate.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub cache: CacheConfig,
    pub ratchet: RatchetConfig,
}

/// `[cache]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory, relative to the project root unless absolute
    pub dir: Option<PathBuf>,
    /// Maximum files to fingerprint (0 = unlimited)
    pub max_files: usize,
    /// Maximum cumulative bytes to fingerprint (0 = unlimited)
    pub max_bytes: u64,
    pub hash_workers: HashWorkers,
    pub respect_gitignore: bool,
    /// Source extensions, without the dot
    pub extensions: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            max_files: 0,
            max_bytes: 0,
            hash_workers: HashWorkers::default(),
            respect_gitignore: true,
            extensions: vec!["py".to_string(), "pyi".to_string()],
        }
    }
}

impl CacheConfig {
    pub fn max_files_limit(&self) -> Option<usize> {
        (self.max_files > 0).then_some(self.max_files)
    }

    pub fn max_bytes_limit(&self) -> Option<u64> {
        (self.max_bytes > 0).then_some(self.max_bytes)
    }
}

/// `[ratchet]` section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RatchetConfig {
    pub budget: Option<PathBuf>,
    /// Severity tokens; validated when used
    pub severities: Vec<String>,
    /// Severity token -> floor that auto-update never tightens below
    pub targets: BTreeMap<String, u64>,
}

impl RatchetConfig {
    /// Budget path for `project_root`.
    pub fn budget_path(&self, project_root: &Path) -> PathBuf {
        match &self.budget {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => project_root.join(path),
            None => project_root.join(DEFAULT_BUDGET_FILE),
        }
    }

    /// Parsed severity set; empty when none are configured.
    pub fn severity_set(&self) -> Result<BTreeSet<Severity>, ParseSeverityError> {
        self.severities.iter().map(|s| s.parse()).collect()
    }

    /// Parsed target floors.
    pub fn target_floors(&self) -> Result<BTreeMap<Severity, u64>, ParseSeverityError> {
        self.targets
            .iter()
            .map(|(token, floor)| Ok((token.parse()?, *floor)))
            .collect()
    }
}

/// Load project configuration from `project_root`.
///
/// A missing file yields defaults. An unreadable or unparseable file is an
/// error naming the file; nothing in it is applied.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let toml_path = project_root.join(CONFIG_FILE);
    if !toml_path.exists() {
        debug!("No project config found, using defaults");
        return Ok(ProjectConfig::default());
    }

    let config = load_toml_config(&toml_path)?;
    debug!("Loaded project config from {}", toml_path.display());
    Ok(config)
}

/// Load configuration from a TOML file
fn load_toml_config(path: &Path) -> Result<ProjectConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Invalid configuration in {}", path.display()))
}
