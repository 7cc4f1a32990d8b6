//! Ratchet budget file
//!
//! ```json
//! {"schemaVersion": 1, "generatedAt": "2026-01-01T00:00:00Z",
//!  "runs": {"pyright:strict": {"severities": ["error"],
//!                              "paths": {"a.py": {"severities": {"error": 2}}},
//!                              "targets": {"error": 0},
//!                              "engineSignature": {"tool": "pyright", "mode": "strict",
//!                                                  "engineOptions": {}, "hash": "..."}}}}
//! ```

use super::error::{RatchetError, RatchetResult};
use super::signature::EngineSignature;
use crate::models::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::info;

/// The only budget schema version this build reads and writes.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatchetBudget {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_root: Option<String>,
    #[serde(default)]
    pub runs: BTreeMap<String, RunBudget>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunBudget {
    #[serde(default)]
    pub severities: BTreeSet<Severity>,
    #[serde(default)]
    pub paths: BTreeMap<String, PathBudget>,
    /// Floors that auto-update never tightens below
    #[serde(default)]
    pub targets: BTreeMap<Severity, u64>,
    #[serde(default)]
    pub engine_signature: Option<EngineSignature>,
}

/// Allowed count per severity for one path. Absent severities allow 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathBudget {
    #[serde(default)]
    pub severities: BTreeMap<Severity, u64>,
}

impl RatchetBudget {
    pub fn new() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            generated_at: Utc::now(),
            manifest_path: None,
            project_root: None,
            runs: BTreeMap::new(),
        }
    }

    /// Load a budget file. An unknown schema version is fatal.
    pub fn load(path: &Path) -> RatchetResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| RatchetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let malformed = |message: String| RatchetError::MalformedBudget {
            path: path.to_path_buf(),
            message,
        };

        let raw: Value = serde_json::from_str(&content).map_err(|e| malformed(e.to_string()))?;
        match raw.get("schemaVersion") {
            Some(Value::Number(n)) if n.as_u64() == Some(u64::from(SCHEMA_VERSION)) => {}
            other => {
                return Err(RatchetError::UnsupportedSchema {
                    path: path.to_path_buf(),
                    found: other.map_or_else(|| "(missing)".to_string(), Value::to_string),
                    supported: SCHEMA_VERSION,
                })
            }
        }

        serde_json::from_value(raw).map_err(|e| malformed(e.to_string()))
    }

    /// Write the budget atomically (temp file + rename).
    pub fn save(&self, path: &Path) -> RatchetResult<()> {
        let io_err = |source| RatchetError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut json = serde_json::to_string_pretty(self).map_err(|e| {
            RatchetError::MalformedBudget {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        })?;
        json.push('\n');

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;

        info!("Wrote ratchet budget with {} runs to {}", self.runs.len(), path.display());
        Ok(())
    }
}

impl Default for RatchetBudget {
    fn default() -> Self {
        Self::new()
    }
}

impl RunBudget {
    /// Tracked severities; an empty set means the default set.
    pub fn tracked_severities(&self) -> BTreeSet<Severity> {
        if self.severities.is_empty() {
            Severity::DEFAULT_SET.into_iter().collect()
        } else {
            self.severities.clone()
        }
    }

    pub fn allowed(&self, path: &str, severity: Severity) -> u64 {
        self.paths
            .get(path)
            .and_then(|p| p.severities.get(&severity))
            .copied()
            .unwrap_or(0)
    }

    pub fn floor(&self, severity: Severity) -> u64 {
        self.targets.get(&severity).copied().unwrap_or(0)
    }

    /// Drop zero allowances and paths left with none.
    pub fn prune(&mut self) {
        for path in self.paths.values_mut() {
            path.severities.retain(|_, allowed| *allowed > 0);
        }
        self.paths.retain(|_, path| !path.severities.is_empty());
    }
}
