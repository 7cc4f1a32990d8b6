//! Analyzer manifest input
//!
//! The manifest aggregates the output of every analyzer run in one audit.
//! The ratchet engine only reads it.
//!
//! ```json
//! {"runs": [{"tool": "pyright", "mode": "strict",
//!            "perFile": [{"path": "a.py", "errors": 2, "warnings": 0, "information": 0,
//!                         "diagnostics": [{"severity": "error", "message": "..."}]}],
//!            "engineOptions": {"pluginArgs": []}}]}
//! ```

use super::error::{RatchetError, RatchetResult};
use crate::models::Severity;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Severity counts per manifest path.
pub type PathCounts = BTreeMap<String, BTreeMap<Severity, u64>>;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    runs: Vec<ManifestRun>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestRun {
    pub tool: String,
    pub mode: String,
    #[serde(default)]
    pub per_file: Vec<FileEntry>,
    #[serde(default)]
    pub engine_options: Value,
}

/// Per-file totals, optionally with the individual diagnostics.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub path: String,
    #[serde(default)]
    pub errors: u64,
    #[serde(default)]
    pub warnings: u64,
    #[serde(default)]
    pub information: u64,
    #[serde(default)]
    pub diagnostics: Option<Vec<ManifestDiagnostic>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManifestDiagnostic {
    #[serde(default)]
    pub severity: String,
    /// Tool-specific fields, carried but not interpreted
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Manifest {
    /// Load and validate a manifest file.
    pub fn load(path: &Path) -> RatchetResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| RatchetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Parse manifest JSON; `origin` names the source in error messages.
    pub fn parse(content: &str, origin: &Path) -> RatchetResult<Self> {
        let manifest: Manifest =
            serde_json::from_str(content).map_err(|e| RatchetError::MalformedManifest {
                path: origin.to_path_buf(),
                message: e.to_string(),
            })?;
        manifest.validate()?;
        debug!(
            "Loaded manifest {} with {} runs",
            origin.display(),
            manifest.runs.len()
        );
        Ok(manifest)
    }

    pub fn from_runs(runs: Vec<ManifestRun>) -> RatchetResult<Self> {
        let manifest = Manifest { runs };
        manifest.validate()?;
        Ok(manifest)
    }

    /// Reject duplicate run ids and diagnostics with unknown severity tokens.
    fn validate(&self) -> RatchetResult<()> {
        let mut seen = HashSet::new();
        for run in &self.runs {
            let id = run.run_id();
            if !seen.insert(id.clone()) {
                return Err(RatchetError::DuplicateRun(id));
            }
            for entry in &run.per_file {
                for diagnostic in entry.diagnostics.iter().flatten() {
                    if let Err(source) = diagnostic.severity.parse::<Severity>() {
                        return Err(RatchetError::InvalidDiagnostic {
                            run: id,
                            path: entry.path.clone(),
                            source,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn runs(&self) -> &[ManifestRun] {
        &self.runs
    }

    pub fn run(&self, run_id: &str) -> Option<&ManifestRun> {
        self.runs.iter().find(|r| r.run_id() == run_id)
    }

    pub fn run_ids(&self) -> BTreeSet<String> {
        self.runs.iter().map(ManifestRun::run_id).collect()
    }
}

impl ManifestRun {
    /// Run id, `"{tool}:{mode}"`.
    pub fn run_id(&self) -> String {
        run_id(&self.tool, &self.mode)
    }

    /// Count diagnostics per path for the requested severities.
    ///
    /// Entries with a diagnostic list are counted from it; otherwise the
    /// pre-aggregated totals are used. Entries for the same normalized path
    /// are summed. Paths are kept even when every count is zero.
    pub fn counts(&self, severities: &BTreeSet<Severity>) -> PathCounts {
        let mut counts = PathCounts::new();
        for entry in &self.per_file {
            let slot = counts.entry(normalize_path(&entry.path)).or_default();
            for (severity, n) in entry.severity_counts() {
                if severities.contains(&severity) {
                    *slot.entry(severity).or_insert(0) += n;
                }
            }
        }
        counts
    }
}

impl FileEntry {
    fn severity_counts(&self) -> BTreeMap<Severity, u64> {
        let mut counts = BTreeMap::new();
        match &self.diagnostics {
            Some(diagnostics) => {
                // Tokens were checked in Manifest::validate
                for severity in diagnostics.iter().filter_map(|d| d.severity.parse().ok()) {
                    *counts.entry(severity).or_insert(0) += 1;
                }
            }
            None => {
                counts.insert(Severity::Error, self.errors);
                counts.insert(Severity::Warning, self.warnings);
                counts.insert(Severity::Information, self.information);
            }
        }
        counts
    }
}

pub fn run_id(tool: &str, mode: &str) -> String {
    format!("{}:{}", tool, mode)
}

/// Normalize a manifest path to `/` separators without a leading `./`.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = path.replace('\\', "/");
    while let Some(rest) = normalized.strip_prefix("./") {
        normalized = rest.to_string();
    }
    normalized
}
