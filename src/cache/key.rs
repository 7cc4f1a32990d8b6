//! Deterministic run cache keys
//!
//! A key names one analyzer invocation: tool, mode, the target path set and
//! every flag that can change the analyzer's output. Anything that could
//! change the diagnostics must change either the key or the fingerprint map.

use super::fingerprint::fingerprint;
use crate::config::EngineOptions;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheKey {
    tool: String,
    mode: String,
    paths: BTreeSet<String>,
    flags: Vec<String>,
}

impl CacheKey {
    /// Start a key; duplicate paths collapse and order is irrelevant.
    pub fn new<I, S>(tool: &str, mode: &str, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tool: tool.to_string(),
            mode: mode.to_string(),
            paths: paths.into_iter().map(Into::into).collect(),
            flags: Vec::new(),
        }
    }

    /// Append a `name=value` flag.
    pub fn with_flag(mut self, name: &str, value: impl AsRef<str>) -> Self {
        self.flags.push(format!("{}={}", name, value.as_ref()));
        self
    }

    /// Append every output-affecting field of an option snapshot.
    pub fn with_options(mut self, options: &EngineOptions) -> Self {
        for arg in options.plugin_args() {
            self = self.with_flag("plugin-arg", arg);
        }
        if let Some(profile) = options.profile() {
            self = self.with_flag("profile", profile);
        }
        for pattern in options.include() {
            self = self.with_flag("include", pattern);
        }
        for pattern in options.exclude() {
            self = self.with_flag("exclude", pattern);
        }
        for (name, value) in options.overrides() {
            self = self.with_flag("override", format!("{}:{}", name, value));
        }
        for (category, severity) in options.category_mapping() {
            self = self.with_flag("category", format!("{}:{}", category, severity));
        }
        self
    }

    /// Append the config file path together with its own fingerprint, so
    /// editing the config file invalidates the key.
    pub fn with_config_file(self, path: &Path) -> Self {
        let fp = serde_json::to_string(&fingerprint(path)).unwrap_or_default();
        self.with_flag("config-file", path.to_string_lossy())
            .with_flag("config-fingerprint", fp)
    }

    /// Append the detected tool version; an undetectable version is recorded
    /// explicitly rather than omitted.
    pub fn with_tool_version(self, version: Option<&str>) -> Self {
        self.with_flag("tool-version", version.unwrap_or("unknown"))
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn mode(&self) -> &str {
        &self.mode
    }

    pub fn paths(&self) -> &BTreeSet<String> {
        &self.paths
    }

    /// Stable string form used as the store key: `tool:mode:<sha256>`.
    pub fn as_string(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        let digest = Sha256::digest(&canonical);
        format!("{}:{}:{:x}", self.tool, self.mode, digest)
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_string())
    }
}
