//! Persisted run cache
//!
//! Maps a [`CacheKey`] to the complete result of one analyzer invocation.
//! An entry is valid only while the current fingerprint map is exactly the
//! one it was recorded with; any added, removed or changed file is a full
//! miss. Entries are replaced wholesale, never patched.
//!
//! # Example
//!
//! ```ignore
//! let mut cache = RunCache::load(&cache_dir);
//! let current = collect_fingerprints(root, &targets, &options).fingerprints;
//! if let Some(entry) = cache.lookup(&key, &current) {
//!     return Ok(entry.diagnostics.clone());
//! }
//! let run = invoke_analyzer()?;
//! cache.record(&key, current, run);
//! cache.persist()?;
//! ```

use super::collect::FingerprintMap;
use super::key::CacheKey;
use super::lock::ScopedLock;
use super::paths::{LOCK_FILE, STORE_FILE};
use crate::config::EngineOptions;
use crate::models::{sort_diagnostics, Diagnostic};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Stored result of one analyzer invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheEntry {
    pub command: Vec<String>,
    pub exit_code: i32,
    pub duration_ms: u64,
    pub diagnostics: Vec<Diagnostic>,
    pub fingerprints: FingerprintMap,
    /// Options snapshot the run was made with
    #[serde(flatten)]
    pub options: EngineOptions,
    pub tool_summary: Option<Value>,
}

/// Everything an analyzer invocation produced, as handed to [`RunCache::record`].
#[derive(Debug, Clone, Default)]
pub struct AnalyzerRun {
    pub command: Vec<String>,
    pub exit_code: i32,
    pub duration_ms: u64,
    pub diagnostics: Vec<Diagnostic>,
    pub options: EngineOptions,
    pub tool_summary: Option<Value>,
}

/// Cache statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_diagnostics: usize,
    pub tracked_files: usize,
    pub store_path: PathBuf,
}

/// Whole-store run cache backed by one JSON file.
///
/// Not shared across threads: one instance is used sequentially. Writes
/// from concurrent processes are serialized by a lock file beside the store.
pub struct RunCache {
    cache_dir: PathBuf,
    store_file: PathBuf,
    entries: BTreeMap<String, CacheEntry>,
    dirty: bool,
}

impl RunCache {
    /// Load the store from `cache_dir`.
    ///
    /// A missing store is empty; an unreadable or corrupt store is logged
    /// and treated as empty, since the cache is only an optimization.
    pub fn load(cache_dir: &Path) -> Self {
        let store_file = cache_dir.join(STORE_FILE);
        let entries = match Self::read_store(&store_file) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Discarding unreadable run cache: {:#}", e);
                BTreeMap::new()
            }
        };
        debug!(
            "Loaded run cache with {} entries from {}",
            entries.len(),
            store_file.display()
        );

        Self {
            cache_dir: cache_dir.to_path_buf(),
            store_file,
            entries,
            dirty: false,
        }
    }

    fn read_store(store_file: &Path) -> Result<BTreeMap<String, CacheEntry>> {
        if !store_file.exists() {
            return Ok(BTreeMap::new());
        }
        let bytes = fs::read(store_file)
            .with_context(|| format!("Failed to read {}", store_file.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse {}", store_file.display()))
    }

    /// Return the entry for `key` only if it was recorded with exactly
    /// `current` fingerprints.
    pub fn lookup(&self, key: &CacheKey, current: &FingerprintMap) -> Option<&CacheEntry> {
        let key_str = key.as_string();
        match self.entries.get(&key_str) {
            Some(entry) if entry.fingerprints == *current => {
                debug!("Run cache hit for {}", key_str);
                Some(entry)
            }
            Some(_) => {
                debug!("Run cache stale for {} (fingerprints differ)", key_str);
                None
            }
            None => {
                debug!("Run cache miss for {}", key_str);
                None
            }
        }
    }

    /// Store the result of a run, replacing any previous entry for `key`.
    ///
    /// Diagnostics are sorted into canonical order first so identical runs
    /// persist identical bytes.
    pub fn record(
        &mut self,
        key: &CacheKey,
        fingerprints: FingerprintMap,
        run: AnalyzerRun,
    ) -> &CacheEntry {
        let AnalyzerRun {
            command,
            exit_code,
            duration_ms,
            mut diagnostics,
            options,
            tool_summary,
        } = run;
        sort_diagnostics(&mut diagnostics);

        let entry = CacheEntry {
            command,
            exit_code,
            duration_ms,
            diagnostics,
            fingerprints,
            options,
            tool_summary,
        };

        self.dirty = true;
        let key_str = key.as_string();
        self.entries.insert(key_str.clone(), entry);
        &self.entries[&key_str]
    }

    /// Drop the entry for `key`. Returns whether one existed.
    pub fn invalidate(&mut self, key: &CacheKey) -> bool {
        let removed = self.entries.remove(&key.as_string()).is_some();
        if removed {
            self.dirty = true;
        }
        removed
    }

    /// Clear the entire cache
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.entries.clear();
            self.dirty = true;
        }
    }

    /// Write the store if anything changed since load.
    ///
    /// The JSON is written to a temp file and renamed over the store while
    /// holding the advisory lock, so readers never observe a partial file.
    pub fn persist(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        fs::create_dir_all(&self.cache_dir).with_context(|| {
            format!("Failed to create cache directory {}", self.cache_dir.display())
        })?;
        let _lock = ScopedLock::acquire(&self.cache_dir.join(LOCK_FILE))?;

        let json = serde_json::to_vec_pretty(&self.entries).context("Failed to serialize run cache")?;
        let tmp_file = self.store_file.with_extension("json.tmp");
        fs::write(&tmp_file, &json)
            .with_context(|| format!("Failed to write {}", tmp_file.display()))?;
        fs::rename(&tmp_file, &self.store_file)
            .with_context(|| format!("Failed to replace {}", self.store_file.display()))?;

        self.dirty = false;
        info!(
            "Saved run cache with {} entries to {}",
            self.entries.len(),
            self.store_file.display()
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn store_path(&self) -> &Path {
        &self.store_file
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            total_diagnostics: self.entries.values().map(|e| e.diagnostics.len()).sum(),
            tracked_files: self.entries.values().map(|e| e.fingerprints.len()).sum(),
            store_path: self.store_file.clone(),
        }
    }
}
