//! Incremental re-analysis cache
//!
//! Analyzer runs are keyed by [`CacheKey`] and validated against a
//! [`FingerprintMap`] of every file in scope. A hit returns the stored
//! diagnostics without re-running the analyzer.
//!
//! - `fingerprint.rs` (per-file content fingerprints)
//! - `collect.rs` (target enumeration, budgets, parallel hashing)
//! - `key.rs` (deterministic run keys)
//! - `store.rs` (persisted whole-store cache)
//! - `lock.rs` (cross-process write lock)

pub mod collect;
pub mod fingerprint;
pub mod key;
pub mod lock;
pub mod paths;
pub mod store;

pub use collect::{
    collect_fingerprints, path_key, CollectOptions, CollectResult, FingerprintMap, HashWorkers,
    HASH_WORKERS_ENV,
};
pub use fingerprint::{fingerprint, FileFingerprint};
pub use key::CacheKey;
pub use lock::{LockStrength, ScopedLock};
pub use paths::{default_cache_dir, resolve_cache_dir, store_path};
pub use store::{AnalyzerRun, CacheEntry, CacheStats, RunCache};
