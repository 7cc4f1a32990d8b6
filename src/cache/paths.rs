//! Cache path utilities - the run cache lives inside the project, under .auditgate/cache/

use std::path::{Path, PathBuf};

/// Project-local state directory
pub const STATE_DIR: &str = ".auditgate";

/// Store file name inside the cache directory
pub const STORE_FILE: &str = "run_cache.json";

/// Advisory lock file beside the store
pub const LOCK_FILE: &str = "run_cache.lock";

/// Get the default cache directory for a project.
pub fn default_cache_dir(project_root: &Path) -> PathBuf {
    project_root.join(STATE_DIR).join("cache")
}

/// Resolve a configured cache directory; relative paths are taken from the project root.
pub fn resolve_cache_dir(project_root: &Path, configured: Option<&Path>) -> PathBuf {
    match configured {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => project_root.join(dir),
        None => default_cache_dir(project_root),
    }
}

/// Get the store file path for a cache directory.
pub fn store_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(STORE_FILE)
}
