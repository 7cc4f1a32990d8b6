//! Advisory cross-process lock for the cache store
//!
//! On unix and windows this is a native exclusive file lock held on a
//! sibling lock file. Elsewhere there is no native primitive, so the lock
//! degrades to best-effort: the lock file is created but nothing excludes
//! other processes. Callers can inspect [`ScopedLock::strength`].

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::path::Path;
use tracing::debug;

/// Guarantee actually provided by a held lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStrength {
    /// Other processes using the same lock file are excluded.
    Exclusive,
    /// No native primitive on this platform; mutual exclusion is not enforced.
    BestEffort,
}

/// Lock held until dropped.
pub struct ScopedLock {
    file: File,
    strength: LockStrength,
}

impl ScopedLock {
    /// Block until the lock on `lock_path` is held. Creates the file if needed.
    pub fn acquire(lock_path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)
            .with_context(|| format!("Failed to open lock file {}", lock_path.display()))?;

        let strength = lock_native(&file)
            .with_context(|| format!("Failed to lock {}", lock_path.display()))?;
        debug!("Acquired {:?} lock on {}", strength, lock_path.display());

        Ok(Self { file, strength })
    }

    pub fn strength(&self) -> LockStrength {
        self.strength
    }
}

#[cfg(any(unix, windows))]
fn lock_native(file: &File) -> std::io::Result<LockStrength> {
    fs2::FileExt::lock_exclusive(file)?;
    Ok(LockStrength::Exclusive)
}

#[cfg(not(any(unix, windows)))]
fn lock_native(_file: &File) -> std::io::Result<LockStrength> {
    Ok(LockStrength::BestEffort)
}

impl Drop for ScopedLock {
    fn drop(&mut self) {
        if self.strength == LockStrength::Exclusive {
            let _ = fs2::FileExt::unlock(&self.file);
        }
    }
}
