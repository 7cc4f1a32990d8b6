//! Per-file content fingerprints
//!
//! A fingerprint identifies the observable state of one input file: its
//! content hash plus size and modification time, or a terminal marker when
//! the file is missing or cannot be read. Fingerprinting never fails; a
//! missing or unreadable input is itself a valid state for cache keys.

use serde::{Deserialize, Serialize};
use std::fs::{self, File, Metadata};
use std::io::{self, Read};
use std::path::Path;
use std::time::UNIX_EPOCH;
use xxhash_rust::xxh3::Xxh3;

/// Buffer size for hashing large files (64KB chunks)
const HASH_BUFFER_SIZE: usize = 65536;

/// Observable state of one input file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawFingerprint", into = "RawFingerprint")]
pub enum FileFingerprint {
    /// File was read successfully.
    Content {
        /// XXH3-128 of the file bytes, 32 lowercase hex chars
        content_hash: String,
        /// Modification time in nanoseconds since the Unix epoch
        modified_at_nanos: u64,
        size_bytes: u64,
    },
    /// File does not exist.
    Missing,
    /// File exists but could not be read (permissions, not a regular file, ...).
    Unreadable,
}

impl FileFingerprint {
    pub fn is_content(&self) -> bool {
        matches!(self, FileFingerprint::Content { .. })
    }

    /// Whether `self` and `other` agree on size and modification time.
    fn same_stat(&self, modified_at_nanos: u64, size_bytes: u64) -> bool {
        match self {
            FileFingerprint::Content {
                modified_at_nanos: m,
                size_bytes: s,
                ..
            } => *m == modified_at_nanos && *s == size_bytes,
            _ => false,
        }
    }
}

/// On-disk shape: `{contentHash, modifiedAtNanos, sizeBytes}`,
/// `{missing: true}` or `{unreadable: true}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFingerprint {
    #[serde(skip_serializing_if = "Option::is_none")]
    content_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    modified_at_nanos: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "is_false")]
    missing: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    unreadable: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl TryFrom<RawFingerprint> for FileFingerprint {
    type Error = String;

    fn try_from(raw: RawFingerprint) -> Result<Self, Self::Error> {
        let has_content =
            raw.content_hash.is_some() || raw.modified_at_nanos.is_some() || raw.size_bytes.is_some();
        match (has_content, raw.missing, raw.unreadable) {
            (true, false, false) => match (raw.content_hash, raw.modified_at_nanos, raw.size_bytes) {
                (Some(content_hash), Some(modified_at_nanos), Some(size_bytes)) => {
                    Ok(FileFingerprint::Content {
                        content_hash,
                        modified_at_nanos,
                        size_bytes,
                    })
                }
                _ => Err("fingerprint needs contentHash, modifiedAtNanos and sizeBytes".to_string()),
            },
            (false, true, false) => Ok(FileFingerprint::Missing),
            (false, false, true) => Ok(FileFingerprint::Unreadable),
            _ => Err("fingerprint must be exactly one of content, missing or unreadable".to_string()),
        }
    }
}

impl From<FileFingerprint> for RawFingerprint {
    fn from(fp: FileFingerprint) -> Self {
        match fp {
            FileFingerprint::Content {
                content_hash,
                modified_at_nanos,
                size_bytes,
            } => RawFingerprint {
                content_hash: Some(content_hash),
                modified_at_nanos: Some(modified_at_nanos),
                size_bytes: Some(size_bytes),
                ..Default::default()
            },
            FileFingerprint::Missing => RawFingerprint {
                missing: true,
                ..Default::default()
            },
            FileFingerprint::Unreadable => RawFingerprint {
                unreadable: true,
                ..Default::default()
            },
        }
    }
}

/// How a fingerprint was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Probe {
    /// File bytes were read and hashed.
    Hashed,
    /// Baseline hash reused because size and mtime matched.
    Reused,
    /// Terminal state (missing/unreadable), nothing hashed.
    Terminal,
}

/// Fingerprint a single file.
pub fn fingerprint(path: &Path) -> FileFingerprint {
    fingerprint_stat(path, fs::metadata(path), None).0
}

/// Fingerprint a file whose metadata has already been fetched.
///
/// When `baseline` is a content fingerprint with the same size and mtime,
/// its hash is reused without reading the file. A same-size rewrite inside
/// one mtime tick is therefore not detected.
pub(crate) fn fingerprint_stat(
    path: &Path,
    stat: io::Result<Metadata>,
    baseline: Option<&FileFingerprint>,
) -> (FileFingerprint, Probe) {
    let metadata = match stat {
        Ok(m) => m,
        Err(e) => return (terminal_for(&e), Probe::Terminal),
    };
    if !metadata.is_file() {
        return (FileFingerprint::Unreadable, Probe::Terminal);
    }

    let size_bytes = metadata.len();
    let modified_at_nanos = modified_nanos(&metadata);

    if let Some(base) = baseline {
        if base.same_stat(modified_at_nanos, size_bytes) {
            return (base.clone(), Probe::Reused);
        }
    }

    match hash_contents(path) {
        Ok(content_hash) => (
            FileFingerprint::Content {
                content_hash,
                modified_at_nanos,
                size_bytes,
            },
            Probe::Hashed,
        ),
        Err(e) => (terminal_for(&e), Probe::Terminal),
    }
}

fn terminal_for(err: &io::Error) -> FileFingerprint {
    if err.kind() == io::ErrorKind::NotFound {
        FileFingerprint::Missing
    } else {
        FileFingerprint::Unreadable
    }
}

fn modified_nanos(metadata: &Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Stream the file through XXH3-128 in fixed-size chunks.
fn hash_contents(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Xxh3::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

    loop {
        match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buffer[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(format!("{:032x}", hasher.digest128()))
}
