use crate::models::ParseSeverityError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop the ratchet engine.
///
/// These are configuration or input-shape problems; they are never
/// degraded to a default the way cache I/O failures are.
#[derive(Error, Debug)]
pub enum RatchetError {
    #[error("Unsupported budget schema version {found} in {path} (supported: {supported})")]
    UnsupportedSchema {
        path: PathBuf,
        found: String,
        supported: u32,
    },

    #[error(transparent)]
    InvalidSeverity(#[from] ParseSeverityError),

    #[error("Invalid target '{0}': expected SEVERITY=COUNT, e.g. error=0")]
    InvalidTarget(String),

    #[error("Malformed manifest {path}: {message}")]
    MalformedManifest { path: PathBuf, message: String },

    #[error("Manifest run '{run}' has a diagnostic for {path} with an {source}")]
    InvalidDiagnostic {
        run: String,
        path: String,
        source: ParseSeverityError,
    },

    #[error("Duplicate run id '{0}' in manifest")]
    DuplicateRun(String),

    #[error("Malformed budget {path}: {message}")]
    MalformedBudget { path: PathBuf, message: String },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type RatchetResult<T> = Result<T, RatchetError>;
