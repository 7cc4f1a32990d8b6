//! One-way diagnostic budget ratchet
//!
//! A budget records, per run, path and severity, how many diagnostics are
//! allowed. Built once from today's manifest, it is then compared against
//! every later manifest. Regressions are violations; improvements can be
//! locked in with [`auto_update`], which only ever tightens.
//!
//! Each budget run also stores an [`EngineSignature`] of the analyzer
//! configuration, so a changed configuration shows up as drift instead of
//! as a silent change in counts.

mod budget;
mod engine;
mod error;
mod manifest;
mod report;
mod signature;

pub use budget::{PathBudget, RatchetBudget, RunBudget, SCHEMA_VERSION};
pub use engine::{auto_update, build, compare, parse_target, refresh_signatures, RunSelection};
pub use error::{RatchetError, RatchetResult};
pub use manifest::{
    normalize_path, run_id, FileEntry, Manifest, ManifestDiagnostic, ManifestRun, PathCounts,
};
pub use report::{BudgetReport, Finding, FindingKind, RunReport};
pub use signature::{canonicalize, signature_hash, EngineSignature};
