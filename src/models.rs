//! Core data models for auditgate
//!
//! These models are shared by the run cache (which stores analyzer
//! diagnostics verbatim) and the ratchet engine (which counts them per
//! severity).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

/// Severity levels that a budget can track.
///
/// Ordered by importance so that severity sets serialize as
/// `error`, `warning`, `information`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Severity {
    Error,
    Warning,
    Information,
}

impl Severity {
    /// All severities, in canonical order.
    pub const ALL: [Severity; 3] = [Severity::Error, Severity::Warning, Severity::Information];

    /// Severities tracked when the caller does not ask for a specific set.
    pub const DEFAULT_SET: [Severity; 2] = [Severity::Error, Severity::Warning];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Information => "information",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A severity token that is not one of the accepted spellings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid severity '{token}': expected one of error, warning, information")]
pub struct ParseSeverityError {
    pub token: String,
}

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" | "errors" => Ok(Severity::Error),
            "warning" | "warnings" => Ok(Severity::Warning),
            "information" | "info" => Ok(Severity::Information),
            _ => Err(ParseSeverityError {
                token: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Severity {
    type Error = ParseSeverityError;

    fn try_from(s: String) -> Result<Self, ParseSeverityError> {
        s.parse()
    }
}

/// One diagnostic emitted by an external analyzer.
///
/// The severity is kept as the tool's raw token; only the ratchet engine
/// interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub rule: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl Diagnostic {
    /// Canonical ordering: path, line, column, then the remaining fields so
    /// that ties between distinct diagnostics still sort deterministically.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.path
            .cmp(&other.path)
            .then(self.line.cmp(&other.line))
            .then(self.column.cmp(&other.column))
            .then_with(|| self.severity.cmp(&other.severity))
            .then_with(|| self.rule.cmp(&other.rule))
            .then_with(|| self.message.cmp(&other.message))
    }
}

/// Sort diagnostics into canonical order in place.
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by(Diagnostic::canonical_cmp);
}
