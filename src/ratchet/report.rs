//! Comparison results

use crate::models::Severity;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingKind {
    /// More diagnostics than allowed
    Violation,
    /// Fewer diagnostics than allowed; the budget could be tightened
    Improvement,
}

/// One `(path, severity)` cell whose actual count differs from its allowance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub kind: FindingKind,
    pub path: String,
    pub severity: Severity,
    pub allowed: u64,
    pub actual: u64,
    pub delta: i64,
}

impl Finding {
    /// Classify a cell. Equal counts produce no finding.
    pub fn classify(path: &str, severity: Severity, allowed: u64, actual: u64) -> Option<Self> {
        let kind = match actual.cmp(&allowed) {
            std::cmp::Ordering::Greater => FindingKind::Violation,
            std::cmp::Ordering::Less => FindingKind::Improvement,
            std::cmp::Ordering::Equal => return None,
        };
        Some(Self {
            kind,
            path: path.to_string(),
            severity,
            allowed,
            actual,
            delta: actual as i64 - allowed as i64,
        })
    }

    pub fn is_violation(&self) -> bool {
        self.kind == FindingKind::Violation
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: String,
    pub signature_matches: bool,
    /// Hash stored in the budget, if any
    pub expected_signature: Option<String>,
    /// Hash recomputed from the manifest, if the run is present there
    pub actual_signature: Option<String>,
    pub findings: Vec<Finding>,
}

impl RunReport {
    pub fn violations(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.kind == FindingKind::Violation)
    }

    pub fn improvements(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.kind == FindingKind::Improvement)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetReport {
    pub runs: Vec<RunReport>,
}

impl BudgetReport {
    pub fn violation_count(&self) -> usize {
        self.runs.iter().map(|r| r.violations().count()).sum()
    }

    pub fn improvement_count(&self) -> usize {
        self.runs.iter().map(|r| r.improvements().count()).sum()
    }

    pub fn has_violations(&self) -> bool {
        self.violation_count() > 0
    }

    pub fn signature_mismatches(&self) -> impl Iterator<Item = &RunReport> {
        self.runs.iter().filter(|r| !r.signature_matches)
    }

    /// 1 on any violation; otherwise 1 on signature drift unless ignored; else 0.
    pub fn exit_code(&self, ignore_signature: bool) -> i32 {
        if self.has_violations() {
            return 1;
        }
        if !ignore_signature && self.signature_mismatches().next().is_some() {
            return 1;
        }
        0
    }
}
