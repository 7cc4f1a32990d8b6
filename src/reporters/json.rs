//! JSON reporter
//!
//! Outputs the BudgetReport plus the exit code the check resolved to.
//! Useful for CI annotations, piping to jq, or further processing.

use crate::ratchet::BudgetReport;
use anyhow::Result;
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a> {
    report: &'a BudgetReport,
    violations: usize,
    improvements: usize,
    exit_code: i32,
}

/// Render report as JSON
pub fn render(report: &BudgetReport, exit_code: i32) -> Result<String> {
    let envelope = Envelope {
        report,
        violations: report.violation_count(),
        improvements: report.improvement_count(),
        exit_code,
    };
    Ok(serde_json::to_string_pretty(&envelope)?)
}
