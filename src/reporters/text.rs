//! Text (terminal) reporter with colors and formatting

use crate::ratchet::{BudgetReport, Finding, FindingKind};
use anyhow::Result;
use console::style;
use std::fmt::Write;

fn finding_line(finding: &Finding) -> String {
    let tag = match finding.kind {
        FindingKind::Violation => style("[VIOLATION]").red().bold().to_string(),
        FindingKind::Improvement => style("[IMPROVED]").green().to_string(),
    };
    format!(
        "  {} {} {}: allowed {}, actual {} ({:+})",
        tag, finding.path, finding.severity, finding.allowed, finding.actual, finding.delta
    )
}

/// Render report as formatted terminal output
pub fn render(report: &BudgetReport, exit_code: i32) -> Result<String> {
    let mut out = String::new();

    writeln!(out, "\n{}", style("Ratchet Budget Check").bold())?;
    writeln!(out, "{}", style("──────────────────────────────────────").dim())?;

    for run in &report.runs {
        writeln!(out, "{}", style(&run.run_id).cyan().bold())?;
        if !run.signature_matches {
            let expected = run.expected_signature.as_deref().unwrap_or("none");
            let actual = run.actual_signature.as_deref().unwrap_or("none");
            writeln!(
                out,
                "  {} engine configuration changed (budget {}, current {})",
                style("[DRIFT]").yellow().bold(),
                short_hash(expected),
                short_hash(actual)
            )?;
        }
        // Violations first
        for finding in run.violations().chain(run.improvements()) {
            writeln!(out, "{}", finding_line(finding))?;
        }
        if run.findings.is_empty() && run.signature_matches {
            writeln!(out, "  {}", style("within budget").dim())?;
        }
    }

    let violations = report.violation_count();
    let improvements = report.improvement_count();
    let drifted = report.signature_mismatches().count();
    writeln!(out)?;
    writeln!(
        out,
        "Violations: {}  Improvements: {}  Drifted runs: {}",
        violations, improvements, drifted
    )?;
    if improvements > 0 && violations == 0 {
        writeln!(
            out,
            "{}",
            style("Run `auditgate ratchet update` to lock in the improvements.").dim()
        )?;
    }
    let status = if exit_code == 0 {
        style("PASS").green().bold()
    } else {
        style("FAIL").red().bold()
    };
    writeln!(out, "Result: {} (exit {})", status, exit_code)?;

    Ok(out)
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
