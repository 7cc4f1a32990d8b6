//! Output reporters for budget comparison results
//!
//! Supports two output formats:
//! - `text` - Terminal output with colors
//! - `json` - Machine-readable JSON, including the exit code

mod json;
mod text;

use crate::ratchet::BudgetReport;
use anyhow::{anyhow, Result};
use std::str::FromStr;

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" | "terminal" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(anyhow!("Unknown format '{}'. Valid formats: text, json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Render a budget report in the specified format
pub fn report(report: &BudgetReport, format: &str, exit_code: i32) -> Result<String> {
    let fmt = OutputFormat::from_str(format)?;
    report_with_format(report, fmt, exit_code)
}

/// Render a budget report using an OutputFormat enum
pub fn report_with_format(report: &BudgetReport, format: OutputFormat, exit_code: i32) -> Result<String> {
    match format {
        OutputFormat::Text => text::render(report, exit_code),
        OutputFormat::Json => json::render(report, exit_code),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::Severity;
    use crate::ratchet::{Finding, RunReport};

    /// A report with one violation, one improvement and one drifted run
    pub(crate) fn test_report() -> BudgetReport {
        BudgetReport {
            runs: vec![
                RunReport {
                    run_id: "pyright:strict".into(),
                    signature_matches: true,
                    expected_signature: Some("abc".into()),
                    actual_signature: Some("abc".into()),
                    findings: vec![
                        Finding::classify("src/a.py", Severity::Error, 2, 3).unwrap(),
                        Finding::classify("src/b.py", Severity::Warning, 4, 1).unwrap(),
                    ],
                },
                RunReport {
                    run_id: "ruff:check".into(),
                    signature_matches: false,
                    expected_signature: Some("old".into()),
                    actual_signature: Some("new".into()),
                    findings: vec![],
                },
            ],
        }
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("terminal".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("sarif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_report_dispatch() {
        let r = test_report();
        let json = report(&r, "json", 1).unwrap();
        assert!(json.trim_start().starts_with('{'));
        let text = report(&r, "text", 1).unwrap();
        assert!(text.contains("pyright:strict"));
    }
}
