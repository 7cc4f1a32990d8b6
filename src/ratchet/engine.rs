//! Budget build, compare, auto-update and signature refresh
//!
//! All operations are pure: they read a manifest and a budget and return a
//! new budget or a report. Allowed counts only ever go down through
//! [`auto_update`]; nothing here loosens a budget.

use super::budget::{PathBudget, RatchetBudget, RunBudget};
use super::error::{RatchetError, RatchetResult};
use super::manifest::Manifest;
use super::report::{BudgetReport, Finding, RunReport};
use super::signature::EngineSignature;
use crate::models::Severity;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Which runs an operation applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RunSelection {
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl RunSelection {
    /// Select the given run ids; no ids selects every run.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: BTreeSet<String> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            RunSelection::All
        } else {
            RunSelection::Only(ids)
        }
    }

    pub fn includes(&self, run_id: &str) -> bool {
        match self {
            RunSelection::All => true,
            RunSelection::Only(ids) => ids.contains(run_id),
        }
    }
}

/// Parse a `SEVERITY=COUNT` target floor.
pub fn parse_target(spec: &str) -> RatchetResult<(Severity, u64)> {
    let (severity, count) = spec
        .split_once('=')
        .ok_or_else(|| RatchetError::InvalidTarget(spec.to_string()))?;
    let severity: Severity = severity.parse()?;
    let count = count
        .trim()
        .parse::<u64>()
        .map_err(|_| RatchetError::InvalidTarget(spec.to_string()))?;
    Ok((severity, count))
}

/// Build a budget whose allowances are exactly today's counts.
///
/// An empty `severities` set tracks the default set.
pub fn build(
    manifest: &Manifest,
    selection: &RunSelection,
    severities: &BTreeSet<Severity>,
    targets: &BTreeMap<Severity, u64>,
) -> RatchetBudget {
    let severities: BTreeSet<Severity> = if severities.is_empty() {
        Severity::DEFAULT_SET.into_iter().collect()
    } else {
        severities.clone()
    };

    let mut budget = RatchetBudget::new();
    for run in manifest.runs() {
        let run_id = run.run_id();
        if !selection.includes(&run_id) {
            continue;
        }

        let paths: BTreeMap<String, PathBudget> = run
            .counts(&severities)
            .into_iter()
            .filter_map(|(path, counts)| {
                let counts: BTreeMap<Severity, u64> =
                    counts.into_iter().filter(|(_, n)| *n > 0).collect();
                (!counts.is_empty()).then_some((path, PathBudget { severities: counts }))
            })
            .collect();

        debug!("Built budget for {} covering {} paths", run_id, paths.len());
        budget.runs.insert(
            run_id,
            RunBudget {
                severities: severities.clone(),
                paths,
                targets: targets.clone(),
                engine_signature: Some(EngineSignature::of_run(run)),
            },
        );
    }
    budget
}

/// Compare current counts against the budget.
///
/// Covers every selected run on either side. A path missing on one side
/// counts as zero there.
pub fn compare(
    manifest: &Manifest,
    budget: &RatchetBudget,
    selection: &RunSelection,
) -> BudgetReport {
    let run_ids: BTreeSet<String> = manifest
        .run_ids()
        .into_iter()
        .chain(budget.runs.keys().cloned())
        .filter(|id| selection.includes(id))
        .collect();

    let runs = run_ids
        .into_iter()
        .map(|run_id| {
            let manifest_run = manifest.run(&run_id);
            let run_budget = budget.runs.get(&run_id);
            let severities = run_budget
                .map(RunBudget::tracked_severities)
                .unwrap_or_else(|| Severity::DEFAULT_SET.into_iter().collect());

            let actual = manifest_run
                .map(|run| run.counts(&severities))
                .unwrap_or_default();
            let empty = RunBudget::default();
            let allowed = run_budget.unwrap_or(&empty);

            let paths: BTreeSet<&String> = actual.keys().chain(allowed.paths.keys()).collect();
            let mut findings = Vec::new();
            for path in paths {
                for &severity in &severities {
                    let actual_count = actual
                        .get(path)
                        .and_then(|c| c.get(&severity))
                        .copied()
                        .unwrap_or(0);
                    let allowed_count = allowed.allowed(path, severity);
                    if let Some(finding) =
                        Finding::classify(path, severity, allowed_count, actual_count)
                    {
                        findings.push(finding);
                    }
                }
            }

            let expected_signature = run_budget
                .and_then(|b| b.engine_signature.as_ref())
                .map(|s| s.hash.clone());
            let actual_signature = manifest_run.map(|run| EngineSignature::of_run(run).hash);
            let signature_matches = match (&expected_signature, &actual_signature) {
                (Some(expected), Some(actual)) => expected == actual,
                (None, Some(_)) => false,
                (_, None) => true,
            };

            RunReport {
                run_id,
                signature_matches,
                expected_signature,
                actual_signature,
                findings,
            }
        })
        .collect();

    BudgetReport { runs }
}

/// Tighten allowances that current counts undercut.
///
/// Each lowered allowance becomes `max(floor, actual)`, never above the
/// previous value. A run whose allowances moved gets its signature
/// refreshed. Runs absent from the budget are not added.
pub fn auto_update(
    manifest: &Manifest,
    budget: &RatchetBudget,
    selection: &RunSelection,
) -> RatchetBudget {
    let mut updated = budget.clone();
    for (run_id, run_budget) in updated.runs.iter_mut() {
        if !selection.includes(run_id) {
            continue;
        }
        let manifest_run = manifest.run(run_id);
        let tracked: BTreeSet<Severity> = run_budget
            .paths
            .values()
            .flat_map(|p| p.severities.keys().copied())
            .collect();
        let actual = manifest_run
            .map(|run| run.counts(&tracked))
            .unwrap_or_default();

        let floors = run_budget.targets.clone();
        let mut tightened = 0usize;
        for (path, path_budget) in run_budget.paths.iter_mut() {
            for (severity, allowed) in path_budget.severities.iter_mut() {
                let actual_count = actual
                    .get(path)
                    .and_then(|c| c.get(severity))
                    .copied()
                    .unwrap_or(0);
                if actual_count >= *allowed {
                    continue;
                }
                let floor = floors.get(severity).copied().unwrap_or(0);
                let next = (*allowed).min(floor.max(actual_count));
                if next < *allowed {
                    debug!("{} {} {}: {} -> {}", run_id, path, severity, allowed, next);
                    *allowed = next;
                    tightened += 1;
                }
            }
        }
        run_budget.prune();

        if tightened > 0 {
            info!("Tightened {} allowances for {}", tightened, run_id);
            if let Some(run) = manifest_run {
                run_budget.engine_signature = Some(EngineSignature::of_run(run));
            }
        }
    }
    updated
}

/// Replace the stored signature of each selected manifest run, leaving
/// allowances untouched. A run missing from the budget is added with no
/// allowances.
pub fn refresh_signatures(
    manifest: &Manifest,
    budget: &RatchetBudget,
    selection: &RunSelection,
) -> RatchetBudget {
    let mut updated = budget.clone();
    for run in manifest.runs() {
        let run_id = run.run_id();
        if !selection.includes(&run_id) {
            continue;
        }
        let run_budget = updated.runs.entry(run_id.clone()).or_insert_with(|| RunBudget {
            severities: Severity::DEFAULT_SET.into_iter().collect(),
            ..Default::default()
        });
        run_budget.engine_signature = Some(EngineSignature::of_run(run));
        info!("Refreshed engine signature for {}", run_id);
    }
    updated
}
