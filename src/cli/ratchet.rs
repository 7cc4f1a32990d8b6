//! Ratchet commands - build, check, update and re-sign budgets

use super::{RatchetArgs, RatchetCommand, ReportArgs};
use anyhow::{bail, Context, Result};
use auditgate::config::{load_project_config, ProjectConfig};
use auditgate::models::Severity;
use auditgate::ratchet::{self, BudgetReport, Manifest, RatchetBudget, RunSelection};
use auditgate::reporters;
use console::style;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub fn run(project: &Path, command: RatchetCommand) -> Result<i32> {
    let config = load_project_config(project)?;

    match command {
        RatchetCommand::Init {
            args,
            severities,
            targets,
            force,
        } => init(project, &config, &args, &severities, &targets, force),
        RatchetCommand::Check { args, report } => check(project, &config, &args, &report),
        RatchetCommand::Update { args, report } => update(project, &config, &args, &report),
        RatchetCommand::RefreshSignature { args } => refresh_signature(project, &config, &args),
    }
}

fn budget_path(project: &Path, config: &ProjectConfig, args: &RatchetArgs) -> PathBuf {
    match &args.budget {
        Some(path) if path.is_absolute() => path.clone(),
        Some(path) => project.join(path),
        None => config.ratchet.budget_path(project),
    }
}

fn load_manifest(project: &Path, args: &RatchetArgs) -> Result<Manifest> {
    let path = if args.manifest.is_absolute() {
        args.manifest.clone()
    } else {
        project.join(&args.manifest)
    };
    Ok(Manifest::load(&path)?)
}

fn load_budget(path: &Path) -> Result<RatchetBudget> {
    RatchetBudget::load(path).with_context(|| {
        format!(
            "Failed to load budget {}. Run `auditgate ratchet init` first",
            path.display()
        )
    })
}

/// Severity set: CLI flags win, then auditgate.toml; empty means the default set.
fn resolve_severities(config: &ProjectConfig, cli: &[String]) -> Result<BTreeSet<Severity>> {
    if cli.is_empty() {
        return Ok(config.ratchet.severity_set()?);
    }
    let parsed: Result<BTreeSet<Severity>, _> = cli.iter().map(|s| s.parse::<Severity>()).collect();
    Ok(parsed?)
}

/// Target floors from auditgate.toml, overridden per severity by CLI flags.
fn resolve_targets(config: &ProjectConfig, cli: &[String]) -> Result<BTreeMap<Severity, u64>> {
    let mut targets = config.ratchet.target_floors()?;
    for spec in cli {
        let (severity, floor) = ratchet::parse_target(spec)?;
        targets.insert(severity, floor);
    }
    Ok(targets)
}

fn init(
    project: &Path,
    config: &ProjectConfig,
    args: &RatchetArgs,
    severities: &[String],
    targets: &[String],
    force: bool,
) -> Result<i32> {
    let path = budget_path(project, config, args);
    if path.exists() && !force {
        bail!(
            "Budget {} already exists. Use --force to overwrite, or `auditgate ratchet update` to tighten it",
            path.display()
        );
    }

    let manifest = load_manifest(project, args)?;
    let severities = resolve_severities(config, severities)?;
    let targets = resolve_targets(config, targets)?;
    let selection = RunSelection::from_ids(args.runs.iter().cloned());

    let mut budget = ratchet::build(&manifest, &selection, &severities, &targets);
    budget.manifest_path = Some(args.manifest.display().to_string());
    budget.project_root = Some(project.display().to_string());
    budget.save(&path)?;

    let paths: usize = budget.runs.values().map(|r| r.paths.len()).sum();
    println!(
        "{} Recorded budget for {} runs ({} paths) in {}",
        style("[OK]").green(),
        style(budget.runs.len()).cyan(),
        style(paths).cyan(),
        style(path.display()).dim()
    );
    Ok(0)
}

fn check(
    project: &Path,
    config: &ProjectConfig,
    args: &RatchetArgs,
    report_args: &ReportArgs,
) -> Result<i32> {
    let manifest = load_manifest(project, args)?;
    let budget = load_budget(&budget_path(project, config, args))?;
    let selection = RunSelection::from_ids(args.runs.iter().cloned());

    let report = ratchet::compare(&manifest, &budget, &selection);
    emit(&report, report_args)
}

fn update(
    project: &Path,
    config: &ProjectConfig,
    args: &RatchetArgs,
    report_args: &ReportArgs,
) -> Result<i32> {
    let manifest = load_manifest(project, args)?;
    let path = budget_path(project, config, args);
    let budget = load_budget(&path)?;
    let selection = RunSelection::from_ids(args.runs.iter().cloned());

    let updated = ratchet::auto_update(&manifest, &budget, &selection);
    if updated != budget {
        updated.save(&path)?;
    } else {
        info!("Budget already tight, {} unchanged", path.display());
    }

    let report = ratchet::compare(&manifest, &updated, &selection);
    emit(&report, report_args)
}

fn refresh_signature(project: &Path, config: &ProjectConfig, args: &RatchetArgs) -> Result<i32> {
    let manifest = load_manifest(project, args)?;
    let path = budget_path(project, config, args);
    let budget = load_budget(&path)?;
    let selection = RunSelection::from_ids(args.runs.iter().cloned());

    let refreshed = ratchet::refresh_signatures(&manifest, &budget, &selection);
    refreshed.save(&path)?;

    println!(
        "{} Refreshed engine signatures in {}",
        style("[OK]").green(),
        style(path.display()).dim()
    );
    Ok(0)
}

/// Render the report to stdout or `--output` and return its exit code.
fn emit(report: &BudgetReport, args: &ReportArgs) -> Result<i32> {
    let exit_code = report.exit_code(args.ignore_signature);
    let rendered = reporters::report(report, &args.format, exit_code)?;

    match &args.output {
        Some(path) => {
            fs::write(path, &rendered)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            eprintln!("Report written to {}", path.display());
        }
        None => println!("{}", rendered.trim_end()),
    }
    Ok(exit_code)
}
