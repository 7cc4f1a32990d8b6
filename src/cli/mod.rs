//! CLI command definitions and handlers

mod cache;
mod ratchet;

use anyhow::Result;
use auditgate::cache::HashWorkers;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// auditgate - incremental analyzer cache and one-way diagnostic budgets
#[derive(Parser, Debug)]
#[command(name = "auditgate")]
#[command(
    version,
    about = "Incremental analyzer cache and one-way diagnostic budget ratchet",
    long_about = "auditgate keeps static-analysis runs cheap and regressions out.\n\n\
The cache skips re-running an analyzer when no file in scope changed. The ratchet \
records today's diagnostic counts as a budget, fails CI when any path gets worse, \
and tightens the budget as code gets better.",
    after_help = "\
Examples:
  auditgate ratchet init --manifest audit.json        Record today's counts as the budget
  auditgate ratchet check --manifest audit.json       Fail on regressions or config drift
  auditgate ratchet update --manifest audit.json      Lock in improvements
  auditgate cache fingerprint src tests               Print the fingerprint map
  auditgate cache status                              Show run cache contents"
)]
pub struct Cli {
    /// Project root (default: current directory)
    #[arg(long, short = 'C', global = true, default_value = ".")]
    pub project: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build, check and tighten diagnostic budgets
    Ratchet {
        #[command(subcommand)]
        command: RatchetCommand,
    },

    /// Inspect and manage the run cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
}

/// Options shared by every ratchet subcommand
#[derive(Args, Debug, Clone)]
pub struct RatchetArgs {
    /// Analyzer manifest (JSON)
    #[arg(long)]
    pub manifest: PathBuf,

    /// Budget file (default: [ratchet].budget from auditgate.toml, or ratchet_budget.json)
    #[arg(long)]
    pub budget: Option<PathBuf>,

    /// Restrict to these run ids (tool:mode); repeatable
    #[arg(long = "run", value_name = "RUN_ID")]
    pub runs: Vec<String>,
}

/// Options for subcommands that print a report
#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    /// Do not fail on engine configuration drift
    #[arg(long)]
    pub ignore_signature: bool,

    /// Output format: text, json
    #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
    pub format: String,

    /// Output file path (default: stdout)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum RatchetCommand {
    /// Record current counts as the budget
    #[command(after_help = "\
Examples:
  auditgate ratchet init --manifest audit.json
  auditgate ratchet init --manifest audit.json --severity error --target error=0
  auditgate ratchet init --manifest audit.json --run pyright:strict --force")]
    Init {
        #[command(flatten)]
        args: RatchetArgs,

        /// Severities to track (error, warning, information); repeatable
        #[arg(long = "severity", value_name = "SEVERITY")]
        severities: Vec<String>,

        /// Floor that auto-update never tightens below, as SEVERITY=COUNT; repeatable
        #[arg(long = "target", value_name = "SEVERITY=COUNT")]
        targets: Vec<String>,

        /// Overwrite an existing budget file
        #[arg(long)]
        force: bool,
    },

    /// Compare the manifest against the budget
    Check {
        #[command(flatten)]
        args: RatchetArgs,

        #[command(flatten)]
        report: ReportArgs,
    },

    /// Tighten the budget to current counts, then report
    Update {
        #[command(flatten)]
        args: RatchetArgs,

        #[command(flatten)]
        report: ReportArgs,
    },

    /// Accept the current engine configuration without touching allowances
    RefreshSignature {
        #[command(flatten)]
        args: RatchetArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Show run cache statistics
    Status,

    /// Remove every cached run
    Clear,

    /// Print the fingerprint map for the given targets as JSON
    Fingerprint {
        /// Files or directories, relative to the project root
        #[arg(default_value = ".")]
        targets: Vec<PathBuf>,

        /// Restrict to files git tracks or would track
        #[arg(long, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
        respect_gitignore: Option<bool>,

        /// Maximum files to fingerprint (0 = unlimited)
        #[arg(long)]
        max_files: Option<usize>,

        /// Maximum cumulative bytes to fingerprint (0 = unlimited)
        #[arg(long)]
        max_bytes: Option<u64>,

        /// Hash workers: an integer or "auto"
        #[arg(long)]
        hash_workers: Option<HashWorkers>,

        /// Source extension to include, without the dot; repeatable
        #[arg(long = "extension", value_name = "EXT")]
        extensions: Vec<String>,

        /// Previous fingerprint output to reuse for unchanged files
        #[arg(long)]
        baseline: Option<PathBuf>,
    },
}

/// Run the parsed command and return the process exit code
pub fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Ratchet { command } => ratchet::run(&cli.project, command),
        Commands::Cache { command } => cache::run(&cli.project, command),
    }
}
