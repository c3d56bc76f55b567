//! CLI interface for shepherd.
//!
//! Each subcommand is non-interactive. `run` executes the pipeline; the rest
//! inspect it:
//!
//! - `shepherd run [--dry-run] [--step <name>]...`: run all or some steps.
//! - `shepherd steps`: the fixed step sequence.
//! - `shepherd runs`: prior runs and their artifacts.
//! - `shepherd doctor`: check config and `gh` before a first run.

mod format;
mod run;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::artifact::ArtifactStore;
use crate::config::Config;
use crate::forge::GhCli;
use crate::steps;

use format::{format_runs, format_steps};

/// Shepherd: drive review issues through their workflow.
#[derive(Debug, Parser)]
#[command(name = "shepherd", version, after_long_help = PIPELINE_HELP)]
pub struct Cli {
    /// Config file. Defaults to `./shepherd.toml`, then `~/.shepherd/config.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Where run directories are written. Overrides `output-dir` in the config.
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Debug logging, including every `gh` invocation.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

const PIPELINE_HELP: &str = r"Pipeline:
  fetch     labeled issues, comments and board status   → items.json
  classify  each item's review phase                   → phases.json
  process   apply (or preview) each phase's effects    → actions.json
  report    Markdown summary                            → report.md

Examples:
  shepherd run --dry-run
  shepherd run --step report
  DRY_RUN=1 shepherd run --step fetch --step process";

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the pipeline.
    ///
    /// Runs every step unless `--step` narrows the selection. Selected steps
    /// always run in pipeline order. A step run on its own reads its inputs
    /// from the newest prior run that has them.
    Run {
        /// Log and record actions without changing anything.
        /// Also enabled by `DRY_RUN=true|1|yes`.
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Run only this step. Can be specified multiple times.
        #[arg(long = "step", value_name = "NAME")]
        steps: Vec<String>,
    },

    /// List the pipeline steps in order.
    Steps,

    /// List prior runs, newest first.
    Runs,

    /// Check the config and that `gh` is installed and authenticated.
    Doctor,
}

/// Run the CLI, returning an error message on failure.
pub fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Run { dry_run, steps } => {
            let config = load_config(cli.config.as_deref())?;
            let output = cli.output_dir.unwrap_or_else(|| config.output_dir.clone());
            run::cmd_run(&config, output, dry_run, &steps)
        }
        Command::Steps => {
            print!("{}", format_steps(&steps::pipeline()));
            Ok(())
        }
        Command::Runs => {
            let output = match cli.output_dir {
                Some(dir) => dir,
                None => load_config(cli.config.as_deref())?.output_dir,
            };
            cmd_runs(&ArtifactStore::new(output))
        }
        Command::Doctor => cmd_doctor(cli.config.as_deref()),
    }
}

fn load_config(explicit: Option<&Path>) -> Result<Config, String> {
    Config::resolve(explicit).map_err(|e| e.to_string())
}

fn cmd_runs(store: &ArtifactStore) -> Result<(), String> {
    let runs = store
        .list_runs()
        .map_err(|e| format!("failed to list runs: {e}"))?;

    if runs.is_empty() {
        println!("No runs in {}", store.root().display());
        return Ok(());
    }

    print!("{}", format_runs(&runs));
    Ok(())
}

fn cmd_doctor(explicit: Option<&Path>) -> Result<(), String> {
    let config = load_config(explicit)?;
    println!(
        "config    ok ({} repositories, reviewer {})",
        config.review.repos.len(),
        config.review.reviewer
    );

    let gh = GhCli::new(gh_config_dir(&config)?, config.project.clone());
    let version = gh
        .version()
        .map_err(|e| format!("gh is not installed or not on PATH: {e}"))?;
    println!("gh        {version}");

    gh.auth_status().map_err(|e| {
        format!("gh is not authenticated: {e}\nSet up with: gh auth login")
    })?;
    println!("gh auth   ok");

    match &config.notify {
        Some(notify) => println!(
            "notify    {} ({} escalation recipients)",
            notify.webhook,
            notify.escalation_recipients.len()
        ),
        None => println!("notify    not configured; the process step will refuse to run"),
    }

    Ok(())
}

/// Resolve the `GH_CONFIG_DIR` for `gh`.
///
/// An explicit `gh-config-dir` must exist. Otherwise an identity maps to
/// `~/.shepherd/gh-config/<identity>/` when that directory exists, and
/// `gh`'s own default applies when it doesn't.
fn gh_config_dir(config: &Config) -> Result<Option<PathBuf>, String> {
    if let Some(dir) = &config.gh_config_dir {
        if !dir.is_dir() {
            return Err(format!(
                "gh-config-dir {} does not exist\n\
                 Set up with: GH_CONFIG_DIR={} gh auth login",
                dir.display(),
                dir.display(),
            ));
        }
        return Ok(Some(dir.clone()));
    }

    let Some(identity) = &config.identity else {
        return Ok(None);
    };
    let dir = dirs::home_dir()
        .map(|home| home.join(".shepherd").join("gh-config").join(identity))
        .filter(|dir| dir.is_dir());
    if dir.is_none() {
        tracing::debug!(identity = %identity, "no dedicated gh config, using gh defaults");
    }
    Ok(dir)
}
