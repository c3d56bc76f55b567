//! The concrete pipeline steps and the context they share.
//!
//! | step     | reads                     | writes         |
//! |----------|---------------------------|----------------|
//! | fetch    |                           | `items.json`   |
//! | classify | `items.json`              | `phases.json`  |
//! | process  | `items.json`              | `actions.json` |
//! | report   | `items.json`, `actions.json` | `report.md` |
//!
//! A step's inputs come from the current run when an earlier step wrote
//! them, otherwise from the newest prior run that has them.

mod classify;
mod fetch;
mod process;
mod report;

use std::{collections::BTreeMap, path::PathBuf};

use jiff::Timestamp;

use crate::artifact::{ArtifactError, ArtifactStore, Resolved, RunHandle};
use crate::classify::ReviewPolicy;
use crate::config::Config;
use crate::execute::Mode;
use crate::forge::Forge;
use crate::notify::Notifier;
use crate::pipeline::{Pipeline, Step};

pub const ITEMS: &str = "items.json";
pub const PHASES: &str = "phases.json";
pub const ACTIONS: &str = "actions.json";
pub const REPORT: &str = "report.md";

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("{step} needs {}, which no run has; run {} first", .files.join(", "), .upstream.join(", "))]
    UpstreamArtifactMissing {
        step: &'static str,
        upstream: Vec<&'static str>,
        files: Vec<String>,
    },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("{0}")]
    Invalid(String),
}

/// Everything a step may touch.
pub struct StepContext<'a> {
    pub config: &'a Config,
    pub policy: &'a ReviewPolicy,
    pub store: &'a ArtifactStore,
    pub forge: &'a dyn Forge,
    /// Absent when no notification endpoint is configured.
    pub notifier: Option<&'a dyn Notifier>,
    pub mode: Mode,
    /// Reference time for business-day arithmetic, fixed for the run.
    pub now: Timestamp,
}

impl StepContext<'_> {
    pub fn run(&self) -> Result<&RunHandle, ArtifactError> {
        self.store.create_run()
    }

    /// Locate `required` for `step`, naming the producing steps when absent.
    fn inputs(
        &self,
        step: &'static str,
        required: &[&str],
    ) -> Result<BTreeMap<String, PathBuf>, StepError> {
        let run = self.run()?;
        match self.store.resolve_inputs(run, required)? {
            Resolved::Found(files) => Ok(files),
            Resolved::Missing(files) => {
                let mut upstream: Vec<&'static str> = files.iter().map(|f| producer(f)).collect();
                upstream.dedup();
                Err(StepError::UpstreamArtifactMissing {
                    step,
                    upstream,
                    files,
                })
            }
        }
    }
}

/// The fixed step sequence.
pub fn pipeline() -> Pipeline {
    Pipeline::new(vec![
        Step {
            name: "fetch",
            description: "fetch labeled issues with comments and board status",
            run: fetch::run,
        },
        Step {
            name: "classify",
            description: "infer each item's review phase",
            run: classify::run,
        },
        Step {
            name: "process",
            description: "apply the effects of each phase",
            run: process::run,
        },
        Step {
            name: "report",
            description: "render the Markdown report",
            run: report::run,
        },
    ])
}

fn producer(file: &str) -> &'static str {
    match file {
        PHASES => "classify",
        ACTIONS => "process",
        REPORT => "report",
        _ => "fetch",
    }
}

fn input<'m>(files: &'m BTreeMap<String, PathBuf>, name: &str) -> Result<&'m PathBuf, StepError> {
    files
        .get(name)
        .ok_or_else(|| StepError::Invalid(format!("{name} was not resolved")))
}
