//! The step orchestrator.
//!
//! A pipeline is a fixed, ordered list of named steps. Any subset can be
//! selected; selected steps always run in pipeline order. Steps are plain
//! functions over a shared [`StepContext`] and talk to each other only
//! through artifacts.

use std::time::Instant;

use crate::artifact::ArtifactError;
use crate::model::PipelineRun;
use crate::steps::{StepContext, StepError};

/// Run record written to the run directory after every step.
pub const RUN_RECORD: &str = "run.json";

pub type StepFn = fn(&StepContext<'_>) -> Result<StepReport, StepError>;

/// One named stage of the pipeline.
pub struct Step {
    pub name: &'static str,
    pub description: &'static str,
    pub run: StepFn,
}

/// What a step reports back on success.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Per-item failures recorded without aborting the step.
    pub item_errors: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("unknown step `{name}` (available: {})", .available.join(", "))]
    UnknownStep {
        name: String,
        available: Vec<&'static str>,
    },

    #[error("step `{step}` failed: {source}")]
    StepFailed {
        step: &'static str,
        #[source]
        source: StepError,
    },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run: PipelineRun,
    pub item_errors: usize,
}

impl RunSummary {
    pub fn is_clean(&self) -> bool {
        self.item_errors == 0
    }
}

pub struct Pipeline {
    steps: Vec<Step>,
}

impl Pipeline {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Resolve requested step names into pipeline order.
    ///
    /// An empty request selects every step. Duplicates are ignored.
    pub fn select(&self, requested: &[String]) -> Result<Vec<&Step>, PipelineError> {
        if let Some(unknown) = requested
            .iter()
            .find(|name| !self.steps.iter().any(|s| s.name == name.as_str()))
        {
            return Err(PipelineError::UnknownStep {
                name: unknown.clone(),
                available: self.steps.iter().map(|s| s.name).collect(),
            });
        }

        Ok(self
            .steps
            .iter()
            .filter(|s| requested.is_empty() || requested.iter().any(|r| r == s.name))
            .collect())
    }

    /// Run `selection` in order, stopping at the first failing step.
    ///
    /// The run id is fixed before the first step starts and `run.json` is
    /// rewritten after each step, including a failed one.
    ///
    /// Item errors are summed over the steps of this invocation only.
    pub fn run(
        &self,
        ctx: &StepContext<'_>,
        selection: &[&Step],
    ) -> Result<RunSummary, PipelineError> {
        let handle = ctx.store.create_run()?;
        // A joined run keeps the steps its parent already recorded.
        let mut record = match ctx.store.read::<PipelineRun>(handle, RUN_RECORD) {
            Ok(prior) => prior,
            Err(ArtifactError::NotFound { .. }) => PipelineRun {
                id: handle.id.clone(),
                dir: handle.dir.clone(),
                steps: Vec::new(),
            },
            Err(e) => return Err(e.into()),
        };
        let mut item_errors = 0;

        tracing::info!(run = %record.id, mode = ?ctx.mode, "starting run");

        for step in selection {
            eprintln!("▸ {}: {}", step.name, step.description);
            let started = Instant::now();

            record.steps.push(step.name.to_string());
            let result = (step.run)(ctx);
            ctx.store.write(handle, RUN_RECORD, &record)?;

            match result {
                Ok(report) => {
                    eprintln!(
                        "  {} done in {:.1?} ({} item errors)",
                        step.name,
                        started.elapsed(),
                        report.item_errors
                    );
                    item_errors += report.item_errors;
                }
                Err(source) => {
                    eprintln!("  {} failed after {:.1?}", step.name, started.elapsed());
                    return Err(PipelineError::StepFailed {
                        step: step.name,
                        source,
                    });
                }
            }
        }

        Ok(RunSummary {
            run: record,
            item_errors,
        })
    }
}
