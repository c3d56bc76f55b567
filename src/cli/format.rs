//! Output formatting for CLI display.

use crate::artifact::RunListing;
use crate::pipeline::Pipeline;

pub(super) fn format_steps(pipeline: &Pipeline) -> String {
    let width = pipeline
        .steps()
        .iter()
        .map(|s| s.name.len())
        .max()
        .unwrap_or(0);

    pipeline
        .steps()
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {:<width$}  {}\n", i + 1, s.name, s.description))
        .collect()
}

pub(super) fn format_runs(runs: &[RunListing]) -> String {
    runs.iter()
        .map(|run| {
            let artifacts = if run.artifacts.is_empty() {
                "(empty)".to_string()
            } else {
                run.artifacts.join(", ")
            };
            format!("{}  {artifacts}\n", run.id)
        })
        .collect()
}
