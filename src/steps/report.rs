use crate::artifact::read_path;
use crate::execute::ProcessOutcome;
use crate::pipeline::StepReport;
use crate::report;
use crate::source::FetchOutcome;

use super::{ACTIONS, ITEMS, REPORT, StepContext, StepError, input};

pub fn run(ctx: &StepContext<'_>) -> Result<StepReport, StepError> {
    let files = ctx.inputs("report", &[ITEMS, ACTIONS])?;
    let fetched: FetchOutcome = read_path(input(&files, ITEMS)?)?;
    let outcome: ProcessOutcome = read_path(input(&files, ACTIONS)?)?;

    let markdown = report::render(&fetched, &outcome, ctx.now);
    let path = ctx.store.write_text(ctx.run()?, REPORT, &markdown)?;
    eprintln!("  report: {}", path.display());

    Ok(StepReport::default())
}
