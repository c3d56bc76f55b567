use crate::pipeline::StepReport;
use crate::source;

use super::{ITEMS, StepContext, StepError};

pub fn run(ctx: &StepContext<'_>) -> Result<StepReport, StepError> {
    let review = &ctx.config.review;
    let outcome = source::fetch(ctx.forge, &review.repos, &review.label);

    let path = ctx.store.write(ctx.run()?, ITEMS, &outcome)?;
    tracing::info!(
        items = outcome.items.len(),
        failures = outcome.failures.len(),
        path = %path.display(),
        "fetched work items"
    );

    Ok(StepReport {
        item_errors: outcome.failures.len(),
    })
}
