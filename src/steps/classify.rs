use std::collections::BTreeMap;

use crate::artifact::read_path;
use crate::classify::classify;
use crate::model::Classification;
use crate::pipeline::StepReport;
use crate::source::FetchOutcome;

use super::{ITEMS, PHASES, StepContext, StepError, input};

/// Writes phases for inspection; `process` never reads them back.
pub fn run(ctx: &StepContext<'_>) -> Result<StepReport, StepError> {
    let files = ctx.inputs("classify", &[ITEMS])?;
    let fetched: FetchOutcome = read_path(input(&files, ITEMS)?)?;

    let classifications: Vec<Classification> = fetched
        .items
        .iter()
        .map(|entry| classify(entry, ctx.policy, ctx.now))
        .collect();

    let mut counts = BTreeMap::new();
    for c in &classifications {
        tracing::info!(item = %c.item, phase = %c.phase, reason = %c.reason, "classified");
        *counts.entry(c.phase).or_insert(0_usize) += 1;
    }
    for (phase, count) in counts {
        tracing::info!(%phase, count, "phase total");
    }

    ctx.store.write(ctx.run()?, PHASES, &classifications)?;
    Ok(StepReport::default())
}
