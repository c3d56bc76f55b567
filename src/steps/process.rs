use crate::artifact::read_path;
use crate::execute::Executor;
use crate::pipeline::StepReport;
use crate::source::FetchOutcome;

use super::{ACTIONS, ITEMS, StepContext, StepError, input};

pub fn run(ctx: &StepContext<'_>) -> Result<StepReport, StepError> {
    let (Some(notifier), Some(notify)) = (ctx.notifier, ctx.config.notify.as_ref()) else {
        return Err(StepError::Invalid(
            "process needs a notification endpoint; add a [notify] section to the config"
                .to_string(),
        ));
    };

    let files = ctx.inputs("process", &[ITEMS])?;
    let fetched: FetchOutcome = read_path(input(&files, ITEMS)?)?;

    let executor = Executor::new(
        ctx.forge,
        notifier,
        ctx.policy,
        &notify.escalation_recipients,
        ctx.mode,
    );
    let outcome = executor.process(&fetched.items, ctx.now);

    ctx.store.write(ctx.run()?, ACTIONS, &outcome)?;
    tracing::info!(
        actions = outcome.actions.len(),
        errors = outcome.errors.len(),
        dry_run = outcome.dry_run,
        "processed work items"
    );

    Ok(StepReport {
        item_errors: outcome.errors.len(),
    })
}
