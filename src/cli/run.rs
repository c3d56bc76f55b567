//! `shepherd run`: wire the collaborators and execute the pipeline.

use std::path::PathBuf;

use jiff::Timestamp;

use crate::artifact::ArtifactStore;
use crate::classify::ReviewPolicy;
use crate::config::{self, Config};
use crate::execute::Mode;
use crate::forge::GhCli;
use crate::notify::{Notifier, WebhookNotifier};
use crate::pipeline::Step;
use crate::steps::{self, REPORT, StepContext};

use super::gh_config_dir;

pub(super) fn cmd_run(
    config: &Config,
    output: PathBuf,
    dry_run: bool,
    requested: &[String],
) -> Result<(), String> {
    let pipeline = steps::pipeline();
    let selection = pipeline.select(requested).map_err(|e| e.to_string())?;
    let mode = Mode::from_dry_run(config::resolve_dry_run(dry_run));
    let policy = ReviewPolicy::from_config(config).map_err(|e| e.to_string())?;

    let processes = selection.iter().any(|s| s.name == "process");
    let notifier = match &config.notify {
        Some(notify) => {
            if processes && notify.escalation_recipients.is_empty() {
                return Err("notify.escalation-recipients must list at least one address".into());
            }
            Some(
                WebhookNotifier::new(notify.webhook.clone())
                    .map_err(|e| format!("failed to set up notifications: {e}"))?,
            )
        }
        None if processes => {
            return Err(
                "the process step needs a [notify] section with a webhook in the config".into(),
            );
        }
        None => None,
    };

    let forge = GhCli::new(gh_config_dir(config)?, config.project.clone());
    if touches_forge(&selection) {
        forge.auth_status().map_err(|e| {
            format!("gh is not authenticated: {e}\nSet up with: gh auth login")
        })?;
    }
    let store = ArtifactStore::new(output).with_run_id(ArtifactStore::inherited_run_id());

    let ctx = StepContext {
        config,
        policy: &policy,
        store: &store,
        forge: &forge,
        notifier: notifier.as_ref().map(|n| n as &dyn Notifier),
        mode,
        now: Timestamp::now(),
    };

    if mode.is_dry_run() {
        eprintln!("Dry run: actions are logged and recorded, nothing is changed.");
    }

    let summary = pipeline
        .run(&ctx, &selection)
        .map_err(|e| e.to_string())?;

    eprintln!("Run {} → {}", summary.run.id, summary.run.dir.display());

    if !summary.is_clean() {
        let report = summary.run.dir.join(REPORT);
        let hint = if report.is_file() {
            format!("; see {}", report.display())
        } else {
            String::new()
        };
        return Err(format!(
            "{} item error(s) recorded{hint}",
            summary.item_errors
        ));
    }

    Ok(())
}

/// Steps that call `gh`, so credentials are checked before the run starts.
fn touches_forge(selection: &[&Step]) -> bool {
    selection
        .iter()
        .any(|s| matches!(s.name, "fetch" | "process"))
}
