//! Action execution: apply the side effects of each item's phase.
//!
//! Every mutation funnels through [`Executor::perform`], the only place the
//! run [`Mode`] is consulted. In dry-run mode the same log line is emitted
//! with a `[dry-run]` prefix, the same [`Action`] is recorded with
//! `dry_run` set, and the collaborator is never called.
//!
//! Before mutating, the executor re-reads the item's live state and skips
//! effects that already hold, so a repeat run against an unchanged snapshot
//! does not assign, notify, or close twice.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::classify::{ReviewPolicy, classify};
use crate::forge::{Forge, ForgeError};
use crate::model::{
    Action, ActionKind, Channel, Classification, EnrichedItem, ItemError, Phase, WorkItem,
    WorkItemId,
};
use crate::notify::{Notifier, NotifyError};

/// Marker on the comment asking for missing fields.
pub const VALIDATION_MARKER: &str = "<!-- shepherd:validation -->";

/// Marker on the final approval notice.
pub const APPROVED_MARKER: &str = "<!-- shepherd:approved -->";

/// Whether side effects reach the outside world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Live,
    DryRun,
}

impl Mode {
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run { Self::DryRun } else { Self::Live }
    }

    pub fn is_dry_run(self) -> bool {
        self == Self::DryRun
    }

    /// Log prefix; empty in live mode.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Live => "",
            Self::DryRun => "[dry-run] ",
        }
    }
}

/// A failure applying one item's effects.
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Forge(#[from] ForgeError),

    #[error("notification failed: {0}")]
    Notify(#[from] NotifyError),
}

/// What the process step produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOutcome {
    pub dry_run: bool,
    pub classifications: Vec<Classification>,
    pub actions: Vec<Action>,
    #[serde(default)]
    pub errors: Vec<ItemError>,
}

/// Applies phase effects through the forge and notifier.
pub struct Executor<'a> {
    forge: &'a dyn Forge,
    notifier: &'a dyn Notifier,
    policy: &'a ReviewPolicy,
    escalation_recipients: &'a [String],
    mode: Mode,
}

impl<'a> Executor<'a> {
    pub fn new(
        forge: &'a dyn Forge,
        notifier: &'a dyn Notifier,
        policy: &'a ReviewPolicy,
        escalation_recipients: &'a [String],
        mode: Mode,
    ) -> Self {
        Self {
            forge,
            notifier,
            policy,
            escalation_recipients,
            mode,
        }
    }

    /// Classify and apply every item, in order.
    ///
    /// A failing item is recorded in `errors` and does not stop the batch.
    /// Actions completed for it before the failure are kept.
    pub fn process(&self, entries: &[EnrichedItem], now: Timestamp) -> ProcessOutcome {
        let mut outcome = ProcessOutcome {
            dry_run: self.mode.is_dry_run(),
            ..ProcessOutcome::default()
        };

        for entry in entries {
            let classification = classify(entry, self.policy, now);
            let id = &entry.item.id;

            if let Err(e) = self.apply(entry, &classification, &mut outcome.actions) {
                tracing::warn!(item = %id, phase = %classification.phase, error = %e, "item failed");
                outcome.errors.push(ItemError {
                    item: id.clone(),
                    phase: classification.phase,
                    message: e.to_string(),
                });
            }
            outcome.classifications.push(classification);
        }

        outcome
    }

    /// Apply the effects of one item's phase, appending to `actions`.
    pub fn apply(
        &self,
        entry: &EnrichedItem,
        classification: &Classification,
        actions: &mut Vec<Action>,
    ) -> Result<(), ExecuteError> {
        let item = &entry.item;
        match classification.phase {
            Phase::InitialReview => {
                self.start_review(item, &classification.findings.missing_fields, actions)
            }
            Phase::EscalatedReview => self.escalate(item, actions),
            Phase::ReadyToClose => self.finish(item, actions),
            Phase::AwaitingReview | Phase::Watching => {
                tracing::info!(
                    "{}{}: {}, nothing to do ({})",
                    self.mode.prefix(),
                    item.id,
                    classification.phase,
                    classification.reason
                );
                Ok(())
            }
        }
    }

    // ── Phase effects ──

    fn start_review(
        &self,
        item: &WorkItem,
        missing: &[String],
        actions: &mut Vec<Action>,
    ) -> Result<(), ExecuteError> {
        let state = self.forge.item_state(&item.id)?;

        if !missing.is_empty() {
            if state.has_marker(VALIDATION_MARKER) {
                self.skip(&item.id, "missing-field request already posted");
                return Ok(());
            }
            return self.comment(&item.id, validation_comment(missing), actions);
        }

        if state.is_assigned_to(&self.policy.reviewer) {
            self.skip(&item.id, "reviewer already assigned");
            return Ok(());
        }
        self.assign(&item.id, &self.policy.reviewer, actions)
    }

    fn escalate(&self, item: &WorkItem, actions: &mut Vec<Action>) -> Result<(), ExecuteError> {
        let current = self.forge.project_status(&item.id)?;
        let watching = &self.policy.watching_status;

        if current
            .as_ref()
            .is_some_and(|s| s.name.eq_ignore_ascii_case(watching))
        {
            self.skip(&item.id, "already on watch");
            return Ok(());
        }

        let subject = format!("Review escalated: {} ({})", item.title, item.id);
        let body = escalation_body(item, self.policy.waiting_business_days);
        self.email(&item.id, &subject, &body, actions)?;
        self.set_status(&item.id, current.map(|s| s.name), watching, actions)
    }

    fn finish(&self, item: &WorkItem, actions: &mut Vec<Action>) -> Result<(), ExecuteError> {
        let state = self.forge.item_state(&item.id)?;
        if !state.open {
            self.skip(&item.id, "already closed");
            return Ok(());
        }

        // The marker comment suppresses the message on later runs, so the
        // message goes first.
        if state.has_marker(APPROVED_MARKER) {
            self.skip(&item.id, "approval notice already posted");
        } else {
            let message = format!("{} ({}) was approved and closed.", item.title, item.url);
            self.direct(&item.id, &self.policy.reviewer, &message, actions)?;
            let notice = approval_notice(self.policy.waiting_business_days);
            self.comment(&item.id, notice, actions)?;
        }

        self.close(&item.id, "completed", actions)
    }

    // ── Mutations ──

    fn assign(
        &self,
        id: &WorkItemId,
        login: &str,
        actions: &mut Vec<Action>,
    ) -> Result<(), ExecuteError> {
        let kind = ActionKind::Assign {
            assignee: login.to_string(),
        };
        self.perform(id, kind, actions, || {
            self.forge.add_assignee(id, login).map_err(Into::into)
        })
    }

    fn comment(
        &self,
        id: &WorkItemId,
        body: String,
        actions: &mut Vec<Action>,
    ) -> Result<(), ExecuteError> {
        let kind = ActionKind::Comment { body: body.clone() };
        self.perform(id, kind, actions, || {
            self.forge.add_comment(id, &body).map_err(Into::into)
        })
    }

    fn set_status(
        &self,
        id: &WorkItemId,
        from: Option<String>,
        to: &str,
        actions: &mut Vec<Action>,
    ) -> Result<(), ExecuteError> {
        let kind = ActionKind::StatusChange {
            from,
            to: to.to_string(),
        };
        self.perform(id, kind, actions, || {
            self.forge.set_project_status(id, to).map_err(Into::into)
        })
    }

    fn email(
        &self,
        id: &WorkItemId,
        subject: &str,
        body: &str,
        actions: &mut Vec<Action>,
    ) -> Result<(), ExecuteError> {
        let kind = ActionKind::Notify {
            channel: Channel::Email,
            recipients: self.escalation_recipients.to_vec(),
            subject: subject.to_string(),
        };
        self.perform(id, kind, actions, || {
            self.notifier
                .send_email(self.escalation_recipients, subject, body)
                .map_err(Into::into)
        })
    }

    fn direct(
        &self,
        id: &WorkItemId,
        user: &str,
        message: &str,
        actions: &mut Vec<Action>,
    ) -> Result<(), ExecuteError> {
        let kind = ActionKind::Notify {
            channel: Channel::DirectMessage,
            recipients: vec![user.to_string()],
            subject: message.to_string(),
        };
        self.perform(id, kind, actions, || {
            self.notifier.send_direct(user, message).map_err(Into::into)
        })
    }

    fn close(
        &self,
        id: &WorkItemId,
        reason: &str,
        actions: &mut Vec<Action>,
    ) -> Result<(), ExecuteError> {
        let kind = ActionKind::Close {
            reason: reason.to_string(),
        };
        self.perform(id, kind, actions, || {
            self.forge.close_issue(id, reason).map_err(Into::into)
        })
    }

    /// Log, run `op` unless in dry-run mode, and record the action.
    fn perform(
        &self,
        id: &WorkItemId,
        kind: ActionKind,
        actions: &mut Vec<Action>,
        op: impl FnOnce() -> Result<(), ExecuteError>,
    ) -> Result<(), ExecuteError> {
        tracing::info!("{}{id}: {}", self.mode.prefix(), kind.describe());

        if self.mode == Mode::Live {
            op()?;
        }

        actions.push(Action::new(id.clone(), kind, self.mode.is_dry_run()));
        Ok(())
    }

    fn skip(&self, id: &WorkItemId, why: &str) {
        tracing::info!("{}{id}: skipped, {why}", self.mode.prefix());
    }
}

fn validation_comment(missing: &[String]) -> String {
    let list: String = missing.iter().map(|f| format!("- {f}\n")).collect();
    format!(
        "{VALIDATION_MARKER}\n\
         Thanks for the review request. Before a reviewer is assigned, \
         please add the following to the issue description:\n\n{list}"
    )
}

fn escalation_body(item: &WorkItem, window: i64) -> String {
    format!(
        "{title}\n{url}\n\n\
         The reviewer has signed off. The item is now on watch for \
         {window} business days; reply on the issue to object.",
        title = item.title,
        url = item.url,
    )
}

fn approval_notice(window: i64) -> String {
    format!(
        "{APPROVED_MARKER}\n\
         No objections were raised during the {window}-business-day watch window. \
         Approved; closing."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use jiff::ToSpan;

    use crate::testing::{
        REPO, StubForge, StubNotifier, comment_at, enriched, policy, timestamp, watching_since,
        with_assignee, with_label,
    };

    fn friday() -> Timestamp {
        timestamp("2026-10-16T15:00:00Z")
    }

    fn wednesday() -> Timestamp {
        friday() + 120.hours()
    }

    fn recipients() -> Vec<String> {
        vec!["board@example.com".to_string()]
    }

    /// One item per phase.
    fn every_phase() -> Vec<EnrichedItem> {
        let mut missing_fields = enriched(6);
        missing_fields.item.body = String::new();
        vec![
            enriched(1),
            with_assignee(enriched(2), "alice"),
            with_label(with_assignee(enriched(3), "alice"), "ready-for-review"),
            watching_since(enriched(4), wednesday()),
            watching_since(enriched(5), friday()),
            missing_fields,
        ]
    }

    fn track_all(forge: &StubForge, entries: &[EnrichedItem]) {
        for entry in entries {
            forge.track(entry);
        }
    }

    #[test]
    fn dry_run_never_reaches_collaborators() {
        let forge = StubForge::default();
        let notifier = StubNotifier::default();
        let mut p = policy();
        p.required_fields = vec!["Namespace".into()];
        let entries = every_phase();
        track_all(&forge, &entries);
        let recipients = recipients();
        let executor = Executor::new(&forge, &notifier, &p, &recipients, Mode::DryRun);

        let outcome = executor.process(&entries, wednesday());

        assert!(forge.mutations().is_empty());
        assert!(notifier.sent().is_empty());
        assert!(outcome.dry_run);
        assert!(outcome.errors.is_empty());
        assert!(!outcome.actions.is_empty());
        assert!(outcome.actions.iter().all(|a| a.dry_run));

        let phases: Vec<Phase> = outcome.classifications.iter().map(|c| c.phase).collect();
        assert_eq!(
            phases,
            vec![
                Phase::InitialReview,
                Phase::AwaitingReview,
                Phase::EscalatedReview,
                Phase::Watching,
                Phase::ReadyToClose,
                Phase::InitialReview,
            ]
        );
    }

    #[test]
    fn dry_run_records_the_same_actions_as_live() {
        let entries = every_phase();
        let recipients = recipients();
        let p = policy();

        let kinds = |mode| {
            let forge = StubForge::default();
            let notifier = StubNotifier::default();
            track_all(&forge, &entries);
            Executor::new(&forge, &notifier, &p, &recipients, mode)
                .process(&entries, wednesday())
                .actions
                .into_iter()
                .map(|a| (a.target, a.kind))
                .collect::<Vec<_>>()
        };

        assert_eq!(kinds(Mode::DryRun), kinds(Mode::Live));
    }

    #[test]
    fn repeat_live_run_does_not_duplicate_effects() {
        let forge = StubForge::default();
        let notifier = StubNotifier::default();
        let p = policy();
        let entries = vec![
            enriched(1),
            with_label(with_assignee(enriched(2), "alice"), "ready-for-review"),
            watching_since(enriched(3), friday()),
        ];
        track_all(&forge, &entries);
        let recipients = recipients();
        let executor = Executor::new(&forge, &notifier, &p, &recipients, Mode::Live);

        let first = executor.process(&entries, wednesday());
        let second = executor.process(&entries, wednesday());

        assert_eq!(first.actions.len(), 6);
        assert!(second.actions.is_empty());
        assert_eq!(forge.count("assign"), 1);
        assert_eq!(forge.count("status"), 1);
        assert_eq!(forge.count("comment"), 1);
        assert_eq!(forge.count("close"), 1);
        assert_eq!(notifier.sent().len(), 2);
    }

    #[test]
    fn failing_item_is_isolated() {
        let forge = StubForge::default();
        let notifier = StubNotifier::default();
        let p = policy();
        let entries = vec![enriched(1), enriched(2), enriched(3)];
        track_all(&forge, &entries);
        forge.fail_item(&WorkItemId::new(REPO, 2));
        let recipients = recipients();
        let executor = Executor::new(&forge, &notifier, &p, &recipients, Mode::Live);

        let outcome = executor.process(&entries, friday());

        let targets: Vec<u64> = outcome.actions.iter().map(|a| a.target.number).collect();
        assert_eq!(targets, vec![1, 3]);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].item, WorkItemId::new(REPO, 2));
        assert_eq!(outcome.errors[0].phase, Phase::InitialReview);
        assert!(outcome.errors[0].message.contains("rate limit"));
        assert_eq!(outcome.classifications.len(), 3);
    }

    #[test]
    fn ready_label_and_lgtm_escalate_live() {
        let forge = StubForge::default();
        let notifier = StubNotifier::default();
        let p = policy();
        let mut entry = with_label(with_assignee(enriched(1), "alice"), "ready-for-review");
        entry
            .item
            .comments
            .push(comment_at("alice", "LGTM", friday()));
        forge.track(&entry);
        let recipients = recipients();
        let executor = Executor::new(&forge, &notifier, &p, &recipients, Mode::Live);

        let outcome = executor.process(std::slice::from_ref(&entry), friday());

        assert_eq!(outcome.classifications[0].phase, Phase::EscalatedReview);
        assert_eq!(outcome.actions.len(), 2);
        let notify: Vec<&Action> = outcome
            .actions
            .iter()
            .filter(|a| matches!(a.kind, ActionKind::Notify { .. }))
            .collect();
        let status: Vec<&Action> = outcome
            .actions
            .iter()
            .filter(|a| matches!(a.kind, ActionKind::StatusChange { .. }))
            .collect();
        assert_eq!(notify.len(), 1);
        assert_eq!(status.len(), 1);
        assert!(outcome.actions.iter().all(|a| !a.dry_run));
        assert_eq!(notifier.sent().len(), 1);
        assert_eq!(forge.count("status"), 1);
    }

    #[test]
    fn missing_fields_request_is_posted_once() {
        let forge = StubForge::default();
        let notifier = StubNotifier::default();
        let mut p = policy();
        p.required_fields = vec!["Service".into()];
        let entry = enriched(1);
        forge.track(&entry);
        let recipients = recipients();
        let executor = Executor::new(&forge, &notifier, &p, &recipients, Mode::Live);

        executor.process(std::slice::from_ref(&entry), friday());
        executor.process(std::slice::from_ref(&entry), friday());

        assert_eq!(forge.count("comment"), 1);
        assert_eq!(forge.count("assign"), 0);
        let state = forge.state(&entry.item.id).unwrap();
        assert!(state.comments[0].body.contains("- Service"));
    }

    #[test]
    fn notification_failure_is_an_item_error() {
        let forge = StubForge::default();
        let notifier = StubNotifier::failing();
        let p = policy();
        let entry = with_label(with_assignee(enriched(1), "alice"), "ready-for-review");
        forge.track(&entry);
        let recipients = recipients();
        let executor = Executor::new(&forge, &notifier, &p, &recipients, Mode::Live);

        let outcome = executor.process(std::slice::from_ref(&entry), friday());

        assert!(outcome.actions.is_empty());
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].message.contains("401"));
        assert_eq!(forge.count("status"), 0);
    }

    #[test]
    fn failed_reviewer_message_is_retried_before_closing() {
        let forge = StubForge::default();
        let p = policy();
        let entry = watching_since(enriched(1), friday());
        forge.track(&entry);
        let recipients = recipients();

        let broken = StubNotifier::failing();
        let first = Executor::new(&forge, &broken, &p, &recipients, Mode::Live)
            .process(std::slice::from_ref(&entry), wednesday());

        assert_eq!(first.errors.len(), 1);
        assert!(first.actions.is_empty());
        assert_eq!(forge.count("comment"), 0);
        assert!(forge.state(&entry.item.id).unwrap().open);

        let healthy = StubNotifier::default();
        let second = Executor::new(&forge, &healthy, &p, &recipients, Mode::Live)
            .process(std::slice::from_ref(&entry), wednesday());

        assert!(second.errors.is_empty());
        assert_eq!(healthy.sent(), vec!["direct alice".to_string()]);
        assert_eq!(forge.count("comment"), 1);
        assert_eq!(forge.count("close"), 1);
        assert!(!forge.state(&entry.item.id).unwrap().open);
    }

    #[test]
    fn waiting_phases_take_no_action() {
        let forge = StubForge::default();
        let notifier = StubNotifier::default();
        let p = policy();
        let entries = vec![
            with_assignee(enriched(1), "alice"),
            watching_since(enriched(2), wednesday()),
        ];
        track_all(&forge, &entries);
        let recipients = recipients();
        let executor = Executor::new(&forge, &notifier, &p, &recipients, Mode::Live);

        let outcome = executor.process(&entries, wednesday());

        assert!(outcome.actions.is_empty());
        assert!(forge.mutations().is_empty());
    }

    #[test]
    fn markers_identify_own_comments() {
        for marker in [VALIDATION_MARKER, APPROVED_MARKER] {
            assert!(marker.starts_with(crate::model::MARKER_PREFIX));
        }
        assert!(validation_comment(&["Service".into()]).starts_with(VALIDATION_MARKER));
        assert!(approval_notice(3).contains("3-business-day"));
    }

    #[test]
    fn mode_prefix() {
        assert_eq!(Mode::from_dry_run(true).prefix(), "[dry-run] ");
        assert_eq!(Mode::from_dry_run(false).prefix(), "");
    }
}
