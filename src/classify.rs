//! Phase classification: infer where a work item stands from what is visible.
//!
//! The classifier never consults stored state. Each phase is recognized by
//! the side effects of the previous one: an assignee, a label, a comment,
//! a board status and how long it has been set. Running it twice on the
//! same snapshot gives the same answer.
//!
//! Rules, first match wins:
//!
//! 1. `InitialReview`: reviewer not assigned.
//! 2. `AwaitingReview`: no ready signal and not on watch.
//! 3. `EscalatedReview`: ready signal, not on watch yet.
//! 4. `Watching`: on watch, and the window is still open, an objection was
//!    seen, or the watch start is unknown.
//! 5. `ReadyToClose`: on watch, window elapsed, no objection.

use jiff::{Timestamp, tz::TimeZone};
use regex::{Regex, RegexBuilder};

use crate::calendar::business_days_between;
use crate::config::{Config, ConfigError};
use crate::model::{Classification, EnrichedItem, Findings, Phase, ProjectStatus, WorkItem};

/// Compiled review policy: who reviews, what counts as approval or objection,
/// and how long the objection window lasts.
#[derive(Debug, Clone)]
pub struct ReviewPolicy {
    pub reviewer: String,
    pub ready_label: String,

    /// Login shepherd acts as; its comments never count as objections.
    pub identity: Option<String>,

    pub watching_status: String,
    pub waiting_business_days: i64,
    pub required_fields: Vec<String>,
    pub unrecognized_comments_block_close: bool,
    pub time_zone: TimeZone,
    approval: Vec<Regex>,
    objection: Vec<Regex>,
}

impl ReviewPolicy {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let review = &config.review;
        let time_zone = match &config.timezone {
            Some(name) => TimeZone::get(name)
                .map_err(|e| ConfigError::Invalid(format!("unknown timezone '{name}': {e}")))?,
            None => TimeZone::UTC,
        };

        Ok(Self {
            reviewer: review.reviewer.clone(),
            ready_label: review.ready_label.clone(),
            identity: config.identity.clone(),
            watching_status: config.project.watching_status.clone(),
            waiting_business_days: review.waiting_business_days,
            required_fields: review.required_fields.clone(),
            unrecognized_comments_block_close: review.unrecognized_comments_block_close,
            time_zone,
            approval: compile(&review.approval_patterns)?,
            objection: compile(&review.objection_patterns)?,
        })
    }

    fn is_approval(&self, text: &str) -> bool {
        self.approval.iter().any(|r| r.is_match(text)) && !self.is_objection(text)
    }

    fn is_objection(&self, text: &str) -> bool {
        self.objection.iter().any(|r| r.is_match(text))
    }

    fn is_self(&self, login: &str) -> bool {
        self.identity
            .as_deref()
            .is_some_and(|id| id.eq_ignore_ascii_case(login))
    }

    /// Required fields absent from the body, compared case-insensitively.
    pub fn missing_fields(&self, body: &str) -> Vec<String> {
        let body = body.to_lowercase();
        self.required_fields
            .iter()
            .filter(|f| !body.contains(&f.to_lowercase()))
            .cloned()
            .collect()
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .map_err(|e| ConfigError::Invalid(format!("bad pattern '{p}': {e}")))
        })
        .collect()
}

/// Classify one item against the policy as of `now`.
pub fn classify(entry: &EnrichedItem, policy: &ReviewPolicy, now: Timestamp) -> Classification {
    let item = &entry.item;
    let verdict = |phase, reason: String, findings| Classification {
        item: item.id.clone(),
        phase,
        reason,
        findings,
    };

    if !item.is_assigned_to(&policy.reviewer) {
        let findings = Findings {
            missing_fields: policy.missing_fields(&item.body),
            ..Findings::default()
        };
        return verdict(
            Phase::InitialReview,
            format!("{} is not assigned", policy.reviewer),
            findings,
        );
    }

    let watch = entry
        .project_status
        .as_ref()
        .filter(|s| s.name.eq_ignore_ascii_case(&policy.watching_status));
    let signal = ready_signal(item, policy);

    match (signal, watch) {
        (None, None) => verdict(
            Phase::AwaitingReview,
            "no ready label or approval from the reviewer yet".to_string(),
            Findings::default(),
        ),
        (Some(signal), None) => verdict(Phase::EscalatedReview, signal, Findings::default()),
        (_, Some(status)) => {
            let (phase, reason, findings) = classify_watch(item, status, policy, now);
            verdict(phase, reason, findings)
        }
    }
}

/// What signals the reviewer is done, if anything.
fn ready_signal(item: &WorkItem, policy: &ReviewPolicy) -> Option<String> {
    if item.has_label(&policy.ready_label) {
        return Some(format!("labeled {}", policy.ready_label));
    }
    item.comments
        .iter()
        .find(|c| c.author.eq_ignore_ascii_case(&policy.reviewer) && policy.is_approval(&c.body))
        .map(|c| format!("approval comment from {}", c.author))
}

fn classify_watch(
    item: &WorkItem,
    status: &ProjectStatus,
    policy: &ReviewPolicy,
    now: Timestamp,
) -> (Phase, String, Findings) {
    let Some(since) = status.since else {
        return (
            Phase::Watching,
            "watch start unknown; holding".to_string(),
            Findings::default(),
        );
    };

    let start = since.to_zoned(policy.time_zone.clone()).date();
    let today = now.to_zoned(policy.time_zone.clone()).date();
    let elapsed = business_days_between(start, today);

    let findings = Findings {
        objections: objections(item, since, policy),
        business_days_elapsed: Some(elapsed),
        ..Findings::default()
    };

    if !findings.objections.is_empty() {
        let reason = format!("objection raised by {}", findings.objections.join(", "));
        return (Phase::Watching, reason, findings);
    }

    if elapsed < policy.waiting_business_days {
        let reason = format!(
            "{elapsed} of {} business days elapsed",
            policy.waiting_business_days
        );
        return (Phase::Watching, reason, findings);
    }

    let reason = format!("{elapsed} business days elapsed without objection");
    (Phase::ReadyToClose, reason, findings)
}

/// Comments since the watch began that block closing.
///
/// Explicit objections always count. Comments that are neither objections
/// nor approvals count too unless the policy says otherwise.
fn objections(item: &WorkItem, since: Timestamp, policy: &ReviewPolicy) -> Vec<String> {
    let mut found = Vec::new();
    for comment in item.comments.iter().filter(|c| c.created_at >= since) {
        if policy.is_self(&comment.author) || comment.is_marked() {
            continue;
        }
        let blocks = if policy.is_objection(&comment.body) {
            true
        } else {
            policy.unrecognized_comments_block_close && !policy.is_approval(&comment.body)
        };
        if blocks && !found.contains(&comment.author) {
            found.push(comment.author.clone());
        }
    }
    found
}
