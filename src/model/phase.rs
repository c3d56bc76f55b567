//! Phases: where a work item stands in the review workflow.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::WorkItemId;

/// The inferred stage of a work item.
///
/// Always recomputed from the item's observable state; never persisted
/// as a cursor that later runs would trust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    /// The designated reviewer is not assigned yet.
    InitialReview,

    /// Reviewer assigned, waiting for a ready signal.
    AwaitingReview,

    /// Ready signal seen; the item goes out for external sign-off.
    EscalatedReview,

    /// Tracking status set; waiting out the objection window.
    Watching,

    /// Window elapsed with no objection.
    ReadyToClose,
}

impl Phase {
    pub const ALL: [Self; 5] = [
        Self::InitialReview,
        Self::AwaitingReview,
        Self::EscalatedReview,
        Self::Watching,
        Self::ReadyToClose,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::InitialReview => "initial review",
            Self::AwaitingReview => "awaiting review",
            Self::EscalatedReview => "escalated review",
            Self::Watching => "watching",
            Self::ReadyToClose => "ready to close",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The classifier's verdict for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub item: WorkItemId,
    pub phase: Phase,

    /// Short human-readable explanation of why this phase matched.
    pub reason: String,

    #[serde(default)]
    pub findings: Findings,
}

/// Facts the classifier noticed along the way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Findings {
    /// Required body fields that are missing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<String>,

    /// Comments treated as objections during the watch window, by author.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub objections: Vec<String>,

    /// Business days elapsed since watching began.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_days_elapsed: Option<i64>,
}
