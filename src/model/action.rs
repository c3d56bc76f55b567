//! Action types: immutable records of side effects shepherd applied or previewed.
//!
//! One action = one kind. In dry-run mode the same record is produced
//! with `dry_run` set, and nothing reaches the outside world.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Phase, WorkItemId};

/// A single, immutable record of a side effect against one work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: Uuid,

    /// Which item the action targets.
    pub target: WorkItemId,

    /// What was done.
    pub kind: ActionKind,

    /// True when the action was only logged, not executed.
    pub dry_run: bool,

    pub recorded_at: Timestamp,
}

impl Action {
    pub fn new(target: WorkItemId, kind: ActionKind, dry_run: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            target,
            kind,
            dry_run,
            recorded_at: Timestamp::now(),
        }
    }
}

/// What was done. Grouped by verb.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ActionKind {
    /// Added an assignee.
    Assign { assignee: String },

    /// Posted a comment.
    Comment { body: String },

    /// Changed the tracking status on the project board.
    StatusChange { from: Option<String>, to: String },

    /// Sent a notification outside the forge.
    Notify {
        channel: Channel,
        recipients: Vec<String>,
        subject: String,
    },

    /// Closed the item.
    Close { reason: String },
}

impl ActionKind {
    /// Short verb phrase for logs and reports.
    pub fn describe(&self) -> String {
        match self {
            Self::Assign { assignee } => format!("assign {assignee}"),
            Self::Comment { .. } => "comment".to_string(),
            Self::StatusChange { from, to } => match from {
                Some(from) => format!("status {from} → {to}"),
                None => format!("status → {to}"),
            },
            Self::Notify {
                channel,
                recipients,
                ..
            } => format!("notify {} via {}", recipients.join(", "), channel.label()),
            Self::Close { reason } => format!("close ({reason})"),
        }
    }
}

/// How a notification is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Channel {
    DirectMessage,
    Email,
}

impl Channel {
    pub fn label(self) -> &'static str {
        match self {
            Self::DirectMessage => "direct message",
            Self::Email => "email",
        }
    }
}

/// An external failure isolated to one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemError {
    pub item: WorkItemId,
    pub phase: Phase,
    pub message: String,
}
