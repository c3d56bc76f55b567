//! Work items: the unit of review flowing through the pipeline.

use std::fmt;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Stable identifier for a work item: repository plus issue number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkItemId {
    /// `owner/name`.
    pub repo: String,
    pub number: u64,
}

impl WorkItemId {
    pub fn new(repo: impl Into<String>, number: u64) -> Self {
        Self {
            repo: repo.into(),
            number,
        }
    }
}

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.repo, self.number)
    }
}

/// A snapshot of one issue, taken at fetch time.
///
/// Never mutated after the fetch step. Derived facts live in
/// [`EnrichedItem`] or in a [`Classification`](super::Classification).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    pub id: WorkItemId,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    pub comments: Vec<Comment>,
    pub url: String,
}

impl WorkItem {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l.eq_ignore_ascii_case(label))
    }

    pub fn is_assigned_to(&self, login: &str) -> bool {
        self.assignees.iter().any(|a| a.eq_ignore_ascii_case(login))
    }
}

/// A top-level comment on an issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub author: String,
    pub body: String,
    pub created_at: Timestamp,
}

impl Comment {
    /// Whether shepherd itself posted this comment.
    pub fn is_marked(&self) -> bool {
        self.body.contains(super::MARKER_PREFIX)
    }
}

/// Single-select status of the item on the tracking project board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatus {
    /// Option name, e.g. `"Watching"`.
    pub name: String,

    /// When the field was last changed, if the board reports it.
    pub since: Option<Timestamp>,
}

/// A work item plus the facts attached to it during the fetch step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedItem {
    pub item: WorkItem,
    pub project_status: Option<ProjectStatus>,
}

/// Live state of an item, re-read right before mutating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemState {
    pub open: bool,
    pub assignees: Vec<String>,
    pub comments: Vec<Comment>,
}

impl ItemState {
    pub fn is_assigned_to(&self, login: &str) -> bool {
        self.assignees.iter().any(|a| a.eq_ignore_ascii_case(login))
    }

    /// Whether any comment already carries the given hidden marker.
    pub fn has_marker(&self, marker: &str) -> bool {
        self.comments.iter().any(|c| c.body.contains(marker))
    }
}
