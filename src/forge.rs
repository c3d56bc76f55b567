//! The issue and project-board collaborator.
//!
//! Everything shepherd knows about work items comes through [`Forge`],
//! and every mutation of them goes out through it. The production
//! implementation shells out to the `gh` CLI; tests use an in-memory stub.

mod gh;

use std::io;

pub use gh::GhCli;

use crate::model::{Comment, ItemState, ProjectStatus, WorkItem, WorkItemId};

/// Errors from the forge. Always isolated to the item or repository
/// being worked on when they occur.
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    #[error("failed to run gh: {0}")]
    Spawn(#[source] io::Error),

    #[error("gh {command} failed: {stderr}")]
    Failed { command: String, stderr: String },

    #[error("unexpected gh output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("project board: {0}")]
    Project(String),
}

/// Read and write access to issues and the tracking board.
///
/// Reads take a snapshot; nothing is cached between calls.
/// Methods below the `Mutations` marker change the outside world and must
/// only be called by the executor after it has checked the run mode.
pub trait Forge {
    /// Open issues carrying `label` in `repo` (`owner/name`).
    /// Comments are not included; fetch them with [`Forge::issue_comments`].
    fn list_issues(&self, repo: &str, label: &str) -> Result<Vec<WorkItem>, ForgeError>;

    fn issue_comments(&self, id: &WorkItemId) -> Result<Vec<Comment>, ForgeError>;

    /// Current open/assignee/comment state, re-read right before mutating.
    fn item_state(&self, id: &WorkItemId) -> Result<ItemState, ForgeError>;

    /// The item's status on the configured board, `None` if it is not on it.
    fn project_status(&self, id: &WorkItemId) -> Result<Option<ProjectStatus>, ForgeError>;

    // ── Mutations ──

    fn add_assignee(&self, id: &WorkItemId, login: &str) -> Result<(), ForgeError>;

    fn add_comment(&self, id: &WorkItemId, body: &str) -> Result<(), ForgeError>;

    /// Close with a reason (`completed` or `not planned`).
    fn close_issue(&self, id: &WorkItemId, reason: &str) -> Result<(), ForgeError>;

    /// Set the board status, adding the item to the board first if needed.
    fn set_project_status(&self, id: &WorkItemId, status: &str) -> Result<(), ForgeError>;
}
