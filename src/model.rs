//! Core data model for shepherd.
//!
//! These types flow between pipeline steps as JSON artifacts:
//! work items, phases, actions, and the run record itself.

mod action;
mod phase;
mod run;
mod work_item;

pub use action::{Action, ActionKind, Channel, ItemError};
pub use phase::{Classification, Findings, Phase};
pub use run::PipelineRun;
pub use work_item::{Comment, EnrichedItem, ItemState, ProjectStatus, WorkItem, WorkItemId};

/// Prefix of the hidden markers shepherd embeds in the comments it posts.
pub const MARKER_PREFIX: &str = "<!-- shepherd:";
