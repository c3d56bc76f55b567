//! Issue source: fetch and enrich work items, one repository at a time.
//!
//! Each repository's outcome is captured as a value. A failure listing one
//! repository, or enriching one item, is recorded and the loop moves on.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::forge::{Forge, ForgeError};
use crate::model::{EnrichedItem, WorkItem, WorkItemId};

/// Everything the fetch step saw: the items and what went wrong.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOutcome {
    pub items: Vec<EnrichedItem>,
    #[serde(default)]
    pub failures: Vec<FetchFailure>,
}

/// A repository, or one item in it, that could not be fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchFailure {
    pub repo: String,

    /// Set when only this item failed to enrich.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<u64>,

    pub message: String,
}

/// Fetch open items carrying `label` from each repository, in order.
pub fn fetch(forge: &dyn Forge, repos: &[String], label: &str) -> FetchOutcome {
    let mut outcome = FetchOutcome::default();
    let mut seen = BTreeSet::new();

    for repo in repos {
        let listed = forge.list_issues(repo, label);
        let items = match listed {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(repo = %repo, error = %e, "failed to list issues");
                outcome.failures.push(FetchFailure {
                    repo: repo.clone(),
                    item: None,
                    message: e.to_string(),
                });
                continue;
            }
        };

        tracing::info!(repo = %repo, count = items.len(), "listed issues");

        for item in items {
            if !seen.insert(item.id.clone()) {
                tracing::warn!(item = %item.id, "duplicate item, keeping the first");
                continue;
            }
            match enrich(forge, item) {
                Ok(entry) => outcome.items.push(entry),
                Err((id, e)) => {
                    tracing::warn!(item = %id, error = %e, "failed to enrich item");
                    outcome.failures.push(FetchFailure {
                        repo: id.repo,
                        item: Some(id.number),
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    outcome
}

/// Attach comments and board status to a listed item.
fn enrich(forge: &dyn Forge, item: WorkItem) -> Result<EnrichedItem, (WorkItemId, ForgeError)> {
    let comments = forge
        .issue_comments(&item.id)
        .map_err(|e| (item.id.clone(), e))?;
    let project_status = forge
        .project_status(&item.id)
        .map_err(|e| (item.id.clone(), e))?;

    Ok(EnrichedItem {
        item: WorkItem { comments, ..item },
        project_status,
    })
}
