//! Markdown report for a run.
//!
//! Output depends only on its inputs. The generation time is confined to a
//! single `<!-- generated-at: ... -->` line so two renders of the same run
//! can be compared by masking it.

use std::collections::BTreeMap;

use jiff::Timestamp;

use crate::execute::ProcessOutcome;
use crate::model::{Phase, WorkItem, WorkItemId};
use crate::source::FetchOutcome;

/// Render the report for one run.
pub fn render(fetched: &FetchOutcome, outcome: &ProcessOutcome, generated_at: Timestamp) -> String {
    let items: BTreeMap<&WorkItemId, &WorkItem> = fetched
        .items
        .iter()
        .map(|e| (&e.item.id, &e.item))
        .collect();

    let mut out = String::new();
    out.push_str("# Review status\n\n");
    out.push_str(&format!("<!-- generated-at: {generated_at} -->\n"));
    out.push('\n');
    if outcome.dry_run {
        out.push_str("> Dry run: no changes were made.\n\n");
    }

    summary(&mut out, outcome);
    item_table(&mut out, outcome, &items);
    actions(&mut out, outcome);
    errors(&mut out, fetched, outcome);

    out
}

fn summary(out: &mut String, outcome: &ProcessOutcome) {
    let mut counts: BTreeMap<Phase, usize> = Phase::ALL.iter().map(|p| (*p, 0)).collect();
    for c in &outcome.classifications {
        *counts.entry(c.phase).or_default() += 1;
    }

    out.push_str("## Summary\n\n| Phase | Items |\n|---|---:|\n");
    for (phase, count) in &counts {
        out.push_str(&format!("| {phase} | {count} |\n"));
    }
    out.push_str(&format!("| **total** | {} |\n", outcome.classifications.len()));
    out.push('\n');
}

fn item_table(
    out: &mut String,
    outcome: &ProcessOutcome,
    items: &BTreeMap<&WorkItemId, &WorkItem>,
) {
    out.push_str("## Items\n\n");
    if outcome.classifications.is_empty() {
        out.push_str("No open work items.\n\n");
        return;
    }

    out.push_str("| Item | Title | Phase | Reason |\n|---|---|---|---|\n");
    for c in &outcome.classifications {
        let (link, title) = match items.get(&c.item) {
            Some(item) => (format!("[{}]({})", c.item, item.url), cell(&item.title)),
            None => (c.item.to_string(), String::new()),
        };
        out.push_str(&format!("| {link} | {title} | {} | {} |\n", c.phase, cell(&c.reason)));
    }
    out.push('\n');
}

fn actions(out: &mut String, outcome: &ProcessOutcome) {
    out.push_str("## Actions\n\n");
    if outcome.actions.is_empty() {
        out.push_str("None.\n\n");
        return;
    }

    for action in &outcome.actions {
        let suffix = if action.dry_run { " (dry run)" } else { "" };
        out.push_str(&format!("- {}: {}{suffix}\n", action.target, action.kind.describe()));
    }
    out.push('\n');
}

fn errors(out: &mut String, fetched: &FetchOutcome, outcome: &ProcessOutcome) {
    out.push_str("## Errors\n\n");
    if fetched.failures.is_empty() && outcome.errors.is_empty() {
        out.push_str("None.\n");
        return;
    }

    for f in &fetched.failures {
        let what = match f.item {
            Some(number) => format!("{}#{number}", f.repo),
            None => f.repo.clone(),
        };
        out.push_str(&format!("- {what} (fetch): {}\n", single_line(&f.message)));
    }
    for e in &outcome.errors {
        out.push_str(&format!("- {} ({}): {}\n", e.item, e.phase, single_line(&e.message)));
    }
}

/// Escape text for a table cell.
fn cell(text: &str) -> String {
    single_line(text).replace('|', "\\|")
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
