//! Bottom-up aggregation of child progress and status into parents.

use serde::{Deserialize, Serialize};

use crate::model::{Status, WbsItem};

/// A recomputed parent the caller should persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRollup {
    pub id: String,
    pub progress: u8,
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollupOutcome {
    pub updated_items: Vec<WbsItem>,
    /// Only ancestors whose progress or status actually changed, deepest
    /// first.
    pub parents_to_update: Vec<ParentRollup>,
}

/// Rounded mean of child progress.
pub fn rollup_progress(children: &[WbsItem]) -> u8 {
    if children.is_empty() {
        return 0;
    }
    let n = children.len() as u64;
    let sum: u64 = children.iter().map(|c| c.progress() as u64).sum();
    ((2 * sum + n) / (2 * n)).min(100) as u8
}

/// First matching rule wins: Completed, In Progress, Delayed, On Hold,
/// Not Started.
pub fn rollup_status(children: &[WbsItem]) -> Status {
    if children.is_empty() {
        return Status::NotStarted;
    }
    if children.iter().all(|c| c.progress() == 100)
        || children.iter().all(|c| c.status() == Status::Completed)
    {
        Status::Completed
    } else if children
        .iter()
        .any(|c| c.status() == Status::InProgress || c.progress() > 0)
    {
        Status::InProgress
    } else if children.iter().any(|c| c.status() == Status::Delayed) {
        Status::Delayed
    } else if children.iter().any(|c| c.status() == Status::OnHold) {
        Status::OnHold
    } else {
        Status::NotStarted
    }
}

fn recompute(node: &mut WbsItem, changed: &mut Vec<ParentRollup>) {
    let progress = rollup_progress(&node.children);
    let status = rollup_status(&node.children);
    if node.progress() != progress || node.status() != status {
        node.set_rollup(progress, status);
        changed.push(ParentRollup {
            id: node.id.clone(),
            progress,
            status,
        });
    }
}

/// Returns whether `changed_id` is this node or lies beneath it.
fn visit(node: &mut WbsItem, changed_id: &str, changed: &mut Vec<ParentRollup>) -> bool {
    let mut below = false;
    for child in &mut node.children {
        below |= visit(child, changed_id, changed);
    }
    if below {
        recompute(node, changed);
    }
    below || node.id == changed_id
}

/// Recompute the ancestors of `changed_item_id`.
pub fn update_parent_rollups(items: &[WbsItem], changed_item_id: &str) -> RollupOutcome {
    let mut updated_items = items.to_vec();
    let mut parents_to_update = Vec::new();
    for root in &mut updated_items {
        visit(root, changed_item_id, &mut parents_to_update);
    }
    RollupOutcome {
        updated_items,
        parents_to_update,
    }
}

fn visit_all(node: &mut WbsItem, changed: &mut Vec<ParentRollup>) {
    for child in &mut node.children {
        visit_all(child, changed);
    }
    if !node.is_leaf() {
        recompute(node, changed);
    }
}

/// Recompute every branch node, e.g. after import when stored parent values
/// have drifted.
pub fn recompute_all_rollups(items: &[WbsItem]) -> RollupOutcome {
    let mut updated_items = items.to_vec();
    let mut parents_to_update = Vec::new();
    for root in &mut updated_items {
        visit_all(root, &mut parents_to_update);
    }
    RollupOutcome {
        updated_items,
        parents_to_update,
    }
}
