//! Rebuild the WBS tree from flat rows.
//!
//! Stored `parent_id` and `level` values drift as items are moved and
//! renumbered, so parentage is derived from the `wbs_id` path alone. Rows whose
//! parent path is missing become roots instead of being dropped.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::model::wbs_path;
use crate::model::{WbsItem, WbsRow};

/// Distance between a row's declared level and the level its path implies.
/// A missing declaration counts as a match.
fn level_score(row: &WbsRow) -> u64 {
    let expected = wbs_path::expected_level(&row.wbs_id) as i64;
    row.level.map(|l| l.abs_diff(expected)).unwrap_or(0)
}

/// Preference order among rows sharing a `wbs_id`: best level score, then
/// most recently updated, then smallest id so the choice is stable.
fn prefer(a: &WbsRow, b: &WbsRow) -> Ordering {
    level_score(a)
        .cmp(&level_score(b))
        .then_with(|| b.updated_at.cmp(&a.updated_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Keep exactly one row per `wbs_id`. Rows with malformed paths carry no
/// identity to collide on and are all kept.
pub fn dedupe_rows(rows: Vec<WbsRow>) -> Vec<WbsRow> {
    let mut by_path: HashMap<String, WbsRow> = HashMap::new();
    let mut malformed = Vec::new();
    for row in rows {
        if !wbs_path::is_well_formed(&row.wbs_id) {
            tracing::debug!(id = %row.id, wbs_id = %row.wbs_id, "malformed wbs_id, treated as level 0");
            malformed.push(row);
            continue;
        }
        let key = row.wbs_id.trim().to_string();
        match by_path.get(&key) {
            Some(kept) if prefer(kept, &row) != Ordering::Greater => {
                tracing::warn!(wbs_id = %key, kept = %kept.id, dropped = %row.id, "duplicate wbs_id");
            }
            Some(kept) => {
                tracing::warn!(wbs_id = %key, kept = %row.id, dropped = %kept.id, "duplicate wbs_id");
                by_path.insert(key, row);
            }
            None => {
                by_path.insert(key, row);
            }
        }
    }
    by_path.into_values().chain(malformed).collect()
}

/// Build the tree and return its roots, siblings in numeric path order.
pub fn build_hierarchy(rows: Vec<WbsRow>) -> Vec<WbsItem> {
    let mut items: Vec<WbsItem> = dedupe_rows(rows)
        .into_iter()
        .map(WbsItem::from_row)
        .collect();
    sort_items(&mut items);

    let index_by_path: HashMap<String, usize> = items
        .iter()
        .enumerate()
        .map(|(i, item)| (item.wbs_id().to_string(), i))
        .collect();

    // parent slot for each item, `None` for roots
    let parents: Vec<Option<usize>> = items
        .iter()
        .map(|item| {
            wbs_path::parent_path(item.wbs_id()).and_then(|p| index_by_path.get(p).copied())
        })
        .collect();

    let mut child_slots: Vec<Vec<usize>> = vec![Vec::new(); items.len()];
    let mut root_slots = Vec::new();
    for (i, parent) in parents.iter().enumerate() {
        match parent {
            Some(p) => child_slots[*p].push(i),
            None => {
                if wbs_path::parent_path(items[i].wbs_id()).is_some() {
                    tracing::debug!(id = %items[i].id, wbs_id = %items[i].wbs_id(), "parent path missing, promoted to root");
                }
                root_slots.push(i);
            }
        }
    }

    // repair advisory parent ids from the derived structure
    for (i, parent) in parents.iter().enumerate() {
        let derived = parent.map(|p| items[p].id.clone());
        if items[i].parent_id != derived {
            tracing::debug!(id = %items[i].id, stored = ?items[i].parent_id, derived = ?derived, "parent_id repaired");
            items[i].parent_id = derived;
        }
    }

    let mut slots: Vec<Option<WbsItem>> = items.into_iter().map(Some).collect();
    root_slots
        .into_iter()
        .filter_map(|i| assemble(i, &mut slots, &child_slots))
        .collect()
}

fn assemble(
    index: usize,
    slots: &mut [Option<WbsItem>],
    child_slots: &[Vec<usize>],
) -> Option<WbsItem> {
    let mut item = slots[index].take()?;
    item.children = child_slots[index]
        .iter()
        .filter_map(|&c| assemble(c, slots, child_slots))
        .collect();
    Some(item)
}

/// Sort by numeric path order; ties (only possible for malformed paths)
/// fall back to id.
pub fn sort_items(items: &mut [WbsItem]) {
    items.sort_by(|a, b| wbs_path::compare(a.wbs_id(), b.wbs_id()).then_with(|| a.id.cmp(&b.id)));
}

/// Pre-order walk of the tree with children detached from each copy.
pub fn flatten(roots: &[WbsItem]) -> Vec<WbsItem> {
    let mut out = Vec::new();
    let mut stack: Vec<&WbsItem> = roots.iter().rev().collect();
    while let Some(node) = stack.pop() {
        let mut copy = node.clone();
        copy.children = Vec::new();
        out.push(copy);
        stack.extend(node.children.iter().rev());
    }
    out
}

/// Locate a node anywhere in the tree.
pub fn find<'a>(roots: &'a [WbsItem], id: &str) -> Option<&'a WbsItem> {
    for node in roots {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find(&node.children, id) {
            return Some(found);
        }
    }
    None
}
