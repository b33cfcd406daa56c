//! Allocation of WBS path identifiers.

use serde::{Deserialize, Serialize};

use super::hierarchy::flatten;
use crate::model::wbs_path;
use crate::model::WbsItem;

/// A path change produced by renumbering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WbsIdUpdate {
    pub id: String,
    pub wbs_id: String,
}

/// Smallest positive integer missing from `used`, or `max + 1`.
fn first_gap(mut used: Vec<u64>) -> u64 {
    used.sort_unstable();
    used.dedup();
    let mut expected = 1;
    for n in used {
        if n == 0 {
            continue;
        }
        if n > expected {
            break;
        }
        expected = n + 1;
    }
    expected
}

/// Next root-level id: the first unused positive integer among the
/// single-segment numeric ids in `items`.
pub fn generate_wbs_id(items: &[WbsItem]) -> String {
    let used = items
        .iter()
        .filter_map(|item| wbs_path::root_number(item.wbs_id()))
        .collect();
    first_gap(used).to_string()
}

/// Next child id under `parent_wbs_id`, following the same gap rule.
pub fn generate_child_wbs_id(parent_wbs_id: &str, items: &[WbsItem]) -> String {
    let used = items
        .iter()
        .filter_map(|item| wbs_path::child_number(parent_wbs_id, item.wbs_id()))
        .collect();
    format!("{}.{}", parent_wbs_id.trim(), first_gap(used))
}

/// Renumber every item to a flat sequence `"1", "2", ...` in creation order.
///
/// Only items whose path actually changes are returned, so the caller writes
/// as few rows as possible.
pub fn renumber_all_wbs_items(roots: &[WbsItem]) -> Vec<WbsIdUpdate> {
    // flatten is pre-order, so a stable sort keeps path order for ties
    let mut flat = flatten(roots);
    flat.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    flat.iter()
        .enumerate()
        .filter_map(|(i, item)| {
            let wbs_id = (i + 1).to_string();
            (item.wbs_id() != wbs_id).then(|| WbsIdUpdate {
                id: item.id.clone(),
                wbs_id,
            })
        })
        .collect()
}
