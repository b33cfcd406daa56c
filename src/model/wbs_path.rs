//! Helpers for dot-delimited WBS paths such as `"2.1.3"`.
//!
//! The path is the ground truth for hierarchy: its segment count gives the
//! depth and dropping the last segment gives the parent's path.

use std::cmp::Ordering;

/// Deepest level a WBS item can report (Stage = 0).
pub const MAX_LEVEL: u8 = 4;

/// A path is well formed when it is non-empty and has no empty segments.
pub fn is_well_formed(wbs_id: &str) -> bool {
    let trimmed = wbs_id.trim();
    !trimmed.is_empty() && trimmed.split('.').all(|s| !s.trim().is_empty())
}

/// Segment count of a well-formed path, or `None` when malformed.
pub fn depth(wbs_id: &str) -> Option<usize> {
    is_well_formed(wbs_id).then(|| wbs_id.trim().split('.').count())
}

/// Level implied by the path: `segments - 1`, clamped to `0..=MAX_LEVEL`.
/// Malformed paths are level 0.
pub fn expected_level(wbs_id: &str) -> u8 {
    match depth(wbs_id) {
        Some(n) => (n.saturating_sub(1)).min(MAX_LEVEL as usize) as u8,
        None => 0,
    }
}

/// Path of the parent node, or `None` for single-segment and malformed paths.
pub fn parent_path(wbs_id: &str) -> Option<&str> {
    if !is_well_formed(wbs_id) {
        return None;
    }
    let trimmed = wbs_id.trim();
    trimmed.rfind('.').map(|idx| &trimmed[..idx])
}

/// The numeric value of a single-segment path (`"7"` -> 7).
pub fn root_number(wbs_id: &str) -> Option<u64> {
    let trimmed = wbs_id.trim();
    if trimmed.contains('.') {
        return None;
    }
    trimmed.parse().ok()
}

/// Last segment as a number when the path sits directly under `parent`.
pub fn child_number(parent: &str, wbs_id: &str) -> Option<u64> {
    let rest = wbs_id.trim().strip_prefix(parent.trim())?.strip_prefix('.')?;
    if rest.contains('.') {
        return None;
    }
    rest.parse().ok()
}

/// True when `candidate` lies strictly below `ancestor` in the tree.
pub fn is_descendant(ancestor: &str, candidate: &str) -> bool {
    candidate
        .trim()
        .strip_prefix(ancestor.trim())
        .is_some_and(|rest| rest.starts_with('.') && rest.len() > 1)
}

/// Order paths segment by segment, numerically where both segments are
/// numbers, so `"2.10"` sorts after `"2.9"`. Non-numeric segments sort after
/// numeric ones and compare as text. A prefix sorts before its extensions.
pub fn compare(a: &str, b: &str) -> Ordering {
    let mut left = a.trim().split('.');
    let mut right = b.trim().split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ord = compare_segment(l.trim(), r.trim());
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn compare_segment(l: &str, r: &str) -> Ordering {
    match (l.parse::<u64>(), r.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => l.cmp(r),
    }
}
