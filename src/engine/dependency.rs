//! Date constraint imposed by a single predecessor relation.

use chrono::NaiveDate;

use crate::model::item::shift;
use crate::model::{DependencyKind, WbsItem};

/// The constraint a predecessor places on its successor, in calendar days.
///
/// * FS: `end + 1 + lag`, earliest successor start
/// * SS: `start + lag`, earliest successor start
/// * FF: `end + lag`, successor finish
/// * SF: `start + lag`, successor finish
///
/// A missing end is derived from start and duration. Returns `None` when the
/// anchor the rule needs is unknown; the relation is then non-binding.
pub fn calculate_dependency_date(
    predecessor: &WbsItem,
    kind: DependencyKind,
    lag: i64,
) -> Option<NaiveDate> {
    match kind {
        DependencyKind::FinishToStart => predecessor.resolved_end().map(|end| shift(end, 1 + lag)),
        DependencyKind::StartToStart | DependencyKind::StartToFinish => {
            predecessor.start_date.map(|start| shift(start, lag))
        }
        DependencyKind::FinishToFinish => predecessor.resolved_end().map(|end| shift(end, lag)),
    }
}
