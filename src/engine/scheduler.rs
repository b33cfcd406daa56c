//! Earliest feasible dates for one task given all of its predecessors.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::dependency::calculate_dependency_date;
use crate::model::item::{end_from_start, start_from_end};
use crate::model::WbsItem;

/// Proposed new dates for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleUpdate {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl WbsItem {
    pub fn apply_schedule(&mut self, update: &ScheduleUpdate) {
        self.start_date = Some(update.start_date);
        self.end_date = Some(update.end_date);
    }
}

pub(crate) fn lookup<'a>(all: &'a [WbsItem], id: &str) -> Option<&'a WbsItem> {
    all.iter().find(|t| t.id == id)
}

/// The start date all of `task`'s resolvable predecessors allow, or `None`
/// when none of them bind.
///
/// FS/SS relations give earliest starts; FF/SF give finish targets that are
/// converted to a start through the task's duration. The latest of all wins.
pub fn constrained_start(task: &WbsItem, all: &[WbsItem]) -> Option<NaiveDate> {
    let mut earliest_start: Option<NaiveDate> = None;
    let mut latest_finish: Option<NaiveDate> = None;

    for pred in &task.predecessors {
        if pred.id == task.id {
            continue;
        }
        let Some(predecessor) = lookup(all, &pred.id) else {
            tracing::debug!(task = %task.id, predecessor = %pred.id, "predecessor not found, ignored");
            continue;
        };
        let Some(date) = calculate_dependency_date(predecessor, pred.kind, pred.lag) else {
            continue;
        };
        let slot = if pred.kind.constrains_finish() {
            &mut latest_finish
        } else {
            &mut earliest_start
        };
        *slot = Some(slot.map_or(date, |current| current.max(date)));
    }

    let duration = task.effective_duration();
    let required_from_finish = latest_finish.map(|finish| start_from_end(finish, duration));

    match (earliest_start, required_from_finish) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// Propose new dates for `task` from the snapshot `all`.
///
/// Returns `None` when no predecessor binds or when the task already sits on
/// the proposed dates, so applying a result and calling again yields `None`.
pub fn auto_schedule_wbs_task(task: &WbsItem, all: &[WbsItem]) -> Option<ScheduleUpdate> {
    let start_date = constrained_start(task, all)?;
    let end_date = end_from_start(start_date, task.effective_duration());

    if task.start_date == Some(start_date) && task.end_date == Some(end_date) {
        return None;
    }
    Some(ScheduleUpdate {
        start_date,
        end_date,
    })
}
