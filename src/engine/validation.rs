//! Advisory schedule checks. Nothing here blocks an edit; callers decide.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use super::cycles::find_cycles;
use super::dependency::calculate_dependency_date;
use super::scheduler::lookup;
use crate::model::{DependencyKind, WbsItem};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum ScheduleViolation {
    StartsTooEarly {
        task: String,
        predecessor: String,
        kind: DependencyKind,
        required: NaiveDate,
        actual: NaiveDate,
    },
    FinishesTooEarly {
        task: String,
        predecessor: String,
        kind: DependencyKind,
        required: NaiveDate,
        actual: NaiveDate,
    },
    EndBeforeStart {
        task: String,
        start: NaiveDate,
        end: NaiveDate,
    },
    MissingPredecessor {
        task: String,
        predecessor: String,
    },
    SelfDependency {
        task: String,
    },
    Cycle {
        tasks: Vec<String>,
    },
}

impl fmt::Display for ScheduleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleViolation::StartsTooEarly { task, predecessor, kind, required, actual } => write!(
                f,
                "Task {task} starts on {actual} but its {kind} dependency on {predecessor} requires a start on or after {required}"
            ),
            ScheduleViolation::FinishesTooEarly { task, predecessor, kind, required, actual } => write!(
                f,
                "Task {task} finishes on {actual} but its {kind} dependency on {predecessor} requires a finish on or after {required}"
            ),
            ScheduleViolation::EndBeforeStart { task, start, end } => {
                write!(f, "Task {task} ends on {end}, before its start on {start}")
            }
            ScheduleViolation::MissingPredecessor { task, predecessor } => {
                write!(f, "Task {task} depends on {predecessor}, which does not exist")
            }
            ScheduleViolation::SelfDependency { task } => {
                write!(f, "Task {task} lists itself as a predecessor")
            }
            ScheduleViolation::Cycle { tasks } => {
                write!(f, "Dependency cycle: {}", tasks.join(" -> "))
            }
        }
    }
}

/// Check one task against its predecessors.
pub fn validate_wbs_task_schedule(task: &WbsItem, all: &[WbsItem]) -> Vec<ScheduleViolation> {
    let mut violations = Vec::new();

    if let (Some(start), Some(end)) = (task.start_date, task.end_date) {
        if end < start {
            violations.push(ScheduleViolation::EndBeforeStart {
                task: task.id.clone(),
                start,
                end,
            });
        }
    }

    for pred in &task.predecessors {
        if pred.id == task.id {
            violations.push(ScheduleViolation::SelfDependency {
                task: task.id.clone(),
            });
            continue;
        }
        let Some(predecessor) = lookup(all, &pred.id) else {
            violations.push(ScheduleViolation::MissingPredecessor {
                task: task.id.clone(),
                predecessor: pred.id.clone(),
            });
            continue;
        };
        let Some(required) = calculate_dependency_date(predecessor, pred.kind, pred.lag) else {
            continue;
        };

        if pred.kind.constrains_finish() {
            if let Some(actual) = task.resolved_end().filter(|end| *end < required) {
                violations.push(ScheduleViolation::FinishesTooEarly {
                    task: task.id.clone(),
                    predecessor: pred.id.clone(),
                    kind: pred.kind,
                    required,
                    actual,
                });
            }
        } else if let Some(actual) = task.start_date.filter(|start| *start < required) {
            violations.push(ScheduleViolation::StartsTooEarly {
                task: task.id.clone(),
                predecessor: pred.id.clone(),
                kind: pred.kind,
                required,
                actual,
            });
        }
    }
    violations
}

/// Every task's violations plus any dependency cycles.
pub fn validate_project(all: &[WbsItem]) -> Vec<ScheduleViolation> {
    let mut violations: Vec<ScheduleViolation> = all
        .iter()
        .flat_map(|task| validate_wbs_task_schedule(task, all))
        .collect();
    violations.extend(
        find_cycles(all)
            .into_iter()
            .map(|tasks| ScheduleViolation::Cycle { tasks }),
    );
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DependencyKind::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn pred() -> WbsItem {
        WbsItem::new("a", "1", "Concrete").with_schedule(d(2024, 1, 1), 5)
    }

    #[test]
    fn early_start_is_reported() {
        let succ = WbsItem::new("b", "2", "Formwork strip")
            .with_schedule(d(2024, 1, 4), 2)
            .with_predecessor("a", FinishToStart, 0);
        let all = vec![pred(), succ.clone()];
        let violations = validate_wbs_task_schedule(&succ, &all);
        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations[0].to_string(),
            "Task b starts on 2024-01-04 but its FS dependency on a requires a start on or after 2024-01-06"
        );
    }

    #[test]
    fn early_finish_is_reported() {
        let succ = WbsItem::new("b", "2", "Curing")
            .with_schedule(d(2024, 1, 1), 2)
            .with_predecessor("a", FinishToFinish, 1);
        let all = vec![pred(), succ.clone()];
        let violations = validate_wbs_task_schedule(&succ, &all);
        assert!(matches!(
            violations.as_slice(),
            [ScheduleViolation::FinishesTooEarly { required, .. }] if *required == d(2024, 1, 6)
        ));
    }

    #[test]
    fn satisfied_schedule_is_clean() {
        let succ = WbsItem::new("b", "2", "Framing")
            .with_schedule(d(2024, 1, 6), 2)
            .with_predecessor("a", FinishToStart, 0);
        let all = vec![pred(), succ.clone()];
        assert!(validate_wbs_task_schedule(&succ, &all).is_empty());
    }

    #[test]
    fn structural_problems_are_reported() {
        let mut odd = WbsItem::new("b", "2", "Odd")
            .with_predecessor("b", FinishToStart, 0)
            .with_predecessor("ghost", StartToStart, 0);
        odd.start_date = Some(d(2024, 2, 1));
        odd.end_date = Some(d(2024, 1, 1));
        let all = vec![pred(), odd.clone()];
        let violations = validate_wbs_task_schedule(&odd, &all);
        assert_eq!(violations.len(), 3);
        assert!(matches!(violations[0], ScheduleViolation::EndBeforeStart { .. }));
        assert!(matches!(violations[1], ScheduleViolation::SelfDependency { .. }));
        assert!(matches!(violations[2], ScheduleViolation::MissingPredecessor { .. }));
    }

    #[test]
    fn project_report_includes_cycles() {
        let all = vec![
            WbsItem::new("a", "1", "A").with_predecessor("b", FinishToStart, 0),
            WbsItem::new("b", "2", "B").with_predecessor("a", FinishToStart, 0),
        ];
        let violations = validate_project(&all);
        assert_eq!(
            violations,
            vec![ScheduleViolation::Cycle { tasks: vec!["a".into(), "b".into()] }]
        );
    }
}
