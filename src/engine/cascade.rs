//! Transitive rescheduling of everything downstream of a changed task.
//!
//! The affected set is collected with an explicit worklist, then scheduled in
//! dependency order so each dependent is evaluated once, after all of its
//! affected predecessors. A dependent is only evaluated when at least one of
//! its predecessors actually moved during this cascade.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;

use super::scheduler::{auto_schedule_wbs_task, ScheduleUpdate};
use crate::model::WbsItem;
use crate::store::{ItemPatch, PersistSink};

/// Outcome of one cascade.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CascadeReport {
    /// Dependents rescheduled and persisted, in the order they were written.
    pub updated: Vec<(String, ScheduleUpdate)>,
    /// Dependents whose write failed, with the error text.
    pub failed: Vec<(String, String)>,
    /// Dependents left untouched because they sit on a dependency cycle.
    pub skipped_cyclic: Vec<String>,
}

impl CascadeReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.skipped_cyclic.is_empty()
    }
}

/// successor indices keyed by predecessor id
fn dependents_index(tasks: &[WbsItem]) -> HashMap<String, Vec<usize>> {
    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, task) in tasks.iter().enumerate() {
        let mut seen = HashSet::new();
        for pred in &task.predecessors {
            if pred.id != task.id && seen.insert(pred.id.as_str()) {
                index.entry(pred.id.clone()).or_default().push(i);
            }
        }
    }
    index
}

/// Affected indices that lie on a dependency cycle within `affected`.
fn cyclic_members(
    affected: &[usize],
    dependents: &HashMap<String, Vec<usize>>,
    tasks: &[WbsItem],
) -> HashSet<usize> {
    let in_set: HashSet<usize> = affected.iter().copied().collect();
    let in_set = &in_set;
    let successors = move |i: usize| {
        dependents
            .get(&tasks[i].id)
            .into_iter()
            .flatten()
            .copied()
            .filter(move |next| in_set.contains(next))
    };

    let mut cyclic = HashSet::new();
    for &origin in affected {
        let mut seen: HashSet<usize> = HashSet::new();
        let mut stack: Vec<usize> = successors(origin).collect();
        while let Some(i) = stack.pop() {
            if i == origin {
                cyclic.insert(origin);
                break;
            }
            if seen.insert(i) {
                stack.extend(successors(i));
            }
        }
    }
    cyclic
}

/// Reschedule every task that depends, directly or transitively, on
/// `changed_task_id`, persisting each change through `sink`.
///
/// The in-memory `tasks` snapshot is updated after each successful write so
/// later calculations see it. A failed write is logged and recorded; the
/// cascade carries on with the other dependents.
pub async fn auto_schedule_dependent_wbs_tasks(
    changed_task_id: &str,
    tasks: &mut [WbsItem],
    sink: &dyn PersistSink,
) -> CascadeReport {
    let mut report = CascadeReport::default();
    let dependents = dependents_index(tasks);

    // collect the affected set; the changed task itself is never rescheduled
    let mut processed: HashSet<String> = HashSet::new();
    let mut affected: Vec<usize> = Vec::new();
    let mut worklist = vec![changed_task_id.to_string()];
    while let Some(id) = worklist.pop() {
        if !processed.insert(id.clone()) {
            continue;
        }
        for &i in dependents.get(&id).into_iter().flatten() {
            let dep_id = &tasks[i].id;
            if dep_id != changed_task_id && !processed.contains(dep_id) {
                affected.push(i);
                worklist.push(dep_id.clone());
            }
        }
    }
    affected.sort_unstable();
    affected.dedup();

    if affected.is_empty() {
        return report;
    }

    // only dependents that can reach themselves inside the affected set sit
    // on a cycle; anything merely downstream of one is still scheduled
    let cyclic = cyclic_members(&affected, &dependents, tasks);
    for &i in &affected {
        if cyclic.contains(&i) {
            tracing::warn!(task = %tasks[i].id, "dependent sits on a dependency cycle, not rescheduled");
            report.skipped_cyclic.push(tasks[i].id.clone());
        }
    }

    // with cyclic members removed the rest is acyclic; order it by in-degree
    // counted over the remaining affected predecessors
    let acyclic: Vec<usize> = affected.iter().copied().filter(|i| !cyclic.contains(i)).collect();
    let in_set: HashSet<&str> = acyclic.iter().map(|&i| tasks[i].id.as_str()).collect();
    let mut indegree: HashMap<usize, usize> = acyclic
        .iter()
        .map(|&i| {
            let preds: HashSet<&str> = tasks[i]
                .predecessors
                .iter()
                .map(|p| p.id.as_str())
                .filter(|id| *id != tasks[i].id && in_set.contains(id))
                .collect();
            (i, preds.len())
        })
        .collect();

    let mut ready: VecDeque<usize> = acyclic
        .iter()
        .copied()
        .filter(|i| indegree.get(i) == Some(&0))
        .collect();
    let mut order = Vec::with_capacity(acyclic.len());
    while let Some(i) = ready.pop_front() {
        order.push(i);
        for &next in dependents.get(&tasks[i].id).into_iter().flatten() {
            if let Some(count) = indegree.get_mut(&next) {
                if *count > 0 {
                    *count -= 1;
                    if *count == 0 {
                        ready.push_back(next);
                    }
                }
            }
        }
    }

    let mut moved: HashSet<String> = HashSet::from([changed_task_id.to_string()]);
    for i in order {
        let upstream_moved = tasks[i].predecessors.iter().any(|p| moved.contains(&p.id));
        if !upstream_moved {
            continue;
        }
        let Some(update) = auto_schedule_wbs_task(&tasks[i], tasks) else {
            continue;
        };

        let id = tasks[i].id.clone();
        match sink.persist(&id, &ItemPatch::from(update)).await {
            Ok(()) => {
                tracing::debug!(task = %id, start = %update.start_date, end = %update.end_date, "rescheduled");
                tasks[i].apply_schedule(&update);
                moved.insert(id.clone());
                report.updated.push((id, update));
            }
            Err(e) => {
                tracing::warn!(task = %id, error = %e, "failed to persist rescheduled dates");
                report.failed.push((id, e.to_string()));
            }
        }
    }

    tracing::info!(
        changed = %changed_task_id,
        updated = report.updated.len(),
        failed = report.failed.len(),
        skipped = report.skipped_cyclic.len(),
        "cascade finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DependencyKind::*;
    use crate::store::MemorySink;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    struct RejectingSink {
        reject: &'static str,
        inner: MemorySink,
    }

    #[async_trait]
    impl PersistSink for RejectingSink {
        async fn persist(&self, id: &str, patch: &ItemPatch) -> anyhow::Result<()> {
            if id == self.reject {
                anyhow::bail!("database unavailable");
            }
            self.inner.persist(id, patch).await
        }
    }

    #[tokio::test]
    async fn diamond_dependents_are_written_once() {
        let mut tasks = vec![
            WbsItem::new("A", "1", "Slab").with_schedule(d(2024, 1, 10), 5),
            WbsItem::new("B", "2", "Walls")
                .with_schedule(d(2024, 1, 1), 2)
                .with_predecessor("A", FinishToStart, 0),
            WbsItem::new("C", "3", "Plumbing")
                .with_schedule(d(2024, 1, 1), 4)
                .with_predecessor("A", FinishToStart, 0),
            WbsItem::new("D", "4", "Roof")
                .with_schedule(d(2024, 1, 1), 1)
                .with_predecessor("B", FinishToStart, 0)
                .with_predecessor("C", FinishToStart, 0),
        ];
        let sink = MemorySink::new();
        let report = auto_schedule_dependent_wbs_tasks("A", &mut tasks, &sink).await;

        let written: Vec<String> = sink.writes().await.into_iter().map(|(id, _)| id).collect();
        assert_eq!(written, vec!["B", "C", "D"]);
        assert!(report.is_clean());
        // C ends 01-18, later than B's 01-16
        assert_eq!(tasks[3].start_date, Some(d(2024, 1, 19)));
    }

    #[tokio::test]
    async fn failed_write_does_not_block_other_branches() {
        let mut tasks = vec![
            WbsItem::new("A", "1", "Slab").with_schedule(d(2024, 1, 10), 5),
            WbsItem::new("B", "2", "Walls")
                .with_schedule(d(2024, 1, 1), 2)
                .with_predecessor("A", FinishToStart, 0),
            WbsItem::new("B2", "3", "Cladding")
                .with_schedule(d(2024, 1, 1), 2)
                .with_predecessor("B", FinishToStart, 0),
            WbsItem::new("C", "4", "Drainage")
                .with_schedule(d(2024, 1, 1), 2)
                .with_predecessor("A", StartToStart, 1),
        ];
        let sink = RejectingSink {
            reject: "B",
            inner: MemorySink::new(),
        };
        let report = auto_schedule_dependent_wbs_tasks("A", &mut tasks, &sink).await;

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "B");
        let updated: Vec<&str> = report.updated.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(updated, vec!["C"]);
        // B was not written, so its snapshot and its dependent stay put
        assert_eq!(tasks[1].start_date, Some(d(2024, 1, 1)));
        assert_eq!(tasks[2].start_date, Some(d(2024, 1, 1)));
        assert_eq!(tasks[3].start_date, Some(d(2024, 1, 11)));
    }

    #[tokio::test]
    async fn cyclic_dependents_are_skipped() {
        let mut tasks = vec![
            WbsItem::new("A", "1", "Start").with_schedule(d(2024, 1, 1), 1),
            WbsItem::new("B", "2", "Loop one")
                .with_schedule(d(2024, 1, 1), 1)
                .with_predecessor("A", FinishToStart, 0)
                .with_predecessor("C", FinishToStart, 0),
            WbsItem::new("C", "3", "Loop two")
                .with_schedule(d(2024, 1, 1), 1)
                .with_predecessor("B", FinishToStart, 0),
        ];
        let sink = MemorySink::new();
        let report = auto_schedule_dependent_wbs_tasks("A", &mut tasks, &sink).await;
        assert_eq!(report.skipped_cyclic, vec!["B", "C"]);
        assert!(sink.writes().await.is_empty());
    }

    #[tokio::test]
    async fn dependent_downstream_of_a_cycle_is_still_scheduled() {
        let mut tasks = vec![
            WbsItem::new("A", "1", "Slab").with_schedule(d(2024, 1, 10), 5),
            WbsItem::new("B", "2", "Loop one")
                .with_schedule(d(2024, 1, 1), 1)
                .with_predecessor("A", FinishToStart, 0)
                .with_predecessor("C", FinishToStart, 0),
            WbsItem::new("C", "3", "Loop two")
                .with_schedule(d(2024, 1, 1), 1)
                .with_predecessor("B", FinishToStart, 0),
            WbsItem::new("D", "4", "Handover")
                .with_schedule(d(2024, 1, 1), 1)
                .with_predecessor("A", FinishToStart, 0)
                .with_predecessor("C", FinishToStart, 0),
        ];
        let sink = MemorySink::new();
        let report = auto_schedule_dependent_wbs_tasks("A", &mut tasks, &sink).await;

        assert_eq!(report.skipped_cyclic, vec!["B", "C"]);
        let updated: Vec<&str> = report.updated.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(updated, vec!["D"]);
        assert_eq!(tasks[3].start_date, Some(d(2024, 1, 15)));
    }

    #[tokio::test]
    async fn unknown_task_changes_nothing() {
        let mut tasks = vec![WbsItem::new("A", "1", "Only").with_schedule(d(2024, 1, 1), 1)];
        let sink = MemorySink::new();
        let report = auto_schedule_dependent_wbs_tasks("nope", &mut tasks, &sink).await;
        assert_eq!(report, CascadeReport::default());
    }
}
