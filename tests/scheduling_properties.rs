//! End-to-end properties of the scheduling engine: dependency arithmetic,
//! idempotent scheduling, cascade termination, cycle detection, rollups,
//! hierarchy reconstruction and renumbering.

use chrono::{NaiveDate, TimeZone, Utc};
use wbs_scheduler::engine::{
    auto_schedule_dependent_wbs_tasks, auto_schedule_wbs_task, build_hierarchy,
    calculate_dependency_date, detect_circular_dependencies, renumber_all_wbs_items,
    update_parent_rollups, WbsIdUpdate,
};
use wbs_scheduler::{DependencyKind, MemorySink, Status, WbsItem, WbsRow};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn predecessor() -> WbsItem {
    WbsItem::new("P", "1", "Predecessor").with_schedule(d(2024, 1, 1), 5)
}

fn successor(kind: DependencyKind, lag: i64, duration: i64) -> WbsItem {
    WbsItem::new("S", "2", "Successor")
        .with_schedule(d(2024, 6, 1), duration)
        .with_predecessor("P", kind, lag)
}

fn chain() -> Vec<WbsItem> {
    vec![
        WbsItem::new("A", "1", "A").with_schedule(d(2024, 1, 1), 3),
        WbsItem::new("B", "2", "B")
            .with_schedule(d(2024, 1, 4), 2)
            .with_predecessor("A", DependencyKind::FinishToStart, 0),
        WbsItem::new("C", "3", "C")
            .with_schedule(d(2024, 1, 6), 2)
            .with_predecessor("B", DependencyKind::FinishToStart, 0),
        WbsItem::new("D", "4", "D")
            .with_schedule(d(2024, 1, 8), 1)
            .with_predecessor("C", DependencyKind::FinishToStart, 0),
    ]
}

// ---------------------------------------------------------------------------
// Dependency arithmetic
// ---------------------------------------------------------------------------

#[test]
fn finish_to_start_no_lag() {
    let date = calculate_dependency_date(&predecessor(), DependencyKind::FinishToStart, 0);
    assert_eq!(date, Some(d(2024, 1, 6)));
}

#[test]
fn start_to_start_lag_two() {
    let date = calculate_dependency_date(&predecessor(), DependencyKind::StartToStart, 2);
    assert_eq!(date, Some(d(2024, 1, 3)));
}

#[test]
fn finish_to_finish_required_start() {
    let task = successor(DependencyKind::FinishToFinish, 0, 3);
    let update = auto_schedule_wbs_task(&task, &[predecessor(), task.clone()]).unwrap();
    assert_eq!(update.start_date, d(2024, 1, 3));
    assert_eq!(update.end_date, d(2024, 1, 5));
}

#[test]
fn start_to_finish_negative_lag() {
    let p = predecessor();
    assert_eq!(
        calculate_dependency_date(&p, DependencyKind::StartToFinish, -1),
        Some(d(2023, 12, 31))
    );
    let task = successor(DependencyKind::StartToFinish, -1, 4);
    let update = auto_schedule_wbs_task(&task, &[p, task.clone()]).unwrap();
    assert_eq!(update.start_date, d(2023, 12, 28));
}

#[test]
fn scheduling_twice_yields_nothing_the_second_time() {
    for kind in DependencyKind::ALL {
        let mut task = successor(kind, 1, 3);
        let first = auto_schedule_wbs_task(&task, &[predecessor(), task.clone()])
            .expect("first pass moves the task");
        task.apply_schedule(&first);
        assert_eq!(
            auto_schedule_wbs_task(&task, &[predecessor(), task.clone()]),
            None,
            "{kind} should be idempotent"
        );
    }
}

// ---------------------------------------------------------------------------
// Cascade
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chain_reschedules_each_dependent_once() {
    let mut tasks = chain();
    // push A back by a week
    tasks[0] = tasks[0].clone().with_schedule(d(2024, 1, 8), 3);

    let sink = MemorySink::new();
    let report = auto_schedule_dependent_wbs_tasks("A", &mut tasks, &sink).await;

    let written: Vec<String> = sink.writes().await.into_iter().map(|(id, _)| id).collect();
    assert_eq!(written, vec!["B", "C", "D"]);
    assert!(report.is_clean());
    assert_eq!(tasks[1].start_date, Some(d(2024, 1, 11)));
    assert_eq!(tasks[2].start_date, Some(d(2024, 1, 13)));
    assert_eq!(tasks[3].start_date, Some(d(2024, 1, 15)));
}

#[tokio::test]
async fn consistent_graph_is_left_alone() {
    let mut tasks = chain();
    let sink = MemorySink::new();
    let report = auto_schedule_dependent_wbs_tasks("A", &mut tasks, &sink).await;
    assert!(report.updated.is_empty());
    assert!(sink.writes().await.is_empty());
    assert_eq!(tasks, chain());
}

#[tokio::test]
async fn cascade_terminates_on_cycles() {
    let mut tasks = chain();
    // close the loop D -> A
    tasks[0] = tasks[0]
        .clone()
        .with_predecessor("D", DependencyKind::FinishToStart, 0);
    tasks[1] = tasks[1].clone().with_schedule(d(2023, 1, 1), 2);

    let sink = MemorySink::new();
    let report = auto_schedule_dependent_wbs_tasks("B", &mut tasks, &sink).await;

    // the loop is cut at the changed task, which is never rescheduled
    let written: Vec<String> = sink.writes().await.into_iter().map(|(id, _)| id).collect();
    assert_eq!(written, vec!["C", "D", "A"]);
    assert!(report.skipped_cyclic.is_empty());
    assert_eq!(tasks[1].start_date, Some(d(2023, 1, 1)));
    assert_eq!(tasks[0].start_date, Some(d(2023, 1, 6)));
}

// ---------------------------------------------------------------------------
// Cycle detection
// ---------------------------------------------------------------------------

#[test]
fn three_node_cycle_detected_and_dag_accepted() {
    let cyclic = vec![
        WbsItem::new("A", "1", "A").with_predecessor("C", DependencyKind::FinishToStart, 0),
        WbsItem::new("B", "2", "B").with_predecessor("A", DependencyKind::FinishToStart, 0),
        WbsItem::new("C", "3", "C").with_predecessor("B", DependencyKind::FinishToStart, 0),
    ];
    assert!(detect_circular_dependencies("A", &cyclic));

    for task in chain() {
        assert!(!detect_circular_dependencies(&task.id, &chain()));
    }
}

// ---------------------------------------------------------------------------
// Rollup
// ---------------------------------------------------------------------------

#[test]
fn stage_rollup_from_two_components() {
    let stage = WbsItem::new("stage", "1", "Stage").with_children(vec![
        WbsItem::new("c1", "1.1", "Component 1").with_progress(40, Status::InProgress),
        WbsItem::new("c2", "1.2", "Component 2").with_progress(60, Status::InProgress),
    ]);
    let out = update_parent_rollups(&[stage], "c1");
    assert_eq!(out.updated_items[0].progress(), 50);

    let done = WbsItem::new("stage", "1", "Stage").with_children(vec![
        WbsItem::new("c1", "1.1", "Component 1").with_progress(40, Status::Completed),
        WbsItem::new("c2", "1.2", "Component 2").with_progress(60, Status::Completed),
    ]);
    let out = update_parent_rollups(&[done], "c2");
    assert_eq!(out.updated_items[0].status(), Status::Completed);
}

// ---------------------------------------------------------------------------
// Hierarchy and identifiers
// ---------------------------------------------------------------------------

#[test]
fn hierarchy_from_paths_with_bad_parent_and_level() {
    let rows: Vec<WbsRow> = [("r1", "1"), ("r11", "1.1"), ("r12", "1.2"), ("r2", "2")]
        .into_iter()
        .map(|(id, wbs)| {
            let mut row = WbsRow::new(id, wbs, wbs);
            row.parent_id = None;
            row.level = Some(4);
            row
        })
        .collect();

    let roots = build_hierarchy(rows);
    assert_eq!(roots.len(), 2);
    assert_eq!(roots[0].wbs_id(), "1");
    assert_eq!(roots[1].wbs_id(), "2");
    let children: Vec<&str> = roots[0].children().iter().map(|c| c.wbs_id()).collect();
    assert_eq!(children, vec!["1.1", "1.2"]);
    assert!(roots[0].children().iter().all(|c| c.level() == 1));
}

#[test]
fn renumber_closes_gaps_in_creation_order() {
    let at = |day| Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap();
    let roots = vec![
        WbsItem::new("a", "1", "A").with_created_at(at(1)),
        WbsItem::new("b", "3", "B").with_created_at(at(2)),
        WbsItem::new("c", "7", "C").with_created_at(at(3)),
    ];
    assert_eq!(
        renumber_all_wbs_items(&roots),
        vec![
            WbsIdUpdate { id: "b".into(), wbs_id: "2".into() },
            WbsIdUpdate { id: "c".into(), wbs_id: "3".into() },
        ]
    );
}
