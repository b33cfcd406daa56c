//! Project files on disk: JSON persistence, CSV exchange and the repair pass
//! applied to imported rows.

use chrono::NaiveDate;
use tempfile::TempDir;
use wbs_scheduler::io::{export_csv, import_csv, load_project, save_project};
use wbs_scheduler::{DependencyKind, Predecessor, Project, Status, WbsError, WbsRow};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn sample_project() -> (Project, String, String, String) {
    let mut project = Project::new("Clinic fit-out");
    let stage = project.add_item("Strip out", None, Some(d(2024, 3, 4)), 5).unwrap();
    let walls = project
        .add_item("Demolish partitions", Some(&stage), Some(d(2024, 3, 4)), 3)
        .unwrap();
    let ceilings = project
        .add_item("Remove ceilings", Some(&stage), Some(d(2024, 3, 7)), 2)
        .unwrap();
    project
        .add_predecessor(&ceilings, Predecessor::new(walls.clone(), DependencyKind::FinishToStart, 0))
        .unwrap();
    (project, stage, walls, ceilings)
}

#[test]
fn json_project_survives_a_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("clinic.json");
    let (mut project, _, walls, ceilings) = sample_project();
    project.set_progress(&walls, 100, Some(Status::Completed)).unwrap();

    save_project(&project, &path).unwrap();
    let loaded = load_project(&path).unwrap();

    assert_eq!(loaded.name, "Clinic fit-out");
    assert_eq!(loaded.items, project.items);
    let row = loaded.items.iter().find(|r| r.id == ceilings).unwrap();
    assert_eq!(row.predecessors[0].id, walls);
}

#[test]
fn missing_project_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let err = load_project(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, WbsError::Io { .. }));
}

#[test]
fn csv_export_then_import_keeps_structure_and_links() {
    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("clinic.csv");
    let (project, stage, walls, ceilings) = sample_project();

    let written = export_csv(&project.tasks(), &csv_path, b';').unwrap();
    assert_eq!(written, 3);

    let (rows, skipped) = import_csv(&csv_path).unwrap();
    assert_eq!(skipped, 0);
    let mut imported = Project::new("Imported");
    imported.items = rows;
    let tree = imported.tree();

    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].id, stage);
    let children: Vec<&str> = tree[0].children().iter().map(|c| c.id.as_str()).collect();
    assert_eq!(children, vec![walls.as_str(), ceilings.as_str()]);
    assert_eq!(tree[0].children()[1].predecessors[0].id, walls);
    assert_eq!(tree[0].children()[0].end_date, Some(d(2024, 3, 6)));
}

#[test]
fn normalize_repairs_drifted_rows() {
    let mut project = Project::new("Drift");
    let mut stage = WbsRow::new("s", "1", "Stage");
    stage.level = Some(2);
    let mut child = WbsRow::new("c", "1.1", "Child");
    child.parent_id = Some("nobody".into());
    let mut stale_copy = WbsRow::new("c-old", "1.1", "Child (stale)");
    stale_copy.level = Some(3);
    project.items = vec![stage, child, stale_copy];

    assert!(project.normalize() > 0);
    assert_eq!(project.items.len(), 2);
    let child = project.items.iter().find(|r| r.id == "c").unwrap();
    assert_eq!(child.parent_id.as_deref(), Some("s"));
    assert_eq!(child.level, Some(1));
    assert_eq!(project.normalize(), 0);
}
