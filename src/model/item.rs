use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::wbs_path;
use crate::error::{Result, WbsError};

/// Represents the type of dependency between two tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyKind {
    #[serde(rename = "FS")]
    FinishToStart,
    #[serde(rename = "SS")]
    StartToStart,
    #[serde(rename = "FF")]
    FinishToFinish,
    #[serde(rename = "SF")]
    StartToFinish,
}

impl DependencyKind {
    pub const ALL: [DependencyKind; 4] = [
        DependencyKind::FinishToStart,
        DependencyKind::StartToStart,
        DependencyKind::FinishToFinish,
        DependencyKind::StartToFinish,
    ];

    pub fn code(self) -> &'static str {
        match self {
            DependencyKind::FinishToStart => "FS",
            DependencyKind::StartToStart => "SS",
            DependencyKind::FinishToFinish => "FF",
            DependencyKind::StartToFinish => "SF",
        }
    }

    /// FF and SF constrain the successor's finish; FS and SS its start.
    pub fn constrains_finish(self) -> bool {
        matches!(
            self,
            DependencyKind::FinishToFinish | DependencyKind::StartToFinish
        )
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for DependencyKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FS" => Ok(DependencyKind::FinishToStart),
            "SS" => Ok(DependencyKind::StartToStart),
            "FF" => Ok(DependencyKind::FinishToFinish),
            "SF" => Ok(DependencyKind::StartToFinish),
            other => Err(format!("unknown dependency type '{other}'")),
        }
    }
}

/// A predecessor link stored on the successor: "this item depends on `id`".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predecessor {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: DependencyKind,
    /// Signed day offset applied after the raw constraint date.
    #[serde(default)]
    pub lag: i64,
}

impl Predecessor {
    pub fn new(id: impl Into<String>, kind: DependencyKind, lag: i64) -> Self {
        Self {
            id: id.into(),
            kind,
            lag,
        }
    }
}

/// Lifecycle status of a WBS item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Delayed,
    #[serde(rename = "On Hold")]
    OnHold,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Status::NotStarted => "Not Started",
            Status::InProgress => "In Progress",
            Status::Completed => "Completed",
            Status::Delayed => "Delayed",
            Status::OnHold => "On Hold",
        }
    }

    /// Lenient mapping of free-text status labels.
    pub fn from_label(s: &str) -> Option<Status> {
        match s.trim().to_lowercase().as_str() {
            "not started" | "not-started" | "new" | "planned" => Some(Status::NotStarted),
            "in progress" | "in-progress" | "active" | "started" => Some(Status::InProgress),
            "completed" | "complete" | "done" | "finished" => Some(Status::Completed),
            "delayed" | "late" | "behind" => Some(Status::Delayed),
            "on hold" | "on-hold" | "paused" | "blocked" => Some(Status::OnHold),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::default()
}

/// A persisted WBS row as it arrives from storage. Nothing here is trusted:
/// `parent_id` and `level` may be stale and `wbs_id` may collide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WbsRow {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub wbs_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub progress: Option<i64>,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub level: Option<i64>,
    #[serde(default)]
    pub predecessors: Vec<Predecessor>,
    #[serde(default)]
    pub is_expanded: bool,
    #[serde(default = "epoch")]
    pub updated_at: DateTime<Utc>,
    #[serde(default = "epoch")]
    pub created_at: DateTime<Utc>,
}

impl WbsRow {
    pub fn new(id: impl Into<String>, wbs_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            wbs_id: wbs_id.into(),
            title: title.into(),
            description: None,
            start_date: None,
            end_date: None,
            duration: None,
            progress: None,
            status: None,
            level: None,
            predecessors: Vec::new(),
            is_expanded: false,
            updated_at: epoch(),
            created_at: epoch(),
        }
    }
}

/// End date of a task that starts on `start` and lasts `duration` days.
/// Zero-day items are milestones and finish on their start day.
pub fn end_from_start(start: NaiveDate, duration: i64) -> NaiveDate {
    shift(start, duration.max(1) - 1)
}

/// Start date of a task that must finish on `end` and lasts `duration` days.
pub fn start_from_end(end: NaiveDate, duration: i64) -> NaiveDate {
    shift(end, -(duration.max(1) - 1))
}

/// Move a date by a signed number of calendar days.
pub fn shift(date: NaiveDate, days: i64) -> NaiveDate {
    let magnitude = Days::new(days.unsigned_abs());
    let moved = if days >= 0 {
        date.checked_add_days(magnitude)
    } else {
        date.checked_sub_days(magnitude)
    };
    moved.unwrap_or(date)
}

/// A node of the work breakdown structure.
///
/// `wbs_id` and `level` move together, and `progress`/`status` become
/// read-only once the item has children; both are reached through accessors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WbsItem {
    pub id: String,
    pub parent_id: Option<String>,
    wbs_id: String,
    level: u8,
    pub title: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub duration: Option<i64>,
    progress: u8,
    status: Status,
    pub predecessors: Vec<Predecessor>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) children: Vec<WbsItem>,
    pub is_expanded: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WbsItem {
    /// Create a new leaf with sensible defaults.
    pub fn new(id: impl Into<String>, wbs_id: impl Into<String>, title: impl Into<String>) -> Self {
        let wbs_id = wbs_id.into();
        Self {
            id: id.into(),
            parent_id: None,
            level: wbs_path::expected_level(&wbs_id),
            wbs_id,
            title: title.into(),
            description: None,
            start_date: None,
            end_date: None,
            duration: None,
            progress: 0,
            status: Status::NotStarted,
            predecessors: Vec::new(),
            children: Vec::new(),
            is_expanded: false,
            created_at: epoch(),
            updated_at: epoch(),
        }
    }

    /// Normalise a persisted row: derive level from the path, clamp numeric
    /// fields, fill in whichever of `end_date`/`duration` is missing and drop
    /// duplicate predecessor links.
    pub fn from_row(row: WbsRow) -> Self {
        let mut item = WbsItem::new(row.id, row.wbs_id.trim(), row.title);
        item.parent_id = row.parent_id;
        item.description = row.description;
        item.start_date = row.start_date;
        item.end_date = row.end_date;
        item.duration = row.duration.map(|d| d.max(0));
        item.progress = row.progress.unwrap_or(0).clamp(0, 100) as u8;
        item.status = row.status.unwrap_or_default();
        item.is_expanded = row.is_expanded;
        item.created_at = row.created_at;
        item.updated_at = row.updated_at;

        for pred in row.predecessors {
            let duplicate = item
                .predecessors
                .iter()
                .any(|p| p.id == pred.id && p.kind == pred.kind);
            if !duplicate {
                item.predecessors.push(pred);
            }
        }

        match (item.start_date, item.end_date, item.duration) {
            (Some(start), None, Some(d)) => item.end_date = Some(end_from_start(start, d)),
            (Some(start), Some(end), None) if end >= start => {
                item.duration = Some((end - start).num_days() + 1)
            }
            (Some(start), Some(end), _) if end < start => {
                let repaired = end_from_start(start, item.duration.unwrap_or(1));
                tracing::debug!(id = %item.id, %start, %end, %repaired, "end date before start, repaired");
                item.end_date = Some(repaired);
                item.duration.get_or_insert(1);
            }
            _ => {}
        }
        item
    }

    /// Back to the persisted shape, with the derived level filled in.
    pub fn to_row(&self) -> WbsRow {
        WbsRow {
            id: self.id.clone(),
            parent_id: self.parent_id.clone(),
            wbs_id: self.wbs_id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            duration: self.duration,
            progress: Some(self.progress as i64),
            status: Some(self.status),
            level: Some(self.level as i64),
            predecessors: self.predecessors.clone(),
            is_expanded: self.is_expanded,
            updated_at: self.updated_at,
            created_at: self.created_at,
        }
    }

    pub fn wbs_id(&self) -> &str {
        &self.wbs_id
    }

    /// Change the path; the level follows it.
    pub fn set_wbs_id(&mut self, wbs_id: impl Into<String>) {
        self.wbs_id = wbs_id.into();
        self.level = wbs_path::expected_level(&self.wbs_id);
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn children(&self) -> &[WbsItem] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Set progress on a leaf. Parents only change through rollups.
    pub fn set_progress(&mut self, progress: u8) -> Result<()> {
        if !self.is_leaf() {
            return Err(WbsError::DerivedField {
                id: self.id.clone(),
                field: "progress",
            });
        }
        self.progress = progress.min(100);
        Ok(())
    }

    /// Set status on a leaf. Parents only change through rollups.
    pub fn set_status(&mut self, status: Status) -> Result<()> {
        if !self.is_leaf() {
            return Err(WbsError::DerivedField {
                id: self.id.clone(),
                field: "status",
            });
        }
        self.status = status;
        Ok(())
    }

    pub(crate) fn set_rollup(&mut self, progress: u8, status: Status) {
        self.progress = progress;
        self.status = status;
    }

    /// Duration used for scheduling: stored, else derived from the dates,
    /// else a single day.
    pub fn effective_duration(&self) -> i64 {
        self.duration
            .or_else(|| match (self.start_date, self.end_date) {
                (Some(s), Some(e)) if e >= s => Some((e - s).num_days() + 1),
                _ => None,
            })
            .unwrap_or(1)
            .max(0)
    }

    /// Finish date, deriving `start + duration - 1` when only the start and
    /// duration are known.
    pub fn resolved_end(&self) -> Option<NaiveDate> {
        self.end_date.or_else(|| {
            let start = self.start_date?;
            let duration = self.duration?;
            Some(end_from_start(start, duration))
        })
    }

    /// Builder: schedule the item from `start` for `duration` days.
    pub fn with_schedule(mut self, start: NaiveDate, duration: i64) -> Self {
        let duration = duration.max(0);
        self.start_date = Some(start);
        self.duration = Some(duration);
        self.end_date = Some(end_from_start(start, duration));
        self
    }

    pub fn with_predecessor(mut self, id: impl Into<String>, kind: DependencyKind, lag: i64) -> Self {
        self.predecessors.push(Predecessor::new(id, kind, lag));
        self
    }

    pub fn with_progress(mut self, progress: u8, status: Status) -> Self {
        self.progress = progress.min(100);
        self.status = status;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_children(mut self, children: Vec<WbsItem>) -> Self {
        self.children = children;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn row_fills_missing_end_from_duration() {
        let mut row = WbsRow::new("a", "1", "Stage");
        row.start_date = Some(d(2024, 1, 1));
        row.duration = Some(5);
        row.level = Some(3);
        let item = WbsItem::from_row(row);
        assert_eq!(item.end_date, Some(d(2024, 1, 5)));
        assert_eq!(item.level(), 0);
    }

    #[test]
    fn negative_duration_clamps_to_a_milestone() {
        let mut row = WbsRow::new("m", "4", "Handover");
        row.start_date = Some(d(2024, 1, 5));
        row.duration = Some(-3);
        row.progress = Some(140);
        let item = WbsItem::from_row(row);
        assert_eq!(item.duration, Some(0));
        assert_eq!(item.end_date, Some(d(2024, 1, 5)));
        assert_eq!(item.effective_duration(), 0);
        assert_eq!(item.progress(), 100);
    }

    #[test]
    fn row_fills_missing_duration_from_dates() {
        let mut row = WbsRow::new("a", "1.2", "Component");
        row.start_date = Some(d(2024, 1, 1));
        row.end_date = Some(d(2024, 1, 10));
        let item = WbsItem::from_row(row);
        assert_eq!(item.duration, Some(10));
        assert_eq!(item.level(), 1);
    }

    #[test]
    fn milestone_ends_on_start() {
        let item = WbsItem::new("m", "3", "Handover").with_schedule(d(2024, 3, 1), 0);
        assert_eq!(item.end_date, Some(d(2024, 3, 1)));
    }

    #[test]
    fn parents_refuse_direct_progress() {
        let child = WbsItem::new("c", "1.1", "Child");
        let mut parent = WbsItem::new("p", "1", "Parent").with_children(vec![child]);
        assert!(matches!(
            parent.set_progress(50),
            Err(WbsError::DerivedField { field: "progress", .. })
        ));
        assert!(parent.set_status(Status::Completed).is_err());
    }

    #[test]
    fn row_json_uses_wire_names() {
        let json = r#"{
            "id": "x", "wbs_id": "1.1", "title": "Footings",
            "start_date": "2024-01-01", "duration": 3,
            "status": "In Progress",
            "predecessors": [{"id": "y", "type": "SS", "lag": -2}]
        }"#;
        let row: WbsRow = serde_json::from_str(json).unwrap();
        assert_eq!(row.status, Some(Status::InProgress));
        assert_eq!(row.predecessors[0].kind, DependencyKind::StartToStart);
        assert_eq!(row.predecessors[0].lag, -2);
    }

    #[test]
    fn shift_handles_negative_days() {
        assert_eq!(shift(d(2024, 1, 1), -1), d(2023, 12, 31));
        assert_eq!(start_from_end(d(2024, 1, 5), 3), d(2024, 1, 3));
    }
}
