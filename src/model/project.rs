use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::item::{end_from_start, Predecessor, Status, WbsItem, WbsRow};
use super::wbs_path;
use crate::engine::cascade::{auto_schedule_dependent_wbs_tasks, CascadeReport};
use crate::engine::cycles::would_create_cycle;
use crate::engine::hierarchy::{build_hierarchy, find, flatten};
use crate::engine::identifiers::{
    generate_child_wbs_id, generate_wbs_id, renumber_all_wbs_items, WbsIdUpdate,
};
use crate::engine::rollup::{recompute_all_rollups, update_parent_rollups, ParentRollup};
use crate::engine::validation::{validate_project, ScheduleViolation};
use crate::error::{Result, WbsError};
use crate::store::{ItemPatch, PersistSink};

/// A WBS project: the persisted rows plus metadata.
///
/// Rows stay in their stored shape; the tree and the flat task snapshot the
/// engine works on are derived from them on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub items: Vec<WbsRow>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            name: "Untitled Project".to_string(),
            items: Vec::new(),
            created: Utc::now(),
            modified: Utc::now(),
        }
    }
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Touch the modified timestamp.
    pub fn touch(&mut self) {
        self.modified = Utc::now();
    }

    /// The reconstructed tree.
    pub fn tree(&self) -> Vec<WbsItem> {
        build_hierarchy(self.items.clone())
    }

    /// Flat, normalised snapshot in tree order.
    pub fn tasks(&self) -> Vec<WbsItem> {
        flatten(&self.tree())
    }

    fn row_mut(&mut self, id: &str) -> Result<&mut WbsRow> {
        self.items
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| WbsError::UnknownItem(id.to_string()))
    }

    fn stamp(&mut self, id: &str) {
        let now = Utc::now();
        if let Some(row) = self.items.iter_mut().find(|r| r.id == id) {
            row.updated_at = now;
        }
        self.modified = now;
    }

    /// Rewrite the rows from the reconstructed tree: duplicates dropped,
    /// parent ids and levels repaired. Returns how many rows changed.
    pub fn normalize(&mut self) -> usize {
        let before = self.items.clone();
        self.items = self.tasks().iter().map(WbsItem::to_row).collect();
        let changed = self
            .items
            .iter()
            .filter(|row| !before.contains(row))
            .count()
            + before.len().saturating_sub(self.items.len());
        if changed > 0 {
            self.touch();
        }
        changed
    }

    /// Create an item with the next free WBS id, at root level or under
    /// `parent`. New items start `Not Started`.
    pub fn add_item(
        &mut self,
        title: impl Into<String>,
        parent: Option<&str>,
        start: Option<NaiveDate>,
        duration: i64,
    ) -> Result<String> {
        let tasks = self.tasks();
        let (wbs_id, parent_id) = match parent {
            Some(parent_id) => {
                let parent = tasks
                    .iter()
                    .find(|t| t.id == parent_id)
                    .ok_or_else(|| WbsError::UnknownItem(parent_id.to_string()))?;
                if !wbs_path::is_well_formed(parent.wbs_id()) {
                    return Err(WbsError::InvalidWbsId(parent.wbs_id().to_string()));
                }
                (
                    generate_child_wbs_id(parent.wbs_id(), &tasks),
                    Some(parent.id.clone()),
                )
            }
            None => (generate_wbs_id(&tasks), None),
        };

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut row = WbsRow::new(id.clone(), wbs_id, title);
        row.parent_id = parent_id;
        row.duration = Some(duration.max(0));
        row.start_date = start;
        row.end_date = start.map(|s| end_from_start(s, duration));
        row.progress = Some(0);
        row.status = Some(Status::NotStarted);
        row.created_at = now;
        row.updated_at = now;
        tracing::debug!(id = %id, wbs_id = %row.wbs_id, "item created");
        self.items.push(row);
        self.touch();
        Ok(id)
    }

    /// Delete an item together with its whole subtree and drop every
    /// predecessor link pointing at a deleted item. Returns the deleted ids.
    ///
    /// The subtree is everything below the item in the rebuilt tree plus any
    /// row whose path lies under the item's path, so orphans such as `1.5.1`
    /// (with no `1.5`) go with `1`.
    pub fn delete_item(&mut self, id: &str) -> Result<Vec<String>> {
        let tree = self.tree();
        let node = find(&tree, id).ok_or_else(|| WbsError::UnknownItem(id.to_string()))?;
        let root_path = node.wbs_id();
        let doomed = flatten(std::slice::from_ref(node));
        let doomed_paths: HashSet<&str> = doomed.iter().map(|t| t.wbs_id()).collect();
        let mut doomed_ids: HashSet<String> = doomed.iter().map(|t| t.id.clone()).collect();

        let by_prefix = wbs_path::is_well_formed(root_path);
        for row in &self.items {
            // stale duplicates of a deleted path go too
            if doomed_paths.contains(row.wbs_id.trim())
                || (by_prefix && wbs_path::is_descendant(root_path, &row.wbs_id))
            {
                doomed_ids.insert(row.id.clone());
            }
        }

        self.items.retain(|r| !doomed_ids.contains(&r.id));
        for row in &mut self.items {
            row.predecessors.retain(|p| !doomed_ids.contains(&p.id));
        }
        self.touch();

        let mut deleted: Vec<String> = doomed_ids.into_iter().collect();
        deleted.sort();
        tracing::debug!(id = %id, count = deleted.len(), "subtree deleted");
        Ok(deleted)
    }

    /// Link `successor` to a predecessor, refusing self links, unknown ids
    /// and links that would close a dependency cycle. Re-adding an existing
    /// `(id, type)` pair updates its lag.
    pub fn add_predecessor(&mut self, successor: &str, link: Predecessor) -> Result<()> {
        if successor == link.id {
            return Err(WbsError::SelfDependency(successor.to_string()));
        }
        let tasks = self.tasks();
        if !tasks.iter().any(|t| t.id == link.id) {
            return Err(WbsError::UnknownItem(link.id));
        }
        if would_create_cycle(successor, &link.id, &tasks) {
            return Err(WbsError::CycleRejected {
                successor: successor.to_string(),
                predecessor: link.id,
            });
        }

        let row = self.row_mut(successor)?;
        match row
            .predecessors
            .iter_mut()
            .find(|p| p.id == link.id && p.kind == link.kind)
        {
            Some(existing) => existing.lag = link.lag,
            None => row.predecessors.push(link),
        }
        self.stamp(successor);
        Ok(())
    }

    /// Drop every link from `successor` to `predecessor`, whatever its type.
    pub fn remove_predecessor(&mut self, successor: &str, predecessor: &str) -> Result<()> {
        let row = self.row_mut(successor)?;
        row.predecessors.retain(|p| p.id != predecessor);
        self.stamp(successor);
        Ok(())
    }

    fn apply_rollups(&mut self, rollups: &[ParentRollup]) {
        for rollup in rollups {
            if let Ok(row) = self.row_mut(&rollup.id) {
                row.progress = Some(rollup.progress as i64);
                row.status = Some(rollup.status);
            }
            self.stamp(&rollup.id);
        }
    }

    /// Set progress (and optionally status) on a leaf, then roll the change
    /// up through its ancestors. Returns the parents that changed.
    pub fn set_progress(
        &mut self,
        id: &str,
        progress: u8,
        status: Option<Status>,
    ) -> Result<Vec<ParentRollup>> {
        let mut tree = self.tree();
        let node = find_mut(&mut tree, id).ok_or_else(|| WbsError::UnknownItem(id.to_string()))?;
        node.set_progress(progress)?;
        if let Some(status) = status {
            node.set_status(status)?;
        }
        let (progress, status) = (node.progress(), node.status());

        let row = self.row_mut(id)?;
        row.progress = Some(progress as i64);
        row.status = Some(status);
        self.stamp(id);

        let outcome = update_parent_rollups(&tree, id);
        self.apply_rollups(&outcome.parents_to_update);
        Ok(outcome.parents_to_update)
    }

    /// Recompute every parent from its children.
    pub fn recompute_rollups(&mut self) -> Vec<ParentRollup> {
        let outcome = recompute_all_rollups(&self.tree());
        self.apply_rollups(&outcome.parents_to_update);
        outcome.parents_to_update
    }

    /// Move a task to `start` (keeping its duration), persist it, and cascade
    /// the change to everything downstream.
    pub async fn reschedule(
        &mut self,
        id: &str,
        start: NaiveDate,
        sink: &dyn PersistSink,
    ) -> Result<CascadeReport> {
        let duration = self
            .tasks()
            .iter()
            .find(|t| t.id == id)
            .map(WbsItem::effective_duration)
            .ok_or_else(|| WbsError::UnknownItem(id.to_string()))?;
        let end = end_from_start(start, duration);

        let patch = ItemPatch {
            start_date: Some(start),
            end_date: Some(end),
            ..Default::default()
        };
        if let Err(e) = sink.persist(id, &patch).await {
            // the edit itself is kept in memory; dependents still follow it
            tracing::warn!(task = %id, error = %e, "failed to persist edited dates");
        }
        let row = self.row_mut(id)?;
        row.start_date = Some(start);
        row.end_date = Some(end);
        row.duration = Some(duration);
        self.stamp(id);

        Ok(self.cascade_from(id, sink).await)
    }

    /// Cascade from `id` over the current snapshot and write the new dates
    /// back into the rows.
    pub async fn cascade_from(&mut self, id: &str, sink: &dyn PersistSink) -> CascadeReport {
        let mut tasks = self.tasks();
        let report = auto_schedule_dependent_wbs_tasks(id, &mut tasks, sink).await;
        for (task_id, update) in &report.updated {
            if let Ok(row) = self.row_mut(task_id) {
                row.start_date = Some(update.start_date);
                row.end_date = Some(update.end_date);
            }
            self.stamp(task_id);
        }
        report
    }

    /// Renumber every item to a flat sequence in creation order. All items
    /// become roots.
    pub fn renumber(&mut self) -> Vec<WbsIdUpdate> {
        let updates = renumber_all_wbs_items(&self.tree());
        for update in &updates {
            if let Ok(row) = self.row_mut(&update.id) {
                row.wbs_id = update.wbs_id.clone();
            }
            self.stamp(&update.id);
        }
        for row in &mut self.items {
            row.parent_id = None;
            row.level = Some(0);
        }
        updates
    }

    pub fn validate(&self) -> Vec<ScheduleViolation> {
        validate_project(&self.tasks())
    }
}

fn find_mut<'a>(roots: &'a mut [WbsItem], id: &str) -> Option<&'a mut WbsItem> {
    for node in roots {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find_mut(&mut node.children, id) {
            return Some(found);
        }
    }
    None
}
