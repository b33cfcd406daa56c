//! The scheduling engine: hierarchy repair, identifier allocation, dependency
//! scheduling, cascades, rollups and cycle checks.
//!
//! Everything here is a pure function over a caller-supplied snapshot except
//! the cascade, which awaits a [`PersistSink`](crate::store::PersistSink) for
//! each write.

pub mod cascade;
pub mod cycles;
pub mod dependency;
pub mod hierarchy;
pub mod identifiers;
pub mod rollup;
pub mod scheduler;
pub mod validation;

pub use cascade::{auto_schedule_dependent_wbs_tasks, CascadeReport};
pub use cycles::{detect_circular_dependencies, find_cycles, would_create_cycle};
pub use dependency::calculate_dependency_date;
pub use hierarchy::{build_hierarchy, flatten};
pub use identifiers::{generate_child_wbs_id, generate_wbs_id, renumber_all_wbs_items, WbsIdUpdate};
pub use rollup::{recompute_all_rollups, update_parent_rollups, ParentRollup, RollupOutcome};
pub use scheduler::{auto_schedule_wbs_task, ScheduleUpdate};
pub use validation::{validate_project, validate_wbs_task_schedule, ScheduleViolation};
