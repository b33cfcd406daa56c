//! Work Breakdown Structure scheduling engine.
//!
//! Rebuilds a WBS tree from flat, possibly inconsistent rows, schedules tasks
//! against FS/SS/FF/SF predecessors with signed lags, cascades date changes
//! through the dependency graph and rolls child progress up into parents.
//!
//! - [`engine`]: the algorithms, pure over a caller-supplied snapshot
//! - [`model`]: rows, items and the [`Project`](model::Project) workspace
//! - [`store`]: the async persistence boundary used by cascades
//! - [`io`]: JSON project files and CSV import/export

pub mod config;
pub mod engine;
pub mod error;
pub mod io;
pub mod model;
pub mod store;

pub use config::Settings;
pub use error::{Result, WbsError};
pub use model::{DependencyKind, Predecessor, Project, Status, WbsItem, WbsRow};
pub use store::{ItemPatch, MemorySink, PersistSink};
