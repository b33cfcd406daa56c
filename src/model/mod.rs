pub mod item;
pub mod project;
pub mod wbs_path;

pub use item::{DependencyKind, Predecessor, Status, WbsItem, WbsRow};
pub use project::Project;
