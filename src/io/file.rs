use crate::error::{Result, WbsError};
use crate::model::Project;
use std::path::Path;

/// Save a project to a JSON file.
pub fn save_project(project: &Project, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(project)?;
    std::fs::write(path, json).map_err(|e| WbsError::io(path, e))
}

/// Load a project from a JSON file.
pub fn load_project(path: &Path) -> Result<Project> {
    let json = std::fs::read_to_string(path).map_err(|e| WbsError::io(path, e))?;
    Ok(serde_json::from_str(&json)?)
}
