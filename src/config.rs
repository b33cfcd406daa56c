//! User settings for the `wbs` tool, stored as JSON in the OS config
//! directory.

use std::path::{Path, PathBuf};

use crate::error::{Result, WbsError};

/// Persisted user settings (lives in the OS config directory).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Fallback tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Duration in days given to newly created items.
    pub default_duration: i64,
    /// Field delimiter for CSV export.
    pub csv_delimiter: char,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "warn".into(),
            default_duration: 1,
            csv_delimiter: ';',
        }
    }
}

impl Settings {
    /// Location of `settings.json`, falling back to the working directory
    /// when no config directory can be resolved.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("", "", "WbsScheduler")
            .map(|dirs| dirs.config_dir().join("settings.json"))
            .unwrap_or_else(|| PathBuf::from(".").join("settings.json"))
    }

    /// Load settings; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(WbsError::io(path, e)),
        };
        let settings: Settings = serde_json::from_str(&json)
            .map_err(|e| WbsError::Config(format!("{}: {e}", path.display())))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| WbsError::io(dir, e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| WbsError::io(path, e))
    }

    fn validate(&self) -> Result<()> {
        if self.default_duration < 0 {
            return Err(WbsError::Config(format!(
                "default_duration must not be negative (got {})",
                self.default_duration
            )));
        }
        if !self.csv_delimiter.is_ascii() {
            return Err(WbsError::Config(format!(
                "csv_delimiter must be an ASCII character (got {:?})",
                self.csv_delimiter
            )));
        }
        Ok(())
    }

    pub fn delimiter_byte(&self) -> u8 {
        self.csv_delimiter as u8
    }
}
