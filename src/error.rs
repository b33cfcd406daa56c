//! Error type shared by the model, the project workspace and the I/O layer.
//!
//! Scheduling itself never fails: unresolvable relations are non-binding and
//! cycles are reported as data. These variants cover edits that must be
//! refused and files that cannot be read.

use std::path::PathBuf;

/// Errors produced by WBS edits and project I/O.
#[derive(Debug, thiserror::Error)]
pub enum WbsError {
    #[error("unknown WBS item '{0}'")]
    UnknownItem(String),

    /// Progress and status of a parent are derived from its children.
    #[error("'{field}' of item '{id}' is derived from its children and cannot be set directly")]
    DerivedField { id: String, field: &'static str },

    #[error("item '{0}' cannot depend on itself")]
    SelfDependency(String),

    #[error("linking '{successor}' to predecessor '{predecessor}' would create a dependency cycle")]
    CycleRejected {
        successor: String,
        predecessor: String,
    },

    #[error("invalid WBS id '{0}'")]
    InvalidWbsId(String),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed project JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl WbsError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<csv::Error> for WbsError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WbsError>;
