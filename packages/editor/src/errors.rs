//! Error types for the editor

use scribe_model::ModelError;
use thiserror::Error;

pub type EditorResult<T> = Result<T, EditorError>;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Version mismatch: operation has base version {actual}, document is at {expected}")]
    VersionMismatch { expected: u64, actual: u64 },

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    #[error("Marker not found: {0}")]
    MarkerNotFound(String),

    #[error("Marker already exists: {0}")]
    MarkerExists(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("History starts at version {oldest}, operations are based on {requested}")]
    HistoryUnavailable { oldest: u64, requested: u64 },
}

impl EditorError {
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }
}
