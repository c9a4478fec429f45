//! Error types for `lijo`.

use std::sync::Arc;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LijoError>;

/// Every failure the data layer, preference store, and host can report.
#[derive(Debug, Error)]
pub enum LijoError {
    /// A write violated a store constraint (unknown parent list, CHECK, NOT NULL).
    #[error("constraint violation: {message}")]
    ConstraintViolation { message: String },

    /// Any other store failure. Not recoverable at the data layer.
    #[error("database error: {0}")]
    Database(#[source] rusqlite::Error),

    #[error("database schema version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: i32, supported: i32 },

    #[error("list not found: {id}")]
    ListNotFound { id: i64 },

    #[error("item not found: {id}")]
    ItemNotFound { id: i64 },

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// A blocking-pool task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Background(String),

    /// The query behind a shared live view failed; every subscriber sees this.
    #[error("live view {name} failed: {source}")]
    LiveViewFailed {
        name: String,
        #[source]
        source: Arc<LijoError>,
    },

    /// The change feed behind a live query is gone.
    #[error("store closed")]
    StoreClosed,
}

impl LijoError {
    /// Build a validation error for a named field.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True when the error came from a store constraint.
    #[must_use]
    pub const fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation { .. })
    }

    /// Process exit code used by the `lijo` binary.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::ListNotFound { .. } | Self::ItemNotFound { .. } => 3,
            Self::Validation { .. } | Self::Config(_) => 2,
            Self::ConstraintViolation { .. } => 4,
            _ => 1,
        }
    }
}

impl From<rusqlite::Error> for LijoError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref failure, ref message) = err {
            if failure.code == rusqlite::ErrorCode::ConstraintViolation {
                return Self::ConstraintViolation {
                    message: message.clone().unwrap_or_else(|| failure.to_string()),
                };
            }
        }
        Self::Database(err)
    }
}

impl From<tokio::task::JoinError> for LijoError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Background(err.to_string())
    }
}
