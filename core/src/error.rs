//! Error taxonomy for recipe storage.

use thiserror::Error;

/// Errors surfaced by the store and everything layered on top of it.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A required field is missing, or an insert carried a preassigned id.
    #[error("constraint violation: {field} {reason}")]
    ConstraintViolation { field: String, reason: String },

    /// An update or lookup targeted an id with no matching row.
    #[error("recipe {id} not found")]
    NotFound { id: i64 },

    /// The database file could not be opened, read, or written.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] rusqlite::Error),

    /// The store was closed; no further reads or writes are possible.
    #[error("storage unavailable: store is closed")]
    Closed,

    /// The blocking storage task panicked or was aborted.
    #[error("storage task failed: {0}")]
    TaskFailed(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub(crate) fn constraint(field: &str) -> Self {
        Self::ConstraintViolation {
            field: field.to_string(),
            reason: "is required".to_string(),
        }
    }

    pub(crate) fn preassigned_id() -> Self {
        Self::ConstraintViolation {
            field: "id".to_string(),
            reason: "must not be set on insert".to_string(),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        // SQLite reports NOT NULL failures as "NOT NULL constraint failed: recipes.title"
        if let rusqlite::Error::SqliteFailure(code, Some(message)) = &err {
            if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_NOTNULL {
                let field = message.rsplit('.').next().unwrap_or(message.as_str());
                return Self::constraint(field);
            }
        }
        Self::StorageUnavailable(err)
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskFailed(err.to_string())
    }
}
