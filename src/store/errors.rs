//! Store errors

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures raised by the relational store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database could not be opened or prepared for use
    #[error("Failed to open database {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A statement failed
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A previous holder of the connection panicked
    #[error("Connection lock poisoned")]
    Poisoned,
}
