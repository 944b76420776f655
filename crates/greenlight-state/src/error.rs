//! Error types for the team state store.

use thiserror::Error;

/// Result type alias for state store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during state store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("team not found: {0}")]
    NotFound(String),

    #[error("team already registered: {0}")]
    AlreadyExists(String),

    /// Concurrent modification: the record changed since it was read.
    #[error("version conflict for team {0}; re-read and retry")]
    Conflict(String),

    /// Structurally invalid record. Reads fail closed until an
    /// operator restores the team from a snapshot.
    #[error("corrupt record for team {0}; restore from snapshot required")]
    Corrupt(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),
}
