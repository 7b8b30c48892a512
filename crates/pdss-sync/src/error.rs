//! Error types for the replication layer.

use thiserror::Error;

/// Errors from replicator construction and lifecycle waits.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The store's role does not match the replicator side.
    #[error("Store role mismatch: expected {expected}")]
    WrongRole { expected: &'static str },

    /// The initial snapshot transfer was abandoned after the configured
    /// retries; the store is back to `Uninitialized`.
    #[error("Snapshot transfer failed")]
    SnapshotFailed,
}

pub type Result<T> = std::result::Result<T, SyncError>;
