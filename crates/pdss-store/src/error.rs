//! Error types for store operations.

use thiserror::Error;

/// Errors from writes and snapshot application.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// An intermediate path segment does not exist. Writing to an
    /// unreplicated branch is an integration bug and fails fast rather
    /// than being masked.
    #[error("Path not found: {0}")]
    PathNotFound(String),

    /// The path traverses through a scalar or opaque leaf.
    #[error("Not a container: {0}")]
    NotAContainer(String),

    /// A snapshot must be a map at the top level.
    #[error("Snapshot is not a map")]
    MalformedSnapshot,

    /// The root itself is a container, not a writable value.
    #[error("Cannot write to the root path")]
    RootWrite,
}

pub type Result<T> = std::result::Result<T, StoreError>;
