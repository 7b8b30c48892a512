//! Error types for the core value model.

use thiserror::Error;

/// Errors from path walks over plain values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Not a container: {0}")]
    NotAContainer(String),

    #[error("Cannot address the root as a single value")]
    RootPath,
}

pub type Result<T> = std::result::Result<T, CoreError>;
