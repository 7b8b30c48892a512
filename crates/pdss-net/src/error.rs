//! Error types for the transport boundary.

use thiserror::Error;

/// Errors from transport operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetError {
    #[error("Peer not found: {0}")]
    PeerNotFound(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Disconnected")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, NetError>;
