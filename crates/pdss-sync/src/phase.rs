//! Replica lifecycle.

/// Lifecycle of a replica's store.
///
/// `Live` is terminal in normal operation. A client drops back to
/// `Uninitialized` when its transport dies or the snapshot transfer is
/// abandoned, and serves no waits or incremental updates until a fresh
/// snapshot succeeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplicaPhase {
    Uninitialized,
    Initializing,
    Ready,
    Live,
}

impl ReplicaPhase {
    pub fn is_live(&self) -> bool {
        matches!(self, ReplicaPhase::Live)
    }
}
