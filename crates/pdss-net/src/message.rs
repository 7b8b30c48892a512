//! Wire messages for path-delta replication.

use pdss_core::{Path, Value};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique identifier for a replica endpoint on the transport.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplicaId(pub String);

impl ReplicaId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh collision-safe id.
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }
}

impl std::fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Messages exchanged between replicas.
///
/// The receiver trusts the sender: there is no versioning or schema
/// negotiation on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SyncMessage {
    /// Ask the authority for its full current state. Sent once per client
    /// boot (retries are the sync layer's concern).
    StateRequest,
    /// The entire stripped tree at send time — never a replay of
    /// historical deltas.
    StateResponse { state: Value },
    /// One incremental `(path, value)` delta.
    Update { path: Path, value: Value },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdss_core::Key;

    #[test]
    fn test_update_serde_round_trip() {
        let msg = SyncMessage::Update {
            path: Path::parse("Profile.Level"),
            value: Value::Int(2),
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let back: SyncMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_state_response_carries_nested_map() {
        let state = Value::from_iter([(
            Key::from("Profile"),
            Value::from_iter([("Level", Value::Int(1))]),
        )]);
        let msg = SyncMessage::StateResponse {
            state: state.clone(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: SyncMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SyncMessage::StateResponse { state });
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(ReplicaId::generate(), ReplicaId::generate());
    }
}
