//! # pdss-net
//!
//! The transport boundary of the Larimar Path-Delta State Store.
//!
//! Replication assumes an ordered, reliable message channel: broadcasts
//! from one sender arrive at every receiver in send order, and a single
//! request/response pair carries the initial snapshot. This crate defines
//! that boundary — [`Transport`], [`SyncMessage`] — and provides
//! [`MemoryTransport`], an in-memory implementation for tests and
//! same-process topologies.
//!
//! There is no sequencing, deduplication, or retransmission here; a real
//! network transport must supply those guarantees itself.

pub mod error;
pub mod message;
pub mod transport;

pub use error::NetError;
pub use message::{ReplicaId, SyncMessage};
pub use transport::{star_network, MemoryTransport, Peer, PeerState, Transport};
