//! # pdss-sync
//!
//! The replication protocol of the Larimar Path-Delta State Store.
//!
//! One [`ServerReplicator`] owns the authoritative store: it answers
//! full-state requests with the current stripped tree and forwards every
//! local write as exactly one incremental `(path, value)` broadcast. Each
//! [`ClientReplicator`] bootstraps its tracking store from one snapshot
//! (with bounded retry) and then applies incremental updates through the
//! store's normal write path, gated on readiness so a delta racing ahead
//! of the snapshot stalls instead of crashing or being dropped.
//!
//! State is never persisted: a client rebuilds from the authority on
//! every (re)connect.

pub mod client;
pub mod config;
pub mod error;
pub mod phase;
pub mod server;

pub use client::ClientReplicator;
pub use config::{SyncConfig, SyncConfigBuilder};
pub use error::SyncError;
pub use phase::ReplicaPhase;
pub use server::ServerReplicator;
