//! # pdss-store
//!
//! The replicated state tree and its change-notification machinery:
//!
//! - [`Node`] wraps plain nested values into a tree where every nested
//!   structure knows its absolute path from the store root
//! - [`Store`] is one replica's copy of the shared state: writes go through
//!   [`Store::set`] (or a [`NodeRef`] handle), which wraps nested values,
//!   emits a [`Change`] on the store's change stream, and notifies bindings
//! - [`BindingTree`] holds at most one change callback per path and fires
//!   callbacks along a written path, outermost first
//!
//! There is no hidden global store: construct one with [`Store::new`] and
//! share the `Arc` with every consumer.

pub mod bindings;
pub mod error;
pub mod node;
pub mod store;

pub use bindings::BindingTree;
pub use error::{Result, StoreError};
pub use node::{Node, Slot};
pub use store::{Change, NodeRef, Role, Store};
