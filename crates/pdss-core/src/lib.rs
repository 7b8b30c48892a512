//! # pdss-core
//!
//! Core types for the Larimar Path-Delta State Store:
//!
//! - [`Key`] and [`Path`] address nested values by ordered key sequences
//! - [`Value`] is the plain (unwrapped) form of nested state, used on the wire
//! - [`OpaqueRef`] marks values that are never recursed into or replicated
//!
//! Higher layers wrap plain values into path-tracked nodes (`pdss-store`)
//! and replicate `(path, value)` deltas between replicas (`pdss-sync`).

pub mod error;
pub mod path;
pub mod value;

pub use error::{CoreError, Result};
pub use path::{Key, Path};
pub use value::{OpaqueRef, Value};
