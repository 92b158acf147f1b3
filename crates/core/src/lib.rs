//! Shared vocabulary for the hierarchy cache
//!
//! This crate provides:
//! - Path syntax (names, same-name-sibling indices, absolute paths)
//! - Node identifiers and node state snapshots
//! - Mutation events delivered by the backing store
//! - The `StateProvider` trait the cache falls back to on a miss
//! - An in-memory provider used by tests and tooling

pub mod error;
pub mod memory;
pub mod path;
pub mod provider;
pub mod state;

// Re-exports
pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use path::{Name, Path, PathElement};
pub use provider::StateProvider;
pub use state::{ChildEntry, ItemId, NodeId, NodeState, StateEvent};
