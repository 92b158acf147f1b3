//! Bounded id <-> path cache for hierarchical stores
//!
//! This crate provides:
//! - Path trie with same-name-sibling index bookkeeping
//! - Id index and recency list over cache entries
//! - The caching hierarchy manager and its event handlers
//! - A consistency verifier for the three structures
//! - Cache configuration loaded from TOML

pub mod config;
pub mod consistency;
pub mod hierarchy;
pub mod index;
pub mod lru;
pub mod pathmap;
pub mod stats;

// Re-exports
pub use config::CacheConfig;
pub use consistency::Violation;
pub use hierarchy::HierarchyCache;
pub use pathmap::{ElementId, PathMap};
pub use stats::CacheStats;
