//! Common utilities for integration tests

#![allow(dead_code)]

use pathcache::{CacheConfig, HierarchyCache};
use pathcache_core::{MemoryStore, Name, NodeId, NodeState, Path, StateEvent, StateProvider};
use std::sync::Arc;

pub fn id(s: &str) -> NodeId {
    NodeId::from(s)
}

pub fn path(s: &str) -> Path {
    s.parse().unwrap()
}

pub fn name(s: &str) -> Name {
    Name::new(s).unwrap()
}

/// Cache with the consistency checker enabled
pub fn checked_cache(store: &Arc<MemoryStore>, capacity: usize) -> HierarchyCache {
    HierarchyCache::new(
        store.clone(),
        CacheConfig {
            capacity,
            consistency_check: true,
        },
    )
}

/// Store rooted at `root` with `(path, id)` nodes added in order
pub fn store_with(nodes: &[(&str, &str)]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::with_root(id("root")));
    for (p, node) in nodes {
        store.insert_at(&path(p), id(node), false).unwrap();
    }
    store
}

/// Feed a batch of notifications to the cache
pub fn apply(cache: &HierarchyCache, events: Vec<StateEvent>) {
    for event in events {
        cache.on_event(event);
    }
}

/// Snapshot of a node without disturbing a test's lookup count
pub fn snapshot(store: &MemoryStore, node: &NodeId) -> NodeState {
    let state = store.node(node).unwrap();
    store.reset_lookups();
    state
}

/// Path of a node through its primary parents
pub fn primary_path(store: &MemoryStore, node: &NodeId) -> Path {
    let mut elements = Vec::new();
    let mut current = node.clone();
    while let Some(parent) = store.node(&current).unwrap().parent {
        let entry = store
            .node(&parent)
            .unwrap()
            .child_entry_by_id(&current)
            .unwrap()
            .path_element();
        elements.push(entry);
        current = parent;
    }
    elements.reverse();
    Path::from_elements(elements)
}
