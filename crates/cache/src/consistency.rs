//! Bidirectional consistency check between the trie and the id index
//!
//! Every payload-bearing trie position must be registered in its entry, and
//! every registered position must carry that entry as payload.

use crate::index::IdIndex;
use crate::lru::EntryId;
use crate::pathmap::{ElementId, PathMap};
use pathcache_core::NodeId;
use thiserror::Error;

/// A broken cache invariant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("trie position {element:?} points at missing entry {entry:?}")]
    DanglingPayload { element: ElementId, entry: EntryId },

    #[error("entry for {id} does not list trie position {element:?}")]
    MissingBackReference { id: NodeId, element: ElementId },

    #[error("entry for {id} is not reachable through the id index")]
    UnindexedEntry { id: NodeId },

    #[error("entry for {id} has no positions")]
    EmptyEntry { id: NodeId },

    #[error("position {element:?} of {id} does not carry its entry")]
    ForeignPosition { id: NodeId, element: ElementId },

    #[error("position {element:?} of {id} is detached from the root")]
    DetachedPosition { id: NodeId, element: ElementId },

    #[error("{payloads} payload-bearing positions but {positions} registered positions")]
    CountMismatch { payloads: usize, positions: usize },

    #[error("{indexed} indexed ids but {linked} recency list entries")]
    RecencyMismatch { indexed: usize, linked: usize },
}

/// Walk both structures and verify they describe the same mapping
pub fn check(trie: &PathMap<EntryId>, index: &IdIndex) -> Result<(), Violation> {
    let positions = index.position_total();

    let mut payloads = 0;
    for element in trie.traverse(trie.root(), false) {
        let Some(&entry) = trie.get(element) else {
            continue;
        };
        payloads += 1;
        let existing = index
            .entry(entry)
            .ok_or(Violation::DanglingPayload { element, entry })?;
        if !existing.positions().contains(&element) {
            return Err(Violation::MissingBackReference {
                id: existing.id().clone(),
                element,
            });
        }
        if index.lookup(existing.id()) != Some(entry) {
            return Err(Violation::UnindexedEntry {
                id: existing.id().clone(),
            });
        }
    }

    for (id, entry) in index.iter() {
        let existing = index
            .entry(entry)
            .filter(|e| e.id() == id)
            .ok_or_else(|| Violation::UnindexedEntry { id: id.clone() })?;
        if existing.positions().is_empty() {
            return Err(Violation::EmptyEntry { id: id.clone() });
        }
        for &element in existing.positions() {
            if !trie.contains(element) || trie.get(element) != Some(&entry) {
                return Err(Violation::ForeignPosition {
                    id: id.clone(),
                    element,
                });
            }
            if trie.path(element).is_none() {
                return Err(Violation::DetachedPosition {
                    id: id.clone(),
                    element,
                });
            }
        }
    }

    if payloads != positions {
        return Err(Violation::CountMismatch { payloads, positions });
    }
    if index.len() != index.linked() {
        return Err(Violation::RecencyMismatch {
            indexed: index.len(),
            linked: index.linked(),
        });
    }
    Ok(())
}
