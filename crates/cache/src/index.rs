//! Identifier index: node id to cache entry

use crate::lru::{EntryId, LruEntry, RecencyList};
use crate::pathmap::ElementId;
use ahash::AHashMap;
use pathcache_core::NodeId;

/// Maps node ids to their cache entries and keeps them in recency order
#[derive(Debug, Default)]
pub struct IdIndex {
    ids: AHashMap<NodeId, EntryId>,
    lru: RecencyList,
}

impl IdIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct ids cached
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Check if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Entry handle for a node id
    pub fn lookup(&self, id: &NodeId) -> Option<EntryId> {
        self.ids.get(id).copied()
    }

    /// Entry behind a handle
    pub fn entry(&self, entry: EntryId) -> Option<&LruEntry> {
        self.lru.get(entry)
    }

    /// Positions registered for a node id (empty if not cached)
    pub fn positions(&self, id: &NodeId) -> &[ElementId] {
        self.lookup(id)
            .and_then(|e| self.lru.get(e))
            .map(LruEntry::positions)
            .unwrap_or(&[])
    }

    /// Mark an id as used and return its first position
    pub fn touch(&mut self, id: &NodeId) -> Option<ElementId> {
        let entry = self.lookup(id)?;
        self.touch_entry(entry);
        self.lru.get(entry)?.positions().first().copied()
    }

    /// Mark an entry as used
    pub fn touch_entry(&mut self, entry: EntryId) {
        self.lru.touch(entry);
    }

    /// Register `element` as a position of `id`
    ///
    /// Creates the entry at the most recently used end if the id is new;
    /// otherwise appends the position and touches the entry.
    pub fn attach(&mut self, id: NodeId, element: ElementId) -> EntryId {
        if let Some(entry) = self.lookup(&id) {
            if let Some(existing) = self.lru.get_mut(entry) {
                existing.add_position(element);
            }
            self.lru.touch(entry);
            return entry;
        }
        let entry = self.lru.push_back(id.clone(), element);
        self.ids.insert(id, entry);
        entry
    }

    /// Forget one position of an entry
    ///
    /// Returns true if that was the last position and the entry was dropped.
    pub fn detach(&mut self, entry: EntryId, element: ElementId) -> bool {
        let Some(existing) = self.lru.get_mut(entry) else {
            return false;
        };
        existing.remove_position(element);
        if !existing.positions().is_empty() {
            return false;
        }
        if let Some(removed) = self.lru.unlink(entry) {
            self.ids.remove(removed.id());
        }
        true
    }

    /// Entries from least to most recently used
    pub fn lru_order(&self) -> impl Iterator<Item = EntryId> + '_ {
        self.lru.iter()
    }

    /// All `(id, entry)` pairs, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, EntryId)> + '_ {
        self.ids.iter().map(|(id, entry)| (id, *entry))
    }

    /// Number of entries linked in the recency list
    pub fn linked(&self) -> usize {
        self.lru.len()
    }

    /// Sum of position counts over all entries
    pub fn position_total(&self) -> usize {
        self.ids
            .values()
            .filter_map(|&e| self.lru.get(e))
            .map(|e| e.positions().len())
            .sum()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.ids.clear();
        self.lru.clear();
    }
}
