//! Recency list of cache entries
//!
//! Entries are stored in an arena with index-based `prev`/`next` links, so
//! append, unlink and touch are all O(1) without pointer cycles. The head is
//! the least recently used entry, the tail the most recently used.

use crate::pathmap::ElementId;
use pathcache_core::NodeId;
use smallvec::SmallVec;

/// Handle to an entry of a `RecencyList`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(u32);

impl EntryId {
    fn slot(self) -> usize {
        self.0 as usize
    }
}

/// What the cache knows about one node id
#[derive(Debug)]
pub struct LruEntry {
    id: NodeId,
    /// Trie positions referencing this id; more than one only for
    /// shareable nodes
    positions: SmallVec<[ElementId; 1]>,
    prev: Option<EntryId>,
    next: Option<EntryId>,
}

impl LruEntry {
    /// Node id of this entry
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Trie positions, in the order they were registered
    pub fn positions(&self) -> &[ElementId] {
        &self.positions
    }

    /// Register an additional position
    pub fn add_position(&mut self, element: ElementId) {
        if !self.positions.contains(&element) {
            self.positions.push(element);
        }
    }

    /// Forget a position; returns false if it was not registered
    pub fn remove_position(&mut self, element: ElementId) -> bool {
        match self.positions.iter().position(|&p| p == element) {
            Some(pos) => {
                self.positions.remove(pos);
                true
            }
            None => false,
        }
    }
}

/// Doubly linked recency list over an entry arena
#[derive(Debug, Default)]
pub struct RecencyList {
    slots: Vec<Option<LruEntry>>,
    free: Vec<u32>,
    head: Option<EntryId>,
    tail: Option<EntryId>,
    len: usize,
}

impl RecencyList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of linked entries
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the list is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Least recently used entry
    pub fn head(&self) -> Option<EntryId> {
        self.head
    }

    /// Most recently used entry
    pub fn tail(&self) -> Option<EntryId> {
        self.tail
    }

    /// Look up an entry
    pub fn get(&self, entry: EntryId) -> Option<&LruEntry> {
        self.slots.get(entry.slot()).and_then(Option::as_ref)
    }

    /// Look up an entry mutably
    pub fn get_mut(&mut self, entry: EntryId) -> Option<&mut LruEntry> {
        self.slots.get_mut(entry.slot()).and_then(Option::as_mut)
    }

    /// Append a new entry at the most recently used end
    pub fn push_back(&mut self, id: NodeId, position: ElementId) -> EntryId {
        let mut positions = SmallVec::new();
        positions.push(position);
        let entry = LruEntry {
            id,
            positions,
            prev: self.tail,
            next: None,
        };
        let handle = match self.free.pop() {
            Some(slot) => {
                self.slots[slot as usize] = Some(entry);
                EntryId(slot)
            }
            None => {
                self.slots.push(Some(entry));
                EntryId((self.slots.len() - 1) as u32)
            }
        };
        match self.tail.and_then(|t| self.get_mut(t)) {
            Some(tail) => tail.next = Some(handle),
            None => self.head = Some(handle),
        }
        self.tail = Some(handle);
        self.len += 1;
        handle
    }

    /// Remove an entry from the list and the arena
    pub fn unlink(&mut self, entry: EntryId) -> Option<LruEntry> {
        self.detach(entry)?;
        let removed = self.slots.get_mut(entry.slot()).and_then(Option::take)?;
        self.free.push(entry.0);
        self.len -= 1;
        Some(removed)
    }

    /// Move an entry to the most recently used end
    pub fn touch(&mut self, entry: EntryId) {
        if self.tail == Some(entry) || self.detach(entry).is_none() {
            return;
        }
        let old_tail = self.tail;
        if let Some(node) = self.get_mut(entry) {
            node.prev = old_tail;
            node.next = None;
        }
        match old_tail.and_then(|t| self.get_mut(t)) {
            Some(tail) => tail.next = Some(entry),
            None => self.head = Some(entry),
        }
        self.tail = Some(entry);
    }

    /// Iterate from least to most recently used
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            next: self.head,
        }
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Splice an entry out of the chain, leaving it in the arena
    fn detach(&mut self, entry: EntryId) -> Option<()> {
        let (prev, next) = {
            let node = self.get(entry)?;
            (node.prev, node.next)
        };
        match prev.and_then(|p| self.get_mut(p)) {
            Some(p) => p.next = next,
            None => self.head = next,
        }
        match next.and_then(|n| self.get_mut(n)) {
            Some(n) => n.prev = prev,
            None => self.tail = prev,
        }
        Some(())
    }
}

/// Iterator returned by [`RecencyList::iter`]
pub struct Iter<'a> {
    list: &'a RecencyList,
    next: Option<EntryId>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = EntryId;

    fn next(&mut self) -> Option<EntryId> {
        let current = self.next?;
        self.next = self.list.get(current).and_then(|e| e.next);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathmap::PathMap;

    fn ids(list: &RecencyList) -> Vec<String> {
        list.iter()
            .map(|e| list.get(e).unwrap().id().to_string())
            .collect()
    }

    fn position() -> ElementId {
        PathMap::<()>::new().root()
    }

    #[test]
    fn test_push_and_iterate_lru_to_mru() {
        let mut list = RecencyList::new();
        list.push_back(NodeId::from("a"), position());
        list.push_back(NodeId::from("b"), position());
        list.push_back(NodeId::from("c"), position());
        assert_eq!(ids(&list), vec!["a", "b", "c"]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_touch_moves_to_tail() {
        let mut list = RecencyList::new();
        let a = list.push_back(NodeId::from("a"), position());
        list.push_back(NodeId::from("b"), position());
        let c = list.push_back(NodeId::from("c"), position());

        list.touch(a);
        assert_eq!(ids(&list), vec!["b", "c", "a"]);
        assert_eq!(list.tail(), Some(a));

        list.touch(a);
        assert_eq!(ids(&list), vec!["b", "c", "a"]);

        list.touch(c);
        assert_eq!(ids(&list), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_unlink_head_middle_tail() {
        let mut list = RecencyList::new();
        let a = list.push_back(NodeId::from("a"), position());
        let b = list.push_back(NodeId::from("b"), position());
        let c = list.push_back(NodeId::from("c"), position());

        assert_eq!(list.unlink(b).unwrap().id(), &NodeId::from("b"));
        assert_eq!(ids(&list), vec!["a", "c"]);
        list.unlink(a);
        list.unlink(c);
        assert!(list.is_empty());
        assert_eq!(list.head(), None);
        assert_eq!(list.tail(), None);
        assert!(list.unlink(a).is_none());
    }

    #[test]
    fn test_slot_reuse() {
        let mut list = RecencyList::new();
        let a = list.push_back(NodeId::from("a"), position());
        list.unlink(a);
        let b = list.push_back(NodeId::from("b"), position());
        assert_eq!(a, b);
        assert_eq!(ids(&list), vec!["b"]);
    }

    #[test]
    fn test_positions() {
        let mut map: PathMap<()> = PathMap::new();
        let x = map.put(&"/x".parse().unwrap());
        let y = map.put(&"/y".parse().unwrap());

        let mut list = RecencyList::new();
        let e = list.push_back(NodeId::from("s"), x);
        let entry = list.get_mut(e).unwrap();
        entry.add_position(y);
        entry.add_position(y);
        assert_eq!(entry.positions(), &[x, y]);
        assert!(entry.remove_position(x));
        assert!(!entry.remove_position(x));
        assert_eq!(entry.positions(), &[y]);
    }
}
