//! Caching hierarchy manager
//!
//! Keeps a bounded mapping between node ids and their paths in front of a
//! `StateProvider`. Three structures are kept in lockstep behind one mutex:
//! - a path trie whose positions carry cache entry handles
//! - an id index pointing at cache entries
//! - a recency list ordering the entries for eviction
//!
//! Mutation events update the trie surgically (insert, remove, shift and
//! reorder positions) instead of invalidating whole subtrees.

use crate::config::CacheConfig;
use crate::consistency::{self, Violation};
use crate::index::IdIndex;
use crate::lru::EntryId;
use crate::pathmap::{ElementId, PathMap};
use crate::stats::CacheStats;
use ahash::{AHashMap, AHashSet};
use parking_lot::Mutex;
use pathcache_core::{
    Error, ItemId, Name, NodeId, NodeState, Path, PathElement, Result, StateEvent, StateProvider,
};
use smallvec::{smallvec, SmallVec};
use std::sync::Arc;
use tracing::{debug, trace, warn};

type Positions = SmallVec<[ElementId; 2]>;

/// Bounded id <-> path cache over a hierarchical store
///
/// All operations serialize on a single lock covering the trie, the id
/// index and the recency list. Provider calls on a miss happen while that
/// lock is held.
pub struct HierarchyCache {
    provider: Arc<dyn StateProvider>,
    state: Mutex<CacheState>,
}

struct CacheState {
    /// The root is always known and never cached
    root_id: NodeId,
    trie: PathMap<EntryId>,
    index: IdIndex,
    capacity: usize,
    consistency_check: bool,
    stats: CacheStats,
    /// Moved nodes whose removal from the old parent was already applied,
    /// mapped to that parent
    moved: AHashMap<NodeId, NodeId>,
}

impl HierarchyCache {
    /// Create a cache in front of `provider`
    pub fn new(provider: Arc<dyn StateProvider>, config: CacheConfig) -> Self {
        let root_id = provider.root_id();
        Self {
            provider,
            state: Mutex::new(CacheState {
                root_id,
                trie: PathMap::new(),
                index: IdIndex::new(),
                capacity: config.capacity,
                consistency_check: config.consistency_check,
                stats: CacheStats::default(),
                moved: AHashMap::new(),
            }),
        }
    }

    /// Resolve a path to an item id
    ///
    /// With `want_node` false, the last element may also name a property.
    pub fn resolve_path(&self, path: &Path, want_node: bool) -> Result<ItemId> {
        self.state.lock().resolve(&*self.provider, path, want_node)
    }

    /// Resolve a path that must denote a node
    pub fn resolve_node_path(&self, path: &Path) -> Result<NodeId> {
        match self.resolve_path(path, true)? {
            ItemId::Node(id) => Ok(id),
            ItemId::Property { .. } => Err(Error::not_found(path)),
        }
    }

    /// Path of a node; the first registered path for shareable nodes
    pub fn path_of(&self, id: &NodeId) -> Result<Path> {
        self.state.lock().path_of(&*self.provider, id)
    }

    /// Path of a node or property
    pub fn item_path(&self, item: &ItemId) -> Result<Path> {
        match item {
            ItemId::Node(id) => self.path_of(id),
            ItemId::Property { parent, name } => Ok(self.path_of(parent)?.child(name.clone(), 1)),
        }
    }

    /// Name of a node; `None` for the root
    pub fn name_of(&self, id: &NodeId) -> Result<Option<Name>> {
        self.state.lock().name_of(&*self.provider, id)
    }

    /// Depth of a node; the root has depth 0
    pub fn depth_of(&self, id: &NodeId) -> Result<usize> {
        self.state.lock().depth_of(&*self.provider, id)
    }

    /// Depth of `descendant` below `ancestor`, `None` if unrelated
    ///
    /// Every cached position of `descendant` is walked up first, so a
    /// shared ancestor is found through any of its positions.
    pub fn relative_depth(&self, ancestor: &NodeId, descendant: &NodeId) -> Result<Option<usize>> {
        self.state
            .lock()
            .relative_depth(&*self.provider, ancestor, descendant)
    }

    /// Check if `ancestor` is a proper ancestor of `descendant`
    pub fn is_ancestor(&self, ancestor: &NodeId, descendant: &NodeId) -> Result<bool> {
        Ok(self.relative_depth(ancestor, descendant)?.map_or(false, |d| d > 0))
    }

    /// Record that `id` lives at `path`
    pub fn cache(&self, id: NodeId, path: &Path) {
        self.state.lock().cache(id, path);
    }

    /// Check if any path is cached for `id`
    pub fn is_cached(&self, id: &NodeId) -> bool {
        self.state.lock().index.lookup(id).is_some()
    }

    /// Every cached path of `id`, in registration order
    pub fn cached_paths(&self, id: &NodeId) -> Vec<Path> {
        let state = self.state.lock();
        state
            .index
            .positions(id)
            .iter()
            .filter_map(|&p| state.trie.path(p))
            .collect()
    }

    /// Absorb a mutation notification; never fails
    pub fn on_event(&self, event: StateEvent) {
        match event {
            StateEvent::Created(_) => {}
            StateEvent::Modified(state) => self.node_modified(&state),
            StateEvent::Destroyed(id) => self.state_destroyed(&id),
            StateEvent::Discarded {
                id,
                transient_new,
                still_persisted,
            } => self.state_discarded(&id, transient_new, still_persisted),
            StateEvent::ChildAdded {
                parent,
                name,
                index,
                child,
            } => self.node_added(&parent, &name, index, &child),
            StateEvent::ChildRemoved {
                parent,
                name,
                index,
                child,
            } => self.node_removed(&parent, &name, index, &child),
            StateEvent::ChildrenReplaced(state) => self.nodes_replaced(&state),
        }
    }

    /// A child `name[index]` with id `child` was added to `parent`
    pub fn node_added(&self, parent: &NodeState, name: &Name, index: u32, child: &NodeId) {
        self.state
            .lock()
            .node_added(&*self.provider, parent, name, index, child);
    }

    /// The child `name[index]` with id `child` was removed from `parent`
    pub fn node_removed(&self, parent: &NodeState, name: &Name, index: u32, child: &NodeId) {
        self.state
            .lock()
            .node_removed(&*self.provider, parent, name, index, child);
    }

    /// A node changed; re-validate its cached children
    pub fn node_modified(&self, state: &NodeState) {
        self.state.lock().node_modified(state);
    }

    /// A node's children were replaced or reordered
    pub fn nodes_replaced(&self, state: &NodeState) {
        self.state.lock().nodes_replaced(state);
    }

    /// A node was destroyed
    pub fn state_destroyed(&self, id: &NodeId) {
        let mut state = self.state.lock();
        state.moved.remove(id);
        state.evict_all(id, true);
        state.check();
    }

    /// A node's transient state was discarded
    pub fn state_discarded(&self, id: &NodeId, transient_new: bool, still_persisted: bool) {
        let mut state = self.state.lock();
        // Sibling order is untouched while the persisted node still exists
        let shift = transient_new || !still_persisted;
        state.evict_all(id, shift);
        state.check();
    }

    /// Human-readable snapshot of the trie
    pub fn dump(&self) -> String {
        let state = self.state.lock();
        let mut out = format!(
            "capacity={} cached={} positions={}\n",
            state.capacity,
            state.index.len(),
            state.index.position_total()
        );
        out.push_str(&state.trie.dump_with(|&entry| match state.index.entry(entry) {
            Some(existing) => existing.id().to_string(),
            None => "<dangling>".to_string(),
        }));
        out
    }

    /// Enable or disable verification after every mutation
    pub fn set_consistency_checking(&self, enabled: bool) {
        let mut state = self.state.lock();
        state.consistency_check = enabled;
        state.check();
    }

    /// Verify the cache without panicking
    pub fn verify(&self) -> std::result::Result<(), Violation> {
        let state = self.state.lock();
        consistency::check(&state.trie, &state.index)
    }

    /// Number of distinct ids cached
    pub fn len(&self) -> usize {
        self.state.lock().index.len()
    }

    /// Check if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Advisory upper bound on cached ids
    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats
    }

    /// Drop everything cached
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.trie = PathMap::new();
        state.index.clear();
        state.moved.clear();
    }
}

impl CacheState {
    fn check(&self) {
        if !self.consistency_check {
            return;
        }
        if let Err(violation) = consistency::check(&self.trie, &self.index) {
            panic!("hierarchy cache invariant violated: {}", violation);
        }
    }

    /// First position of `id`, touching its entry; the trie root for the
    /// root node
    fn element_of(&mut self, id: &NodeId) -> Option<ElementId> {
        if id == &self.root_id {
            return Some(self.trie.root());
        }
        self.index.touch(id)
    }

    fn positions_of(&self, id: &NodeId) -> Positions {
        if id == &self.root_id {
            return smallvec![self.trie.root()];
        }
        self.index.positions(id).iter().copied().collect()
    }

    fn id_at(&self, element: ElementId) -> Option<&NodeId> {
        let entry = self.trie.get(element)?;
        self.index.entry(*entry).map(|e| e.id())
    }

    /// Id bound to a trie position, counting the trie root as the root node
    fn owner_of(&self, element: ElementId) -> Option<NodeId> {
        if element == self.trie.root() {
            return Some(self.root_id.clone());
        }
        self.id_at(element).cloned()
    }

    fn path_at(&self, element: ElementId, id: &NodeId) -> Result<Path> {
        self.trie.path(element).ok_or_else(|| {
            let msg = format!("Failed to build path of {}", id);
            debug!("{}", msg);
            Error::Repository(msg)
        })
    }

    /// Deepest cached position on `path`, touched; the root if none
    fn map(&mut self, path: &Path) -> (ElementId, NodeId) {
        let mut current = self.trie.map(path, false);
        while let Some(element) = current {
            if let Some(&entry) = self.trie.get(element) {
                if let Some(id) = self.index.entry(entry).map(|e| e.id().clone()) {
                    self.index.touch_entry(entry);
                    return (element, id);
                }
            }
            current = self.trie.parent(element);
        }
        (self.trie.root(), self.root_id.clone())
    }

    fn resolve(&mut self, provider: &dyn StateProvider, path: &Path, want_node: bool) -> Result<ItemId> {
        let (element, mut id) = self.map(path);
        let start = self.trie.depth(element);
        let elements = path.elements();
        if start == elements.len() {
            self.stats.hits += 1;
            trace!(%path, %id, "Resolved from cache");
            return Ok(ItemId::Node(id));
        }

        self.stats.misses += 1;
        trace!(%path, from = %id, depth = start, "Resolving remainder through provider");
        for (i, element) in elements.iter().enumerate().skip(start) {
            match provider.child_id(&id, element.name(), element.index()) {
                Ok(child) => {
                    id = child;
                    let resolved = Path::from_elements(elements[..=i].iter().cloned());
                    self.cache(id.clone(), &resolved);
                }
                Err(e) if e.is_not_found() => {
                    let last = i + 1 == elements.len();
                    if last
                        && !want_node
                        && element.index() == 1
                        && provider.has_property(&id, element.name())?
                    {
                        return Ok(ItemId::Property {
                            parent: id,
                            name: element.name().clone(),
                        });
                    }
                    return Err(Error::not_found(path));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(ItemId::Node(id))
    }

    fn path_of(&mut self, provider: &dyn StateProvider, id: &NodeId) -> Result<Path> {
        if let Some(element) = self.element_of(id) {
            self.stats.hits += 1;
            return self.path_at(element, id);
        }
        self.stats.misses += 1;
        self.build_path(provider, id)
    }

    /// Build a path through the provider, caching every node on the way
    /// down from the nearest cached ancestor
    fn build_path(&mut self, provider: &dyn StateProvider, id: &NodeId) -> Result<Path> {
        let mut chain: Vec<(NodeId, PathElement)> = Vec::new();
        let mut visited = AHashSet::new();
        let mut current = id.clone();
        let base = loop {
            if let Some(element) = self.element_of(&current) {
                break self.path_at(element, &current)?;
            }
            if !visited.insert(current.clone()) {
                return Err(Error::Repository(format!("cycle detected in path of {}", id)));
            }
            let (parent, element) = parent_entry(provider, &current)?;
            chain.push((current, element));
            current = parent;
        };

        let mut path = base;
        for (node, element) in chain.into_iter().rev() {
            path = path.child(element.name().clone(), element.index());
            self.cache(node, &path);
        }
        Ok(path)
    }

    fn name_of(&mut self, provider: &dyn StateProvider, id: &NodeId) -> Result<Option<Name>> {
        if let Some(element) = self.element_of(id) {
            self.stats.hits += 1;
            return Ok(self.trie.path_element(element).map(|e| e.name().clone()));
        }
        self.stats.misses += 1;
        let (_, element) = parent_entry(provider, id)?;
        Ok(Some(element.name().clone()))
    }

    fn depth_of(&mut self, provider: &dyn StateProvider, id: &NodeId) -> Result<usize> {
        if let Some(element) = self.element_of(id) {
            self.stats.hits += 1;
            return Ok(self.trie.depth(element));
        }
        self.stats.misses += 1;

        let mut depth = 0;
        let mut visited = AHashSet::new();
        let mut current = id.clone();
        loop {
            if let Some(element) = self.element_of(&current) {
                return Ok(depth + self.trie.depth(element));
            }
            if !visited.insert(current.clone()) {
                return Err(Error::Repository(format!("cycle detected in depth of {}", id)));
            }
            current = provider
                .node(&current)?
                .parent
                .ok_or_else(|| Error::not_found(&current))?;
            depth += 1;
        }
    }

    fn relative_depth(
        &mut self,
        provider: &dyn StateProvider,
        ancestor: &NodeId,
        descendant: &NodeId,
    ) -> Result<Option<usize>> {
        if ancestor == descendant {
            return Ok(Some(0));
        }
        self.index.touch(descendant);
        for position in self.positions_of(descendant) {
            let mut depth = 0;
            let mut current = self.trie.parent(position);
            while let Some(element) = current {
                depth += 1;
                if self.owner_of(element).as_ref() == Some(ancestor) {
                    return Ok(Some(depth));
                }
                current = self.trie.parent(element);
            }
        }

        let mut depth = 0;
        let mut visited = AHashSet::new();
        let mut current = provider.node(descendant)?.parent;
        while let Some(parent) = current {
            depth += 1;
            if &parent == ancestor {
                return Ok(Some(depth));
            }
            if !visited.insert(parent.clone()) {
                return Err(Error::Repository(format!(
                    "cycle detected above {}",
                    descendant
                )));
            }
            current = provider.node(&parent)?.parent;
        }
        Ok(None)
    }

    fn is_cached_at(&self, id: &NodeId, path: &Path) -> bool {
        self.index
            .positions(id)
            .iter()
            .any(|&p| self.trie.has_path(p, path))
    }

    fn cache(&mut self, id: NodeId, path: &Path) {
        if id == self.root_id {
            return;
        }
        if path.is_root() {
            warn!(%id, "Refusing to cache a non-root node at the root path");
            return;
        }
        if self.is_cached_at(&id, path) {
            return;
        }
        if self.index.lookup(&id).is_none() && self.index.len() >= self.capacity {
            self.evict_lru_leaf(path);
        }

        let element = self.trie.put(path);
        if let Some(previous) = self.trie.take(element) {
            let found = self.index.entry(previous).map(|e| e.id().clone());
            warn!(%path, expected = %id, ?found, "Overwriting path map element bound to another id");
            self.stats.anomalies += 1;
            self.index.detach(previous, element);
        }
        let entry = self.index.attach(id, element);
        self.trie.set(element, entry);
        self.check();
    }

    /// Evict the least recently used entry without children, if any
    ///
    /// Ancestors of `target` are kept so the path about to be cached stays
    /// reachable through cached parents.
    fn evict_lru_leaf(&mut self, target: &Path) {
        let victim = self.index.lru_order().find_map(|entry| {
            let existing = self.index.entry(entry)?;
            let evictable = existing.positions().iter().all(|&p| {
                self.trie.children_count(p) == 0
                    && !self
                        .trie
                        .path(p)
                        .map_or(false, |path| path.is_ancestor_of(target))
            });
            evictable.then(|| existing.id().clone())
        });
        match victim {
            Some(id) => {
                debug!(%id, "Evicting least recently used leaf");
                self.evict_all(&id, false);
                self.stats.evictions += 1;
            }
            None => trace!(capacity = self.capacity, "Every entry has children, exceeding capacity"),
        }
    }

    /// Remove every position of `id`
    fn evict_all(&mut self, id: &NodeId, shift: bool) {
        for element in self.positions_of_cached(id) {
            if self.trie.contains(element) {
                self.evict(element, shift);
            }
        }
    }

    fn positions_of_cached(&self, id: &NodeId) -> Positions {
        self.index.positions(id).iter().copied().collect()
    }

    /// Remove a position and its subtree, dropping every payload in it
    fn evict(&mut self, element: ElementId, shift: bool) {
        let cached: Vec<(ElementId, EntryId)> = self
            .trie
            .traverse(element, false)
            .filter_map(|e| self.trie.get(e).map(|&entry| (e, entry)))
            .collect();
        for (position, entry) in cached {
            self.index.detach(entry, position);
        }
        self.trie.remove(element, shift);
    }

    fn node_added(
        &mut self,
        provider: &dyn StateProvider,
        parent: &NodeState,
        name: &Name,
        index: u32,
        child: &NodeId,
    ) {
        // Untracked subtrees are not woken up
        let Some(primary) = self.element_of(&parent.id) else {
            return;
        };
        if self.trie.path(primary).is_none() {
            warn!(parent = %parent.id, "Ignoring child addition under a detached position");
            return;
        }
        let element = PathElement::new(name.clone(), index);
        if let Some(existing) = self.trie.child(primary, &element) {
            if self.id_at(existing) == Some(child) {
                trace!(%child, "Child addition already reflected");
                return;
            }
        }

        // A non-shareable node cached elsewhere has been moved here
        self.moved.remove(child);
        let moved = if self.index.lookup(child).is_some() && !is_shareable(provider, child) {
            self.lift(child)
        } else {
            None
        };

        let parents = self.positions_of(&parent.id);
        for &position in &parents {
            if self.trie.contains(position) {
                self.trie.insert(position, &element);
            }
        }
        if let Some(keep) = moved {
            match parents.first() {
                Some(&target) if self.trie.contains(target) => {
                    if let Some(displaced) = self.trie.graft(target, &element, keep) {
                        warn!(%child, "Displaced a cached position while moving");
                        self.evict(displaced, false);
                    }
                    debug!(%child, parent = %parent.id, "Moved cached node");
                }
                _ => self.evict(keep, false),
            }
        }
        self.check();
    }

    /// Take a moved node out of its old parent, keeping its first position
    /// and cached subtree detached for re-grafting
    ///
    /// The removal from the old parent is applied here, so the matching
    /// removal notification is recorded and later skipped.
    fn lift(&mut self, child: &NodeId) -> Option<ElementId> {
        let positions = self.positions_of_cached(child);
        let &keep = positions.first()?;
        let old_parent = self.trie.parent(keep).and_then(|p| self.owner_of(p));
        let (Some(old_parent), Some(old_element)) = (old_parent, self.trie.path_element(keep)) else {
            // Without a known old slot, forget the node and let the removal
            // notification do the shifting
            self.evict_all(child, false);
            return None;
        };

        for position in self.positions_of(&old_parent) {
            if !self.trie.contains(position) {
                continue;
            }
            match self.trie.child(position, &old_element) {
                Some(slot) if slot == keep => self.trie.detach(keep, true),
                Some(slot) if self.id_at(slot) == Some(child) => self.evict(slot, true),
                Some(_) => {}
                None => {
                    self.trie.remove_child(position, &old_element, true);
                }
            }
        }
        // Positions outside the old parent are stale
        for other in positions.into_iter().skip(1) {
            if self.trie.contains(other) && self.trie.get(other).is_some() {
                self.evict(other, false);
            }
        }
        self.moved.insert(child.clone(), old_parent);
        Some(keep)
    }

    fn node_removed(
        &mut self,
        provider: &dyn StateProvider,
        parent: &NodeState,
        name: &Name,
        index: u32,
        child: &NodeId,
    ) {
        if self.moved.get(child) == Some(&parent.id) {
            self.moved.remove(child);
            trace!(%child, "Child removal already applied by a move");
            return;
        }
        if self.element_of(&parent.id).is_none() {
            return;
        }

        let shareable = is_shareable(provider, child);
        let element = PathElement::new(name.clone(), index);
        let mut superseded = false;
        for position in self.positions_of(&parent.id) {
            if !self.trie.contains(position) {
                continue;
            }
            let Some(slot) = self.trie.child(position, &element) else {
                // Not cached, but later same-name siblings still move down
                self.trie.remove_child(position, &element, true);
                continue;
            };
            match self.id_at(slot) {
                Some(cached) if cached != child => {
                    debug!(%child, %cached, "Ignoring removal of a superseded position");
                    superseded = true;
                }
                _ => self.evict(slot, true),
            }
        }

        // Anything left for a non-shareable node is stale
        if !shareable && !superseded {
            self.evict_all(child, false);
        }
        self.check();
    }

    fn node_modified(&mut self, state: &NodeState) {
        // The snapshot supersedes any removal still pending from a move
        self.moved.retain(|_, old_parent| old_parent != &state.id);
        for parent in self.positions_of(&state.id) {
            while self.trie.contains(parent) {
                let stale = self
                    .trie
                    .children(parent)
                    .into_iter()
                    .find(|&c| self.is_stale_child(state, c));
                match stale {
                    Some(child) => self.evict(child, true),
                    None => break,
                }
            }
        }
        self.check();
    }

    /// A cached child is stale if its slot is gone or now holds another id
    fn is_stale_child(&self, state: &NodeState, child: ElementId) -> bool {
        let Some(element) = self.trie.path_element(child) else {
            return false;
        };
        match state.child_entry(element.name(), element.index()) {
            None => true,
            Some(entry) => self.id_at(child).map_or(false, |cached| cached != &entry.id),
        }
    }

    fn nodes_replaced(&mut self, state: &NodeState) {
        for parent in self.positions_of(&state.id) {
            if !self.trie.contains(parent) {
                continue;
            }
            let mut order = Vec::new();
            let mut reordered = false;
            for child in self.trie.children(parent) {
                let Some(cached) = self.id_at(child).cloned() else {
                    // Without an id the position cannot be re-validated
                    self.evict(child, false);
                    continue;
                };
                let Some(entry) = state.child_entry_by_id(&cached) else {
                    self.evict(child, false);
                    continue;
                };
                let element = entry.path_element();
                if self.trie.path_element(child).as_ref() != Some(&element) {
                    reordered = true;
                }
                order.push((element, child));
            }
            if reordered {
                debug!(parent = %state.id, "Reordering cached children");
                self.trie.set_children(parent, order);
            }
        }
        self.check();
    }
}

fn is_shareable(provider: &dyn StateProvider, id: &NodeId) -> bool {
    provider.node(id).map(|s| s.shareable).unwrap_or(false)
}

/// Primary parent of `id` and the element `id` occupies under it
fn parent_entry(provider: &dyn StateProvider, id: &NodeId) -> Result<(NodeId, PathElement)> {
    let parent = provider
        .node(id)?
        .parent
        .ok_or_else(|| Error::not_found(id))?;
    let element = provider
        .node(&parent)?
        .child_entry_by_id(id)
        .map(|c| c.path_element())
        .ok_or_else(|| Error::Repository(format!("{} is not listed under its parent {}", id, parent)))?;
    Ok((parent, element))
}
