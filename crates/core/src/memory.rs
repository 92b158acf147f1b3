//! In-memory state provider, intended primarily for testing and tooling
//!
//! Mutators apply a change and return the notifications a persistent store
//! would deliver for it, so callers can feed them to a cache.

use crate::error::{Error, Result};
use crate::path::{Name, Path};
use crate::provider::StateProvider;
use crate::state::{ChildEntry, NodeId, NodeState, StateEvent};
use ahash::AHashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

struct Record {
    state: NodeState,
    /// Every parent this node is currently linked under (more than one only
    /// for shareable nodes)
    parents: Vec<NodeId>,
}

/// An in-memory node tree implementing `StateProvider`
pub struct MemoryStore {
    root: NodeId,
    nodes: RwLock<AHashMap<NodeId, Record>>,
    lookups: AtomicUsize,
}

impl MemoryStore {
    /// Create a store holding only a root node with a random id
    pub fn new() -> Self {
        Self::with_root(NodeId::random())
    }

    /// Create a store whose root node has the given id
    pub fn with_root(root: NodeId) -> Self {
        let mut nodes = AHashMap::new();
        nodes.insert(
            root.clone(),
            Record {
                state: NodeState::new(root.clone(), None),
                parents: Vec::new(),
            },
        );
        Self {
            root,
            nodes: RwLock::new(nodes),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Number of provider calls served so far
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Reset the provider call counter
    pub fn reset_lookups(&self) {
        self.lookups.store(0, Ordering::SeqCst);
    }

    /// Add a node as the last same-name sibling `name` under `parent`
    pub fn add_node(&self, parent: &NodeId, name: &str, id: NodeId) -> Result<Vec<StateEvent>> {
        self.add(parent, name, id, false)
    }

    /// Add a shareable node as the last same-name sibling `name` under `parent`
    pub fn add_shareable_node(
        &self,
        parent: &NodeId,
        name: &str,
        id: NodeId,
    ) -> Result<Vec<StateEvent>> {
        self.add(parent, name, id, true)
    }

    fn add(&self, parent: &NodeId, name: &str, id: NodeId, shareable: bool) -> Result<Vec<StateEvent>> {
        let name = Name::new(name)?;
        let mut nodes = self.nodes.write();
        if nodes.contains_key(&id) {
            return Err(Error::Repository(format!("node {} already exists", id)));
        }
        if !nodes.contains_key(parent) {
            return Err(Error::not_found(parent));
        }

        let mut state = NodeState::new(id.clone(), Some(parent.clone()));
        state.shareable = shareable;
        nodes.insert(
            id.clone(),
            Record {
                state,
                parents: vec![parent.clone()],
            },
        );

        let (parent_state, index) = link_child(&mut nodes, parent, name.clone(), id.clone())?;
        Ok(vec![
            StateEvent::Created(id.clone()),
            StateEvent::ChildAdded {
                parent: parent_state.clone(),
                name,
                index,
                child: id,
            },
            StateEvent::Modified(parent_state),
        ])
    }

    /// Create a node at `path`; its index must be the next free sibling index
    pub fn insert_at(&self, path: &Path, id: NodeId, shareable: bool) -> Result<Vec<StateEvent>> {
        let (parent_path, element) = match (path.parent(), path.name_element()) {
            (Some(parent), Some(element)) => (parent, element.clone()),
            _ => return Err(Error::Repository("cannot insert at the root path".to_string())),
        };
        let parent = self.locate(&parent_path)?;

        let expected = {
            let nodes = self.nodes.read();
            let state = &nodes.get(&parent).ok_or_else(|| Error::not_found(&parent))?.state;
            state.children.iter().filter(|c| &c.name == element.name()).count() as u32 + 1
        };
        if element.index() != expected {
            return Err(Error::Repository(format!(
                "{} must be inserted as index {}",
                path, expected
            )));
        }
        self.add(&parent, element.name().as_str(), id, shareable)
    }

    /// Link an existing shareable node under an additional parent
    pub fn share_node(&self, id: &NodeId, parent: &NodeId, name: &str) -> Result<Vec<StateEvent>> {
        let name = Name::new(name)?;
        let mut nodes = self.nodes.write();
        let record = nodes.get_mut(id).ok_or_else(|| Error::not_found(id))?;
        if !record.state.shareable {
            return Err(Error::Repository(format!("node {} is not shareable", id)));
        }
        if record.parents.contains(parent) {
            return Err(Error::Repository(format!("node {} already shared under {}", id, parent)));
        }
        record.parents.push(parent.clone());

        let (parent_state, index) = link_child(&mut nodes, parent, name.clone(), id.clone())?;
        Ok(vec![
            StateEvent::ChildAdded {
                parent: parent_state.clone(),
                name,
                index,
                child: id.clone(),
            },
            StateEvent::Modified(parent_state),
        ])
    }

    /// Remove the child `name[index]` of `parent`
    ///
    /// The node and its subtree are destroyed unless the node is still
    /// linked under another parent.
    pub fn remove_node(&self, parent: &NodeId, name: &str, index: u32) -> Result<Vec<StateEvent>> {
        let name = Name::new(name)?;
        let mut nodes = self.nodes.write();
        let (parent_state, child) = unlink_child(&mut nodes, parent, &name, index)?;

        let mut events = vec![
            StateEvent::ChildRemoved {
                parent: parent_state.clone(),
                name,
                index: index.max(1),
                child: child.clone(),
            },
            StateEvent::Modified(parent_state),
        ];

        let orphaned = {
            let record = nodes.get_mut(&child).ok_or_else(|| Error::not_found(&child))?;
            record.parents.retain(|p| p != parent);
            match record.parents.first() {
                Some(next) => {
                    record.state.parent = Some(next.clone());
                    false
                }
                None => true,
            }
        };
        if orphaned {
            destroy_subtree(&mut nodes, &child, &mut events);
        }
        Ok(events)
    }

    /// Move a non-shareable node under `new_parent` as the last sibling `name`
    pub fn move_node(&self, id: &NodeId, new_parent: &NodeId, name: &str) -> Result<Vec<StateEvent>> {
        let name = Name::new(name)?;
        let mut nodes = self.nodes.write();
        let old_parent = {
            let record = nodes.get(id).ok_or_else(|| Error::not_found(id))?;
            if record.state.shareable {
                return Err(Error::Repository(format!("cannot move shareable node {}", id)));
            }
            record
                .state
                .parent
                .clone()
                .ok_or_else(|| Error::Repository("cannot move the root node".to_string()))?
        };
        if !nodes.contains_key(new_parent) {
            return Err(Error::not_found(new_parent));
        }

        let old_entry = nodes
            .get(&old_parent)
            .and_then(|r| r.state.child_entry_by_id(id).cloned())
            .ok_or_else(|| Error::not_found(id))?;
        let (old_state, _) = unlink_child(&mut nodes, &old_parent, &old_entry.name, old_entry.index)?;
        let (new_state, index) = link_child(&mut nodes, new_parent, name.clone(), id.clone())?;
        if let Some(record) = nodes.get_mut(id) {
            record.state.parent = Some(new_parent.clone());
            record.parents = vec![new_parent.clone()];
        }
        // A move within one parent must report the final parent state
        let old_state = if &old_parent == new_parent {
            new_state.clone()
        } else {
            old_state
        };

        Ok(vec![
            StateEvent::ChildAdded {
                parent: new_state.clone(),
                name,
                index,
                child: id.clone(),
            },
            StateEvent::ChildRemoved {
                parent: old_state.clone(),
                name: old_entry.name,
                index: old_entry.index,
                child: id.clone(),
            },
            StateEvent::Modified(old_state),
            StateEvent::Modified(new_state),
        ])
    }

    /// Move `child` before `before` (or to the end) in `parent`'s child order
    pub fn order_before(
        &self,
        parent: &NodeId,
        child: &NodeId,
        before: Option<&NodeId>,
    ) -> Result<Vec<StateEvent>> {
        let mut nodes = self.nodes.write();
        let state = &mut nodes.get_mut(parent).ok_or_else(|| Error::not_found(parent))?.state;
        let from = state
            .children
            .iter()
            .position(|c| &c.id == child)
            .ok_or_else(|| Error::not_found(child))?;
        let entry = state.children.remove(from);
        let to = match before {
            Some(before) => state
                .children
                .iter()
                .position(|c| &c.id == before)
                .ok_or_else(|| Error::not_found(before))?,
            None => state.children.len(),
        };
        state.children.insert(to, entry);
        renumber(&mut state.children);
        Ok(vec![StateEvent::ChildrenReplaced(state.clone())])
    }

    /// Add a property name to a node
    pub fn set_property(&self, id: &NodeId, name: &str) -> Result<()> {
        let name = Name::new(name)?;
        let mut nodes = self.nodes.write();
        let state = &mut nodes.get_mut(id).ok_or_else(|| Error::not_found(id))?.state;
        if !state.has_property(&name) {
            state.properties.push(name);
        }
        Ok(())
    }

    /// Resolve a path without touching the lookup counter
    pub fn locate(&self, path: &Path) -> Result<NodeId> {
        let nodes = self.nodes.read();
        let mut current = self.root.clone();
        for element in path.elements() {
            let state = &nodes.get(&current).ok_or_else(|| Error::not_found(&current))?.state;
            current = state
                .child_entry(element.name(), element.index())
                .map(|c| c.id.clone())
                .ok_or_else(|| Error::not_found(path))?;
        }
        Ok(current)
    }

    /// Number of nodes, including the root
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// Check if the store holds only the root
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    fn count(&self) {
        self.lookups.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateProvider for MemoryStore {
    fn root_id(&self) -> NodeId {
        self.root.clone()
    }

    fn child_id(&self, parent: &NodeId, name: &Name, index: u32) -> Result<NodeId> {
        self.count();
        let nodes = self.nodes.read();
        let record = nodes.get(parent).ok_or_else(|| Error::not_found(parent))?;
        record
            .state
            .child_entry(name, index)
            .map(|c| c.id.clone())
            .ok_or_else(|| Error::not_found(format!("{}/{}[{}]", parent, name, index.max(1))))
    }

    fn has_property(&self, parent: &NodeId, name: &Name) -> Result<bool> {
        self.count();
        let nodes = self.nodes.read();
        let record = nodes.get(parent).ok_or_else(|| Error::not_found(parent))?;
        Ok(record.state.has_property(name))
    }

    fn node_exists(&self, id: &NodeId) -> bool {
        self.count();
        self.nodes.read().contains_key(id)
    }

    fn node(&self, id: &NodeId) -> Result<NodeState> {
        self.count();
        self.nodes
            .read()
            .get(id)
            .map(|r| r.state.clone())
            .ok_or_else(|| Error::not_found(id))
    }
}

/// Append `child` as the last sibling `name` of `parent`
fn link_child(
    nodes: &mut AHashMap<NodeId, Record>,
    parent: &NodeId,
    name: Name,
    child: NodeId,
) -> Result<(NodeState, u32)> {
    let state = &mut nodes.get_mut(parent).ok_or_else(|| Error::not_found(parent))?.state;
    let index = state.children.iter().filter(|c| c.name == name).count() as u32 + 1;
    state.children.push(ChildEntry {
        name,
        index,
        id: child,
    });
    Ok((state.clone(), index))
}

/// Remove the child entry `name[index]` of `parent`, shifting later siblings
fn unlink_child(
    nodes: &mut AHashMap<NodeId, Record>,
    parent: &NodeId,
    name: &Name,
    index: u32,
) -> Result<(NodeState, NodeId)> {
    let state = &mut nodes.get_mut(parent).ok_or_else(|| Error::not_found(parent))?.state;
    let index = index.max(1);
    let pos = state
        .children
        .iter()
        .position(|c| &c.name == name && c.index == index)
        .ok_or_else(|| Error::not_found(format!("{}/{}[{}]", parent, name, index)))?;
    let removed = state.children.remove(pos);
    renumber(&mut state.children);
    Ok((state.clone(), removed.id))
}

/// Reassign same-name-sibling indices in document order
fn renumber(children: &mut [ChildEntry]) {
    let mut seen: AHashMap<Name, u32> = AHashMap::new();
    for child in children.iter_mut() {
        let next = seen.entry(child.name.clone()).or_insert(0);
        *next += 1;
        child.index = *next;
    }
}

/// Drop `id` and every descendant no longer linked elsewhere
fn destroy_subtree(nodes: &mut AHashMap<NodeId, Record>, id: &NodeId, events: &mut Vec<StateEvent>) {
    let mut stack = vec![id.clone()];
    while let Some(current) = stack.pop() {
        let Some(record) = nodes.remove(&current) else {
            continue;
        };
        for child in &record.state.children {
            let still_linked = match nodes.get_mut(&child.id) {
                Some(child_record) => {
                    child_record.parents.retain(|p| p != &current);
                    match child_record.parents.first() {
                        Some(next) => {
                            child_record.state.parent = Some(next.clone());
                            true
                        }
                        None => false,
                    }
                }
                None => true,
            };
            if !still_linked {
                stack.push(child.id.clone());
            }
        }
        events.push(StateEvent::Destroyed(current));
    }
}
