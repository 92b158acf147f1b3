//! Node identifiers, node state snapshots and mutation events

use crate::path::{Name, PathElement};
use std::fmt;
use std::sync::Arc;

/// Opaque, immutable node identifier
#[derive(Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeId(Arc<str>);

impl NodeId {
    /// Create an identifier from any string
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Generate a fresh random identifier
    pub fn random() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an item: either a node or a property of a node
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum ItemId {
    /// A node
    Node(NodeId),
    /// A property, identified by its parent node and name
    Property { parent: NodeId, name: Name },
}

impl ItemId {
    /// The node id, if this denotes a node
    pub fn as_node(&self) -> Option<&NodeId> {
        match self {
            ItemId::Node(id) => Some(id),
            ItemId::Property { .. } => None,
        }
    }

    /// Check if this denotes a node
    pub fn denotes_node(&self) -> bool {
        matches!(self, ItemId::Node(_))
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Node(id) => write!(f, "{}", id),
            ItemId::Property { parent, name } => write!(f, "{}/{}", parent, name),
        }
    }
}

/// A child node entry as recorded by the parent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEntry {
    /// Child name
    pub name: Name,
    /// 1-based same-name-sibling index
    pub index: u32,
    /// Child node id
    pub id: NodeId,
}

impl ChildEntry {
    /// Path element this entry occupies under its parent
    pub fn path_element(&self) -> PathElement {
        PathElement::new(self.name.clone(), self.index)
    }
}

/// Authoritative snapshot of a node as seen by the backing store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeState {
    /// Node id
    pub id: NodeId,
    /// Primary parent; `None` for the root
    pub parent: Option<NodeId>,
    /// Whether the node may be reachable through several parents
    pub shareable: bool,
    /// Child node entries in document order
    pub children: Vec<ChildEntry>,
    /// Property names
    pub properties: Vec<Name>,
}

impl NodeState {
    /// Create an empty node state
    pub fn new(id: NodeId, parent: Option<NodeId>) -> Self {
        Self {
            id,
            parent,
            shareable: false,
            children: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// Look up a child entry by name and index
    pub fn child_entry(&self, name: &Name, index: u32) -> Option<&ChildEntry> {
        let index = index.max(1);
        self.children
            .iter()
            .find(|c| &c.name == name && c.index == index)
    }

    /// Look up a child entry by child id
    pub fn child_entry_by_id(&self, id: &NodeId) -> Option<&ChildEntry> {
        self.children.iter().find(|c| &c.id == id)
    }

    /// Check if a property with the given name exists
    pub fn has_property(&self, name: &Name) -> bool {
        self.properties.contains(name)
    }
}

/// A change notification delivered by the backing store
#[derive(Debug, Clone)]
pub enum StateEvent {
    /// A new item state was created
    Created(NodeId),
    /// A node's state was modified; carries the new state
    Modified(NodeState),
    /// A node was destroyed
    Destroyed(NodeId),
    /// A node's transient state was discarded
    Discarded {
        /// Discarded node
        id: NodeId,
        /// The discarded state was a new, never-persisted node
        transient_new: bool,
        /// A persisted version of the node still exists
        still_persisted: bool,
    },
    /// A child node entry was added to `parent`
    ChildAdded {
        parent: NodeState,
        name: Name,
        index: u32,
        child: NodeId,
    },
    /// A child node entry was removed from `parent`
    ChildRemoved {
        parent: NodeState,
        name: Name,
        index: u32,
        child: NodeId,
    },
    /// The child node entries of a node were replaced or reordered
    ChildrenReplaced(NodeState),
}

impl StateEvent {
    /// The node this event is about (the parent for child events)
    pub fn subject(&self) -> &NodeId {
        match self {
            StateEvent::Created(id) | StateEvent::Destroyed(id) => id,
            StateEvent::Discarded { id, .. } => id,
            StateEvent::Modified(state) | StateEvent::ChildrenReplaced(state) => &state.id,
            StateEvent::ChildAdded { parent, .. } | StateEvent::ChildRemoved { parent, .. } => {
                &parent.id
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Name {
        Name::new(s).unwrap()
    }

    #[test]
    fn test_child_entry_lookup() {
        let mut state = NodeState::new(NodeId::from("p"), None);
        state.children.push(ChildEntry { name: name("foo"), index: 1, id: NodeId::from("1") });
        state.children.push(ChildEntry { name: name("foo"), index: 2, id: NodeId::from("2") });

        assert_eq!(state.child_entry(&name("foo"), 2).unwrap().id, NodeId::from("2"));
        assert_eq!(state.child_entry(&name("foo"), 0).unwrap().id, NodeId::from("1"));
        assert!(state.child_entry(&name("foo"), 3).is_none());
        assert_eq!(state.child_entry_by_id(&NodeId::from("2")).unwrap().index, 2);
    }

    #[test]
    fn test_node_id_is_plain_string_value() {
        let id = NodeId::new(String::from("n-1"));
        assert_eq!(id, NodeId::from("n-1"));
        assert_eq!(id.as_str(), "n-1");
        assert_eq!(id.to_string(), "n-1");
        assert_eq!(format!("{:?}", id), "NodeId(n-1)");
    }

    #[test]
    fn test_random_ids_are_distinct() {
        assert_ne!(NodeId::random(), NodeId::random());
    }
}
