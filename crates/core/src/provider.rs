//! Source of truth consulted by the cache on a miss

use crate::error::Result;
use crate::path::Name;
use crate::state::{NodeId, NodeState};

/// Authoritative node structure behind the cache
///
/// Implementations are called while the cache lock is held, so they must
/// never call back into the cache.
pub trait StateProvider: Send + Sync {
    /// Id of the root node
    fn root_id(&self) -> NodeId;

    /// Id of the child `name[index]` of `parent`
    ///
    /// Returns `Error::NotFound` if the parent or the child does not exist.
    fn child_id(&self, parent: &NodeId, name: &Name, index: u32) -> Result<NodeId>;

    /// Check if `parent` has a property called `name`
    fn has_property(&self, parent: &NodeId, name: &Name) -> Result<bool>;

    /// Check if a node with this id exists
    fn node_exists(&self, id: &NodeId) -> bool;

    /// Snapshot of a node
    fn node(&self, id: &NodeId) -> Result<NodeState>;
}
