//! Tree fixtures: TOML descriptions of a node hierarchy
//!
//! ```toml
//! root = "root"
//!
//! [[node]]
//! path = "/a"
//! id = "1"
//!
//! [[node]]
//! path = "/a/s"
//! id = "s"
//! shareable = true
//! properties = ["title"]
//! ```
//!
//! Nodes are created in file order, so parents must come first and
//! same-name siblings must be listed by increasing index. Listing a
//! shareable id again links it under an additional parent.

use anyhow::{Context, Result};
use pathcache_core::{MemoryStore, NodeId, Path};
use serde::Deserialize;
use std::collections::HashSet;

/// One node of a fixture
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureNode {
    pub path: String,
    pub id: String,
    #[serde(default)]
    pub shareable: bool,
    #[serde(default)]
    pub properties: Vec<String>,
}

/// A parsed tree fixture
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fixture {
    /// Id of the root node; random when omitted
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default, rename = "node")]
    pub nodes: Vec<FixtureNode>,
}

impl Fixture {
    /// Parse a fixture from TOML
    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse tree fixture")
    }

    /// Load a fixture file
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read tree fixture: {}", path.display()))?;
        Self::parse(&contents)
    }

    /// Build an in-memory store holding the fixture's nodes
    pub fn build(&self) -> Result<MemoryStore> {
        let store = match &self.root {
            Some(root) => MemoryStore::with_root(NodeId::new(root)),
            None => MemoryStore::new(),
        };

        let mut seen = HashSet::new();
        for node in &self.nodes {
            let path: Path = node
                .path
                .parse()
                .with_context(|| format!("Invalid fixture path: {}", node.path))?;
            let id = NodeId::new(&node.id);

            if seen.insert(node.id.clone()) {
                store
                    .insert_at(&path, id.clone(), node.shareable)
                    .with_context(|| format!("Failed to create {} at {}", node.id, path))?;
            } else {
                link_shared(&store, &path, &id)?;
            }

            for property in &node.properties {
                store
                    .set_property(&id, property)
                    .with_context(|| format!("Failed to set property {} on {}", property, node.id))?;
            }
        }

        tracing::debug!(nodes = store.len(), "Built store from fixture");
        Ok(store)
    }
}

/// Link an existing shareable node at an additional path
fn link_shared(store: &MemoryStore, path: &Path, id: &NodeId) -> Result<()> {
    let (parent_path, element) = match (path.parent(), path.name_element()) {
        (Some(parent), Some(element)) => (parent, element),
        _ => anyhow::bail!("Cannot share {} at the root path", id),
    };
    let parent = store
        .locate(&parent_path)
        .with_context(|| format!("Parent of {} does not exist", path))?;
    store
        .share_node(id, &parent, element.name().as_str())
        .with_context(|| format!("Failed to share {} at {}", id, path))?;

    // Sharing appends, so the listed index must be the next free one
    let placed = store.locate(path).ok();
    anyhow::ensure!(
        placed.as_ref() == Some(id),
        "Shared node {} did not land at {}",
        id,
        path
    );
    Ok(())
}
