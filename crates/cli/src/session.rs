//! A cache wired to a fixture-backed store

use crate::fixture::Fixture;
use anyhow::{Context, Result};
use pathcache::{CacheConfig, HierarchyCache};
use pathcache_core::MemoryStore;
use std::path::Path;
use std::sync::Arc;

/// Store plus the cache in front of it
pub struct Session {
    pub store: Arc<MemoryStore>,
    pub cache: HierarchyCache,
}

impl Session {
    /// Build a session from a fixture file and an optional config file
    pub fn open(tree: &Path, config: Option<&Path>, check: bool) -> Result<Self> {
        let fixture = Fixture::load(tree)?;
        let mut config = match config {
            Some(path) => CacheConfig::load(path).context("Failed to load cache config")?,
            None => CacheConfig::default(),
        };
        config.consistency_check |= check;
        Self::from_fixture(&fixture, config)
    }

    /// Build a session from an already parsed fixture
    pub fn from_fixture(fixture: &Fixture, config: CacheConfig) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(fixture.build()?);
        let cache = HierarchyCache::new(store.clone(), config);
        Ok(Self { store, cache })
    }
}
