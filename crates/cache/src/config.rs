//! Cache configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default upper bound on the number of cached ids
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Hierarchy cache configuration
///
/// Loaded from the `[cache]` table of a TOML file, or built directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Advisory upper bound on the number of distinct ids cached
    pub capacity: usize,
    /// Verify the cache after every mutation (debug/test only)
    pub consistency_check: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            consistency_check: false,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    cache: CacheConfig,
}

impl CacheConfig {
    /// Configuration with the given capacity and checking disabled
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Parse a TOML document containing an optional `[cache]` table
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).context("Failed to parse cache config")?;
        file.cache.validate()?;
        Ok(file.cache)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::from_toml_str(&contents)
    }

    /// Reject values the cache cannot work with
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.capacity > 0, "cache capacity must be at least 1");
        Ok(())
    }
}
