//! Cache counters

/// Hit/miss/eviction counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that fell through to the provider
    pub misses: u64,
    /// Entries evicted to stay under capacity
    pub evictions: u64,
    /// Trie positions found bound to an unexpected id
    pub anomalies: u64,
}

impl CacheStats {
    /// Hit rate as a fraction [0.0, 1.0]; 0.0 if no lookups
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
