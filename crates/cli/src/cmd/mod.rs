//! CLI command implementations

pub mod dump;
pub mod path;
pub mod resolve;

use owo_colors::OwoColorize;
use pathcache::CacheStats;

/// Print the cache counters after a command
pub fn print_stats(stats: &CacheStats) {
    println!();
    println!("{}", "Cache".bold());
    println!("  Hits:        {}", stats.hits);
    println!("  Misses:      {}", stats.misses);
    println!("  Hit rate:    {:.1}%", stats.hit_rate() * 100.0);
    println!("  Evictions:   {}", stats.evictions);
    if stats.anomalies > 0 {
        println!("  Anomalies:   {}", stats.anomalies.to_string().yellow());
    }
}
