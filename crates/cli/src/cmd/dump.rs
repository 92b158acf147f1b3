//! Warm the cache and print its trie

use anyhow::{Context, Result};
use cli_lib::Session;
use owo_colors::OwoColorize;
use pathcache_core::Path;

pub fn run(session: &Session, warm: &[String]) -> Result<()> {
    for raw in warm {
        let path: Path = raw
            .parse()
            .with_context(|| format!("Invalid path: {}", raw))?;
        if let Err(e) = session.cache.resolve_path(&path, true) {
            tracing::warn!(%path, error = %e, "Failed to warm path");
        }
    }

    println!("{}", "Hierarchy Cache".bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    print!("{}", session.cache.dump());

    match session.cache.verify() {
        Ok(()) => println!("{}", "Consistent ✓".green()),
        Err(violation) => println!("{} {}", "Inconsistent:".red(), violation),
    }
    super::print_stats(&session.cache.stats());
    Ok(())
}
