//! Look up the path, name and depth of node ids

use anyhow::{Context, Result};
use cli_lib::Session;
use owo_colors::OwoColorize;
use pathcache_core::NodeId;

pub fn run(session: &Session, ids: &[String]) -> Result<()> {
    let mut failed = 0;
    for raw in ids {
        let id = NodeId::new(raw);
        let path = match session.cache.path_of(&id) {
            Ok(path) => path,
            Err(e) if e.is_not_found() => {
                failed += 1;
                println!("{}  {}", id.to_string().cyan(), "not found".red());
                continue;
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to build path of {}", id)),
        };
        let depth = session.cache.depth_of(&id)?;
        println!("{}  {}  (depth {})", id.to_string().cyan(), path, depth);

        let others: Vec<String> = session
            .cache
            .cached_paths(&id)
            .into_iter()
            .filter(|p| p != &path)
            .map(|p| p.to_string())
            .collect();
        if !others.is_empty() {
            println!("  also cached at: {}", others.join(", "));
        }
    }

    super::print_stats(&session.cache.stats());
    if failed > 0 {
        anyhow::bail!("{} of {} ids were not found", failed, ids.len());
    }
    Ok(())
}
