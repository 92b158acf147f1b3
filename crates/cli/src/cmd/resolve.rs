//! Resolve paths to item ids

use anyhow::{Context, Result};
use cli_lib::Session;
use owo_colors::OwoColorize;
use pathcache_core::{ItemId, Path};

pub fn run(session: &Session, paths: &[String], properties: bool) -> Result<()> {
    let mut failed = 0;
    for raw in paths {
        let path: Path = raw
            .parse()
            .with_context(|| format!("Invalid path: {}", raw))?;

        match session.cache.resolve_path(&path, !properties) {
            Ok(ItemId::Node(id)) => println!("{}  {}", path.to_string().cyan(), id),
            Ok(ItemId::Property { parent, name }) => {
                println!("{}  property {} of {}", path.to_string().cyan(), name, parent)
            }
            Err(e) if e.is_not_found() => {
                failed += 1;
                println!("{}  {}", path.to_string().cyan(), "not found".red());
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to resolve {}", path)),
        }
    }

    super::print_stats(&session.cache.stats());
    if failed > 0 {
        anyhow::bail!("{} of {} paths did not resolve", failed, paths.len());
    }
    Ok(())
}
