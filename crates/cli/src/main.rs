//! pcache - inspect a hierarchy cache over a fixture tree

use anyhow::Result;
use clap::{Parser, Subcommand};
use cli_lib::Session;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

/// pcache - bounded id <-> path cache for hierarchical stores
#[derive(Parser)]
#[command(name = "pcache")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Tree fixture (TOML) backing the cache
    #[arg(long, global = true, default_value = "tree.toml")]
    tree: PathBuf,

    /// Cache configuration file with a [cache] table
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verify cache consistency after every mutation
    #[arg(long, global = true)]
    check: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve paths to node ids
    Resolve {
        /// Absolute paths such as /a/b[2]
        #[arg(required = true)]
        paths: Vec<String>,
        /// Allow the last element to name a property
        #[arg(short, long)]
        properties: bool,
    },
    /// Show the path of node ids
    Path {
        /// Node ids
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Print the cache trie, optionally after resolving some paths
    Dump {
        /// Paths to resolve before dumping
        warm: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; RUST_LOG wins over -v
    let level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let session = Session::open(&cli.tree, cli.config.as_deref(), cli.check)?;

    match cli.command {
        Commands::Resolve { paths, properties } => cmd::resolve::run(&session, &paths, properties),
        Commands::Path { ids } => cmd::path::run(&session, &ids),
        Commands::Dump { warm } => cmd::dump::run(&session, &warm),
    }
}
