//! End-to-end tests for the pcache tool

use cli_lib::Session;
use pathcache_core::{NodeId, Path, StateProvider};
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

const TREE: &str = r#"
root = "root"

[[node]]
path = "/content"
id = "c"

[[node]]
path = "/content/page"
id = "p1"
properties = ["title"]

[[node]]
path = "/content/page[2]"
id = "p2"

[[node]]
path = "/shared"
id = "s"
shareable = true

[[node]]
path = "/content/s"
id = "s"
"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("tree.toml"), TREE).unwrap();
        std::fs::write(
            dir.path().join("pcache.toml"),
            "[cache]\ncapacity = 2\nconsistency_check = true\n",
        )
        .unwrap();
        Self { dir }
    }

    fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn pcache(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_pcache"))
            .current_dir(self.dir.path())
            .args(args)
            .env_remove("RUST_LOG")
            .output()
            .unwrap()
    }
}

fn path(s: &str) -> Path {
    s.parse().unwrap()
}

#[test]
fn test_session_from_files() {
    let ws = Workspace::new();
    let session = Session::open(&ws.file("tree.toml"), Some(&ws.file("pcache.toml")), false).unwrap();

    assert_eq!(session.cache.capacity(), 2);
    assert_eq!(session.store.root_id(), NodeId::new("root"));
    assert_eq!(
        session.cache.resolve_node_path(&path("/content/page[2]")).unwrap(),
        NodeId::new("p2")
    );
    assert_eq!(session.cache.path_of(&NodeId::new("p1")).unwrap(), path("/content/page"));
    assert_eq!(session.cache.verify(), Ok(()));
}

#[test]
fn test_session_rejects_bad_config() {
    let ws = Workspace::new();
    std::fs::write(ws.file("bad.toml"), "[cache]\ncapacity = 0\n").unwrap();
    assert!(Session::open(&ws.file("tree.toml"), Some(&ws.file("bad.toml")), false).is_err());
    assert!(Session::open(&ws.file("missing.toml"), None, false).is_err());
}

#[test]
fn test_resolve_command() {
    let ws = Workspace::new();
    let output = ws.pcache(&["resolve", "/content/page[2]", "/shared"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("p2"));
    assert!(stdout.contains("Misses"));
}

#[test]
fn test_resolve_property_and_missing() {
    let ws = Workspace::new();
    let output = ws.pcache(&["resolve", "--properties", "/content/page/title"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("property title of p1"));

    let output = ws.pcache(&["resolve", "/content/nothing"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("not found"));
}

#[test]
fn test_path_command_lists_shared_positions() {
    let ws = Workspace::new();
    let output = ws.pcache(&["path", "s"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("/shared"));
}

#[test]
fn test_dump_command_with_config() {
    let ws = Workspace::new();
    let output = ws.pcache(&[
        "--config",
        "pcache.toml",
        "dump",
        "/content/page",
        "/content/page[2]",
    ]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("capacity=2"));
    assert!(stdout.contains("Consistent"));
}
