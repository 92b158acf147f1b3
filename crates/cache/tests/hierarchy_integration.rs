//! End-to-end behavior of the hierarchy cache against an in-memory store

mod common;

use common::{apply, checked_cache, id, name, path, snapshot, store_with};
use pathcache::HierarchyCache;
use pathcache_core::{ChildEntry, ItemId, MemoryStore, StateEvent};
use std::sync::Arc;

#[test]
fn test_consistency_holds_across_mixed_operations() {
    let store = store_with(&[
        ("/a", "1"),
        ("/a/b", "2"),
        ("/a/b/c", "3"),
        ("/foo", "f1"),
        ("/foo[2]", "f2"),
    ]);
    let cache = checked_cache(&store, 4);

    cache.resolve_node_path(&path("/a/b/c")).unwrap();
    cache.path_of(&id("f2")).unwrap();
    apply(&cache, store.remove_node(&id("root"), "foo", 1).unwrap());
    apply(&cache, store.add_node(&id("2"), "d", id("4")).unwrap());
    cache.resolve_node_path(&path("/a/b/d")).unwrap();

    assert_eq!(cache.verify(), Ok(()));
    assert!(cache.len() <= 5);
}

#[test]
fn test_eviction_only_takes_leaves() {
    let store = store_with(&[("/a", "1"), ("/a/b", "2"), ("/a/b/c", "3"), ("/x", "x")]);
    let cache = checked_cache(&store, 3);

    cache.resolve_node_path(&path("/a/b/c")).unwrap();
    cache.resolve_node_path(&path("/x")).unwrap();

    // /a and /a/b still have cached children; /a/b/c was the only leaf
    assert!(cache.is_cached(&id("1")));
    assert!(cache.is_cached(&id("2")));
    assert!(!cache.is_cached(&id("3")));
    assert!(cache.is_cached(&id("x")));
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn test_shareable_node_keeps_remaining_position() {
    let store = store_with(&[("/x", "1"), ("/y", "2")]);
    store.add_shareable_node(&id("1"), "s", id("s")).unwrap();
    store.share_node(&id("s"), &id("2"), "s").unwrap();
    let cache = checked_cache(&store, 100);

    assert_eq!(cache.resolve_node_path(&path("/x/s")).unwrap(), id("s"));
    assert_eq!(cache.resolve_node_path(&path("/y/s")).unwrap(), id("s"));
    assert_eq!(cache.cached_paths(&id("s")), vec![path("/x/s"), path("/y/s")]);
    assert_eq!(cache.len(), 3);

    apply(&cache, store.remove_node(&id("2"), "s", 1).unwrap());

    assert_eq!(cache.cached_paths(&id("s")), vec![path("/x/s")]);
    store.reset_lookups();
    assert_eq!(cache.resolve_node_path(&path("/x/s")).unwrap(), id("s"));
    assert_eq!(store.lookups(), 0);
}

#[test]
fn test_move_rehomes_cached_subtree() {
    let store = store_with(&[("/a", "1"), ("/b", "2"), ("/a/c", "3"), ("/a/c/d", "4")]);
    let cache = checked_cache(&store, 100);
    cache.resolve_node_path(&path("/a/c/d")).unwrap();
    cache.resolve_node_path(&path("/b")).unwrap();

    apply(&cache, store.move_node(&id("3"), &id("2"), "c").unwrap());

    assert_eq!(cache.cached_paths(&id("3")), vec![path("/b/c")]);
    assert_eq!(cache.cached_paths(&id("4")), vec![path("/b/c/d")]);

    store.reset_lookups();
    assert_eq!(cache.resolve_node_path(&path("/b/c/d")).unwrap(), id("4"));
    assert_eq!(store.lookups(), 0);
    assert!(cache.resolve_node_path(&path("/a/c")).unwrap_err().is_not_found());
    assert_eq!(store.lookups(), 1);
}

#[test]
fn test_move_within_parent_with_cached_siblings() {
    let store = store_with(&[("/p", "p"), ("/p/a", "x"), ("/p/a[2]", "y")]);
    let cache = checked_cache(&store, 100);
    cache.path_of(&id("x")).unwrap();
    cache.path_of(&id("y")).unwrap();

    // x becomes the last `a`, y slides down to index 1
    apply(&cache, store.move_node(&id("x"), &id("p"), "a").unwrap());

    assert_eq!(cache.cached_paths(&id("y")), vec![path("/p/a")]);
    assert_eq!(cache.cached_paths(&id("x")), vec![path("/p/a[2]")]);
    assert_eq!(store.locate(&path("/p/a[2]")).unwrap(), id("x"));
}

#[test]
fn test_removal_shifts_cached_siblings() {
    let store = store_with(&[("/foo", "f1"), ("/foo[2]", "f2"), ("/foo[3]", "f3")]);
    let cache = checked_cache(&store, 100);
    for node in ["f1", "f2", "f3"] {
        cache.path_of(&id(node)).unwrap();
    }

    apply(&cache, store.remove_node(&id("root"), "foo", 1).unwrap());

    assert!(!cache.is_cached(&id("f1")));
    assert_eq!(cache.cached_paths(&id("f2")), vec![path("/foo")]);
    assert_eq!(cache.cached_paths(&id("f3")), vec![path("/foo[2]")]);
    store.reset_lookups();
    assert_eq!(cache.resolve_node_path(&path("/foo[2]")).unwrap(), id("f3"));
    assert_eq!(store.lookups(), 0);
}

#[test]
fn test_removal_of_uncached_sibling_still_shifts() {
    let store = store_with(&[("/foo", "f1"), ("/foo[2]", "f2"), ("/foo[3]", "f3")]);
    let cache = checked_cache(&store, 100);
    cache.path_of(&id("f3")).unwrap();

    apply(&cache, store.remove_node(&id("root"), "foo", 2).unwrap());

    assert_eq!(cache.cached_paths(&id("f3")), vec![path("/foo[2]")]);
}

#[test]
fn test_addition_shifts_cached_siblings() {
    let store = store_with(&[("/foo", "f1")]);
    let cache = checked_cache(&store, 100);
    cache.path_of(&id("f1")).unwrap();

    // Hand-built notification for an insertion in front of f1
    let mut parent = snapshot(&store, &id("root"));
    parent.children.insert(
        0,
        ChildEntry {
            name: name("foo"),
            index: 1,
            id: id("f0"),
        },
    );
    parent.children[1].index = 2;
    cache.node_added(&parent, &name("foo"), 1, &id("f0"));

    assert_eq!(cache.cached_paths(&id("f1")), vec![path("/foo[2]")]);
    assert!(!cache.is_cached(&id("f0")));
}

#[test]
fn test_reorder_renames_cached_children() {
    let store = store_with(&[("/foo", "f1"), ("/foo[2]", "f2"), ("/foo[3]", "f3")]);
    let cache = checked_cache(&store, 100);
    for node in ["f1", "f2", "f3"] {
        cache.path_of(&id(node)).unwrap();
    }

    apply(
        &cache,
        store
            .order_before(&id("root"), &id("f3"), Some(&id("f1")))
            .unwrap(),
    );

    assert_eq!(cache.cached_paths(&id("f3")), vec![path("/foo")]);
    assert_eq!(cache.cached_paths(&id("f1")), vec![path("/foo[2]")]);
    assert_eq!(cache.cached_paths(&id("f2")), vec![path("/foo[3]")]);
}

#[test]
fn test_modified_parent_drops_stale_children() {
    let store = store_with(&[("/a", "1"), ("/a/b", "2"), ("/a/c", "3")]);
    let cache = checked_cache(&store, 100);
    cache.path_of(&id("2")).unwrap();
    cache.path_of(&id("3")).unwrap();

    // Only the trailing Modified is delivered
    let events = store.remove_node(&id("1"), "b", 1).unwrap();
    for event in events {
        if matches!(event, StateEvent::Modified(_)) {
            cache.on_event(event);
        }
    }

    assert!(!cache.is_cached(&id("2")));
    assert_eq!(cache.cached_paths(&id("3")), vec![path("/a/c")]);
}

#[test]
fn test_destroyed_and_discarded() {
    let store = store_with(&[("/a", "1"), ("/a/b", "2")]);
    let cache = checked_cache(&store, 100);
    cache.path_of(&id("2")).unwrap();

    cache.on_event(StateEvent::Discarded {
        id: id("2"),
        transient_new: false,
        still_persisted: true,
    });
    assert!(!cache.is_cached(&id("2")));
    assert!(cache.is_cached(&id("1")));

    cache.on_event(StateEvent::Destroyed(id("1")));
    assert!(cache.is_empty());
}

#[test]
fn test_idempotent_recache() {
    let store = store_with(&[("/a", "1")]);
    let cache = checked_cache(&store, 100);

    cache.cache(id("1"), &path("/a"));
    let (dump, stats) = (cache.dump(), cache.stats());
    cache.cache(id("1"), &path("/a"));

    assert_eq!(cache.dump(), dump);
    assert_eq!(cache.stats(), stats);
}

#[test]
fn test_eviction_scans_from_least_recently_used() {
    let cache = populated(false);
    cache.cache(id("z"), &path("/z"));
    // A was never touched, so it is the first leaf from the head
    assert!(!cache.is_cached(&id("A")));
    assert!(cache.is_cached(&id("Bx")));

    let cache = populated(true);
    cache.cache(id("z"), &path("/z"));
    // After the touch, the first leaf from the head is Bx
    assert!(cache.is_cached(&id("A")));
    assert!(!cache.is_cached(&id("Bx")));
    assert!(cache.is_cached(&id("Cx")));
}

/// A, B, C at the top, B and C with one cached child each
fn populated(touch_a: bool) -> HierarchyCache {
    let store = Arc::new(MemoryStore::with_root(id("root")));
    let cache = checked_cache(&store, 5);
    for (node, p) in [("A", "/a"), ("B", "/b"), ("C", "/c"), ("Bx", "/b/x"), ("Cx", "/c/x")] {
        cache.cache(id(node), &path(p));
    }
    if touch_a {
        assert_eq!(cache.resolve_node_path(&path("/a")).unwrap(), id("A"));
    }
    cache
}

#[test]
fn test_removed_child_misses_while_parent_hits() {
    let store = store_with(&[("/a", "1"), ("/a/b", "2")]);
    let cache = checked_cache(&store, 2);
    cache.cache(id("1"), &path("/a"));
    cache.cache(id("2"), &path("/a/b"));

    store.reset_lookups();
    assert_eq!(cache.resolve_node_path(&path("/a/b")).unwrap(), id("2"));
    assert_eq!(store.lookups(), 0);

    let parent = snapshot(&store, &id("1"));
    cache.node_removed(&parent, &name("b"), 1, &id("2"));
    store.reset_lookups();

    // Falls through to the store, which still has the node
    let misses = cache.stats().misses;
    assert_eq!(cache.resolve_node_path(&path("/a/b")).unwrap(), id("2"));
    assert_eq!(cache.stats().misses, misses + 1);
    assert_eq!(store.lookups(), 1);

    store.reset_lookups();
    assert_eq!(cache.resolve_node_path(&path("/a")).unwrap(), id("1"));
    assert_eq!(store.lookups(), 0);
}

#[test]
fn test_property_resolution_through_cached_parent() {
    let store = store_with(&[("/a", "1")]);
    store.set_property(&id("1"), "title").unwrap();
    let cache = checked_cache(&store, 100);
    cache.path_of(&id("1")).unwrap();

    let item = cache.resolve_path(&path("/a/title"), false).unwrap();
    assert_eq!(
        item,
        ItemId::Property {
            parent: id("1"),
            name: name("title")
        }
    );
    assert!(cache.resolve_path(&path("/a/title[2]"), false).is_err());
    assert!(cache.resolve_path(&path("/a/missing"), false).is_err());
}

#[test]
fn test_ancestry_through_second_position_of_shared_node() {
    let store = store_with(&[("/x", "x"), ("/y", "y")]);
    store.add_shareable_node(&id("x"), "s", id("s")).unwrap();
    store.share_node(&id("s"), &id("y"), "s").unwrap();
    store.add_node(&id("s"), "d", id("d")).unwrap();
    let cache = checked_cache(&store, 10);

    cache.resolve_node_path(&path("/x/s")).unwrap();
    cache.resolve_node_path(&path("/y/s/d")).unwrap();
    assert_eq!(cache.cached_paths(&id("s")), vec![path("/x/s"), path("/y/s")]);
    assert_eq!(cache.cached_paths(&id("d")), vec![path("/y/s/d")]);

    store.reset_lookups();
    assert!(cache.is_ancestor(&id("s"), &id("d")).unwrap());
    assert_eq!(cache.relative_depth(&id("s"), &id("d")).unwrap(), Some(1));
    assert_eq!(cache.relative_depth(&id("y"), &id("d")).unwrap(), Some(2));
    assert_eq!(store.lookups(), 0);

    // Not on any cached chain, answered by the store
    assert_eq!(cache.relative_depth(&id("x"), &id("d")).unwrap(), Some(2));
    assert!(!cache.is_ancestor(&id("d"), &id("s")).unwrap());
}
