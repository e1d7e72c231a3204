//! Tests for split, rotate and merge
//!
//! These tests verify:
//! - Splits promote one separator and grow the tree from the root
//! - Underflow borrows from a sibling before merging
//! - Merges and root collapse return pages to the free list
//! - Balance and ordering survive long mixed workloads

use std::path::PathBuf;

use emberdb::btree::Node;
use emberdb::config::StoreOptions;
use emberdb::Collection;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_file() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tree.db");
    (temp_dir, path)
}

/// 128-byte pages, 40%/70% fill: a leaf holds at most four `KeyN`/`ValueN` items
fn tiny_options() -> StoreOptions {
    StoreOptions::with_page_size(128).fill_percent(0.4, 0.7)
}

fn open_with_keys(path: &PathBuf, keys: &[&str]) -> Collection {
    let mut tree = Collection::open(path, tiny_options()).unwrap();
    for key in keys {
        let value = key.replace("Key", "Value");
        tree.put(key.as_bytes(), value.as_bytes(), false).unwrap();
    }
    tree
}

fn keys_of(node: &Node) -> Vec<String> {
    node.items
        .iter()
        .map(|item| String::from_utf8(item.key.clone()).unwrap())
        .collect()
}

fn all_keys(tree: &Collection) -> Vec<String> {
    tree.fetch_all()
        .unwrap()
        .into_iter()
        .map(|item| String::from_utf8(item.key).unwrap())
        .collect()
}

fn root_and_children(tree: &Collection) -> (Node, Vec<Node>) {
    let root = tree.node(tree.root_page()).unwrap();
    let children = root
        .children
        .iter()
        .map(|page| tree.node(*page).unwrap())
        .collect();
    (root, children)
}

/// Every allocated page is Meta, the free list, a live node or free
fn assert_no_leaks(tree: &Collection) {
    let stats = tree.stats().unwrap();
    assert_eq!(
        stats.nodes as u64 + tree.free_page_count() as u64 + 2,
        tree.page_count(),
        "page accounting: {:?}, free {}",
        stats,
        tree.free_page_count()
    );
}

/// Every node within max fill and the page; every non-root node at or above min fill
fn assert_fill_bounds(tree: &Collection, options: StoreOptions) {
    let root = tree.root_page();
    let mut pending = vec![root];

    while let Some(page) = pending.pop() {
        let node = tree.node(page).unwrap();
        let size = node.node_size() as f64;
        assert!(size <= options.max_fill_bytes(), "page {} overflowed", page);
        assert!(node.encoded_size() <= options.page_size);
        if page != root {
            assert!(
                size >= options.min_fill_bytes(),
                "page {} under-full: {} < {}",
                page,
                size,
                options.min_fill_bytes()
            );
        }
        pending.extend(node.children.iter().copied());
    }
}

/// Deterministic permutation of 0..n
fn shuffled(n: usize) -> Vec<usize> {
    (0..n).map(|i| (i * 7919) % n).collect()
}

// =============================================================================
// Split Tests
// =============================================================================

#[test]
fn test_split_creates_new_root() {
    let (_temp, path) = setup_temp_file();
    let tree = open_with_keys(&path, &["Key1", "Key2", "Key3", "Key4", "Key5", "Key6"]);

    let (root, children) = root_and_children(&tree);
    assert_eq!(keys_of(&root), vec!["Key4"]);
    assert_eq!(children.len(), 2);
    assert_eq!(keys_of(&children[0]), vec!["Key1", "Key2", "Key3"]);
    assert_eq!(keys_of(&children[1]), vec!["Key5", "Key6"]);

    assert_eq!(all_keys(&tree), vec!["Key1", "Key2", "Key3", "Key4", "Key5", "Key6"]);
    assert_eq!(tree.stats().unwrap().depth, 2);
    assert_no_leaks(&tree);
}

#[test]
fn test_no_split_below_max_fill() {
    let (_temp, path) = setup_temp_file();
    let tree = open_with_keys(&path, &["Key1", "Key2", "Key3", "Key4"]);

    let root = tree.node(tree.root_page()).unwrap();
    assert!(root.is_leaf());
    assert_eq!(root.items.len(), 4);
}

#[test]
fn test_split_keeps_nodes_within_max_fill() {
    let (_temp, path) = setup_temp_file();
    let options = StoreOptions::with_page_size(512).fill_percent(0.2, 0.8);
    let mut tree = Collection::open(&path, options).unwrap();

    for i in shuffled(300) {
        let key = format!("key{:04}", i);
        let value = format!("v{:04}", i);
        tree.put(key.as_bytes(), value.as_bytes(), false).unwrap();
    }

    assert_fill_bounds(&tree, options);

    let stats = tree.stats().unwrap();
    assert_eq!(stats.items, 300);
    assert!(stats.depth >= 2);
}

#[test]
fn test_split_never_leaves_empty_sibling() {
    let (_temp, path) = setup_temp_file();
    let mut tree = Collection::open(&path, StoreOptions::with_page_size(256)).unwrap();

    // Large, small, large: the size threshold is only crossed at the middle item
    tree.put(b"a", &[b'x'; 111], false).unwrap();
    tree.put(b"b", b"y", false).unwrap();
    tree.put(b"c", &[b'z'; 111], false).unwrap();

    let (root, children) = root_and_children(&tree);
    assert_eq!(keys_of(&root), vec!["b"]);
    assert_eq!(children.len(), 2);
    assert_eq!(keys_of(&children[0]), vec!["a"]);
    assert_eq!(keys_of(&children[1]), vec!["c"]);

    assert_eq!(tree.find(b"c").unwrap(), Some(vec![b'z'; 111]));
    assert_no_leaks(&tree);
}

// =============================================================================
// Rotation Tests
// =============================================================================

#[test]
fn test_left_rotate_from_right_sibling() {
    let (_temp, path) = setup_temp_file();
    let mut tree = open_with_keys(
        &path,
        &["Key1", "Key2", "Key3", "Key4", "Key5", "Key6", "Key7", "Key8"],
    );

    tree.remove(b"Key1").unwrap();

    let (root, children) = root_and_children(&tree);
    assert_eq!(keys_of(&root), vec!["Key5"]);
    assert_eq!(keys_of(&children[0]), vec!["Key2", "Key3", "Key4"]);
    assert_eq!(keys_of(&children[1]), vec!["Key6", "Key7", "Key8"]);
    assert_eq!(tree.free_page_count(), 0, "rotation frees nothing");
}

#[test]
fn test_right_rotate_from_left_sibling() {
    let (_temp, path) = setup_temp_file();
    let mut tree = open_with_keys(&path, &["Key1", "Key2", "Key3", "Key4", "Key5", "Key6"]);
    tree.put(b"Key0", b"Value0", false).unwrap();

    tree.remove(b"Key6").unwrap();

    let (root, children) = root_and_children(&tree);
    assert_eq!(keys_of(&root), vec!["Key3"]);
    assert_eq!(keys_of(&children[0]), vec!["Key0", "Key1", "Key2"]);
    assert_eq!(keys_of(&children[1]), vec!["Key4", "Key5"]);
}

#[test]
fn test_shrinking_update_rebalances() {
    let (_temp, path) = setup_temp_file();
    let mut tree = open_with_keys(
        &path,
        &["Key1", "Key2", "Key3", "Key4", "Key5", "Key6", "Key7", "Key8"],
    );

    for key in ["Key1", "Key2", "Key3"] {
        tree.put(key.as_bytes(), b"", true).unwrap();
    }

    let (root, children) = root_and_children(&tree);
    assert_eq!(keys_of(&root), vec!["Key5"]);
    assert_eq!(keys_of(&children[0]), vec!["Key1", "Key2", "Key3", "Key4"]);
    assert_eq!(keys_of(&children[1]), vec!["Key6", "Key7", "Key8"]);

    assert_eq!(tree.find(b"Key1").unwrap(), Some(Vec::new()));
    assert_eq!(tree.find(b"Key4").unwrap(), Some(b"Value4".to_vec()));
    assert_fill_bounds(&tree, tiny_options());
}

// =============================================================================
// Merge Tests
// =============================================================================

#[test]
fn test_merge_after_delete_collapses_root() {
    let (_temp, path) = setup_temp_file();
    let mut tree = open_with_keys(&path, &["Key1", "Key2", "Key3", "Key4", "Key5", "Key6"]);

    tree.remove(b"Key1").unwrap();

    assert_eq!(all_keys(&tree), vec!["Key2", "Key3", "Key4", "Key5", "Key6"]);

    let root = tree.node(tree.root_page()).unwrap();
    assert!(root.is_leaf());
    assert_eq!(tree.stats().unwrap().depth, 1);
    assert_eq!(tree.free_page_count(), 2, "merged sibling and old root");
    assert_no_leaks(&tree);
}

#[test]
fn test_merge_into_left_sibling() {
    let (_temp, path) = setup_temp_file();
    let mut tree = open_with_keys(&path, &["Key1", "Key2", "Key3", "Key4", "Key5", "Key6"]);

    tree.remove(b"Key6").unwrap();

    assert_eq!(all_keys(&tree), vec!["Key1", "Key2", "Key3", "Key4", "Key5"]);
    assert!(tree.node(tree.root_page()).unwrap().is_leaf());
    assert_no_leaks(&tree);
}

#[test]
fn test_remove_separator_uses_predecessor() {
    let (_temp, path) = setup_temp_file();
    let mut tree = open_with_keys(&path, &["Key1", "Key2", "Key3", "Key4", "Key5", "Key6"]);

    tree.remove(b"Key4").unwrap();

    assert_eq!(all_keys(&tree), vec!["Key1", "Key2", "Key3", "Key5", "Key6"]);
    assert_eq!(tree.find(b"Key4").unwrap(), None);
    assert_eq!(tree.find(b"Key3").unwrap(), Some(b"Value3".to_vec()));
    assert_no_leaks(&tree);
}

#[test]
fn test_freed_pages_are_reused() {
    let (_temp, path) = setup_temp_file();
    let mut tree = open_with_keys(&path, &["Key1", "Key2", "Key3", "Key4", "Key5", "Key6"]);
    tree.remove(b"Key1").unwrap();
    let high_water = tree.page_count();

    tree.put(b"Key7", b"Value7", false).unwrap();
    tree.put(b"Key8", b"Value8", false).unwrap();

    assert_eq!(tree.page_count(), high_water, "split drew from the free list");
    assert_no_leaks(&tree);
}

// =============================================================================
// Workload Tests
// =============================================================================

#[test]
fn test_insert_then_delete_everything() {
    let (_temp, path) = setup_temp_file();
    let options = StoreOptions::with_page_size(512).fill_percent(0.2, 0.8);
    let mut tree = Collection::open(&path, options).unwrap();
    let n = 300;

    for i in shuffled(n) {
        let key = format!("key{:04}", i);
        tree.put(key.as_bytes(), format!("v{:04}", i).as_bytes(), false)
            .unwrap();
    }
    assert!(tree.stats().unwrap().depth >= 2);

    for (step, i) in shuffled(n).into_iter().rev().enumerate() {
        let key = format!("key{:04}", i);
        tree.remove(key.as_bytes()).unwrap();

        if step % 25 == 0 {
            let stats = tree.stats().unwrap();
            assert_eq!(stats.items, n - step - 1);
            assert_no_leaks(&tree);
        }
    }

    let stats = tree.stats().unwrap();
    assert_eq!(stats.items, 0);
    assert_eq!(stats.depth, 1);
    assert_no_leaks(&tree);
}

#[test]
fn test_mixed_workload_keeps_order_and_balance() {
    let (_temp, path) = setup_temp_file();
    let options = StoreOptions::with_page_size(512).fill_percent(0.2, 0.8);
    let mut tree = Collection::open(&path, options).unwrap();
    let n = 400;

    for i in shuffled(n) {
        let key = format!("key{:04}", i);
        tree.put(key.as_bytes(), format!("v{:04}", i).as_bytes(), false)
            .unwrap();
    }

    // Remove every third key
    for i in shuffled(n).into_iter().filter(|i| i % 3 == 0) {
        tree.remove(format!("key{:04}", i).as_bytes()).unwrap();
    }

    let expected: Vec<String> = (0..n)
        .filter(|i| i % 3 != 0)
        .map(|i| format!("key{:04}", i))
        .collect();
    assert_eq!(all_keys(&tree), expected);
    assert_fill_bounds(&tree, options);

    for i in 0..n {
        let key = format!("key{:04}", i);
        let found = tree.find(key.as_bytes()).unwrap();
        if i % 3 == 0 {
            assert_eq!(found, None);
        } else {
            assert_eq!(found, Some(format!("v{:04}", i).into_bytes()));
        }
    }

    tree.stats().unwrap();
    assert_no_leaks(&tree);
}

#[test]
fn test_workload_survives_reopen() {
    let (_temp, path) = setup_temp_file();
    let options = StoreOptions::with_page_size(512).fill_percent(0.2, 0.8);

    {
        let mut tree = Collection::open(&path, options).unwrap();
        for i in shuffled(200) {
            tree.put(format!("key{:04}", i).as_bytes(), b"v", false).unwrap();
        }
        for i in 0..100 {
            tree.remove(format!("key{:04}", i).as_bytes()).unwrap();
        }
        tree.close().unwrap();
    }

    let tree = Collection::open(&path, options).unwrap();
    let keys = all_keys(&tree);
    assert_eq!(keys.len(), 100);
    assert_eq!(keys.first().map(String::as_str), Some("key0100"));
    assert_no_leaks(&tree);
}
