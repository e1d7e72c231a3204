//! Tests for in-order and range iteration
//!
//! These tests verify:
//! - Full scans yield every item once, in ascending key order
//! - Range scans are inclusive on both bounds
//! - Iterators are lazy and stop at the upper bound

use std::path::PathBuf;

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

/// Keys 0..n as big-endian u64, inserted in scrambled order into small pages
fn numeric_tree(path: &PathBuf, n: u64) -> Collection {
    let options = StoreOptions::with_page_size(256).fill_percent(0.3, 0.8);
    let mut tree = Collection::open(path, options).unwrap();
    for i in 0..n {
        let k = (i * 37) % n;
        tree.put(&k.to_be_bytes(), &(k * 10).to_le_bytes(), false)
            .unwrap();
    }
    tree
}

fn decode_key(key: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(key);
    u64::from_be_bytes(raw)
}

// =============================================================================
// Full Scan Tests
// =============================================================================

#[test]
fn test_fetch_all_is_sorted_and_complete() {
    let (_temp, path) = setup_temp_file();
    let tree = numeric_tree(&path, 100);
    assert!(tree.stats().unwrap().depth >= 2);

    let keys: Vec<u64> = tree
        .fetch_all()
        .unwrap()
        .iter()
        .map(|item| decode_key(&item.key))
        .collect();

    assert_eq!(keys, (0..100).collect::<Vec<_>>());
}

#[test]
fn test_iter_is_lazy() {
    let (_temp, path) = setup_temp_file();
    let tree = numeric_tree(&path, 100);

    let first: Vec<u64> = tree
        .iter()
        .unwrap()
        .take(3)
        .map(|item| decode_key(&item.unwrap().key))
        .collect();

    assert_eq!(first, vec![0, 1, 2]);
}

#[test]
fn test_fetch_subtree_of_root_matches_fetch_all() {
    let (_temp, path) = setup_temp_file();
    let tree = numeric_tree(&path, 60);

    assert_eq!(tree.fetch_subtree(tree.root_page()).unwrap(), tree.fetch_all().unwrap());
}

#[test]
fn test_fetch_subtree_of_child_is_a_slice() {
    let (_temp, path) = setup_temp_file();
    let tree = numeric_tree(&path, 60);

    let root = tree.node(tree.root_page()).unwrap();
    let first_child = tree.fetch_subtree(root.children[0]).unwrap();

    assert!(!first_child.is_empty());
    assert!(first_child.iter().all(|item| item.key < root.items[0].key));
}

// =============================================================================
// Range Scan Tests
// =============================================================================

#[test]
fn test_range_scan_inclusive() {
    let (_temp, path) = setup_temp_file();
    let tree = numeric_tree(&path, 100);

    let items = tree
        .range_scan(&30u64.to_be_bytes(), &40u64.to_be_bytes())
        .unwrap();

    let keys: Vec<u64> = items.iter().map(|item| decode_key(&item.key)).collect();
    assert_eq!(keys, (30..=40).collect::<Vec<_>>());
    assert_eq!(items[0].value, 300u64.to_le_bytes().to_vec());
}

#[test]
fn test_range_scan_bounds_between_keys() {
    let (_temp, path) = setup_temp_file();
    let options = StoreOptions::with_page_size(256).fill_percent(0.3, 0.8);
    let mut tree = Collection::open(&path, options).unwrap();
    for word in ["apple", "banana", "cherry", "damson", "elder", "fig", "grape"] {
        tree.put(word.as_bytes(), b"", false).unwrap();
    }

    let keys: Vec<Vec<u8>> = tree
        .range_scan(b"b", b"e")
        .unwrap()
        .into_iter()
        .map(|item| item.key)
        .collect();

    assert_eq!(keys, vec![b"banana".to_vec(), b"cherry".to_vec(), b"damson".to_vec()]);
}

#[test]
fn test_range_scan_single_key() {
    let (_temp, path) = setup_temp_file();
    let tree = numeric_tree(&path, 100);

    let items = tree
        .range_scan(&77u64.to_be_bytes(), &77u64.to_be_bytes())
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(decode_key(&items[0].key), 77);
}

#[test]
fn test_range_scan_inverted_bounds_is_empty() {
    let (_temp, path) = setup_temp_file();
    let tree = numeric_tree(&path, 100);

    let items = tree
        .range_scan(&50u64.to_be_bytes(), &10u64.to_be_bytes())
        .unwrap();
    assert!(items.is_empty());
}

#[test]
fn test_range_scan_past_either_end() {
    let (_temp, path) = setup_temp_file();
    let tree = numeric_tree(&path, 100);

    let below = tree.range_scan(&[], &5u64.to_be_bytes()).unwrap();
    assert_eq!(below.len(), 6);

    let above = tree
        .range_scan(&95u64.to_be_bytes(), &[0xFF; 9])
        .unwrap();
    assert_eq!(above.len(), 5);

    let beyond = tree
        .range_scan(&200u64.to_be_bytes(), &300u64.to_be_bytes())
        .unwrap();
    assert!(beyond.is_empty());
}

#[test]
fn test_range_iterator_matches_scan() {
    let (_temp, path) = setup_temp_file();
    let tree = numeric_tree(&path, 100);

    let lazy: Vec<_> = tree
        .range(&10u64.to_be_bytes(), &90u64.to_be_bytes())
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    let eager = tree
        .range_scan(&10u64.to_be_bytes(), &90u64.to_be_bytes())
        .unwrap();

    assert_eq!(lazy, eager);
    assert_eq!(lazy.len(), 81);
}
