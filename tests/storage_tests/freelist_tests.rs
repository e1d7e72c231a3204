//! Tests for FreeList
//!
//! These tests verify:
//! - Fresh allocation order and LIFO reuse of released pages
//! - Page layout (u64 high-water mark, u16 count, u64 entries)
//! - Capacity limits and corruption detection on load

use emberdb::storage::{FreeList, FREELIST_HEADER_SIZE, INITIAL_PAGE};
use emberdb::EmberError;

// =============================================================================
// Allocation Tests
// =============================================================================

#[test]
fn test_fresh_list_starts_after_meta() {
    let mut list = FreeList::new();

    assert_eq!(list.max_page(), INITIAL_PAGE);
    assert_eq!(list.next_page(), 1);
    assert_eq!(list.next_page(), 2);
    assert_eq!(list.max_page(), 3);
}

#[test]
fn test_released_pages_reused_lifo() {
    let mut list = FreeList::new();
    let pages: Vec<u64> = (0..4).map(|_| list.next_page()).collect();
    assert_eq!(pages, vec![1, 2, 3, 4]);

    list.release(2);
    list.release(4);

    assert_eq!(list.next_page(), 4);
    assert_eq!(list.next_page(), 2);
    assert_eq!(list.next_page(), 5);
    assert!(list.released_pages().is_empty());
}

#[test]
fn test_release_does_not_lower_high_water_mark() {
    let mut list = FreeList::new();
    let page = list.next_page();
    list.release(page);

    assert_eq!(list.max_page(), 2);
    assert_eq!(list.released_pages(), &[1]);
}

// =============================================================================
// Serialization Tests
// =============================================================================

#[test]
fn test_serialized_layout() {
    let mut list = FreeList::new();
    for _ in 0..5 {
        list.next_page();
    }
    list.release(3);
    list.release(5);

    let mut buf = vec![0u8; 128];
    list.serialize(&mut buf).unwrap();

    assert_eq!(&buf[0..8], &6u64.to_le_bytes());
    assert_eq!(&buf[8..10], &2u16.to_le_bytes());
    assert_eq!(&buf[10..18], &3u64.to_le_bytes());
    assert_eq!(&buf[18..26], &5u64.to_le_bytes());

    assert_eq!(FreeList::deserialize(&buf).unwrap(), list);
}

#[test]
fn test_high_water_mark_beyond_u16() {
    let mut list = FreeList::new();
    for _ in 0..70_000 {
        list.next_page();
    }

    let mut buf = vec![0u8; 64];
    list.serialize(&mut buf).unwrap();

    let loaded = FreeList::deserialize(&buf).unwrap();
    assert_eq!(loaded.max_page(), 70_001);
}

#[test]
fn test_drop_oldest_keeps_newest_releases() {
    let mut list = FreeList::new();
    for _ in 0..6 {
        list.next_page();
    }
    for page in 1..=6 {
        list.release(page);
    }

    assert_eq!(list.drop_oldest(4), 2);
    assert_eq!(list.released_pages(), &[3, 4, 5, 6]);
    assert_eq!(list.drop_oldest(10), 0);
    assert_eq!(list.next_page(), 6);
    assert_eq!(list.max_page(), 7, "dropped pages stay allocated");
}

#[test]
fn test_raise_max_page_never_lowers() {
    let mut list = FreeList::new();
    list.raise_max_page(9);
    assert_eq!(list.max_page(), 9);
    assert_eq!(list.next_page(), 9);

    list.raise_max_page(3);
    assert_eq!(list.max_page(), 10);
}

#[test]
fn test_capacity_matches_page_size() {
    assert_eq!(FreeList::capacity(64), (64 - FREELIST_HEADER_SIZE) / 8);
    assert_eq!(FreeList::capacity(4096), 510);
    assert_eq!(FreeList::capacity(4), 0);
}

#[test]
fn test_serialize_overfull_list_fails() {
    let mut list = FreeList::new();
    for _ in 0..20 {
        list.next_page();
    }
    for page in 1..=10 {
        list.release(page);
    }

    let mut buf = vec![0u8; 64];
    let result = list.serialize(&mut buf);
    assert!(matches!(result, Err(EmberError::Storage(_))));
}

#[test]
fn test_deserialize_short_buffer() {
    let result = FreeList::deserialize(&[0u8; FREELIST_HEADER_SIZE - 1]);
    assert!(matches!(result, Err(EmberError::Corruption(_))));
}

#[test]
fn test_deserialize_count_beyond_buffer() {
    let mut buf = vec![0u8; 32];
    buf[0..8].copy_from_slice(&10u64.to_le_bytes());
    buf[8..10].copy_from_slice(&100u16.to_le_bytes());

    let result = FreeList::deserialize(&buf);
    assert!(matches!(result, Err(EmberError::Corruption(_))));
}

#[test]
fn test_deserialize_page_outside_range() {
    let mut buf = vec![0u8; 32];
    buf[0..8].copy_from_slice(&4u64.to_le_bytes());
    buf[8..10].copy_from_slice(&1u16.to_le_bytes());
    buf[10..18].copy_from_slice(&9u64.to_le_bytes());

    let result = FreeList::deserialize(&buf);
    assert!(matches!(result, Err(EmberError::Corruption(_))));
}
