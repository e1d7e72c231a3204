//! B-tree node
//!
//! A node is materialized from one page on demand and dropped after use. It
//! never holds a handle to the store; every operation that needs another page
//! goes through the `Collection` that owns the store.

use std::cmp::Ordering;

use crate::storage::{PageNum, PAGE_NUM_SIZE};

/// Leaf flag (1) + item count (2)
pub const NODE_HEADER_SIZE: usize = 3;

/// Offset slot for each item in the left-hand header area
pub const OFFSET_SIZE: usize = 2;

/// Longest key or value the one-byte length prefix can describe
pub const MAX_ITEM_FIELD_LEN: usize = u8::MAX as usize;

/// An owned key/value pair
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Item {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Item {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Size charged to this item by the fill accounting
    pub fn element_size(&self) -> usize {
        self.key.len() + self.value.len() + PAGE_NUM_SIZE
    }
}

/// A B-tree node identified by its page number
///
/// Leaf when `children` is empty; otherwise `children.len() == items.len() + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Node {
    pub page_num: PageNum,
    pub items: Vec<Item>,
    pub children: Vec<PageNum>,
}

impl Node {
    /// An empty leaf at `page_num`
    pub fn leaf(page_num: PageNum) -> Self {
        Self {
            page_num,
            items: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn new(page_num: PageNum, items: Vec<Item>, children: Vec<PageNum>) -> Self {
        Self {
            page_num,
            items,
            children,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Scan for the first item whose key is not less than `key`
    ///
    /// Returns `(true, i)` on an exact match, otherwise `(false, i)` where `i`
    /// is the insertion point and, for internal nodes, the child to descend.
    pub fn find_key_in_node(&self, key: &[u8]) -> (bool, usize) {
        for (i, item) in self.items.iter().enumerate() {
            match item.key.as_slice().cmp(key) {
                Ordering::Equal => return (true, i),
                Ordering::Greater => return (false, i),
                Ordering::Less => {}
            }
        }
        (false, self.items.len())
    }

    /// Accounted size of the item at `index`
    pub fn element_size(&self, index: usize) -> usize {
        self.items[index].element_size()
    }

    /// Accounted size: header + every element + one trailing child slot
    pub fn node_size(&self) -> usize {
        NODE_HEADER_SIZE
            + self.items.iter().map(Item::element_size).sum::<usize>()
            + PAGE_NUM_SIZE
    }

    /// Exact number of bytes the codec needs for this node
    pub fn encoded_size(&self) -> usize {
        let per_item_header = if self.is_leaf() {
            OFFSET_SIZE
        } else {
            PAGE_NUM_SIZE + OFFSET_SIZE
        };
        let arena: usize = self
            .items
            .iter()
            .map(|item| item.key.len() + item.value.len() + 2)
            .sum();
        let trailer = if self.is_leaf() { 0 } else { PAGE_NUM_SIZE };

        NODE_HEADER_SIZE + self.items.len() * per_item_header + trailer + arena
    }

    /// Insert `item` at `index`, shifting later items right
    pub fn add_item(&mut self, item: Item, index: usize) -> usize {
        self.items.insert(index, item);
        index
    }

    /// Remove and return the item at `index`, shifting later items left
    pub fn remove_item(&mut self, index: usize) -> Item {
        self.items.remove(index)
    }
}
