//! Collection
//!
//! A B-tree over one `PageStore`: point lookups, inserts, updates, removals
//! and ordered scans.
//!
//! ## Write Ordering
//! There is no log. Every mutation writes the deepest node first, its
//! ancestors afterwards, and Meta last, so an interrupted operation leaves at
//! worst an unreachable page rather than a dangling root. The free list is
//! persisted at the end of every mutation that touched it.

use std::path::Path;

use crate::config::StoreOptions;
use crate::error::{EmberError, Result};
use crate::storage::{PageNum, PageStore, PAGE_NUM_SIZE};

use super::codec::{decode_node, encode_node};
use super::iterator::TreeIter;
use super::node::{Item, Node, MAX_ITEM_FIELD_LEN, NODE_HEADER_SIZE};

/// Where a search ended
#[derive(Debug)]
pub struct SearchResult {
    /// Exact match index, or the insertion point
    pub index: usize,
    /// Whether `node.items[index]` holds the searched key
    pub found: bool,
    /// The node the search ended in
    pub node: Node,
    /// Child index taken at each level; entry 0 stands for the root itself
    pub ancestor_indexes: Vec<usize>,
}

/// Shape summary produced by a full walk of the tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Levels from root to leaves (a lone root leaf has depth 1)
    pub depth: usize,
    pub nodes: usize,
    pub leaves: usize,
    pub items: usize,
}

/// A B-tree rooted at the page recorded in Meta
pub struct Collection {
    pub(super) store: PageStore,
}

impl Collection {
    /// Open or create a tree-backed store file
    ///
    /// A fresh file gets an empty root leaf, and Meta is persisted pointing
    /// at it before this returns.
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        let store = PageStore::open(path, options)?;
        let mut collection = Self { store };

        if collection.store.meta().root == 0 {
            let root = Node::leaf(collection.store.allocate_page());
            collection.write_node(&root)?;
            collection.store.meta_mut().root = root.page_num;
            collection.store.write_meta()?;
            tracing::info!("Created empty root at page {}", root.page_num);
        }

        Ok(collection)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Value stored under `key`
    pub fn find(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .find_key(key, true)?
            .map(|mut hit| hit.node.items.swap_remove(hit.index).value))
    }

    /// Whether `key` is present
    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.find_key(key, true)?.is_some())
    }

    /// Descend from the root to `key`
    ///
    /// Stops at the first node holding the key. Otherwise ends at a leaf:
    /// `None` when `exact_only`, else the insertion point in that leaf.
    pub fn find_key(&self, key: &[u8], exact_only: bool) -> Result<Option<SearchResult>> {
        let mut ancestor_indexes = vec![0];
        let mut node = self.node(self.root_page())?;

        loop {
            let (found, index) = node.find_key_in_node(key);
            if found {
                return Ok(Some(SearchResult {
                    index,
                    found,
                    node,
                    ancestor_indexes,
                }));
            }

            if node.is_leaf() {
                if exact_only {
                    return Ok(None);
                }
                return Ok(Some(SearchResult {
                    index,
                    found,
                    node,
                    ancestor_indexes,
                }));
            }

            ancestor_indexes.push(index);
            node = self.node(node.children[index])?;
        }
    }

    /// Re-read the nodes along a path of child indexes, root first
    pub fn nodes_along(&self, indexes: &[usize]) -> Result<Vec<Node>> {
        let mut nodes = Vec::with_capacity(indexes.len());
        let mut node = self.node(self.root_page())?;

        for &index in indexes.iter().skip(1) {
            let child = *node.children.get(index).ok_or_else(|| {
                EmberError::Corruption(format!(
                    "page {} has no child {} on the recorded path",
                    node.page_num, index
                ))
            })?;
            nodes.push(node);
            node = self.node(child)?;
        }
        nodes.push(node);

        Ok(nodes)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Insert `key`, or overwrite it when `is_update` is set
    ///
    /// - existing key, `is_update == false` → `DuplicateKey`, nothing written
    /// - missing key, `is_update == true` → `KeyNotFound`, nothing written
    pub fn put(&mut self, key: &[u8], value: &[u8], is_update: bool) -> Result<()> {
        self.check_item(key, value)?;

        let hit = self
            .find_key(key, false)?
            .ok_or_else(|| EmberError::Storage("insertion search ended nowhere".to_string()))?;
        let SearchResult {
            index,
            found,
            mut node,
            ancestor_indexes,
        } = hit;

        let item = Item::new(key, value);
        let mut shrunk = false;
        match (found, is_update) {
            (true, false) => {
                return Err(EmberError::DuplicateKey { key: key.to_vec() });
            }
            (true, true) => {
                tracing::trace!("Updating item {} in page {}", index, node.page_num);
                shrunk = item.element_size() < node.items[index].element_size();
                node.items[index] = item;
            }
            (false, true) => return Err(EmberError::KeyNotFound),
            (false, false) => {
                tracing::trace!("Inserting item at {} in page {}", index, node.page_num);
                node.add_item(item, index);
            }
        }

        // Ancestors are untouched on disk; the mutated node replaces the tail.
        let mut path = match ancestor_indexes.len() {
            1 => Vec::with_capacity(1),
            len => self.nodes_along(&ancestor_indexes[..len - 1])?,
        };
        path.push(node);

        self.split_path(path, &ancestor_indexes)?;
        if shrunk {
            // A shorter value can leave the node under minimum fill
            self.rebalance_path(&ancestor_indexes)?;
        }
        self.store.sync_freelist()
    }

    /// Write back a mutated path, splitting overflowed nodes bottom-up
    fn split_path(&mut self, mut path: Vec<Node>, indexes: &[usize]) -> Result<()> {
        for level in (1..path.len()).rev() {
            if !self.is_overflowed(&path[level]) {
                return self.write_node(&path[level]);
            }

            let (upper, lower) = path.split_at_mut(level);
            self.split(&mut upper[level - 1], &mut lower[0], indexes[level])?;
        }

        let mut root = path.swap_remove(0);
        if !self.is_overflowed(&root) {
            return self.write_node(&root);
        }

        let mut new_root = Node::new(self.store.allocate_page(), Vec::new(), vec![root.page_num]);
        self.split(&mut new_root, &mut root, 0)?;
        self.write_node(&new_root)?;
        self.set_root(new_root.page_num)?;
        tracing::debug!("Tree grew: new root {}", new_root.page_num);
        Ok(())
    }

    /// Delete `key`; an absent key is `KeyNotFound` and leaves the file untouched
    pub fn remove(&mut self, key: &[u8]) -> Result<()> {
        let SearchResult {
            index,
            node,
            mut ancestor_indexes,
            ..
        } = self.find_key(key, true)?.ok_or(EmberError::KeyNotFound)?;

        if node.is_leaf() {
            let mut node = node;
            node.remove_item(index);
            self.write_node(&node)?;
        } else {
            let affected = self.remove_from_internal(node, index)?;
            ancestor_indexes.extend(affected);
        }

        self.rebalance_path(&ancestor_indexes)?;
        self.store.sync_freelist()
    }

    /// Fix underflowed nodes along a path bottom-up, collapsing an empty root
    fn rebalance_path(&mut self, indexes: &[usize]) -> Result<()> {
        let mut path = self.nodes_along(indexes)?;

        for level in (1..path.len()).rev() {
            if self.is_underflowed(&path[level]) {
                let (upper, lower) = path.split_at_mut(level);
                self.rebalance(&mut upper[level - 1], &mut lower[0], indexes[level])?;
            }
        }

        let root = &path[0];
        if root.items.is_empty() && !root.is_leaf() {
            let old_root = root.page_num;
            let new_root = root.children[0];
            self.set_root(new_root)?;
            self.store.release_page(old_root);
            tracing::debug!("Tree shrank: root {} collapsed into {}", old_root, new_root);
        }
        Ok(())
    }

    /// Replace an internal item with its in-order predecessor
    ///
    /// Returns the child indexes taken while descending to the predecessor's
    /// leaf, to be appended to the search path.
    fn remove_from_internal(&mut self, mut node: Node, index: usize) -> Result<Vec<usize>> {
        let mut affected = vec![index];
        let mut leaf = self.node(node.children[index])?;

        while !leaf.is_leaf() {
            let last = leaf.children.len() - 1;
            leaf = self.node(leaf.children[last])?;
            affected.push(last);
        }

        let predecessor = leaf.items.pop().ok_or_else(|| {
            EmberError::Corruption(format!("leaf {} on predecessor path is empty", leaf.page_num))
        })?;
        node.items[index] = predecessor;

        self.write_node(&leaf)?;
        self.write_node(&node)?;
        Ok(affected)
    }

    // =========================================================================
    // Scans
    // =========================================================================

    /// Lazy iterator over every item in ascending key order
    pub fn iter(&self) -> Result<TreeIter<'_>> {
        TreeIter::new(self, self.root_page())
    }

    /// Lazy iterator over items with `low <= key <= high`
    pub fn range(&self, low: &[u8], high: &[u8]) -> Result<TreeIter<'_>> {
        TreeIter::range(self, self.root_page(), low, high)
    }

    /// Every item, materialized
    pub fn fetch_all(&self) -> Result<Vec<Item>> {
        self.iter()?.collect()
    }

    /// Every item in the subtree rooted at `page`, materialized
    pub fn fetch_subtree(&self, page: PageNum) -> Result<Vec<Item>> {
        TreeIter::new(self, page)?.collect()
    }

    /// Items with `low <= key <= high`, materialized
    pub fn range_scan(&self, low: &[u8], high: &[u8]) -> Result<Vec<Item>> {
        self.range(low, high)?.collect()
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Walk the tree, checking that every leaf sits at the same depth
    pub fn stats(&self) -> Result<TreeStats> {
        let mut stats = TreeStats::default();
        let mut leaf_depth = None;
        let mut pending = vec![(self.root_page(), 1usize)];

        while let Some((page, depth)) = pending.pop() {
            let node = self.node(page)?;
            stats.nodes += 1;
            stats.items += node.items.len();

            if node.is_leaf() {
                stats.leaves += 1;
                match leaf_depth {
                    None => leaf_depth = Some(depth),
                    Some(expected) if expected != depth => {
                        return Err(EmberError::Corruption(format!(
                            "leaf {} at depth {}, expected {}",
                            page, depth, expected
                        )));
                    }
                    Some(_) => {}
                }
            } else {
                pending.extend(node.children.iter().map(|child| (*child, depth + 1)));
            }
        }

        stats.depth = leaf_depth.unwrap_or(0);
        Ok(stats)
    }

    /// Materialize the node stored at `page`
    pub fn node(&self, page: PageNum) -> Result<Node> {
        let buf = self.store.read_page(page)?;
        decode_node(page, &buf)
    }

    /// Page number of the current root
    pub fn root_page(&self) -> PageNum {
        self.store.meta().root
    }

    /// One past the highest page ever allocated
    pub fn page_count(&self) -> u64 {
        self.store.freelist().max_page()
    }

    /// Pages waiting in the free list
    pub fn free_page_count(&self) -> usize {
        self.store.freelist().released_pages().len()
    }

    pub fn options(&self) -> &StoreOptions {
        self.store.options()
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    // =========================================================================
    // Table Definition Page
    // =========================================================================

    /// Page holding the table definition blob (0 = none written yet)
    pub fn table_def_page(&self) -> PageNum {
        self.store.meta().table_def_page
    }

    /// Raw contents of the table definition page, if one exists
    pub fn read_table_def(&self) -> Result<Option<Vec<u8>>> {
        match self.table_def_page() {
            0 => Ok(None),
            page => self.store.read_page(page).map(Some),
        }
    }

    /// Store `bytes` in the table definition page, allocating it on first use
    pub fn write_table_def(&mut self, bytes: &[u8]) -> Result<()> {
        let mut buf = self.store.allocate_empty_page();
        if bytes.len() > buf.len() {
            return Err(EmberError::Storage(format!(
                "table definition of {} bytes exceeds page size {}",
                bytes.len(),
                buf.len()
            )));
        }
        buf[..bytes.len()].copy_from_slice(bytes);

        let page = match self.table_def_page() {
            0 => self.store.allocate_page(),
            page => page,
        };
        self.store.write_page(page, &buf)?;

        if self.table_def_page() != page {
            self.store.meta_mut().table_def_page = page;
            self.store.write_meta()?;
        }
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Persist the free list and Meta, then release the file. Idempotent.
    ///
    /// The file is released even when the final writes fail.
    pub fn close(&mut self) -> Result<()> {
        if self.store.is_closed() {
            return Ok(());
        }
        let flushed = self.store.write_meta();
        let closed = self.store.close();
        flushed.and(closed)
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    pub(super) fn write_node(&mut self, node: &Node) -> Result<()> {
        let mut buf = self.store.allocate_empty_page();
        encode_node(node, &mut buf)?;
        self.store.write_page(node.page_num, &buf)
    }

    /// Point Meta at a new root and persist it immediately
    fn set_root(&mut self, page: PageNum) -> Result<()> {
        self.store.meta_mut().root = page;
        self.store.write_meta()
    }

    /// Too big for the fill threshold, or for the page itself
    pub(super) fn is_overflowed(&self, node: &Node) -> bool {
        node.node_size() as f64 > self.store.max_fill_bytes()
            || node.encoded_size() > self.store.page_size()
    }

    pub(super) fn is_underflowed(&self, node: &Node) -> bool {
        (node.node_size() as f64) < self.store.min_fill_bytes()
    }

    /// Reject items the codec or a single node cannot hold
    fn check_item(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let lone = NODE_HEADER_SIZE + key.len() + value.len() + 2 * PAGE_NUM_SIZE;
        if key.len() > MAX_ITEM_FIELD_LEN
            || value.len() > MAX_ITEM_FIELD_LEN
            || lone as f64 > self.store.max_fill_bytes()
        {
            return Err(EmberError::ItemTooLarge {
                key_len: key.len(),
                value_len: value.len(),
            });
        }
        Ok(())
    }
}

impl Drop for Collection {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("Failed to close {}: {}", self.store.path().display(), e);
        }
    }
}
