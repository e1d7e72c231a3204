//! Structural maintenance: split on overflow, rotate or merge on underflow.
//!
//! ```text
//!   split (child overflowed)          rotate right (left sibling spares)
//!
//!        [ P ]                             [ .. s .. ]
//!          |            [ P m ]            /         \
//!   [a b m c d]  ->     /     \      [.. x]   [c ..]  ->  [..]  [s c ..]
//!                   [a b]   [c d]                         parent takes x
//! ```
//!
//! Every helper writes the nodes it changes before returning. Pages that fall
//! out of the tree go back to the free list.

use crate::error::{EmberError, Result};

use super::collection::Collection;
use super::node::{Node, NODE_HEADER_SIZE};

/// Index of the item to lift out of `node`
///
/// The first index past the point where the running size exceeds `min_fill`.
/// `None` means the node cannot give up an item without underflowing.
///
/// With `for_split` set, the returned separator always leaves an item to its
/// right for the new sibling, and a node that must split falls back to its
/// midpoint.
pub(super) fn split_index(node: &Node, min_fill: f64, for_split: bool) -> Option<usize> {
    let mut size = NODE_HEADER_SIZE;
    let last = node.items.len().saturating_sub(1);
    let last_candidate = if for_split { last.saturating_sub(1) } else { last };

    for i in 0..node.items.len() {
        size += node.element_size(i);
        if size as f64 > min_fill && i < last_candidate {
            return Some(i + 1);
        }
    }

    if for_split && node.items.len() >= 2 {
        return Some(node.items.len() / 2);
    }
    None
}

impl Collection {
    /// Whether `node` can lend one item to a sibling and stay above minimum
    pub(super) fn can_spare(&self, node: &Node) -> bool {
        split_index(node, self.store.min_fill_bytes(), false).is_some()
    }

    // =========================================================================
    // Split
    // =========================================================================

    /// Split `child`, which sits at `child_index` under `parent`
    ///
    /// The item at the split index moves up into `parent`; everything right
    /// of it moves to a freshly allocated sibling placed after `child`. Writes
    /// the child and the sibling; the caller owns writing `parent`.
    pub(super) fn split(&mut self, parent: &mut Node, child: &mut Node, child_index: usize) -> Result<()> {
        let index = split_index(child, self.store.min_fill_bytes(), true).ok_or_else(|| {
            EmberError::Storage(format!(
                "page {} overflowed but has no split point ({} items)",
                child.page_num,
                child.items.len()
            ))
        })?;

        let right_items = child.items.split_off(index + 1);
        let separator = child.items.pop().ok_or_else(|| {
            EmberError::Storage(format!("page {} lost its separator", child.page_num))
        })?;
        let right_children = if child.is_leaf() {
            Vec::new()
        } else {
            child.children.split_off(index + 1)
        };

        let sibling = Node::new(self.store.allocate_page(), right_items, right_children);

        parent.add_item(separator, child_index);
        parent.children.insert(child_index + 1, sibling.page_num);

        tracing::debug!(
            "Split page {} at {}: {} | {} items, sibling {}",
            child.page_num,
            index,
            child.items.len(),
            sibling.items.len(),
            sibling.page_num
        );

        self.write_node(&sibling)?;
        self.write_node(child)
    }

    // =========================================================================
    // Rebalance
    // =========================================================================

    /// Restore minimum occupancy of `child`, found at `child_index` in `parent`
    ///
    /// Tries, in order: borrow from the left sibling, borrow from the right
    /// sibling, merge with a neighbour.
    pub(super) fn rebalance(&mut self, parent: &mut Node, child: &mut Node, child_index: usize) -> Result<()> {
        if parent.children.len() < 2 {
            return Ok(());
        }

        if child_index > 0 {
            let mut left = self.node(parent.children[child_index - 1])?;
            if self.can_spare(&left) {
                rotate_right(&mut left, child, parent, child_index)?;
                self.write_node(&left)?;
                self.write_node(child)?;
                return self.write_node(parent);
            }
        }

        if child_index + 1 < parent.children.len() {
            let mut right = self.node(parent.children[child_index + 1])?;
            if self.can_spare(&right) {
                rotate_left(child, &mut right, parent, child_index)?;
                self.write_node(child)?;
                self.write_node(&right)?;
                return self.write_node(parent);
            }
        }

        if child_index == 0 {
            let right = self.node(parent.children[1])?;
            self.merge(parent, child, right, 1)
        } else {
            let mut left = self.node(parent.children[child_index - 1])?;
            self.merge(parent, &mut left, child.clone(), child_index)
        }
    }

    /// Fold `right` (at `right_index` in `parent`) into its left neighbour
    ///
    /// The separator comes down between the two halves and the right node's
    /// page is released.
    fn merge(&mut self, parent: &mut Node, left: &mut Node, right: Node, right_index: usize) -> Result<()> {
        let separator = parent.remove_item(right_index - 1);
        parent.children.remove(right_index);

        left.items.push(separator);
        left.items.extend(right.items);
        left.children.extend(right.children);

        tracing::debug!(
            "Merged page {} into {} ({} items)",
            right.page_num,
            left.page_num,
            left.items.len()
        );

        self.store.release_page(right.page_num);

        // Two half-full internal nodes can outgrow a page once their child
        // pointers are counted; hand the excess back out.
        if left.encoded_size() > self.store.page_size() {
            self.split(parent, left, right_index - 1)?;
            return self.write_node(parent);
        }

        self.write_node(left)?;
        self.write_node(parent)
    }
}

/// Move the left sibling's last item up into `parent` and the parent's
/// separator down to the front of `child`
fn rotate_right(left: &mut Node, child: &mut Node, parent: &mut Node, child_index: usize) -> Result<()> {
    let Some(lent) = left.items.pop() else {
        return Err(empty_sibling(left));
    };
    let separator = std::mem::replace(&mut parent.items[child_index - 1], lent);
    child.items.insert(0, separator);

    if let Some(moved) = left.children.pop() {
        child.children.insert(0, moved);
    }
    Ok(())
}

/// Move the right sibling's first item up into `parent` and the parent's
/// separator down to the end of `child`
fn rotate_left(child: &mut Node, right: &mut Node, parent: &mut Node, child_index: usize) -> Result<()> {
    if right.items.is_empty() {
        return Err(empty_sibling(right));
    }
    let lent = right.items.remove(0);
    let separator = std::mem::replace(&mut parent.items[child_index], lent);
    child.items.push(separator);

    if !right.is_leaf() {
        child.children.push(right.children.remove(0));
    }
    Ok(())
}

fn empty_sibling(node: &Node) -> EmberError {
    EmberError::Corruption(format!("sibling page {} has nothing to lend", node.page_num))
}
