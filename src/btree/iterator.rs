//! Tree Iterator
//!
//! Lazy in-order traversal: child 0, item 0, child 1, item 1, ... child N.
//! Only the nodes on the current root-to-leaf path are held in memory.

use crate::error::Result;
use crate::storage::PageNum;

use super::collection::Collection;
use super::node::{Item, Node};

/// One node on the traversal stack
struct Frame {
    node: Node,
    /// Next item to yield; for internal nodes, child `pos` has been visited
    pos: usize,
}

/// Iterator over items in ascending key order, optionally bounded
pub struct TreeIter<'a> {
    collection: &'a Collection,
    stack: Vec<Frame>,
    /// Inclusive upper bound
    high: Option<Vec<u8>>,
    done: bool,
}

impl<'a> TreeIter<'a> {
    /// Iterate the whole subtree rooted at `page`
    pub(super) fn new(collection: &'a Collection, page: PageNum) -> Result<Self> {
        let mut iter = Self {
            collection,
            stack: Vec::new(),
            high: None,
            done: false,
        };
        iter.descend_leftmost(page)?;
        Ok(iter)
    }

    /// Iterate keys in `low..=high` of the subtree rooted at `page`
    pub(super) fn range(
        collection: &'a Collection,
        page: PageNum,
        low: &[u8],
        high: &[u8],
    ) -> Result<Self> {
        let mut iter = Self {
            collection,
            stack: Vec::new(),
            high: Some(high.to_vec()),
            done: low > high,
        };
        if !iter.done {
            iter.seek(page, low)?;
        }
        Ok(iter)
    }

    /// Push the path to the first key not less than `low`
    fn seek(&mut self, page: PageNum, low: &[u8]) -> Result<()> {
        let mut page = page;
        loop {
            let node = self.collection.node(page)?;
            let (found, index) = node.find_key_in_node(low);
            let next = if found || node.is_leaf() {
                None
            } else {
                Some(node.children[index])
            };
            self.stack.push(Frame { node, pos: index });
            match next {
                Some(child) => page = child,
                None => return Ok(()),
            }
        }
    }

    /// Push `page` and its leftmost descendants
    fn descend_leftmost(&mut self, page: PageNum) -> Result<()> {
        let mut page = page;
        loop {
            let node = self.collection.node(page)?;
            let first_child = node.children.first().copied();
            self.stack.push(Frame { node, pos: 0 });
            match first_child {
                Some(child) => page = child,
                None => return Ok(()),
            }
        }
    }

    fn advance(&mut self) -> Result<Option<Item>> {
        while let Some(frame) = self.stack.last_mut() {
            if frame.pos >= frame.node.items.len() {
                self.stack.pop();
                continue;
            }

            let item = frame.node.items[frame.pos].clone();
            frame.pos += 1;
            let next_child = frame.node.children.get(frame.pos).copied();

            if let Some(high) = &self.high {
                if item.key.as_slice() > high.as_slice() {
                    self.stack.clear();
                    return Ok(None);
                }
            }

            if let Some(child) = next_child {
                self.descend_leftmost(child)?;
            }
            return Ok(Some(item));
        }
        Ok(None)
    }
}

impl<'a> Iterator for TreeIter<'a> {
    type Item = Result<Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
