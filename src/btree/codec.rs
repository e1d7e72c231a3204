//! Node codec
//!
//! Binary layout of a node inside one page (little-endian):
//!
//! ```text
//! ┌────────┬──────────┬───────────────────────────────┬────────────┬──────┬──────────────────┐
//! │Leaf (1)│Count (2) │ per item: [child u64] off u16 │[last child]│ free │ arena (from end) │
//! └────────┴──────────┴───────────────────────────────┴────────────┴──────┴──────────────────┘
//! arena entry at `off`: key_len u8 | key | value_len u8 | value
//! ```
//!
//! Fixed-size headers grow from the left, variable payloads from the right.
//! Both sides go through a cursor that refuses to let them cross.

use crate::error::{EmberError, Result};
use crate::storage::{PageNum, META_PAGE_NUM, PAGE_NUM_SIZE};

use super::node::{Item, Node, MAX_ITEM_FIELD_LEN, NODE_HEADER_SIZE};

const LEAF_FLAG: u8 = 1;
const INTERNAL_FLAG: u8 = 0;

/// Write cursor tracking both ends of the free gap in a page
struct PageWriter<'a> {
    buf: &'a mut [u8],
    left: usize,
    right: usize,
}

impl<'a> PageWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        let right = buf.len();
        Self {
            buf,
            left: 0,
            right,
        }
    }

    fn put_left(&mut self, bytes: &[u8]) -> Result<()> {
        if self.right - self.left < bytes.len() {
            return Err(self.overrun(bytes.len()));
        }
        self.buf[self.left..self.left + bytes.len()].copy_from_slice(bytes);
        self.left += bytes.len();
        Ok(())
    }

    /// Prepend to the arena, returning the new start offset
    fn put_right(&mut self, bytes: &[u8]) -> Result<usize> {
        if self.right - self.left < bytes.len() {
            return Err(self.overrun(bytes.len()));
        }
        self.right -= bytes.len();
        self.buf[self.right..self.right + bytes.len()].copy_from_slice(bytes);
        Ok(self.right)
    }

    fn overrun(&self, wanted: usize) -> EmberError {
        EmberError::Storage(format!(
            "node does not fit its {} byte page ({} bytes free, {} wanted)",
            self.buf.len(),
            self.right - self.left,
            wanted
        ))
    }
}

/// Bounds-checked read cursor
struct PageReader<'a> {
    buf: &'a [u8],
    pos: usize,
    page: PageNum,
}

impl<'a> PageReader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| {
                EmberError::Corruption(format!(
                    "page {}: read of {} bytes at offset {} overruns {} byte page",
                    self.page,
                    len,
                    self.pos,
                    self.buf.len()
                ))
            })?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn u64(&mut self) -> Result<u64> {
        let mut raw = [0u8; PAGE_NUM_SIZE];
        raw.copy_from_slice(self.take(PAGE_NUM_SIZE)?);
        Ok(u64::from_le_bytes(raw))
    }

    fn child(&mut self) -> Result<PageNum> {
        let child = self.u64()?;
        if child == META_PAGE_NUM {
            return Err(EmberError::Corruption(format!(
                "page {}: child pointer to the meta page",
                self.page
            )));
        }
        Ok(child)
    }

    /// Read one arena entry starting at `offset`
    fn item_at(&self, offset: usize) -> Result<Item> {
        let mut arena = PageReader {
            buf: self.buf,
            pos: offset,
            page: self.page,
        };
        let key_len = arena.u8()? as usize;
        let key = arena.take(key_len)?.to_vec();
        let value_len = arena.u8()? as usize;
        let value = arena.take(value_len)?.to_vec();
        Ok(Item { key, value })
    }
}

/// Serialize `node` into `buf`, which must be one zeroed page
pub fn encode_node(node: &Node, buf: &mut [u8]) -> Result<()> {
    let leaf = node.is_leaf();
    if !leaf && node.children.len() != node.items.len() + 1 {
        return Err(EmberError::Storage(format!(
            "node {} has {} items but {} children",
            node.page_num,
            node.items.len(),
            node.children.len()
        )));
    }
    if node.items.len() > u16::MAX as usize {
        return Err(EmberError::Storage(format!(
            "node {} has too many items ({})",
            node.page_num,
            node.items.len()
        )));
    }

    let mut writer = PageWriter::new(buf);
    writer.put_left(&[if leaf { LEAF_FLAG } else { INTERNAL_FLAG }])?;
    writer.put_left(&(node.items.len() as u16).to_le_bytes())?;

    for (i, item) in node.items.iter().enumerate() {
        if item.key.len() > MAX_ITEM_FIELD_LEN || item.value.len() > MAX_ITEM_FIELD_LEN {
            return Err(EmberError::ItemTooLarge {
                key_len: item.key.len(),
                value_len: item.value.len(),
            });
        }
        if !leaf {
            writer.put_left(&node.children[i].to_le_bytes())?;
        }

        writer.put_right(&item.value)?;
        writer.put_right(&[item.value.len() as u8])?;
        writer.put_right(&item.key)?;
        let offset = writer.put_right(&[item.key.len() as u8])?;

        writer.put_left(&(offset as u16).to_le_bytes())?;
    }

    if let Some(last) = node.children.last() {
        writer.put_left(&last.to_le_bytes())?;
    }

    Ok(())
}

/// Parse the node stored in page `page_num`
pub fn decode_node(page_num: PageNum, buf: &[u8]) -> Result<Node> {
    let mut reader = PageReader {
        buf,
        pos: 0,
        page: page_num,
    };

    let leaf = match reader.u8()? {
        LEAF_FLAG => true,
        INTERNAL_FLAG => false,
        other => {
            return Err(EmberError::Corruption(format!(
                "page {}: invalid leaf flag {}",
                page_num, other
            )))
        }
    };
    let count = reader.u16()? as usize;

    let mut items = Vec::with_capacity(count);
    let mut children = Vec::with_capacity(if leaf { 0 } else { count + 1 });
    for _ in 0..count {
        if !leaf {
            children.push(reader.child()?);
        }
        let offset = reader.u16()? as usize;
        if offset < NODE_HEADER_SIZE {
            return Err(EmberError::Corruption(format!(
                "page {}: item offset {} points into the header",
                page_num, offset
            )));
        }
        items.push(reader.item_at(offset)?);
    }
    if !leaf {
        children.push(reader.child()?);
    }

    Ok(Node::new(page_num, items, children))
}
