//! Meta Page
//!
//! Page 0 of every file: three little-endian u64 page numbers.
//!
//! ```text
//! ┌───────────────┬───────────────────────┬───────────────────────┐
//! │ Root: u64 (8) │ FreelistPage: u64 (8) │ TableDefPage: u64 (8) │
//! └───────────────┴───────────────────────┴───────────────────────┘
//! ```

use bytes::{Buf, BufMut};

use crate::error::{EmberError, Result};

use super::{PageNum, PAGE_NUM_SIZE};

/// The meta page always lives at page 0
pub const META_PAGE_NUM: PageNum = 0;

/// Serialized size of the meta record
pub const META_SIZE: usize = 3 * PAGE_NUM_SIZE;

/// In-memory mirror of the meta page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Meta {
    /// Page number of the current tree root (0 = no tree yet)
    pub root: PageNum,
    /// Page holding the serialized free list
    pub freelist_page: PageNum,
    /// Page holding the table definition (0 = none)
    pub table_def_page: PageNum,
}

impl Meta {
    /// Write the meta record into a page buffer
    pub fn serialize(&self, mut buf: &mut [u8]) {
        buf.put_u64_le(self.root);
        buf.put_u64_le(self.freelist_page);
        buf.put_u64_le(self.table_def_page);
    }

    /// Parse the meta record from page 0
    pub fn deserialize(mut buf: &[u8]) -> Result<Self> {
        if buf.remaining() < META_SIZE {
            return Err(EmberError::Corruption(format!(
                "meta page too short: {} bytes",
                buf.remaining()
            )));
        }

        Ok(Self {
            root: buf.get_u64_le(),
            freelist_page: buf.get_u64_le(),
            table_def_page: buf.get_u64_le(),
        })
    }
}
