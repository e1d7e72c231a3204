//! Free List
//!
//! Page allocator: a high-water mark plus a stack of reclaimed pages.
//!
//! ## Page Layout
//! ```text
//! ┌──────────────────┬───────────────────┬─────────────────────────────┐
//! │ MaxPage: u64 (8) │ Released: u16 (2) │ Released page numbers (u64) │
//! └──────────────────┴───────────────────┴─────────────────────────────┘
//! ```

use bytes::{Buf, BufMut};

use crate::error::{EmberError, Result};

use super::{PageNum, PAGE_NUM_SIZE};

/// First page handed out by a fresh free list (page 0 is the meta page)
pub const INITIAL_PAGE: PageNum = 1;

/// Fixed part of the serialized free list: max page (8) + released count (2)
pub const FREELIST_HEADER_SIZE: usize = PAGE_NUM_SIZE + 2;

/// Tracks the next unused page number and pages released for reuse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeList {
    /// Every page below this number has been handed out at least once
    max_page: PageNum,
    /// Reclaimed pages, most recently released last (popped first)
    released_pages: Vec<PageNum>,
}

impl Default for FreeList {
    fn default() -> Self {
        Self::new()
    }
}

impl FreeList {
    /// Create an empty free list; the first allocation returns page 1
    pub fn new() -> Self {
        Self {
            max_page: INITIAL_PAGE,
            released_pages: Vec::new(),
        }
    }

    /// Hand out a page number, preferring reclaimed pages
    pub fn next_page(&mut self) -> PageNum {
        if let Some(page) = self.released_pages.pop() {
            return page;
        }
        let page = self.max_page;
        self.max_page += 1;
        page
    }

    /// Return a page for reuse
    pub fn release(&mut self, page: PageNum) {
        self.released_pages.push(page);
    }

    /// Treat every page below `max_page` as handed out
    pub fn raise_max_page(&mut self, max_page: PageNum) {
        self.max_page = self.max_page.max(max_page);
    }

    /// Forget the oldest released pages until at most `keep` remain
    ///
    /// Returns how many were dropped. Dropped pages are never reused.
    pub fn drop_oldest(&mut self, keep: usize) -> usize {
        let excess = self.released_pages.len().saturating_sub(keep);
        self.released_pages.drain(..excess);
        excess
    }

    /// High-water mark: one past the largest page ever handed out
    pub fn max_page(&self) -> PageNum {
        self.max_page
    }

    /// Pages currently waiting for reuse
    pub fn released_pages(&self) -> &[PageNum] {
        &self.released_pages
    }

    /// Number of released pages a page of `page_size` bytes can persist
    pub fn capacity(page_size: usize) -> usize {
        page_size.saturating_sub(FREELIST_HEADER_SIZE) / PAGE_NUM_SIZE
    }

    /// Write the free list into a zeroed page buffer
    pub fn serialize(&self, mut buf: &mut [u8]) -> Result<()> {
        let count = self.released_pages.len();
        if count > Self::capacity(buf.len()) || count > u16::MAX as usize {
            return Err(EmberError::Storage(format!(
                "free list of {} released pages does not fit a {} byte page",
                count,
                buf.len()
            )));
        }

        buf.put_u64_le(self.max_page);
        buf.put_u16_le(count as u16);
        for page in &self.released_pages {
            buf.put_u64_le(*page);
        }
        Ok(())
    }

    /// Parse a free list from its page
    pub fn deserialize(mut buf: &[u8]) -> Result<Self> {
        if buf.remaining() < FREELIST_HEADER_SIZE {
            return Err(EmberError::Corruption(format!(
                "free list page too short: {} bytes",
                buf.remaining()
            )));
        }

        let max_page = buf.get_u64_le();
        let count = buf.get_u16_le() as usize;
        if buf.remaining() < count * PAGE_NUM_SIZE {
            return Err(EmberError::Corruption(format!(
                "free list claims {} released pages but page holds {}",
                count,
                buf.remaining() / PAGE_NUM_SIZE
            )));
        }

        let mut released_pages = Vec::with_capacity(count);
        for _ in 0..count {
            let page = buf.get_u64_le();
            if page == 0 || page >= max_page {
                return Err(EmberError::Corruption(format!(
                    "free list holds page {} outside 1..{}",
                    page, max_page
                )));
            }
            released_pages.push(page);
        }

        Ok(Self {
            max_page,
            released_pages,
        })
    }
}
