//! Storage Module
//!
//! Single-file paged storage underneath the B-tree.
//!
//! ## Responsibilities
//! - Fixed-size page I/O against one backing file
//! - Page allocation and reclamation (free list)
//! - The meta page recording the tree root, free list and table definition
//!
//! ## File Format
//! ```text
//! ┌────────────────────────────────────────┐
//! │ Page 0: Meta                           │
//! │   root (8) | freelist (8) | tabledef(8)│
//! ├────────────────────────────────────────┤
//! │ Page N: FreeList                       │
//! │   max_page (8) | count (2) | pages...  │
//! ├────────────────────────────────────────┤
//! │ Other pages: B-tree nodes / table def  │
//! └────────────────────────────────────────┘
//! ```

mod freelist;
mod meta;
mod pager;

pub use freelist::{FreeList, FREELIST_HEADER_SIZE, INITIAL_PAGE};
pub use meta::{Meta, META_PAGE_NUM, META_SIZE};
pub use pager::PageStore;

/// A page number; the byte offset of a page is `page_num * page_size`
pub type PageNum = u64;

/// Serialized width of a page number
pub const PAGE_NUM_SIZE: usize = 8;
