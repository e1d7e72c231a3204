//! Page Store
//!
//! Owns the backing file and moves whole pages in and out of it.
//!
//! ## Responsibilities
//! - Open or create the file, bootstrapping Meta and FreeList
//! - Read/write fixed-size pages by page number
//! - Hand out and reclaim page numbers through the FreeList
//! - Answer overflow/underflow questions against the fill thresholds
//!
//! ## Free List Durability
//! The on-disk free list is rewritten before Meta and before any reclaimed
//! page is overwritten, so it never lists a page the on-disk tree uses.
//! Pages past its high-water mark that an interrupted session wrote are
//! leaked on the next open.
//!
//! ## File Layout
//! ```text
//! ┌──────────┬──────────┬──────────┬──────────┬─────
//! │ page 0   │ page 1   │ page 2   │ page 3   │ ...
//! │ Meta     │ FreeList │ node     │ node     │
//! └──────────┴──────────┴──────────┴──────────┴─────
//! offset = page_num * page_size
//! ```

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::StoreOptions;
use crate::error::{EmberError, Result};

use super::{FreeList, Meta, PageNum, META_PAGE_NUM};

/// Exclusive owner of one database file
///
/// ## Concurrency:
/// None. A `PageStore` assumes a single reader/writer in a single process;
/// callers sharing a file across threads or processes must serialize access
/// themselves.
pub struct PageStore {
    /// Backing file (None once closed)
    file: Option<File>,

    /// Path, for log and error messages
    path: PathBuf,

    /// Page size and fill thresholds for this session
    options: StoreOptions,

    /// In-memory mirror of the free-list page
    freelist: FreeList,

    /// In-memory mirror of page 0
    meta: Meta,

    /// The free list changed since it was last written
    freelist_dirty: bool,

    /// A reclaimed page was handed out since the free list was last written
    reused_unsynced: bool,
}

impl PageStore {
    /// Open or create a store file
    ///
    /// New file:
    /// 1. Allocate page 1 for the free list and persist it
    /// 2. Persist an empty Meta at page 0
    ///
    /// Existing file:
    /// 1. Read Meta from page 0
    /// 2. Read the FreeList from `meta.freelist_page`
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        options.validate()?;

        let path = path.as_ref().to_path_buf();
        let existing_len = match std::fs::metadata(&path) {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let mut store = Self {
            file: Some(file),
            path,
            options,
            freelist: FreeList::new(),
            meta: Meta::default(),
            freelist_dirty: false,
            reused_unsynced: false,
        };

        if existing_len == 0 {
            store.meta.freelist_page = store.freelist.next_page();
            store.write_freelist()?;
            store.write_meta()?;
            tracing::info!("Created store {}", store.path.display());
        } else {
            store.load(existing_len)?;
            tracing::info!(
                "Loaded store {}: root={} freelist={} table_def={} max_page={}",
                store.path.display(),
                store.meta.root,
                store.meta.freelist_page,
                store.meta.table_def_page,
                store.freelist.max_page()
            );
        }

        Ok(store)
    }

    /// Rebuild Meta and FreeList from an existing file
    fn load(&mut self, file_len: u64) -> Result<()> {
        let page_size = self.options.page_size as u64;
        if file_len < page_size {
            return Err(EmberError::Corruption(format!(
                "{} is {} bytes, shorter than one {} byte page",
                self.path.display(),
                file_len,
                page_size
            )));
        }

        self.meta = Meta::deserialize(&self.read_page(META_PAGE_NUM)?)?;

        let file_pages = file_len.div_ceil(page_size);
        if self.meta.freelist_page == META_PAGE_NUM || self.meta.freelist_page >= file_pages {
            return Err(EmberError::Corruption(format!(
                "free list page {} outside file of {} pages",
                self.meta.freelist_page, file_pages
            )));
        }

        self.freelist = FreeList::deserialize(&self.read_page(self.meta.freelist_page)?)?;

        if file_pages > self.freelist.max_page() {
            tracing::warn!(
                "{}: {} pages beyond the free list high-water mark {}, leaking them",
                self.path.display(),
                file_pages - self.freelist.max_page(),
                self.freelist.max_page()
            );
            self.freelist.raise_max_page(file_pages);
        }
        Ok(())
    }

    // =========================================================================
    // Page I/O
    // =========================================================================

    /// A zeroed buffer the size of one page
    pub fn allocate_empty_page(&self) -> Vec<u8> {
        vec![0u8; self.options.page_size]
    }

    /// Read a whole page
    pub fn read_page(&self, page: PageNum) -> Result<Vec<u8>> {
        let mut file = self.file()?;
        let mut buf = self.allocate_empty_page();

        file.seek(SeekFrom::Start(self.offset(page)))?;
        file.read_exact(&mut buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => EmberError::PageOutOfRange { page },
            _ => EmberError::Io(e),
        })?;

        tracing::trace!("Read page {}", page);
        Ok(buf)
    }

    /// Write a whole page; partial pages are rejected
    ///
    /// Writing into a reclaimed page first persists the free list that no
    /// longer lists it.
    pub fn write_page(&mut self, page: PageNum, data: &[u8]) -> Result<()> {
        if self.reused_unsynced && page != META_PAGE_NUM && page != self.meta.freelist_page {
            self.write_freelist()?;
        }
        self.write_raw(page, data)
    }

    fn write_raw(&mut self, page: PageNum, data: &[u8]) -> Result<()> {
        if data.len() != self.options.page_size {
            return Err(EmberError::Storage(format!(
                "refusing partial write of {} bytes to page {} (page size {})",
                data.len(),
                page,
                self.options.page_size
            )));
        }

        let offset = self.offset(page);
        let mut file = self.file()?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;

        tracing::trace!("Wrote page {}", page);
        Ok(())
    }

    /// Persist the in-memory Meta to page 0, after any pending free list
    pub fn write_meta(&mut self) -> Result<()> {
        self.sync_freelist()?;

        let mut buf = self.allocate_empty_page();
        self.meta.serialize(&mut buf);
        tracing::debug!(
            "Writing meta: root={} freelist={} table_def={}",
            self.meta.root,
            self.meta.freelist_page,
            self.meta.table_def_page
        );
        self.write_raw(META_PAGE_NUM, &buf)
    }

    /// Persist the in-memory FreeList to its page
    ///
    /// Released pages beyond what one page holds are dropped, oldest first.
    /// Dropped pages stay allocated and are never reused.
    pub fn write_freelist(&mut self) -> Result<()> {
        let dropped = self.freelist.drop_oldest(FreeList::capacity(self.options.page_size));
        if dropped > 0 {
            tracing::warn!(
                "{}: free list page full, leaking {} released pages",
                self.path.display(),
                dropped
            );
        }

        let mut buf = self.allocate_empty_page();
        self.freelist.serialize(&mut buf)?;
        tracing::debug!(
            "Writing free list: max_page={} released={}",
            self.freelist.max_page(),
            self.freelist.released_pages().len()
        );
        self.write_raw(self.meta.freelist_page, &buf)?;

        self.freelist_dirty = false;
        self.reused_unsynced = false;
        Ok(())
    }

    /// Persist the free list if it changed since the last write
    pub fn sync_freelist(&mut self) -> Result<()> {
        if self.freelist_dirty {
            self.write_freelist()?;
        }
        Ok(())
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Take a page number from the free list
    pub fn allocate_page(&mut self) -> PageNum {
        self.reused_unsynced |= !self.freelist.released_pages().is_empty();
        self.freelist_dirty = true;
        self.freelist.next_page()
    }

    /// Give a page number back to the free list
    pub fn release_page(&mut self, page: PageNum) {
        tracing::trace!("Released page {}", page);
        self.freelist_dirty = true;
        self.freelist.release(page);
    }

    // =========================================================================
    // Fill Thresholds
    // =========================================================================

    /// Size above which a node must be split
    pub fn max_fill_bytes(&self) -> f64 {
        self.options.max_fill_bytes()
    }

    /// Size below which a non-root node must be rebalanced
    pub fn min_fill_bytes(&self) -> f64 {
        self.options.min_fill_bytes()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Flush and release the file handle. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
            file.sync_all()?;
            tracing::info!("Closed store {}", self.path.display());
        }
        Ok(())
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    pub fn freelist(&self) -> &FreeList {
        &self.freelist
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn page_size(&self) -> usize {
        self.options.page_size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn file(&self) -> Result<&File> {
        self.file.as_ref().ok_or(EmberError::Closed)
    }

    fn offset(&self, page: PageNum) -> u64 {
        page * self.options.page_size as u64
    }
}
