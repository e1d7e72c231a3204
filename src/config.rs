//! Configuration for EmberDB
//!
//! Centralized configuration with sensible defaults. Store options are passed
//! explicitly to every store that is opened; nothing is read from globals.

use std::path::PathBuf;

use crate::error::{EmberError, Result};

/// Typical host memory page size, used when no page size is supplied.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Smallest page that can hold a node header plus a handful of items.
pub const MIN_PAGE_SIZE: usize = 64;

/// Node item offsets are stored as u16.
pub const MAX_PAGE_SIZE: usize = 65536;

/// Per-file storage parameters.
///
/// These are not persisted: the same values must be supplied every time a
/// given file is opened for consistent split/merge behaviour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoreOptions {
    /// Size of every page in bytes
    pub page_size: usize,

    /// A non-root node whose size falls below this fraction of the page underflows
    pub min_fill_percent: f32,

    /// A node whose size exceeds this fraction of the page overflows
    pub max_fill_percent: f32,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            min_fill_percent: 0.5,
            max_fill_percent: 0.95,
        }
    }
}

impl StoreOptions {
    /// Create options for a page size with the default fill percentages
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size,
            ..Self::default()
        }
    }

    /// Set both fill percentages
    pub fn fill_percent(mut self, min: f32, max: f32) -> Self {
        self.min_fill_percent = min;
        self.max_fill_percent = max;
        self
    }

    /// Reject page sizes and fill fractions the tree cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.page_size < MIN_PAGE_SIZE || self.page_size > MAX_PAGE_SIZE {
            return Err(EmberError::InvalidConfiguration(format!(
                "page size {} outside {}..={}",
                self.page_size, MIN_PAGE_SIZE, MAX_PAGE_SIZE
            )));
        }

        let (min, max) = (self.min_fill_percent, self.max_fill_percent);
        if !(min > 0.0 && max <= 1.0) {
            return Err(EmberError::InvalidConfiguration(format!(
                "fill percentages must lie in (0, 1], got min={} max={}",
                min, max
            )));
        }
        if min >= max {
            return Err(EmberError::InvalidConfiguration(format!(
                "min fill {} must be below max fill {}",
                min, max
            )));
        }

        Ok(())
    }

    /// Serialized node size below which a node underflows
    pub fn min_fill_bytes(&self) -> f64 {
        self.min_fill_percent as f64 * self.page_size as f64
    }

    /// Serialized node size above which a node overflows
    pub fn max_fill_bytes(&self) -> f64 {
        self.max_fill_percent as f64 * self.page_size as f64
    }
}

/// Main configuration for an EmberDB instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all table files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── {table}.rec.db          (records tree)
    ///     └── {table}.{column}.idx.db (one per unique column)
    pub data_dir: PathBuf,

    /// Page size and fill thresholds for every file opened
    pub store: StoreOptions,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Connection read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./emberdb_data"),
            store: StoreOptions::default(),
            listen_addr: "127.0.0.1:3030".to_string(),
            read_timeout_ms: 0,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all table files)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the page size (in bytes)
    pub fn page_size(mut self, size: usize) -> Self {
        self.config.store.page_size = size;
        self
    }

    /// Set the minimum fill fraction
    pub fn min_fill_percent(mut self, percent: f32) -> Self {
        self.config.store.min_fill_percent = percent;
        self
    }

    /// Set the maximum fill fraction
    pub fn max_fill_percent(mut self, percent: f32) -> Self {
        self.config.store.max_fill_percent = percent;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Validate the store options and return the config
    pub fn build(self) -> Result<Config> {
        self.config.store.validate()?;
        Ok(self.config)
    }
}
