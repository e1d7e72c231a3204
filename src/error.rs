//! Error types for EmberDB
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::storage::PageNum;

/// Result type alias using EmberError
pub type Result<T> = std::result::Result<T, EmberError>;

/// Unified error type for EmberDB operations
#[derive(Debug, Error)]
pub enum EmberError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Page {page} is beyond the end of the file")]
    PageOutOfRange { page: PageNum },

    #[error("Store is closed")]
    Closed,

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Item too large: key {key_len} bytes, value {value_len} bytes")]
    ItemTooLarge { key_len: usize, value_len: usize },

    // -------------------------------------------------------------------------
    // Key Errors
    // -------------------------------------------------------------------------
    #[error("Duplicate key: {}", String::from_utf8_lossy(.key))]
    DuplicateKey { key: Vec<u8> },

    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Table Errors
    // -------------------------------------------------------------------------
    #[error("Schema error: {0}")]
    Schema(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl EmberError {
    /// True for errors the caller may recover from (the store stays usable).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EmberError::DuplicateKey { .. }
                | EmberError::KeyNotFound
                | EmberError::ItemTooLarge { .. }
                | EmberError::Schema(_)
                | EmberError::Protocol(_)
        )
    }
}
