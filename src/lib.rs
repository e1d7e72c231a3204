//! # EmberDB
//!
//! An embedded, single-file key-value store with:
//! - Fixed-size pages managed through a persisted free list
//! - A byte-ordered B-tree with split, rotate and merge rebalancing
//! - A thin row layer with unique secondary indexes
//! - A line-oriented TCP protocol
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │               (one connection at a time)                     │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ Command
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Database                                │
//! │            (rows, unique indexes, queries)                   │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ key / value bytes
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  Records    │          │  Index      │   Collection (B-tree)
//!   │  tree       │          │  trees      │
//!   └──────┬──────┘          └──────┬──────┘
//!          └────────────┬───────────┘
//!                       ▼
//!               ┌───────────────┐
//!               │   PageStore   │  Meta + FreeList + pages
//!               └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod btree;
pub mod db;
pub mod network;
pub mod protocol;
pub mod storage;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use btree::{Collection, Item};
pub use config::{Config, StoreOptions};
pub use db::Database;
pub use error::{EmberError, Result};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of EmberDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
