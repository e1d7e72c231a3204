//! B-Tree Module
//!
//! Ordered key/value index stored one node per page.
//!
//! ## Responsibilities
//! - Node model and its page codec
//! - Search, insert, update and delete with split/rotate/merge maintenance
//! - In-order and range iteration
//!
//! ## Tree Shape
//! ```text
//!                    ┌──────────────┐
//!                    │ [k3]    [k6] │  internal: items + children
//!                    └──┬─────┬───┬─┘
//!           ┌───────────┘     │   └───────────┐
//!     ┌─────┴─────┐   ┌───────┴───┐   ┌───────┴───┐
//!     │ k1 k2     │   │ k4 k5     │   │ k7 k8 k9  │  leaves
//!     └───────────┘   └───────────┘   └───────────┘
//! ```
//! Every item lives in exactly one node. Keys left of an item sort below it,
//! keys right of it sort above it, and all leaves sit at the same depth.

mod codec;
mod collection;
mod iterator;
mod node;
mod rebalance;

pub use codec::{decode_node, encode_node};
pub use collection::{Collection, SearchResult, TreeStats};
pub use iterator::TreeIter;
pub use node::{Item, Node, MAX_ITEM_FIELD_LEN, NODE_HEADER_SIZE, OFFSET_SIZE};
