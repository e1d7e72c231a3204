//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single thread accepting connections
//! - Each connection served to completion before the next is accepted
//! - Requests routed through `Database::execute`

mod connection;
mod server;

pub use connection::{execute_line, Connection};
pub use server::Server;
