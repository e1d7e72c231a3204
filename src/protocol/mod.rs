//! Protocol Module
//!
//! Defines the line protocol for client-server communication.
//!
//! ## Request Format
//! One command per line, optional trailing `;`:
//! ```text
//! PING
//! ECHO <text>
//! INSERT <v1>, <v2>, ...
//! GET <pk>
//! SELECT [<col> = <v> | <col> BETWEEN <lo> AND <hi>]
//! UPDATE <col> <old> <new>
//! DELETE <col> <v>
//! STATS
//! ```
//! Values are bare tokens or quoted strings.
//!
//! ## Response Format
//! ```text
//! OK [message] | ERR <message>
//! ROW <v1>, <v2>, ...        (zero or more)
//! END
//! ```

mod command;
mod response;

pub use command::Command;
pub use response::{Response, Status, END_MARKER};
