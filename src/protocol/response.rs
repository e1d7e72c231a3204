//! Response definitions
//!
//! Represents responses to clients and their line framing.

use std::io::{BufRead, Write};

use crate::error::{EmberError, Result};

/// Line that closes every response
pub const END_MARKER: &str = "END";

/// Response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
}

/// A response to send to a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status line prefix
    pub status: Status,

    /// Text after `OK`/`ERR`
    pub message: Option<String>,

    /// Rendered result rows, one `ROW` line each
    pub rows: Vec<String>,
}

impl Response {
    /// Create an OK response with an optional message
    pub fn ok(message: Option<String>) -> Self {
        Self {
            status: Status::Ok,
            message,
            rows: Vec::new(),
        }
    }

    /// Create an OK response carrying result rows
    pub fn rows(rows: Vec<String>) -> Self {
        Self {
            status: Status::Ok,
            message: Some(format!("{} rows", rows.len())),
            rows,
        }
    }

    /// Create an ERR response
    pub fn error(message: &str) -> Self {
        Self {
            status: Status::Error,
            message: Some(message.to_string()),
            rows: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Write the response, terminated by `END`
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let prefix = match self.status {
            Status::Ok => "OK",
            Status::Error => "ERR",
        };
        // Messages are single-line by construction.
        match &self.message {
            Some(message) => writeln!(writer, "{} {}", prefix, message.replace('\n', " "))?,
            None => writeln!(writer, "{}", prefix)?,
        }
        for row in &self.rows {
            writeln!(writer, "ROW {}", row)?;
        }
        writeln!(writer, "{}", END_MARKER)?;
        writer.flush()?;
        Ok(())
    }

    /// Read one response, up to and including its `END` line
    pub fn read_from<R: BufRead>(reader: &mut R) -> Result<Self> {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Err(EmberError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed before a response",
            )));
        }

        let status_line = line.trim_end();
        let (status, rest) = if let Some(rest) = status_line.strip_prefix("OK") {
            (Status::Ok, rest)
        } else if let Some(rest) = status_line.strip_prefix("ERR") {
            (Status::Error, rest)
        } else {
            return Err(EmberError::Protocol(format!("bad status line `{}`", status_line)));
        };
        let message = Some(rest.trim())
            .filter(|message| !message.is_empty())
            .map(str::to_string);

        let mut rows = Vec::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Err(EmberError::Protocol("response ended without END".to_string()));
            }
            let body = line.trim_end();
            if body == END_MARKER {
                break;
            }
            let row = body
                .strip_prefix("ROW ")
                .ok_or_else(|| EmberError::Protocol(format!("bad response line `{}`", body)))?;
            rows.push(row.to_string());
        }

        Ok(Self {
            status,
            message,
            rows,
        })
    }
}
