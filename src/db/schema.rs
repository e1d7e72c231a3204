//! Table definition
//!
//! Column names and types, the primary key and unique columns. A definition
//! is stored once in the records file's table-definition page.
//!
//! ## Page Layout
//! ```text
//! ┌───────────┬───────────┬──────────────────────────┐
//! │ Len (4)   │ CRC32 (4) │ bincode(TableDef)        │
//! └───────────┴───────────┴──────────────────────────┘
//! ```

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

use crate::error::{EmberError, Result};

/// Length + checksum in front of the encoded definition
pub const TABLE_DEF_HEADER_SIZE: usize = 8;

/// Storage type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    /// Signed 64-bit integer
    Int,
    /// Arbitrary bytes
    Bytes,
}

impl ColumnType {
    /// Parse a type name from schema text
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_uppercase().as_str() {
            "INT" | "INT64" | "INTEGER" => Ok(ColumnType::Int),
            "BYTE" | "BYTES" | "TEXT" | "STRING" => Ok(ColumnType::Bytes),
            other => Err(EmberError::Schema(format!("unknown column type {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Shape of a table
///
/// Always normalized: the primary key is column 0 and never appears in
/// `unique`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub columns: Vec<Column>,
    pub primary_key: usize,
    pub unique: Vec<usize>,
}

impl TableDef {
    /// Build a definition, moving the primary key to the front
    pub fn new(mut columns: Vec<Column>, primary_key: usize, unique: Vec<usize>) -> Result<Self> {
        if columns.is_empty() {
            return Err(EmberError::Schema("a table needs at least one column".to_string()));
        }
        if primary_key >= columns.len() {
            return Err(EmberError::Schema(format!(
                "primary key index {} out of range",
                primary_key
            )));
        }
        for (i, column) in columns.iter().enumerate() {
            if column.name.is_empty() {
                return Err(EmberError::Schema("empty column name".to_string()));
            }
            let clash = columns[..i]
                .iter()
                .any(|other| other.name.eq_ignore_ascii_case(&column.name));
            if clash {
                return Err(EmberError::Schema(format!("duplicate column {}", column.name)));
            }
        }
        if let Some(bad) = unique.iter().find(|index| **index >= columns.len()) {
            return Err(EmberError::Schema(format!("unique column index {} out of range", bad)));
        }

        // Swapping columns 0 and `primary_key` renumbers exactly those two.
        columns.swap(0, primary_key);
        let renumber = |index: usize| match index {
            i if i == primary_key => 0,
            0 => primary_key,
            i => i,
        };

        let mut normalized: Vec<usize> = unique
            .into_iter()
            .map(renumber)
            .filter(|index| *index != 0)
            .collect();
        normalized.sort_unstable();
        normalized.dedup();

        Ok(Self {
            columns,
            primary_key: 0,
            unique: normalized,
        })
    }

    /// Parse schema text such as `(ID INT, NAME BYTE, CABIN INT) PRIMARY(ID) UNIQUE(CABIN)`
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim().trim_end_matches(';').trim();
        let body = text
            .strip_prefix('(')
            .ok_or_else(|| EmberError::Schema("schema must start with '('".to_string()))?;
        let close = body
            .find(')')
            .ok_or_else(|| EmberError::Schema("unterminated column list".to_string()))?;

        let mut columns = Vec::new();
        for spec in body[..close].split(',') {
            let parts: Vec<&str> = spec.split_whitespace().collect();
            match parts.as_slice() {
                [name, ty] => columns.push(Column::new(*name, ColumnType::parse(ty)?)),
                _ => {
                    return Err(EmberError::Schema(format!(
                        "expected `NAME TYPE`, got `{}`",
                        spec.trim()
                    )))
                }
            }
        }

        let mut primary_key = None;
        let mut unique = Vec::new();
        let mut rest = body[close + 1..].trim_start();

        while !rest.is_empty() {
            let open = rest
                .find('(')
                .ok_or_else(|| EmberError::Schema(format!("unexpected `{}`", rest)))?;
            let close = rest
                .find(')')
                .filter(|close| *close > open)
                .ok_or_else(|| EmberError::Schema(format!("unterminated clause `{}`", rest)))?;

            let keyword = rest[..open].trim().to_ascii_uppercase();
            let names = rest[open + 1..close]
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty());

            match keyword.as_str() {
                "PRIMARY" | "PRIMARY KEY" => {
                    let names: Vec<&str> = names.collect();
                    if names.len() != 1 || primary_key.is_some() {
                        return Err(EmberError::Schema(
                            "exactly one PRIMARY column is required".to_string(),
                        ));
                    }
                    primary_key = Some(find_column(&columns, names[0])?);
                }
                "UNIQUE" => {
                    for name in names {
                        unique.push(find_column(&columns, name)?);
                    }
                }
                other => {
                    return Err(EmberError::Schema(format!("unknown clause {}", other)));
                }
            }

            rest = rest[close + 1..].trim_start();
        }

        let primary_key =
            primary_key.ok_or_else(|| EmberError::Schema("missing PRIMARY clause".to_string()))?;
        Self::new(columns, primary_key, unique)
    }

    /// Position of the column called `name` (case-insensitive)
    pub fn column_index(&self, name: &str) -> Result<usize> {
        find_column(&self.columns, name)
    }

    pub fn column(&self, index: usize) -> &Column {
        &self.columns[index]
    }

    pub fn is_unique(&self, index: usize) -> bool {
        self.unique.contains(&index)
    }

    // =========================================================================
    // Page Encoding
    // =========================================================================

    /// Frame the definition for the table-definition page
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload =
            bincode::serialize(self).map_err(|e| EmberError::Serialization(e.to_string()))?;

        let mut buf = Vec::with_capacity(TABLE_DEF_HEADER_SIZE + payload.len());
        buf.put_u32_le(payload.len() as u32);
        buf.put_u32_le(crc32fast::hash(&payload));
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    /// Read a definition back from a table-definition page
    pub fn from_bytes(mut buf: &[u8]) -> Result<Self> {
        if buf.remaining() < TABLE_DEF_HEADER_SIZE {
            return Err(EmberError::Corruption("table definition page too short".to_string()));
        }
        let len = buf.get_u32_le() as usize;
        let expected = buf.get_u32_le();
        if buf.remaining() < len {
            return Err(EmberError::Corruption(format!(
                "table definition claims {} bytes, page holds {}",
                len,
                buf.remaining()
            )));
        }

        let payload = &buf[..len];
        let actual = crc32fast::hash(payload);
        if actual != expected {
            return Err(EmberError::Corruption(format!(
                "table definition checksum mismatch: expected {:08x}, got {:08x}",
                expected, actual
            )));
        }

        bincode::deserialize(payload).map_err(|e| EmberError::Serialization(e.to_string()))
    }
}

fn find_column(columns: &[Column], name: &str) -> Result<usize> {
    columns
        .iter()
        .position(|column| column.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| EmberError::Schema(format!("unknown column {}", name)))
}
