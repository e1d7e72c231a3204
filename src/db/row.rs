//! Row codec
//!
//! Turns typed column values into B-tree keys and payloads.
//!
//! ## Encodings
//! ```text
//! key:      Int   → 8 bytes big-endian, sign bit flipped (sorts numerically)
//!           Bytes → raw bytes
//! payload:  Int   → 8 bytes big-endian
//!           Bytes → len u16 | bytes
//! ```
//! A row's key is its primary-key column; the payload packs the remaining
//! columns in schema order.

use std::fmt;

use bytes::{Buf, BufMut};

use crate::error::{EmberError, Result};

use super::schema::{ColumnType, TableDef};

const SIGN_BIT: u64 = 1 << 63;

/// One column value
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    Int(i64),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::Int(_) => ColumnType::Int,
            Value::Bytes(_) => ColumnType::Bytes,
        }
    }

    /// Interpret request text as a value of type `ty`
    pub fn parse(text: &str, ty: ColumnType) -> Result<Self> {
        match ty {
            ColumnType::Int => text
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| EmberError::Schema(format!("`{}` is not an integer", text))),
            ColumnType::Bytes => Ok(Value::Bytes(text.as_bytes().to_vec())),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Bytes(v.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Bytes(v) => write!(f, "\"{}\"", String::from_utf8_lossy(v)),
        }
    }
}

// =============================================================================
// Keys
// =============================================================================

/// Order-preserving key bytes for `value`
pub fn encode_key(value: &Value) -> Vec<u8> {
    match value {
        Value::Int(v) => ((*v as u64) ^ SIGN_BIT).to_be_bytes().to_vec(),
        Value::Bytes(v) => v.clone(),
    }
}

/// Inverse of `encode_key`
pub fn decode_key(mut buf: &[u8], ty: ColumnType) -> Result<Value> {
    match ty {
        ColumnType::Int => {
            if buf.len() != 8 {
                return Err(EmberError::Corruption(format!(
                    "integer key of {} bytes",
                    buf.len()
                )));
            }
            Ok(Value::Int((buf.get_u64() ^ SIGN_BIT) as i64))
        }
        ColumnType::Bytes => Ok(Value::Bytes(buf.to_vec())),
    }
}

// =============================================================================
// Rows
// =============================================================================

/// Check arity and column types of a full row
pub fn check_row(def: &TableDef, row: &[Value]) -> Result<()> {
    if row.len() != def.columns.len() {
        return Err(EmberError::Schema(format!(
            "expected {} columns, got {}",
            def.columns.len(),
            row.len()
        )));
    }
    for (value, column) in row.iter().zip(&def.columns) {
        check_value(column.ty, &column.name, value)?;
    }
    Ok(())
}

pub fn check_value(ty: ColumnType, name: &str, value: &Value) -> Result<()> {
    if value.column_type() != ty {
        return Err(EmberError::Schema(format!(
            "column {} expects {:?}, got {:?}",
            name,
            ty,
            value.column_type()
        )));
    }
    Ok(())
}

/// Pack every non-key column of `row`
pub fn encode_payload(row: &[Value]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    for value in row.iter().skip(1) {
        match value {
            Value::Int(v) => buf.put_i64(*v),
            Value::Bytes(v) => {
                let len = u16::try_from(v.len()).map_err(|_| {
                    EmberError::Schema(format!("value of {} bytes is too long", v.len()))
                })?;
                buf.put_u16(len);
                buf.extend_from_slice(v);
            }
        }
    }
    Ok(buf)
}

/// Rebuild a full row from its key and payload
pub fn decode_row(def: &TableDef, key: &[u8], mut payload: &[u8]) -> Result<Vec<Value>> {
    let mut row = Vec::with_capacity(def.columns.len());
    row.push(decode_key(key, def.columns[0].ty)?);

    for column in def.columns.iter().skip(1) {
        let value = match column.ty {
            ColumnType::Int => {
                if payload.remaining() < 8 {
                    return Err(truncated(&column.name));
                }
                Value::Int(payload.get_i64())
            }
            ColumnType::Bytes => {
                if payload.remaining() < 2 {
                    return Err(truncated(&column.name));
                }
                let len = payload.get_u16() as usize;
                if payload.remaining() < len {
                    return Err(truncated(&column.name));
                }
                let bytes = payload[..len].to_vec();
                payload.advance(len);
                Value::Bytes(bytes)
            }
        };
        row.push(value);
    }

    Ok(row)
}

fn truncated(column: &str) -> EmberError {
    EmberError::Corruption(format!("row payload truncated at column {}", column))
}
