//! Command dispatch
//!
//! Routes parsed protocol commands to table operations, typing text values
//! by the column they target.

use crate::error::{EmberError, Result};
use crate::protocol::{Command, Response};

use super::{Database, Value};

impl Database {
    /// Execute a command against this table
    pub fn execute(&mut self, command: Command) -> Result<Response> {
        match command {
            Command::Ping => Ok(Response::ok(Some("PONG".to_string()))),
            Command::Echo(text) => Ok(Response::ok(Some(text))),
            Command::Stats => {
                let stats = self.stats()?;
                Ok(Response::ok(Some(format!(
                    "depth={} nodes={} leaves={} items={}",
                    stats.depth, stats.nodes, stats.leaves, stats.items
                ))))
            }
            Command::Insert(texts) => {
                let def = self.definition();
                if texts.len() != def.columns.len() {
                    return Err(EmberError::Schema(format!(
                        "expected {} values, got {}",
                        def.columns.len(),
                        texts.len()
                    )));
                }
                let row = texts
                    .iter()
                    .zip(&def.columns)
                    .map(|(text, column)| Value::parse(text, column.ty))
                    .collect::<Result<Vec<_>>>()?;
                self.insert(row)?;
                Ok(Response::ok(Some("1 row inserted".to_string())))
            }
            Command::Get(text) => {
                let pk = Value::parse(&text, self.definition().columns[0].ty)?;
                let row = self.get(&pk)?.ok_or(EmberError::KeyNotFound)?;
                Ok(Response::rows(vec![render_row(&row)]))
            }
            Command::SelectAll => Ok(rows_response(self.select_all()?)),
            Command::SelectEq { column, value } => {
                let value = self.parse_for(&column, &value)?;
                Ok(rows_response(self.point_query(&column, &value)?))
            }
            Command::SelectRange { column, low, high } => {
                let low = self.parse_for(&column, &low)?;
                let high = self.parse_for(&column, &high)?;
                Ok(rows_response(self.range_query(&column, &low, &high)?))
            }
            Command::Update { column, old, new } => {
                let old = self.parse_for(&column, &old)?;
                let new = self.parse_for(&column, &new)?;
                let count = self.update_point(&column, &old, &new)?;
                Ok(Response::ok(Some(format!("{} rows updated", count))))
            }
            Command::Delete { column, value } => {
                let value = self.parse_for(&column, &value)?;
                let count = self.delete(&column, &value)?;
                Ok(Response::ok(Some(format!("{} rows deleted", count))))
            }
        }
    }

    /// Type request text by the named column
    fn parse_for(&self, column: &str, text: &str) -> Result<Value> {
        let def = self.definition();
        let index = def.column_index(column)?;
        Value::parse(text, def.columns[index].ty)
    }
}

fn rows_response(rows: Vec<Vec<Value>>) -> Response {
    Response::rows(rows.iter().map(|row| render_row(row)).collect())
}

fn render_row(row: &[Value]) -> String {
    row.iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
