//! Row Layer
//!
//! A single table on top of B-tree collections.
//!
//! ## Files
//! ```text
//! {dir}/{name}.rec.db            primary key → packed row (table def page)
//! {dir}/{name}.{column}.idx.db   unique column key → primary key
//! ```
//!
//! ## Responsibilities
//! - Type-check rows against the table definition
//! - Keep every unique index in step with the records tree
//! - Answer point and range queries, using an index when one exists

mod execute;
mod row;
mod schema;

pub use row::{check_row, decode_key, decode_row, encode_key, encode_payload, Value};
pub use schema::{Column, ColumnType, TableDef, TABLE_DEF_HEADER_SIZE};

use std::path::{Path, PathBuf};

use crate::btree::{Collection, TreeStats};
use crate::config::StoreOptions;
use crate::error::{EmberError, Result};

use row::check_value;

/// A unique column and the tree indexing it
struct UniqueIndex {
    column: usize,
    tree: Collection,
}

/// One open table
pub struct Database {
    name: String,
    def: TableDef,
    records: Collection,
    indexes: Vec<UniqueIndex>,
}

impl Database {
    /// Open table `name` under `dir`, creating it when `def` is given
    ///
    /// An existing table keeps its stored definition; passing a different one
    /// is a `Schema` error.
    pub fn open(
        dir: impl AsRef<Path>,
        name: &str,
        def: Option<TableDef>,
        options: StoreOptions,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let name = name.to_ascii_lowercase();
        let mut records = Collection::open(records_path(dir, &name), options)?;

        let def = match (records.read_table_def()?, def) {
            (Some(stored), requested) => {
                let stored = TableDef::from_bytes(&stored)?;
                if let Some(requested) = requested {
                    if requested != stored {
                        return Err(EmberError::Schema(format!(
                            "table {} already exists with a different definition",
                            name
                        )));
                    }
                }
                stored
            }
            (None, Some(requested)) => {
                records.write_table_def(&requested.to_bytes()?)?;
                tracing::info!("Created table {} with {} columns", name, requested.columns.len());
                requested
            }
            (None, None) => {
                return Err(EmberError::Schema(format!(
                    "table {} does not exist and no definition was given",
                    name
                )));
            }
        };

        let mut indexes = Vec::with_capacity(def.unique.len());
        for &column in &def.unique {
            let path = index_path(dir, &name, &def.columns[column].name);
            tracing::debug!("Opening unique index on {} at {}", def.columns[column].name, path.display());
            indexes.push(UniqueIndex {
                column,
                tree: Collection::open(path, options)?,
            });
        }

        Ok(Self {
            name,
            def,
            records,
            indexes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> &TableDef {
        &self.def
    }

    /// Shape of the records tree
    pub fn stats(&self) -> Result<TreeStats> {
        self.records.stats()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert a full row in schema order
    ///
    /// Duplicate primary keys and unique values are rejected before any write.
    pub fn insert(&mut self, row: Vec<Value>) -> Result<()> {
        check_row(&self.def, &row)?;

        let pk = encode_key(&row[0]);
        if self.records.contains(&pk)? {
            return Err(EmberError::DuplicateKey { key: pk });
        }
        for index in &self.indexes {
            let key = encode_key(&row[index.column]);
            if index.tree.contains(&key)? {
                return Err(EmberError::DuplicateKey { key });
            }
        }

        self.records.put(&pk, &encode_payload(&row)?, false)?;

        for i in 0..self.indexes.len() {
            let key = encode_key(&row[self.indexes[i].column]);
            if let Err(e) = self.indexes[i].tree.put(&key, &pk, false) {
                self.undo_insert(&pk, &row, i);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Roll back a partially indexed insert; the first `indexed` indexes hold it
    fn undo_insert(&mut self, pk: &[u8], row: &[Value], indexed: usize) {
        for index in &mut self.indexes[..indexed] {
            if let Err(e) = index.tree.remove(&encode_key(&row[index.column])) {
                tracing::warn!("Failed to roll back index entry: {}", e);
            }
        }
        if let Err(e) = self.records.remove(pk) {
            tracing::warn!("Failed to roll back row: {}", e);
        }
    }

    /// Set `column` to `new` on every row where it equals `old`
    ///
    /// Returns the number of rows changed. The primary key cannot be updated.
    pub fn update_point(&mut self, column: &str, old: &Value, new: &Value) -> Result<usize> {
        let col = self.def.column_index(column)?;
        if col == self.def.primary_key {
            return Err(EmberError::Schema("the primary key cannot be updated".to_string()));
        }
        let ty = self.def.columns[col].ty;
        check_value(ty, column, old)?;
        check_value(ty, column, new)?;

        let rows = self.point_query(column, old)?;
        if rows.is_empty() || old == new {
            return Ok(rows.len());
        }

        let index_slot = self.indexes.iter().position(|index| index.column == col);
        if let Some(slot) = index_slot {
            let key = encode_key(new);
            if self.indexes[slot].tree.contains(&key)? {
                return Err(EmberError::DuplicateKey { key });
            }
        }

        for mut row in rows.iter().cloned() {
            row[col] = new.clone();
            let pk = encode_key(&row[0]);
            self.records.put(&pk, &encode_payload(&row)?, true)?;

            if let Some(slot) = index_slot {
                let tree = &mut self.indexes[slot].tree;
                tree.remove(&encode_key(old))?;
                tree.put(&encode_key(new), &pk, false)?;
            }
        }

        tracing::debug!("Updated {} rows of {} on {}", rows.len(), self.name, column);
        Ok(rows.len())
    }

    /// Remove every row where `column` equals `value`, returning the count
    pub fn delete(&mut self, column: &str, value: &Value) -> Result<usize> {
        let rows = self.point_query(column, value)?;

        for row in &rows {
            self.records.remove(&encode_key(&row[0]))?;
            for index in &mut self.indexes {
                index.tree.remove(&encode_key(&row[index.column]))?;
            }
        }

        tracing::debug!("Deleted {} rows of {} on {}", rows.len(), self.name, column);
        Ok(rows.len())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Row whose primary key is `pk`
    pub fn get(&self, pk: &Value) -> Result<Option<Vec<Value>>> {
        let column = &self.def.columns[0];
        check_value(column.ty, &column.name, pk)?;

        let key = encode_key(pk);
        match self.records.find(&key)? {
            Some(payload) => decode_row(&self.def, &key, &payload).map(Some),
            None => Ok(None),
        }
    }

    /// Rows where `column` equals `value`
    pub fn point_query(&self, column: &str, value: &Value) -> Result<Vec<Vec<Value>>> {
        let col = self.def.column_index(column)?;
        check_value(self.def.columns[col].ty, column, value)?;

        if col == self.def.primary_key {
            return Ok(self.get(value)?.into_iter().collect());
        }

        if let Some(index) = self.indexes.iter().find(|index| index.column == col) {
            return match index.tree.find(&encode_key(value))? {
                Some(pk) => self.row_for_key(&pk).map(|row| vec![row]),
                None => Ok(Vec::new()),
            };
        }

        self.scan(|row| &row[col] == value)
    }

    /// Rows where `low <= column <= high`, ascending by that column when indexed
    pub fn range_query(&self, column: &str, low: &Value, high: &Value) -> Result<Vec<Vec<Value>>> {
        let col = self.def.column_index(column)?;
        let ty = self.def.columns[col].ty;
        check_value(ty, column, low)?;
        check_value(ty, column, high)?;

        if col == self.def.primary_key {
            return self
                .records
                .range(&encode_key(low), &encode_key(high))?
                .map(|item| {
                    let item = item?;
                    decode_row(&self.def, &item.key, &item.value)
                })
                .collect();
        }

        if let Some(index) = self.indexes.iter().find(|index| index.column == col) {
            return index
                .tree
                .range(&encode_key(low), &encode_key(high))?
                .map(|item| self.row_for_key(&item?.value))
                .collect();
        }

        self.scan(|row| &row[col] >= low && &row[col] <= high)
    }

    /// Every row, ascending by primary key
    pub fn select_all(&self) -> Result<Vec<Vec<Value>>> {
        self.scan(|_| true)
    }

    fn scan(&self, mut keep: impl FnMut(&[Value]) -> bool) -> Result<Vec<Vec<Value>>> {
        let mut rows = Vec::new();
        for item in self.records.iter()? {
            let item = item?;
            let row = decode_row(&self.def, &item.key, &item.value)?;
            if keep(&row) {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// Row for an encoded primary key taken from an index
    fn row_for_key(&self, pk: &[u8]) -> Result<Vec<Value>> {
        let payload = self.records.find(pk)?.ok_or_else(|| {
            EmberError::Corruption(format!("index of {} points at a missing row", self.name))
        })?;
        decode_row(&self.def, pk, &payload)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Close the records tree and every index
    pub fn close(&mut self) -> Result<()> {
        self.records.close()?;
        for index in &mut self.indexes {
            index.tree.close()?;
        }
        tracing::info!("Closed table {}", self.name);
        Ok(())
    }
}

fn records_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.rec.db", name))
}

fn index_path(dir: &Path, name: &str, column: &str) -> PathBuf {
    dir.join(format!("{}.{}.idx.db", name, column.to_ascii_lowercase()))
}
