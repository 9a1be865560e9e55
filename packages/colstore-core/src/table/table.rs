//! Row data stored column by column.
//!
//! Each table has:
//! - A fixed schema of typed columns
//! - One adaptive or string column per schema entry, all of equal length
//! - A row count that is also valid for tables without columns

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::column::{Column, StringColumn};
use crate::config::StoreConfig;
use crate::error::DbError;

use super::column_spec::{ColumnSpec, ColumnType};
use super::validation;

/// Stable identity of a table, unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableKey(pub u64);

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
enum ColumnData {
    Int(Column),
    Bytes(StringColumn),
}

/// A value taken out of a column, kept for copying and rollback.
enum Value {
    Int(i64),
    Bytes(Vec<u8>),
}

/// A value together with its null flag.
struct Cell {
    value: Value,
    null: bool,
}

impl ColumnData {
    fn new(ty: ColumnType, max_leaf_size: usize) -> Self {
        if ty.is_bytes() {
            ColumnData::Bytes(StringColumn::with_leaf_size(max_leaf_size))
        } else {
            ColumnData::Int(Column::with_leaf_size(max_leaf_size))
        }
    }

    fn default_value(&self) -> Value {
        match self {
            ColumnData::Int(_) => Value::Int(0),
            ColumnData::Bytes(_) => Value::Bytes(Vec::new()),
        }
    }

    fn value(&self, row: usize) -> Result<Value, DbError> {
        Ok(match self {
            ColumnData::Int(column) => Value::Int(column.get(row)?),
            ColumnData::Bytes(column) => Value::Bytes(column.get(row)?.into_owned()),
        })
    }

    fn set_value(&mut self, row: usize, value: &Value) -> Result<(), DbError> {
        match (self, value) {
            (ColumnData::Int(column), Value::Int(value)) => column.set(row, *value),
            (ColumnData::Bytes(column), Value::Bytes(bytes)) => column.set(row, bytes),
            _ => Err(kind_mismatch()),
        }
    }

    fn insert_value(&mut self, row: usize, value: &Value) -> Result<(), DbError> {
        match (self, value) {
            (ColumnData::Int(column), Value::Int(value)) => column.insert(row, *value),
            (ColumnData::Bytes(column), Value::Bytes(bytes)) => column.insert(row, bytes),
            _ => Err(kind_mismatch()),
        }
    }

    fn erase(&mut self, row: usize) -> Result<(), DbError> {
        match self {
            ColumnData::Int(column) => column.erase(row).map(|_| ()),
            ColumnData::Bytes(column) => column.erase(row),
        }
    }

    fn len(&self) -> usize {
        match self {
            ColumnData::Int(column) => column.len(),
            ColumnData::Bytes(column) => column.len(),
        }
    }

    fn clear(&mut self) {
        match self {
            ColumnData::Int(column) => column.clear(),
            ColumnData::Bytes(column) => column.clear(),
        }
    }

    fn build_index(&mut self) -> Result<(), DbError> {
        match self {
            ColumnData::Int(column) => column.build_index(),
            ColumnData::Bytes(column) => column.build_index(),
        }
    }

    fn has_index(&self) -> bool {
        match self {
            ColumnData::Int(column) => column.has_index(),
            ColumnData::Bytes(column) => column.has_index(),
        }
    }

    fn verify(&self) -> Result<(), DbError> {
        match self {
            ColumnData::Int(column) => column.verify(),
            ColumnData::Bytes(column) => column.verify(),
        }
    }
}

fn kind_mismatch() -> DbError {
    DbError::DataCorruption("cell kind does not match column storage".to_string())
}

/// Storage of one schema column: values plus, for nullable columns, a
/// parallel column of null flags.
///
/// Every operation either completes on both or leaves both unchanged.
#[derive(Debug, Clone)]
struct StoredColumn {
    data: ColumnData,
    nulls: Option<Column>,
}

impl StoredColumn {
    fn new(spec: &ColumnSpec, max_leaf_size: usize) -> Self {
        let flagged = spec.nullable && spec.ty != ColumnType::Link;
        Self {
            data: ColumnData::new(spec.ty, max_leaf_size),
            nulls: flagged.then(|| Column::with_leaf_size(max_leaf_size)),
        }
    }

    /// Cell of a new row: the type's default, null if the column allows it.
    fn default_cell(&self) -> Cell {
        Cell {
            value: self.data.default_value(),
            null: self.nulls.is_some(),
        }
    }

    fn insert_default(&mut self, row: usize) -> Result<(), DbError> {
        let cell = self.default_cell();
        self.insert_cell(row, &cell)
    }

    fn insert_cell(&mut self, row: usize, cell: &Cell) -> Result<(), DbError> {
        self.data.insert_value(row, &cell.value)?;
        if let Some(nulls) = self.nulls.as_mut() {
            if let Err(e) = nulls.insert(row, i64::from(cell.null)) {
                self.data.erase(row)?;
                return Err(e);
            }
        }
        Ok(())
    }

    fn cell(&self, row: usize) -> Result<Cell, DbError> {
        Ok(Cell {
            value: self.data.value(row)?,
            null: self.is_null(row)?,
        })
    }

    fn put_cell(&mut self, row: usize, cell: &Cell) -> Result<(), DbError> {
        let old = match self.nulls {
            Some(_) => Some(self.data.value(row)?),
            None => None,
        };
        self.data.set_value(row, &cell.value)?;
        if let Some(nulls) = self.nulls.as_mut() {
            if let Err(e) = nulls.set(row, i64::from(cell.null)) {
                if let Some(old) = &old {
                    self.data.set_value(row, old)?;
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn erase(&mut self, row: usize) -> Result<(), DbError> {
        let old = match self.nulls {
            Some(_) => Some(self.data.value(row)?),
            None => None,
        };
        self.data.erase(row)?;
        if let Some(nulls) = self.nulls.as_mut() {
            if let Err(e) = nulls.erase(row) {
                if let Some(old) = &old {
                    self.data.insert_value(row, old)?;
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn is_null(&self, row: usize) -> Result<bool, DbError> {
        match &self.nulls {
            Some(nulls) => Ok(nulls.get(row)? != 0),
            None => Ok(false),
        }
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn clear(&mut self) {
        self.data.clear();
        if let Some(nulls) = self.nulls.as_mut() {
            nulls.clear();
        }
    }

    fn verify(&self) -> Result<(), DbError> {
        self.data.verify()?;
        if let Some(nulls) = &self.nulls {
            nulls.verify()?;
            if nulls.len() != self.data.len() {
                return Err(DbError::DataCorruption(format!(
                    "{} null flags for {} values",
                    nulls.len(),
                    self.data.len()
                )));
            }
        }
        Ok(())
    }
}

/// Decodes a stored link: 0 is null, otherwise the target row plus one.
fn decode_link(stored: i64) -> Result<Option<usize>, DbError> {
    match stored {
        0 => Ok(None),
        v if v > 0 => Ok(Some(v as usize - 1)),
        v => Err(DbError::DataCorruption(format!("negative link value {v}"))),
    }
}

fn encode_link(target: usize) -> Result<i64, DbError> {
    i64::try_from(target)
        .ok()
        .and_then(|t| t.checked_add(1))
        .ok_or(DbError::CapacityOverflow {
            operation: "link encoding",
        })
}

/// Table schema and column storage.
#[derive(Debug, Clone)]
pub struct Table {
    /// Table name
    name: String,
    /// Column definitions in declaration order
    specs: Vec<ColumnSpec>,
    /// Column storage, parallel to `specs`
    columns: Vec<StoredColumn>,
    /// Number of rows
    row_count: usize,
}

impl Table {
    /// Creates an empty table with the given columns.
    ///
    /// # Arguments
    /// * `name` - Table name
    /// * `specs` - Column definitions
    /// * `config` - Node sizing and indexing defaults
    ///
    /// # Returns
    /// `Result<Table, DbError>` containing the created table or an error.
    pub fn create(
        name: impl Into<String>,
        specs: Vec<ColumnSpec>,
        config: &StoreConfig,
    ) -> Result<Self, DbError> {
        let name = name.into();
        config.validate()?;
        validation::validate_table_name(&name)?;
        validation::validate_columns(&name, &specs)?;

        let mut columns = Vec::with_capacity(specs.len());
        for spec in &specs {
            let mut data = StoredColumn::new(spec, config.max_leaf_size);
            let by_default = config.index_new_columns
                && !matches!(spec.ty, ColumnType::Bool | ColumnType::Link);
            if spec.indexed || by_default {
                data.data.build_index()?;
            }
            columns.push(data);
        }

        Ok(Self {
            name,
            specs,
            columns,
            row_count: 0,
        })
    }

    /// Returns the table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of rows.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Returns `true` if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// Returns the number of columns.
    pub fn column_count(&self) -> usize {
        self.specs.len()
    }

    /// Returns the name of column `col`.
    pub fn column_name(&self, col: usize) -> Result<&str, DbError> {
        Ok(&self.spec(col)?.name)
    }

    /// Returns the type of column `col`.
    pub fn column_type(&self, col: usize) -> Result<ColumnType, DbError> {
        Ok(self.spec(col)?.ty)
    }

    /// Returns the position of the column called `name`.
    pub fn column_index(&self, name: &str) -> Result<usize, DbError> {
        self.specs
            .iter()
            .position(|spec| spec.name == name)
            .ok_or_else(|| DbError::ColumnNotFound {
                table: self.name.clone(),
                column: name.to_string(),
            })
    }

    /// Returns the column definitions in declaration order.
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.specs
    }

    /// Returns the integer in column `col` at `row`.
    ///
    /// # Returns
    /// `Result<i64, DbError>`; `TypeMismatch` if the column is not `Int`,
    /// `OutOfRange` if `row` is not a row of the table.
    pub fn get_int(&self, col: usize, row: usize) -> Result<i64, DbError> {
        self.int_column(col, ColumnType::Int)?.get(row)
    }

    /// Returns the flag in column `col` at `row`.
    pub fn get_bool(&self, col: usize, row: usize) -> Result<bool, DbError> {
        Ok(self.int_column(col, ColumnType::Bool)?.get(row)? != 0)
    }

    /// Returns the single-precision float in column `col` at `row`.
    pub fn get_float(&self, col: usize, row: usize) -> Result<f32, DbError> {
        let bits = self.int_column(col, ColumnType::Float)?.get(row)?;
        Ok(f32::from_bits(bits as u32))
    }

    /// Returns the double-precision float in column `col` at `row`.
    pub fn get_double(&self, col: usize, row: usize) -> Result<f64, DbError> {
        let bits = self.int_column(col, ColumnType::Double)?.get(row)?;
        Ok(f64::from_bits(bits as u64))
    }

    /// Returns the timestamp (seconds since the Unix epoch) in column `col` at `row`.
    pub fn get_datetime(&self, col: usize, row: usize) -> Result<i64, DbError> {
        self.int_column(col, ColumnType::DateTime)?.get(row)
    }

    /// Returns the string in column `col` at `row`.
    ///
    /// # Returns
    /// `Result<String, DbError>`; `DataCorruption` if the stored bytes are not UTF-8.
    pub fn get_string(&self, col: usize, row: usize) -> Result<String, DbError> {
        let bytes = self.bytes_column(col, ColumnType::String)?.get(row)?;
        String::from_utf8(bytes.into_owned()).map_err(|_| {
            DbError::DataCorruption(format!(
                "column '{}' row {row} holds invalid UTF-8",
                self.specs[col].name
            ))
        })
    }

    /// Returns a copy of the bytes in column `col` at `row`.
    pub fn get_binary(&self, col: usize, row: usize) -> Result<Vec<u8>, DbError> {
        Ok(self
            .bytes_column(col, ColumnType::Binary)?
            .get(row)?
            .into_owned())
    }

    /// Returns the target row of the link in column `col` at `row`, or
    /// `None` for a null link.
    pub fn get_link(&self, col: usize, row: usize) -> Result<Option<usize>, DbError> {
        decode_link(self.int_column(col, ColumnType::Link)?.get(row)?)
    }

    /// Returns `true` if the link in column `col` at `row` is null.
    pub fn is_null_link(&self, col: usize, row: usize) -> Result<bool, DbError> {
        Ok(self.get_link(col, row)?.is_none())
    }

    /// Returns `true` if the cell in column `col` at `row` is null.
    ///
    /// Cells of non-nullable columns are never null; a link cell is null
    /// when the link is.
    pub fn is_null(&self, col: usize, row: usize) -> Result<bool, DbError> {
        if self.spec(col)?.ty == ColumnType::Link {
            return self.is_null_link(col, row);
        }
        self.check_row(row)?;
        self.columns[col].is_null(row)
    }

    /// Writes an integer into column `col` at `row`.
    ///
    /// Writing a value clears the cell's null flag.
    pub fn set_int(&mut self, col: usize, row: usize, value: i64) -> Result<(), DbError> {
        self.write_value(col, ColumnType::Int, row, Value::Int(value))
    }

    /// Writes a flag into column `col` at `row`.
    pub fn set_bool(&mut self, col: usize, row: usize, value: bool) -> Result<(), DbError> {
        self.write_value(col, ColumnType::Bool, row, Value::Int(i64::from(value)))
    }

    /// Writes a single-precision float into column `col` at `row`.
    pub fn set_float(&mut self, col: usize, row: usize, value: f32) -> Result<(), DbError> {
        let bits = i64::from(value.to_bits());
        self.write_value(col, ColumnType::Float, row, Value::Int(bits))
    }

    /// Writes a double-precision float into column `col` at `row`.
    pub fn set_double(&mut self, col: usize, row: usize, value: f64) -> Result<(), DbError> {
        let bits = value.to_bits() as i64;
        self.write_value(col, ColumnType::Double, row, Value::Int(bits))
    }

    /// Writes a timestamp (seconds since the Unix epoch) into column `col` at `row`.
    pub fn set_datetime(&mut self, col: usize, row: usize, value: i64) -> Result<(), DbError> {
        self.write_value(col, ColumnType::DateTime, row, Value::Int(value))
    }

    /// Writes a string into column `col` at `row`.
    pub fn set_string(&mut self, col: usize, row: usize, value: &str) -> Result<(), DbError> {
        let bytes = Value::Bytes(value.as_bytes().to_vec());
        self.write_value(col, ColumnType::String, row, bytes)
    }

    /// Writes bytes into column `col` at `row`.
    pub fn set_binary(&mut self, col: usize, row: usize, value: &[u8]) -> Result<(), DbError> {
        self.write_value(col, ColumnType::Binary, row, Value::Bytes(value.to_vec()))
    }

    /// Sets the link in column `col` at `row` to null.
    pub fn nullify_link(&mut self, col: usize, row: usize) -> Result<(), DbError> {
        self.write_value(col, ColumnType::Link, row, Value::Int(0))
    }

    /// Makes the cell in column `col` at `row` null.
    ///
    /// The stored value is reset to the type's default, so a null cell reads
    /// as 0, `false` or empty.
    ///
    /// # Returns
    /// `Result<(), DbError>`; `ColumnNotNullable` for a column that was not
    /// declared nullable. Link cells are always nullable.
    pub fn set_null(&mut self, col: usize, row: usize) -> Result<(), DbError> {
        let (ty, nullable) = {
            let spec = self.spec(col)?;
            (spec.ty, spec.nullable)
        };
        if ty == ColumnType::Link {
            return self.nullify_link(col, row);
        }
        if !nullable {
            return Err(DbError::ColumnNotNullable {
                table: self.name.clone(),
                column: self.specs[col].name.clone(),
            });
        }
        self.check_row(row)?;
        let cell = self.columns[col].default_cell();
        self.columns[col].put_cell(row, &cell)
    }

    /// Points the link in column `col` at `row` to `target`.
    ///
    /// `target_len` is the row count of the target table, read under its lock.
    pub(crate) fn set_link(
        &mut self,
        col: usize,
        row: usize,
        target: usize,
        target_len: usize,
    ) -> Result<(), DbError> {
        self.check_type(col, ColumnType::Link)?;
        if target >= target_len {
            return Err(DbError::LinkOutOfRange {
                table: self.link_target(col)?.unwrap_or_default().to_string(),
                row: target,
                len: target_len,
            });
        }
        let stored = encode_link(target)?;
        self.write_value(col, ColumnType::Link, row, Value::Int(stored))
    }

    /// Returns the name of the table that link column `col` points into.
    ///
    /// # Returns
    /// `Result<Option<&str>, DbError>`; `None` for columns that are not links.
    pub fn link_target(&self, col: usize) -> Result<Option<&str>, DbError> {
        Ok(self.spec(col)?.link_target.as_deref())
    }

    /// Positions of the link columns pointing into the table called `target`.
    pub(crate) fn link_columns_into(&self, target: &str) -> Vec<usize> {
        self.specs
            .iter()
            .enumerate()
            .filter(|(_, spec)| spec.link_target.as_deref() == Some(target))
            .map(|(col, _)| col)
            .collect()
    }

    /// Rewrites every non-null link of column `col` through `map`; links
    /// mapped to `None` become null.
    pub(crate) fn remap_links<F>(&mut self, col: usize, map: F) -> Result<(), DbError>
    where
        F: Fn(usize) -> Option<usize>,
    {
        self.int_column_mut(col, ColumnType::Link)?
            .remap_values(|stored| {
                if stored <= 0 {
                    return stored;
                }
                match map(stored as usize - 1) {
                    Some(target) => target as i64 + 1,
                    None => 0,
                }
            })
    }

    /// Returns the first row whose integer in column `col` equals `value`.
    pub fn find_first_int(&self, col: usize, value: i64) -> Result<Option<usize>, DbError> {
        self.int_column(col, ColumnType::Int)?.find(value)
    }

    /// Returns the first row whose flag in column `col` equals `value`.
    pub fn find_first_bool(&self, col: usize, value: bool) -> Result<Option<usize>, DbError> {
        self.int_column(col, ColumnType::Bool)?
            .find(i64::from(value))
    }

    /// Returns the first row whose timestamp in column `col` equals `value`.
    pub fn find_first_datetime(&self, col: usize, value: i64) -> Result<Option<usize>, DbError> {
        self.int_column(col, ColumnType::DateTime)?.find(value)
    }

    /// Returns the first row whose string in column `col` equals `value`.
    pub fn find_first_string(&self, col: usize, value: &str) -> Result<Option<usize>, DbError> {
        self.bytes_column(col, ColumnType::String)?
            .find(value.as_bytes())
    }

    /// Builds a search index on column `col`.
    ///
    /// # Returns
    /// `Result<(), DbError>`; `InvalidConfig` for a link column.
    pub fn add_search_index(&mut self, col: usize) -> Result<(), DbError> {
        if self.spec(col)?.ty == ColumnType::Link {
            return Err(DbError::InvalidConfig(format!(
                "link column '{}' cannot be indexed",
                self.specs[col].name
            )));
        }
        self.columns[col].data.build_index()?;
        tracing::debug!(table = %self.name, column = %self.specs[col].name, "added search index");
        Ok(())
    }

    /// Returns `true` if column `col` has a search index.
    pub fn has_search_index(&self, col: usize) -> Result<bool, DbError> {
        self.spec(col)?;
        Ok(self.columns[col].data.has_index())
    }

    /// Checks that every column is structurally sound and has one entry per row.
    pub fn verify(&self) -> Result<(), DbError> {
        for (spec, column) in self.specs.iter().zip(&self.columns) {
            column.verify()?;
            if column.len() != self.row_count {
                return Err(DbError::DataCorruption(format!(
                    "column '{}' of table '{}' has {} rows, expected {}",
                    spec.name,
                    self.name,
                    column.len(),
                    self.row_count
                )));
            }
        }
        Ok(())
    }

    /// Inserts a row of default values at `row`.
    ///
    /// Columns already extended are shrunk back if a later column fails.
    pub(crate) fn insert_empty_row(&mut self, row: usize) -> Result<(), DbError> {
        if row > self.row_count {
            return Err(DbError::OutOfRange {
                index: row,
                len: self.row_count,
            });
        }
        for done in 0..self.columns.len() {
            if let Err(e) = self.columns[done].insert_default(row) {
                for column in &mut self.columns[..done] {
                    column.erase(row)?;
                }
                return Err(e);
            }
        }
        self.row_count += 1;
        Ok(())
    }

    /// Removes `row`, shifting later rows down by one.
    ///
    /// Cells already removed are put back if a later column fails.
    pub(crate) fn remove(&mut self, row: usize) -> Result<(), DbError> {
        self.check_row(row)?;
        let mut removed = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            removed.push(column.cell(row)?);
        }
        for done in 0..self.columns.len() {
            if let Err(e) = self.columns[done].erase(row) {
                for (column, cell) in self.columns[..done].iter_mut().zip(&removed) {
                    column.insert_cell(row, cell)?;
                }
                return Err(e);
            }
        }
        self.row_count -= 1;
        Ok(())
    }

    /// Overwrites `row` with the last row, then removes the last row.
    pub(crate) fn move_last_over(&mut self, row: usize) -> Result<(), DbError> {
        self.check_row(row)?;
        let last = self.row_count - 1;
        if row == last {
            return self.remove(row);
        }

        let mut overwritten = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            overwritten.push(column.cell(row)?);
        }
        let result = self.copy_row(last, row).and_then(|()| self.remove(last));
        if let Err(e) = result {
            for (column, cell) in self.columns.iter_mut().zip(&overwritten) {
                column.put_cell(row, cell)?;
            }
            return Err(e);
        }
        Ok(())
    }

    /// Removes every row.
    pub(crate) fn clear(&mut self) {
        for column in &mut self.columns {
            column.clear();
        }
        self.row_count = 0;
    }

    fn copy_row(&mut self, from: usize, to: usize) -> Result<(), DbError> {
        for column in &mut self.columns {
            let cell = column.cell(from)?;
            column.put_cell(to, &cell)?;
        }
        Ok(())
    }

    fn check_row(&self, row: usize) -> Result<(), DbError> {
        if row >= self.row_count {
            return Err(DbError::OutOfRange {
                index: row,
                len: self.row_count,
            });
        }
        Ok(())
    }

    fn spec(&self, col: usize) -> Result<&ColumnSpec, DbError> {
        self.specs.get(col).ok_or_else(|| DbError::ColumnNotFound {
            table: self.name.clone(),
            column: format!("#{col}"),
        })
    }

    fn check_type(&self, col: usize, expected: ColumnType) -> Result<(), DbError> {
        let got = self.spec(col)?.ty;
        if got != expected {
            return Err(DbError::TypeMismatch {
                expected: expected.to_string(),
                got: got.to_string(),
            });
        }
        Ok(())
    }

    fn write_value(
        &mut self,
        col: usize,
        ty: ColumnType,
        row: usize,
        value: Value,
    ) -> Result<(), DbError> {
        self.check_type(col, ty)?;
        self.columns[col].put_cell(row, &Cell { value, null: false })
    }

    fn int_column(&self, col: usize, ty: ColumnType) -> Result<&Column, DbError> {
        self.check_type(col, ty)?;
        match &self.columns[col].data {
            ColumnData::Int(column) => Ok(column),
            ColumnData::Bytes(_) => Err(storage_mismatch(&self.specs[col])),
        }
    }

    fn int_column_mut(&mut self, col: usize, ty: ColumnType) -> Result<&mut Column, DbError> {
        self.check_type(col, ty)?;
        match &mut self.columns[col].data {
            ColumnData::Int(column) => Ok(column),
            ColumnData::Bytes(_) => Err(storage_mismatch(&self.specs[col])),
        }
    }

    fn bytes_column(&self, col: usize, ty: ColumnType) -> Result<&StringColumn, DbError> {
        self.check_type(col, ty)?;
        match &self.columns[col].data {
            ColumnData::Bytes(column) => Ok(column),
            ColumnData::Int(_) => Err(storage_mismatch(&self.specs[col])),
        }
    }

    /// Makes the next index update of column `col` fail, for rollback tests.
    #[cfg(test)]
    pub(crate) fn fail_index_updates(&mut self, col: usize) {
        match &mut self.columns[col].data {
            ColumnData::Int(column) => column.fail_index_updates(),
            ColumnData::Bytes(column) => column.fail_index_updates(),
        }
    }
}

fn storage_mismatch(spec: &ColumnSpec) -> DbError {
    DbError::DataCorruption(format!(
        "column '{}' of type {} has the wrong storage",
        spec.name, spec.ty
    ))
}
