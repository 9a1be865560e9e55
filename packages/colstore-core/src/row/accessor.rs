//! Read-only and read-write row views.

use std::ops::{Deref, DerefMut};

use crate::error::DbError;
use crate::table::ColumnType;

use super::handle::RowHandle;

/// Cell reads shared by [`Row`] and [`ConstRow`].
///
/// Every method fails with `DetachedRow` when the underlying handle is not
/// attached, and with the table's own errors for a bad column or type.
pub trait RowRead {
    /// Underlying handle.
    fn handle(&self) -> &RowHandle;

    /// Integer in column `col`.
    fn get_int(&self, col: usize) -> Result<i64, DbError> {
        self.handle().with_row(|table, row| table.get_int(col, row))
    }

    /// Flag in column `col`.
    fn get_bool(&self, col: usize) -> Result<bool, DbError> {
        self.handle().with_row(|table, row| table.get_bool(col, row))
    }

    /// Single-precision float in column `col`.
    fn get_float(&self, col: usize) -> Result<f32, DbError> {
        self.handle().with_row(|table, row| table.get_float(col, row))
    }

    /// Double-precision float in column `col`.
    fn get_double(&self, col: usize) -> Result<f64, DbError> {
        self.handle().with_row(|table, row| table.get_double(col, row))
    }

    /// Timestamp, in seconds since the Unix epoch, in column `col`.
    fn get_datetime(&self, col: usize) -> Result<i64, DbError> {
        self.handle().with_row(|table, row| table.get_datetime(col, row))
    }

    /// String in column `col`; `DataCorruption` if the bytes are not UTF-8.
    fn get_string(&self, col: usize) -> Result<String, DbError> {
        self.handle().with_row(|table, row| table.get_string(col, row))
    }

    /// Copy of the bytes in column `col`.
    fn get_binary(&self, col: usize) -> Result<Vec<u8>, DbError> {
        self.handle().with_row(|table, row| table.get_binary(col, row))
    }

    /// Target row of the link in column `col`, `None` for a null link.
    fn get_link(&self, col: usize) -> Result<Option<usize>, DbError> {
        self.handle().with_row(|table, row| table.get_link(col, row))
    }

    /// `true` if the link in column `col` is null.
    fn is_null_link(&self, col: usize) -> Result<bool, DbError> {
        self.handle().with_row(|table, row| table.is_null_link(col, row))
    }

    /// `true` if the cell in column `col` is null.
    fn is_null(&self, col: usize) -> Result<bool, DbError> {
        self.handle().with_row(|table, row| table.is_null(col, row))
    }

    /// Number of columns in the row's table.
    fn column_count(&self) -> Result<usize, DbError> {
        self.handle().with_row(|table, _| Ok(table.column_count()))
    }

    /// Name of column `col`.
    fn column_name(&self, col: usize) -> Result<String, DbError> {
        self.handle()
            .with_row(|table, _| table.column_name(col).map(str::to_string))
    }

    /// Position of the column called `name`.
    fn column_index(&self, name: &str) -> Result<usize, DbError> {
        self.handle().with_row(|table, _| table.column_index(name))
    }

    /// Type of column `col`.
    fn column_type(&self, col: usize) -> Result<ColumnType, DbError> {
        self.handle().with_row(|table, _| table.column_type(col))
    }
}

/// Read-write view of one table row.
///
/// Dereferences to its [`RowHandle`] for attachment queries and changes.
#[derive(Debug, Clone, Default)]
pub struct Row {
    handle: RowHandle,
}

impl Row {
    /// Creates a detached row view.
    pub fn detached() -> Self {
        Self::default()
    }

    pub(crate) fn from_handle(handle: RowHandle) -> Self {
        Self { handle }
    }

    /// Writes an integer into column `col`.
    ///
    /// # Returns
    /// `Result<(), DbError>`; `DetachedRow` if the row is gone,
    /// `TypeMismatch` if the column is not `Int`.
    pub fn set_int(&self, col: usize, value: i64) -> Result<(), DbError> {
        self.handle
            .with_row_mut(|table, row| table.set_int(col, row, value))
    }

    /// Writes a flag into column `col`.
    pub fn set_bool(&self, col: usize, value: bool) -> Result<(), DbError> {
        self.handle
            .with_row_mut(|table, row| table.set_bool(col, row, value))
    }

    /// Writes a single-precision float into column `col`.
    pub fn set_float(&self, col: usize, value: f32) -> Result<(), DbError> {
        self.handle
            .with_row_mut(|table, row| table.set_float(col, row, value))
    }

    /// Writes a double-precision float into column `col`.
    pub fn set_double(&self, col: usize, value: f64) -> Result<(), DbError> {
        self.handle
            .with_row_mut(|table, row| table.set_double(col, row, value))
    }

    /// Writes a timestamp, in seconds since the Unix epoch, into column `col`.
    pub fn set_datetime(&self, col: usize, value: i64) -> Result<(), DbError> {
        self.handle
            .with_row_mut(|table, row| table.set_datetime(col, row, value))
    }

    /// Writes a string into column `col`.
    pub fn set_string(&self, col: usize, value: &str) -> Result<(), DbError> {
        self.handle
            .with_row_mut(|table, row| table.set_string(col, row, value))
    }

    /// Writes bytes into column `col`.
    pub fn set_binary(&self, col: usize, value: &[u8]) -> Result<(), DbError> {
        self.handle
            .with_row_mut(|table, row| table.set_binary(col, row, value))
    }

    /// Makes the cell in column `col` null; `ColumnNotNullable` unless the
    /// column is nullable or a link.
    pub fn set_null(&self, col: usize) -> Result<(), DbError> {
        self.handle
            .with_row_mut(|table, row| table.set_null(col, row))
    }

    /// Points the link in column `col` at row `target` of the link's target
    /// table; `LinkOutOfRange` if there is no such row.
    pub fn set_link(&self, col: usize, target: usize) -> Result<(), DbError> {
        self.handle.set_link(col, target)
    }

    /// Sets the link in column `col` to null.
    pub fn nullify_link(&self, col: usize) -> Result<(), DbError> {
        self.handle
            .with_row_mut(|table, row| table.nullify_link(col, row))
    }

    /// Returns a view of the row the link in column `col` points at, or
    /// `None` for a null link.
    pub fn follow_link(&self, col: usize) -> Result<Option<Row>, DbError> {
        Ok(self.handle.follow_link(col)?.map(Row::from_handle))
    }

    /// Removes this row from its table; this view is detached afterwards.
    pub fn remove(&self) -> Result<(), DbError> {
        self.handle.remove_row()
    }

    /// Moves the table's last row over this one; this view is detached afterwards.
    pub fn move_last_over(&self) -> Result<(), DbError> {
        self.handle.move_last_over()
    }

    /// Returns a read-only view of the same row with its own registry slot.
    pub fn to_const(&self) -> ConstRow {
        ConstRow::from_handle(self.handle.clone())
    }
}

impl RowRead for Row {
    fn handle(&self) -> &RowHandle {
        &self.handle
    }
}

impl Deref for Row {
    type Target = RowHandle;

    fn deref(&self) -> &RowHandle {
        &self.handle
    }
}

impl DerefMut for Row {
    fn deref_mut(&mut self) -> &mut RowHandle {
        &mut self.handle
    }
}

/// Read-only view of one table row.
#[derive(Debug, Clone, Default)]
pub struct ConstRow {
    handle: RowHandle,
}

impl ConstRow {
    /// Creates a detached read-only row view.
    pub fn detached() -> Self {
        Self::default()
    }

    pub(crate) fn from_handle(handle: RowHandle) -> Self {
        Self { handle }
    }

    /// Returns a read-only view of the row the link in column `col` points
    /// at, or `None` for a null link.
    pub fn follow_link(&self, col: usize) -> Result<Option<ConstRow>, DbError> {
        Ok(self.handle.follow_link(col)?.map(ConstRow::from_handle))
    }
}

impl RowRead for ConstRow {
    fn handle(&self) -> &RowHandle {
        &self.handle
    }
}

impl Deref for ConstRow {
    type Target = RowHandle;

    fn deref(&self) -> &RowHandle {
        &self.handle
    }
}

impl DerefMut for ConstRow {
    fn deref_mut(&mut self) -> &mut RowHandle {
        &mut self.handle
    }
}

impl From<Row> for ConstRow {
    fn from(row: Row) -> Self {
        Self { handle: row.handle }
    }
}
