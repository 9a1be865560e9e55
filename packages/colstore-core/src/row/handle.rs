//! Row handles: live references to "the row currently at position i".

use std::sync::{Arc, Weak};

use crate::error::DbError;
use crate::table::{Table, TableRef, TableShared};

use super::handover::HandoverPatch;
use super::registry::SlotKey;

/// Maps a removed-table error to the handle-level error.
fn detached_if_removed(error: DbError) -> DbError {
    match error {
        DbError::TableDetached { .. } => DbError::DetachedRow,
        other => other,
    }
}

/// Handle onto a table row that follows the row through inserts and removals.
///
/// A handle is either detached, or attached to a table through a slot in
/// that table's registry. It becomes detached when its row is removed, when
/// its table is removed from its group or dropped, or on [`detach`].
///
/// [`detach`]: RowHandle::detach
#[derive(Debug, Default)]
pub struct RowHandle {
    table: Weak<TableShared>,
    key: Option<SlotKey>,
}

impl RowHandle {
    /// Creates a handle attached to nothing.
    pub fn detached() -> Self {
        Self::default()
    }

    /// Attaches a detached handle to row `index` of `table`.
    ///
    /// # Returns
    /// `Result<(), DbError>`; `AlreadyAttached` if the handle is attached,
    /// `OutOfRange` if `index` is not a row of `table`.
    pub fn attach(&mut self, table: &TableRef, index: usize) -> Result<(), DbError> {
        if self.is_attached() {
            return Err(DbError::AlreadyAttached);
        }
        self.detach();
        let data = table.read()?;
        self.attach_locked(table, &data, index)
    }

    /// Detaches the handle, then attaches it to row `index` of `table`.
    pub fn reattach(&mut self, table: &TableRef, index: usize) -> Result<(), DbError> {
        self.detach();
        self.attach(table, index)
    }

    /// Detaches the handle. Calling it on a detached handle does nothing.
    pub fn detach(&mut self) {
        if let Some(key) = self.key.take() {
            if let Some(shared) = self.table.upgrade() {
                shared.release_handle(key);
            }
        }
        self.table = Weak::new();
    }

    /// Returns `true` while the handle refers to a row.
    pub fn is_attached(&self) -> bool {
        self.index().is_some()
    }

    /// Returns the table of an attached handle.
    pub fn table(&self) -> Option<TableRef> {
        if !self.is_attached() {
            return None;
        }
        self.table.upgrade().map(TableRef::from_shared)
    }

    /// Returns the current row of an attached handle.
    pub fn index(&self) -> Option<usize> {
        let key = self.key?;
        let shared = self.table.upgrade()?;
        if !shared.is_valid() {
            return None;
        }
        let registry = shared.registry().ok()?;
        registry.resolve(key)
    }

    /// Captures the handle's table key and row for use in another context.
    ///
    /// # Returns
    /// `Result<HandoverPatch, DbError>`; `DetachedRow` on a detached handle.
    pub fn capture(&self) -> Result<HandoverPatch, DbError> {
        let key = self.shared()?.key();
        self.with_row(|_, row| Ok(HandoverPatch::new(key, row)))
    }

    /// Registers this handle on `index` while the caller holds the table lock.
    ///
    /// The handle must be detached.
    pub(crate) fn attach_locked(
        &mut self,
        table: &TableRef,
        data: &Table,
        index: usize,
    ) -> Result<(), DbError> {
        if index >= data.row_count() {
            return Err(DbError::OutOfRange {
                index,
                len: data.row_count(),
            });
        }
        let key = table.shared().registry()?.attach(index)?;
        self.table = table.downgrade();
        self.key = Some(key);
        Ok(())
    }

    /// Runs `read` on the table and current row under the table's read lock.
    pub(crate) fn with_row<R, F>(&self, read: F) -> Result<R, DbError>
    where
        F: FnOnce(&Table, usize) -> Result<R, DbError>,
    {
        let shared = self.shared()?;
        let data = shared.read().map_err(detached_if_removed)?;
        let row = self.resolve_in(&shared)?;
        read(&data, row)
    }

    /// Runs `write` on the table and current row under the table's write lock.
    pub(crate) fn with_row_mut<R, F>(&self, write: F) -> Result<R, DbError>
    where
        F: FnOnce(&mut Table, usize) -> Result<R, DbError>,
    {
        let shared = self.shared()?;
        let mut data = shared.write().map_err(detached_if_removed)?;
        let row = self.resolve_in(&shared)?;
        write(&mut data, row)
    }

    /// Removes the handle's row; the handle ends up detached.
    pub(crate) fn remove_row(&self) -> Result<(), DbError> {
        let shared = self.shared()?;
        let mut data = shared.write().map_err(detached_if_removed)?;
        let row = self.resolve_in(&shared)?;
        shared.remove_row_locked(&mut data, row)
    }

    /// Moves the last row over the handle's row; the handle ends up detached.
    pub(crate) fn move_last_over(&self) -> Result<(), DbError> {
        let shared = self.shared()?;
        let mut data = shared.write().map_err(detached_if_removed)?;
        let row = self.resolve_in(&shared)?;
        shared.move_last_over_locked(&mut data, row)
    }

    /// Points link column `col` of the handle's row at row `target` of the
    /// link's target table.
    pub(crate) fn set_link(&self, col: usize, target: usize) -> Result<(), DbError> {
        let origin = TableRef::from_shared(self.shared()?);
        origin
            .set_link_at(col, target, |shared| self.resolve_in(shared))
            .map_err(detached_if_removed)
    }

    /// Attaches a new handle to the row that link column `col` of this
    /// handle's row points at; `None` for a null link.
    ///
    /// The target table is read-locked before the handle's own table, so the
    /// link cannot be renumbered between reading it and attaching.
    pub(crate) fn follow_link(&self, col: usize) -> Result<Option<RowHandle>, DbError> {
        let origin = TableRef::from_shared(self.shared()?);
        let target = origin.link_target(col).map_err(detached_if_removed)?;
        let target_data = target.read()?;
        let link = if target == origin {
            let row = self.resolve_in(origin.shared())?;
            target_data.get_link(col, row)?
        } else {
            let data = origin.read().map_err(detached_if_removed)?;
            let row = self.resolve_in(origin.shared())?;
            data.get_link(col, row)?
        };
        let Some(link) = link else {
            return Ok(None);
        };
        let mut handle = RowHandle::detached();
        handle.attach_locked(&target, &target_data, link)?;
        Ok(Some(handle))
    }

    fn shared(&self) -> Result<Arc<TableShared>, DbError> {
        if self.key.is_none() {
            return Err(DbError::DetachedRow);
        }
        self.table.upgrade().ok_or(DbError::DetachedRow)
    }

    fn resolve_in(&self, shared: &TableShared) -> Result<usize, DbError> {
        let key = self.key.ok_or(DbError::DetachedRow)?;
        shared.registry()?.resolve(key).ok_or(DbError::DetachedRow)
    }

    fn try_clone(&self) -> Result<Self, DbError> {
        let mut copy = Self::detached();
        let Ok(shared) = self.shared() else {
            return Ok(copy);
        };
        let table = TableRef::from_shared(shared);
        let data = match table.read() {
            Ok(data) => data,
            Err(DbError::TableDetached { .. }) => return Ok(copy),
            Err(e) => return Err(e),
        };
        match self.resolve_in(table.shared()) {
            Ok(row) => copy.attach_locked(&table, &data, row)?,
            Err(DbError::DetachedRow) => {}
            Err(e) => return Err(e),
        }
        Ok(copy)
    }
}

impl Clone for RowHandle {
    /// Creates an independent handle on the same row, with its own registry slot.
    fn clone(&self) -> Self {
        self.try_clone().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "row handle clone left detached");
            Self::detached()
        })
    }
}

impl Drop for RowHandle {
    fn drop(&mut self) {
        self.detach();
    }
}
