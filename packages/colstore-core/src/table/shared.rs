//! Shared, lock-protected tables and their row handle registries.
//!
//! Link columns tie tables together: a structural change to a table also
//! renumbers, or nullifies, the links other tables hold into it. Tables are
//! locked in ascending key order; a link target is always created before the
//! tables linking to it, so it always has the lower key.

use std::cmp::Ordering as RowOrdering;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use crate::config::StoreConfig;
use crate::error::DbError;
use crate::row::{ConstRow, Row, RowHandle, RowRegistry, SlotKey};

use super::column_spec::ColumnType;
use super::table::{Table, TableKey};

static NEXT_TABLE_KEY: AtomicU64 = AtomicU64::new(1);

/// Hands out a table key never used before in this process.
pub(crate) fn next_table_key() -> TableKey {
    TableKey(NEXT_TABLE_KEY.fetch_add(1, Ordering::Relaxed))
}

/// Other table a link column points into.
#[derive(Debug)]
struct LinkTarget {
    col: usize,
    name: String,
    table: Weak<TableShared>,
}

/// Link column of another table pointing into this one.
#[derive(Debug)]
struct LinkOrigin {
    col: usize,
    table: Weak<TableShared>,
}

/// Write-locked tables whose links point into one table, plus that
/// table's own self-link columns.
struct IncomingLinks<'a> {
    self_cols: Vec<usize>,
    origins: Vec<(RwLockWriteGuard<'a, Table>, &'a [usize])>,
}

impl<'a> IncomingLinks<'a> {
    fn lock(
        table: &Table,
        sources: &'a [(Arc<TableShared>, Vec<usize>)],
    ) -> Result<Self, DbError> {
        let mut origins = Vec::with_capacity(sources.len());
        for (origin, cols) in sources {
            let data = origin.data.write().map_err(|_| DbError::LockPoisoned)?;
            origins.push((data, cols.as_slice()));
        }
        Ok(Self {
            self_cols: table.link_columns_into(table.name()),
            origins,
        })
    }

    /// Rewrites every incoming link through `map`.
    fn remap<F>(&mut self, table: &mut Table, map: F) -> Result<(), DbError>
    where
        F: Fn(usize) -> Option<usize> + Copy,
    {
        for &col in &self.self_cols {
            table.remap_links(col, map)?;
        }
        for (origin, cols) in &mut self.origins {
            for &col in cols.iter() {
                origin.remap_links(col, map)?;
            }
        }
        Ok(())
    }
}

/// Table data and registry behind a [`TableRef`].
///
/// Lock order is always `data` before `rows`. Handles take `rows` alone to
/// read their position or release their slot.
#[derive(Debug)]
pub(crate) struct TableShared {
    key: TableKey,
    name: String,
    data: RwLock<Table>,
    rows: Mutex<RowRegistry>,
    /// Link columns into other tables; fixed at creation
    targets: Vec<LinkTarget>,
    /// Link columns of other tables into this one
    origins: Mutex<Vec<LinkOrigin>>,
    /// Cleared when the table leaves its group
    valid: AtomicBool,
}

impl TableShared {
    pub(crate) fn key(&self) -> TableKey {
        self.key
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub(crate) fn read(&self) -> Result<RwLockReadGuard<'_, Table>, DbError> {
        self.check_valid()?;
        self.data.read().map_err(|_| DbError::LockPoisoned)
    }

    pub(crate) fn write(&self) -> Result<RwLockWriteGuard<'_, Table>, DbError> {
        self.check_valid()?;
        self.data.write().map_err(|_| DbError::LockPoisoned)
    }

    pub(crate) fn registry(&self) -> Result<MutexGuard<'_, RowRegistry>, DbError> {
        self.rows.lock().map_err(|_| DbError::LockPoisoned)
    }

    /// Releases a handle's slot, even from a poisoned registry.
    pub(crate) fn release_handle(&self, key: SlotKey) {
        let mut rows = self
            .rows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        rows.release(key);
    }

    /// Inserts a default row at `ndx` and shifts handles and links at or after it.
    pub(crate) fn insert_row_locked(&self, table: &mut Table, ndx: usize) -> Result<(), DbError> {
        if ndx > table.row_count() {
            return Err(DbError::OutOfRange {
                index: ndx,
                len: table.row_count(),
            });
        }
        let sources = self.link_sources()?;
        let mut incoming = IncomingLinks::lock(table, &sources)?;
        incoming.remap(table, |r| Some(if r >= ndx { r + 1 } else { r }))?;
        if let Err(e) = table.insert_empty_row(ndx) {
            incoming.remap(table, |r| Some(if r > ndx { r - 1 } else { r }))?;
            return Err(e);
        }
        self.registry()?.on_insert(ndx);
        Ok(())
    }

    /// Removes row `ndx`, detaching its handles, nullifying links to it and
    /// renumbering later ones.
    pub(crate) fn remove_row_locked(&self, table: &mut Table, ndx: usize) -> Result<(), DbError> {
        let sources = self.link_sources()?;
        let mut incoming = IncomingLinks::lock(table, &sources)?;
        table.remove(ndx)?;
        incoming.remap(table, |r| match r.cmp(&ndx) {
            RowOrdering::Less => Some(r),
            RowOrdering::Equal => None,
            RowOrdering::Greater => Some(r - 1),
        })?;
        let detached = self.registry()?.on_remove(ndx);
        tracing::trace!(table = %self.name, row = ndx, detached, "removed row");
        Ok(())
    }

    /// Moves the last row over `ndx`, detaching handles on `ndx` and
    /// repointing handles on the last row.
    pub(crate) fn move_last_over_locked(
        &self,
        table: &mut Table,
        ndx: usize,
    ) -> Result<(), DbError> {
        let last = table.row_count().saturating_sub(1);
        let sources = self.link_sources()?;
        let mut incoming = IncomingLinks::lock(table, &sources)?;
        table.move_last_over(ndx)?;
        incoming.remap(table, |r| {
            if r == ndx {
                None
            } else if r == last {
                Some(ndx)
            } else {
                Some(r)
            }
        })?;
        let detached = self.registry()?.on_move_last_over(ndx, last);
        tracing::trace!(table = %self.name, row = ndx, last, detached, "moved last row over");
        Ok(())
    }

    /// Removes every row, nullifying every link into the table.
    pub(crate) fn clear_locked(&self, table: &mut Table) -> Result<(), DbError> {
        let sources = self.link_sources()?;
        let mut incoming = IncomingLinks::lock(table, &sources)?;
        table.clear();
        incoming.remap(table, |_| None)?;
        let detached = self.registry()?.detach_all();
        tracing::debug!(table = %self.name, detached, "cleared table");
        Ok(())
    }

    /// Records that link column `col` of `origin` points into this table.
    fn register_origin(&self, origin: &Arc<TableShared>, col: usize) {
        let mut origins = self
            .origins
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        origins.push(LinkOrigin {
            col,
            table: Arc::downgrade(origin),
        });
    }

    /// Name of a table in the group that still links into this one.
    pub(crate) fn linking_table(&self) -> Result<Option<String>, DbError> {
        let origins = self.origins.lock().map_err(|_| DbError::LockPoisoned)?;
        Ok(origins
            .iter()
            .filter_map(|origin| origin.table.upgrade())
            .find(|origin| origin.is_valid())
            .map(|origin| origin.name.clone()))
    }

    /// Live tables linking into this one with their link columns, in key order.
    ///
    /// Origins that were dropped or removed from the group are forgotten.
    fn link_sources(&self) -> Result<Vec<(Arc<TableShared>, Vec<usize>)>, DbError> {
        let mut origins = self.origins.lock().map_err(|_| DbError::LockPoisoned)?;
        origins.retain(|origin| {
            origin
                .table
                .upgrade()
                .is_some_and(|table| table.is_valid())
        });
        let mut sources: Vec<(Arc<TableShared>, Vec<usize>)> = Vec::new();
        for origin in origins.iter() {
            let Some(table) = origin.table.upgrade() else {
                continue;
            };
            match sources.iter_mut().find(|(t, _)| Arc::ptr_eq(t, &table)) {
                Some((_, cols)) => cols.push(origin.col),
                None => sources.push((table, vec![origin.col])),
            }
        }
        sources.sort_by_key(|(table, _)| table.key);
        Ok(sources)
    }

    /// Marks the table as removed and detaches every handle.
    pub(crate) fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
        let detached = self
            .rows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .detach_all();
        tracing::debug!(table = %self.name, key = %self.key, detached, "table invalidated");
    }

    fn check_valid(&self) -> Result<(), DbError> {
        if !self.is_valid() {
            return Err(DbError::TableDetached {
                table: self.name.clone(),
            });
        }
        Ok(())
    }
}

impl Drop for TableShared {
    fn drop(&mut self) {
        let rows = match self.rows.get_mut() {
            Ok(rows) => rows,
            Err(poisoned) => poisoned.into_inner(),
        };
        let detached = rows.detach_all();
        if detached > 0 {
            tracing::debug!(table = %self.name, detached, "detached row handles on table drop");
        }
    }
}

/// Shared reference to a table inside a group.
///
/// Cloning is cheap; all clones see the same data. Structural changes made
/// through a `TableRef` keep every live row handle on the right row.
#[derive(Debug, Clone)]
pub struct TableRef {
    shared: Arc<TableShared>,
}

impl TableRef {
    /// Wraps `table` and registers it as an origin with every table its
    /// link columns point into.
    ///
    /// # Arguments
    /// * `key` - Fresh table key
    /// * `table` - Table data
    /// * `targets` - Link column and target table, for links to other tables
    /// * `config` - Registry sizing
    pub(crate) fn new(
        key: TableKey,
        table: Table,
        targets: Vec<(usize, TableRef)>,
        config: &StoreConfig,
    ) -> Self {
        let name = table.name().to_string();
        let links = targets
            .iter()
            .map(|(col, target)| LinkTarget {
                col: *col,
                name: target.name().to_string(),
                table: target.downgrade(),
            })
            .collect();
        let shared = Arc::new(TableShared {
            key,
            name,
            data: RwLock::new(table),
            rows: Mutex::new(RowRegistry::with_capacity(config.initial_row_handle_capacity)),
            targets: links,
            origins: Mutex::new(Vec::new()),
            valid: AtomicBool::new(true),
        });
        for (col, target) in &targets {
            target.shared.register_origin(&shared, *col);
        }
        Self { shared }
    }

    pub(crate) fn from_shared(shared: Arc<TableShared>) -> Self {
        Self { shared }
    }

    pub(crate) fn shared(&self) -> &Arc<TableShared> {
        &self.shared
    }

    pub(crate) fn downgrade(&self) -> Weak<TableShared> {
        Arc::downgrade(&self.shared)
    }

    /// Returns the table's key.
    pub fn key(&self) -> TableKey {
        self.shared.key
    }

    /// Returns the table's name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Returns `false` once the table has been removed from its group.
    pub fn is_valid(&self) -> bool {
        self.shared.is_valid()
    }

    /// Locks the table for reading.
    ///
    /// The lock is a `std::sync::RwLock` and is not re-entrant: calling any
    /// [`Row`] or `TableRef` row operation on this table from the thread
    /// holding the guard deadlocks. So does a structural change to a table
    /// this one links into, which write-locks this table to fix up links.
    ///
    /// # Returns
    /// `Result<RwLockReadGuard<Table>, DbError>`; `TableDetached` if the
    /// table was removed from its group.
    pub fn read(&self) -> Result<RwLockReadGuard<'_, Table>, DbError> {
        self.shared.read()
    }

    /// Locks the table for cell writes and index changes.
    ///
    /// Not re-entrant: while the guard is held, calling any [`Row`] or
    /// `TableRef` row operation on this table from the same thread
    /// deadlocks, as does a structural change to a table this one links
    /// into. Drop the guard first.
    pub fn write(&self) -> Result<RwLockWriteGuard<'_, Table>, DbError> {
        self.shared.write()
    }

    /// Returns the number of rows.
    pub fn row_count(&self) -> Result<usize, DbError> {
        Ok(self.read()?.row_count())
    }

    /// Returns a read-write accessor attached to row `index`.
    pub fn row(&self, index: usize) -> Result<Row, DbError> {
        Ok(Row::from_handle(self.attach_handle(Some(index))?))
    }

    /// Returns a read-only accessor attached to row `index`.
    pub fn const_row(&self, index: usize) -> Result<ConstRow, DbError> {
        Ok(ConstRow::from_handle(self.attach_handle(Some(index))?))
    }

    /// Returns an accessor on the first row.
    pub fn front(&self) -> Result<Row, DbError> {
        self.row(0)
    }

    /// Returns an accessor on the last row.
    pub fn back(&self) -> Result<Row, DbError> {
        Ok(Row::from_handle(self.attach_handle(None)?))
    }

    /// Inserts a row of default values at `ndx`.
    ///
    /// Handles on rows at or after `ndx` move up by one.
    pub fn insert_empty_row(&self, ndx: usize) -> Result<(), DbError> {
        let mut table = self.write()?;
        self.shared.insert_row_locked(&mut table, ndx)
    }

    /// Appends a row of default values and returns its position.
    pub fn add_empty_row(&self) -> Result<usize, DbError> {
        let mut table = self.write()?;
        let ndx = table.row_count();
        self.shared.insert_row_locked(&mut table, ndx)?;
        Ok(ndx)
    }

    /// Removes row `ndx`.
    ///
    /// Handles on `ndx` are detached; handles on later rows move down by one.
    pub fn remove(&self, ndx: usize) -> Result<(), DbError> {
        let mut table = self.write()?;
        self.shared.remove_row_locked(&mut table, ndx)
    }

    /// Replaces row `ndx` with the last row and shrinks the table by one.
    ///
    /// Handles on `ndx` are detached; handles on the last row follow it to `ndx`.
    pub fn move_last_over(&self, ndx: usize) -> Result<(), DbError> {
        let mut table = self.write()?;
        self.shared.move_last_over_locked(&mut table, ndx)
    }

    /// Removes every row and detaches every handle.
    ///
    /// Links from other tables into this one become null.
    pub fn clear(&self) -> Result<(), DbError> {
        let mut table = self.write()?;
        self.shared.clear_locked(&mut table)
    }

    /// Returns the table that link column `col` points into.
    ///
    /// # Returns
    /// `Result<TableRef, DbError>`; `TypeMismatch` if `col` is not a link
    /// column, `TableDetached` if the target left the group.
    pub fn link_target(&self, col: usize) -> Result<TableRef, DbError> {
        if let Some(link) = self.shared.targets.iter().find(|link| link.col == col) {
            return link
                .table
                .upgrade()
                .filter(|target| target.is_valid())
                .map(TableRef::from_shared)
                .ok_or_else(|| DbError::TableDetached {
                    table: link.name.clone(),
                });
        }
        let table = self.read()?;
        match table.link_target(col)? {
            Some(_) => Ok(self.clone()),
            None => Err(DbError::TypeMismatch {
                expected: ColumnType::Link.to_string(),
                got: table.column_type(col)?.to_string(),
            }),
        }
    }

    /// Points the link in column `col` at `row` to row `target` of the
    /// link's target table.
    ///
    /// # Returns
    /// `Result<(), DbError>`; `LinkOutOfRange` if `target` is not a row of
    /// the target table.
    pub fn set_link(&self, col: usize, row: usize, target: usize) -> Result<(), DbError> {
        self.set_link_at(col, target, |_| Ok(row))
    }

    /// Sets a link on the row `locate` finds once both tables are locked.
    ///
    /// The target is read-locked before this table is write-locked, so the
    /// target cannot shrink under the range check.
    pub(crate) fn set_link_at<F>(&self, col: usize, target: usize, locate: F) -> Result<(), DbError>
    where
        F: FnOnce(&TableShared) -> Result<usize, DbError>,
    {
        let target_table = self.link_target(col)?;
        if target_table == *self {
            let mut table = self.write()?;
            let row = locate(self.shared.as_ref())?;
            let len = table.row_count();
            return table.set_link(col, row, target, len);
        }
        let target_data = target_table.read()?;
        let mut table = self.write()?;
        let row = locate(self.shared.as_ref())?;
        table.set_link(col, row, target, target_data.row_count())
    }

    /// Number of row handles currently attached to this table.
    pub fn live_row_handles(&self) -> Result<usize, DbError> {
        Ok(self.shared.registry()?.len())
    }

    pub(crate) fn invalidate(&self) {
        self.shared.invalidate();
    }

    /// Attaches a fresh handle to `index`, or to the last row for `None`.
    fn attach_handle(&self, index: Option<usize>) -> Result<RowHandle, DbError> {
        let table = self.read()?;
        let index = match index {
            Some(index) => index,
            None => table.row_count().checked_sub(1).ok_or(DbError::OutOfRange {
                index: 0,
                len: 0,
            })?,
        };
        let mut handle = RowHandle::detached();
        handle.attach_locked(self, &table, index)?;
        Ok(handle)
    }
}

impl PartialEq for TableRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for TableRef {}
