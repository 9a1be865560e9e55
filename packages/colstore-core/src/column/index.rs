//! Secondary index over a column.
//!
//! Entries are `(value, row)` pairs kept sorted ascending in two parallel
//! adaptive columns, so every value maps to its rows in ascending order and
//! the first match for a value is also its lowest row.

use crate::error::DbError;

use super::column::Column;

/// Sorted `(value, row)` index maintained alongside an indexed column.
#[derive(Debug, Clone)]
pub struct ColumnIndex {
    /// Indexed values, ascending
    values: Column,
    /// Row of each entry; ascending within equal values
    rows: Column,
    #[cfg(test)]
    fail_updates: bool,
}

impl ColumnIndex {
    pub(crate) fn new(max_leaf_size: usize) -> Self {
        Self {
            values: Column::with_leaf_size(max_leaf_size),
            rows: Column::with_leaf_size(max_leaf_size),
            #[cfg(test)]
            fail_updates: false,
        }
    }

    /// Builds an index over `keys`, where the n-th key belongs to row n.
    pub(crate) fn build<I>(keys: I, max_leaf_size: usize) -> Result<Self, DbError>
    where
        I: IntoIterator<Item = i64>,
    {
        let mut entries: Vec<(i64, usize)> = keys
            .into_iter()
            .enumerate()
            .map(|(row, value)| (value, row))
            .collect();
        entries.sort_unstable();

        let mut index = Self::new(max_leaf_size);
        for (value, row) in entries {
            index.values.push(value)?;
            index.rows.push(row as i64)?;
        }
        Ok(index)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the index has no entries.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the lowest row in `[start, end)` whose value equals `value`.
    pub fn find_first(&self, value: i64, start: usize, end: usize) -> Result<Option<usize>, DbError> {
        let ndx = self.lower_bound(value, start)?;
        if ndx < self.len() {
            let (found, row) = self.entry(ndx)?;
            if found == value && row < end {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    /// Returns all rows in `[start, end)` whose value equals `value`, ascending.
    pub fn find_all_in(&self, value: i64, start: usize, end: usize) -> Result<Vec<usize>, DbError> {
        let mut rows = Vec::new();
        let mut ndx = self.lower_bound(value, start)?;
        while ndx < self.len() {
            let (found, row) = self.entry(ndx)?;
            if found != value || row >= end {
                break;
            }
            rows.push(row);
            ndx += 1;
        }
        Ok(rows)
    }

    /// Number of rows holding `value`.
    pub fn count(&self, value: i64) -> Result<usize, DbError> {
        Ok(self.find_all_in(value, 0, usize::MAX)?.len())
    }

    /// Distinct indexed values, ascending.
    pub fn distinct_values(&self) -> Vec<i64> {
        let mut values: Vec<i64> = self.values.iter().collect();
        values.dedup();
        values
    }

    /// Iterates over `(value, row)` entries in index order.
    pub fn entries(&self) -> impl Iterator<Item = (i64, usize)> + '_ {
        self.values
            .iter()
            .zip(self.rows.iter().map(|row| row as usize))
    }

    pub(crate) fn on_insert(&mut self, row: usize, value: i64) -> Result<(), DbError> {
        self.check_update()?;
        let first = row as i64;
        self.rows
            .remap_values(|r| if r >= first { r + 1 } else { r })?;
        self.insert_entry(value, row)
    }

    pub(crate) fn on_erase(&mut self, row: usize, value: i64) -> Result<(), DbError> {
        self.check_update()?;
        self.remove_entry(value, row)?;
        let removed = row as i64;
        self.rows
            .remap_values(|r| if r > removed { r - 1 } else { r })
    }

    pub(crate) fn on_set(&mut self, row: usize, old: i64, new: i64) -> Result<(), DbError> {
        self.check_update()?;
        if old == new {
            return Ok(());
        }
        self.remove_entry(old, row)?;
        self.insert_entry(new, row)
    }

    pub(crate) fn clear(&mut self) {
        self.values.clear();
        self.rows.clear();
    }

    /// Checks that the index holds exactly one sorted entry per row of `column`.
    pub(crate) fn verify_against(&self, column: &Column) -> Result<(), DbError> {
        self.verify_keys(column.len(), |row| column.get(row))
    }

    /// Checks the index against `len` rows whose keys are produced by `key_of`.
    pub(crate) fn verify_keys<F>(&self, len: usize, key_of: F) -> Result<(), DbError>
    where
        F: Fn(usize) -> Result<i64, DbError>,
    {
        if self.len() != len || self.rows.len() != self.values.len() {
            return Err(DbError::DataCorruption(format!(
                "index has {} entries for {} rows",
                self.len(),
                len
            )));
        }
        let mut previous: Option<(i64, usize)> = None;
        for (value, row) in self.entries() {
            if previous.is_some_and(|p| p >= (value, row)) {
                return Err(DbError::DataCorruption(
                    "index entries out of order".to_string(),
                ));
            }
            if row >= len || key_of(row)? != value {
                return Err(DbError::DataCorruption(format!(
                    "index maps value {value} to row {row} holding another value"
                )));
            }
            previous = Some((value, row));
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn fail_updates(&mut self) {
        self.fail_updates = true;
    }

    #[cfg(test)]
    fn check_update(&self) -> Result<(), DbError> {
        if self.fail_updates {
            return Err(DbError::CapacityOverflow {
                operation: "index update",
            });
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn check_update(&self) -> Result<(), DbError> {
        Ok(())
    }

    fn entry(&self, ndx: usize) -> Result<(i64, usize), DbError> {
        Ok((self.values.get(ndx)?, self.rows.get(ndx)? as usize))
    }

    /// First entry position not less than `(value, row)`.
    fn lower_bound(&self, value: i64, row: usize) -> Result<usize, DbError> {
        let (mut lo, mut hi) = (0, self.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.entry(mid)? < (value, row) {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    fn insert_entry(&mut self, value: i64, row: usize) -> Result<(), DbError> {
        let ndx = self.lower_bound(value, row)?;
        self.values.insert(ndx, value)?;
        if let Err(e) = self.rows.insert(ndx, row as i64) {
            self.values.erase(ndx)?;
            return Err(e);
        }
        Ok(())
    }

    fn remove_entry(&mut self, value: i64, row: usize) -> Result<(), DbError> {
        let ndx = self.lower_bound(value, row)?;
        if ndx >= self.len() || self.entry(ndx)? != (value, row) {
            return Err(DbError::DataCorruption(format!(
                "index has no entry for value {value} at row {row}"
            )));
        }
        self.values.erase(ndx)?;
        self.rows.erase(ndx)?;
        Ok(())
    }
}
