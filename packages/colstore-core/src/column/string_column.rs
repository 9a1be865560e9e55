//! Byte string column built from two adaptive columns.
//!
//! Each entry has:
//! - A length in the `lengths` column
//! - A reference in the `refs` column: the bytes themselves for strings of
//!   up to [`INLINE_CAPACITY`] bytes, otherwise a slot in the payload arena

use std::borrow::Cow;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use crate::config::StoreConfig;
use crate::error::DbError;

use super::arena::SlotArena;
use super::column::Column;
use super::index::ColumnIndex;

/// Longest string stored inline in its reference entry.
pub const INLINE_CAPACITY: usize = 8;

/// Ordered sequence of byte strings addressed by position.
///
/// Equal strings at different positions are stored independently.
#[derive(Debug, Clone)]
pub struct StringColumn {
    /// Inline bytes or arena slot of each entry
    refs: Column,
    /// Byte length of each entry
    lengths: Column,
    /// Payloads longer than `INLINE_CAPACITY`
    arena: SlotArena,
    /// Index over content hashes, present only after `build_index`
    index: Option<Box<ColumnIndex>>,
}

fn content_hash(bytes: &[u8]) -> i64 {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish() as i64
}

fn pack_inline(bytes: &[u8]) -> i64 {
    let mut buf = [0u8; INLINE_CAPACITY];
    buf[..bytes.len()].copy_from_slice(bytes);
    i64::from_le_bytes(buf)
}

fn unpack_inline(packed: i64, len: usize) -> Vec<u8> {
    packed.to_le_bytes()[..len].to_vec()
}

fn slot_of(reference: i64) -> Result<usize, DbError> {
    usize::try_from(reference)
        .map_err(|_| DbError::DataCorruption(format!("invalid string slot {reference}")))
}

impl StringColumn {
    /// Creates an empty string column using the default configuration.
    pub fn new() -> Self {
        Self::with_leaf_size(StoreConfig::default().max_leaf_size)
    }

    /// Creates an empty string column sized by `config`.
    pub fn with_config(config: &StoreConfig) -> Result<Self, DbError> {
        config.validate()?;
        Ok(Self::with_leaf_size(config.max_leaf_size))
    }

    pub(crate) fn with_leaf_size(max_leaf_size: usize) -> Self {
        Self {
            refs: Column::with_leaf_size(max_leaf_size),
            lengths: Column::with_leaf_size(max_leaf_size),
            arena: SlotArena::default(),
            index: None,
        }
    }

    /// Returns the number of strings.
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// Returns `true` if the column holds no strings.
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Returns the bytes at `pos`.
    ///
    /// # Returns
    /// `Result<Cow<[u8]>, DbError>`: borrowed for arena strings, owned for
    /// inline ones; `OutOfRange` if `pos >= len()`.
    pub fn get(&self, pos: usize) -> Result<Cow<'_, [u8]>, DbError> {
        let len = self.stored_len(pos)?;
        let reference = self.refs.get(pos)?;
        if len <= INLINE_CAPACITY {
            Ok(Cow::Owned(unpack_inline(reference, len)))
        } else {
            Ok(Cow::Borrowed(self.arena.get(slot_of(reference)?)?))
        }
    }

    /// Byte length of the string at `pos`.
    pub fn len_at(&self, pos: usize) -> Result<usize, DbError> {
        self.stored_len(pos)
    }

    /// Replaces the string at `pos`.
    ///
    /// The new payload is stored before the old one is released, so a failed
    /// allocation leaves the entry unchanged.
    pub fn set(&mut self, pos: usize, bytes: &[u8]) -> Result<(), DbError> {
        let old_len = self.stored_len(pos)?;
        let old_ref = self.refs.get(pos)?;
        let hashes = match &self.index {
            Some(_) => Some((content_hash(&self.get(pos)?), content_hash(bytes))),
            None => None,
        };

        let new_ref = self.store(bytes)?;
        if let Err(e) = self.refs.set(pos, new_ref) {
            self.release(new_ref, bytes.len())?;
            return Err(e);
        }
        if let Err(e) = self.lengths.set(pos, bytes.len() as i64) {
            self.refs.set(pos, old_ref)?;
            self.release(new_ref, bytes.len())?;
            return Err(e);
        }
        if let Some((old_hash, new_hash)) = hashes {
            if let Err(e) = self.update_index(|index| index.on_set(pos, old_hash, new_hash)) {
                self.refs.set(pos, old_ref)?;
                self.lengths.set(pos, old_len as i64)?;
                self.release(new_ref, bytes.len())?;
                self.restore_index();
                return Err(e);
            }
        }
        self.release(old_ref, old_len)
    }

    /// Inserts `bytes` at `pos`, shifting later strings up by one.
    ///
    /// # Returns
    /// `Result<(), DbError>`; `OutOfRange` if `pos > len()`. On any failure
    /// the column is left unchanged.
    pub fn insert(&mut self, pos: usize, bytes: &[u8]) -> Result<(), DbError> {
        if pos > self.len() {
            return Err(DbError::OutOfRange {
                index: pos,
                len: self.len(),
            });
        }
        let reference = self.store(bytes)?;
        if let Err(e) = self.refs.insert(pos, reference) {
            self.release(reference, bytes.len())?;
            return Err(e);
        }
        if let Err(e) = self.lengths.insert(pos, bytes.len() as i64) {
            self.refs.erase(pos)?;
            self.release(reference, bytes.len())?;
            return Err(e);
        }
        if let Err(e) = self.update_index(|index| index.on_insert(pos, content_hash(bytes))) {
            self.lengths.erase(pos)?;
            self.refs.erase(pos)?;
            self.release(reference, bytes.len())?;
            self.restore_index();
            return Err(e);
        }
        Ok(())
    }

    /// Appends `bytes`.
    pub fn push(&mut self, bytes: &[u8]) -> Result<(), DbError> {
        self.insert(self.len(), bytes)
    }

    /// Removes the string at `pos`, shifting later strings down by one.
    ///
    /// The payload is released only once bookkeeping and index agree.
    pub fn erase(&mut self, pos: usize) -> Result<(), DbError> {
        let len = self.stored_len(pos)?;
        let old_hash = match &self.index {
            Some(_) => Some(content_hash(&self.get(pos)?)),
            None => None,
        };
        let reference = self.refs.erase(pos)?;
        if let Err(e) = self.lengths.erase(pos) {
            self.refs.insert(pos, reference)?;
            return Err(e);
        }
        if let Some(old_hash) = old_hash {
            if let Err(e) = self.update_index(|index| index.on_erase(pos, old_hash)) {
                self.lengths.insert(pos, len as i64)?;
                self.refs.insert(pos, reference)?;
                self.restore_index();
                return Err(e);
            }
        }
        self.release(reference, len)
    }

    /// Removes every string and releases all payloads.
    pub fn clear(&mut self) {
        self.refs.clear();
        self.lengths.clear();
        self.arena.clear();
        if let Some(index) = self.index.as_mut() {
            index.clear();
        }
    }

    /// Returns the lowest position holding `bytes`.
    pub fn find(&self, bytes: &[u8]) -> Result<Option<usize>, DbError> {
        self.find_in(bytes, 0, self.len())
    }

    /// Returns the lowest position in `[start, end)` holding `bytes`.
    ///
    /// Candidates come from the hash index when present, otherwise from a
    /// scan of the length column; every candidate is compared byte for byte.
    pub fn find_in(&self, bytes: &[u8], start: usize, end: usize) -> Result<Option<usize>, DbError> {
        if end > self.len() || start > end {
            return Err(DbError::OutOfRange {
                index: end.max(start),
                len: self.len(),
            });
        }
        if let Some(index) = &self.index {
            for pos in index.find_all_in(content_hash(bytes), start, end)? {
                if self.get(pos)?.as_ref() == bytes {
                    return Ok(Some(pos));
                }
            }
            return Ok(None);
        }

        let wanted = bytes.len() as i64;
        let mut from = start;
        while let Some(pos) = self.lengths.find_in(wanted, from, end)? {
            if self.get(pos)?.as_ref() == bytes {
                return Ok(Some(pos));
            }
            from = pos + 1;
        }
        Ok(None)
    }

    /// Returns every position holding `bytes`, ascending.
    pub fn find_all(&self, bytes: &[u8]) -> Result<Vec<usize>, DbError> {
        let candidates = match &self.index {
            Some(index) => index.find_all_in(content_hash(bytes), 0, self.len())?,
            None => self.lengths.find_all(bytes.len() as i64)?,
        };
        let mut found = Vec::new();
        for pos in candidates {
            if self.get(pos)?.as_ref() == bytes {
                found.push(pos);
            }
        }
        Ok(found)
    }

    /// Builds (or rebuilds) the hash index from the current contents.
    pub fn build_index(&mut self) -> Result<(), DbError> {
        let mut hashes = Vec::with_capacity(self.len());
        for pos in 0..self.len() {
            hashes.push(content_hash(&self.get(pos)?));
        }
        let index = ColumnIndex::build(hashes, self.refs.max_leaf_size())?;
        tracing::debug!(entries = index.len(), "built string column index");
        self.index = Some(Box::new(index));
        Ok(())
    }

    /// Discards the hash index.
    pub fn clear_index(&mut self) {
        if self.index.take().is_some() {
            tracing::debug!("cleared string column index");
        }
    }

    /// Returns `true` if a hash index is present.
    pub fn has_index(&self) -> bool {
        self.index.is_some()
    }

    /// Copies all strings into owned vectors.
    pub fn to_vec(&self) -> Result<Vec<Vec<u8>>, DbError> {
        (0..self.len())
            .map(|pos| self.get(pos).map(Cow::into_owned))
            .collect()
    }

    /// Bytes used by bookkeeping columns and arena payloads.
    pub fn byte_size(&self) -> usize {
        self.refs.byte_size() + self.lengths.byte_size() + self.arena.byte_size()
    }

    /// Checks bookkeeping, slot ownership and the index.
    pub fn verify(&self) -> Result<(), DbError> {
        self.refs.verify()?;
        self.lengths.verify()?;
        if self.refs.len() != self.lengths.len() {
            return Err(DbError::DataCorruption(format!(
                "string column has {} references for {} lengths",
                self.refs.len(),
                self.lengths.len()
            )));
        }

        let mut slots = HashSet::new();
        for pos in 0..self.len() {
            let len = self.stored_len(pos)?;
            if len <= INLINE_CAPACITY {
                continue;
            }
            let slot = slot_of(self.refs.get(pos)?)?;
            if !slots.insert(slot) {
                return Err(DbError::DataCorruption(format!(
                    "string slot {slot} shared by several entries"
                )));
            }
            if self.arena.get(slot)?.len() != len {
                return Err(DbError::DataCorruption(format!(
                    "string at {pos} has a payload of the wrong length"
                )));
            }
        }
        if slots.len() != self.arena.live() {
            return Err(DbError::DataCorruption(format!(
                "{} live string slots for {} long strings",
                self.arena.live(),
                slots.len()
            )));
        }

        if let Some(index) = &self.index {
            index.verify_keys(self.len(), |pos| Ok(content_hash(&self.get(pos)?)))?;
        }
        Ok(())
    }

    fn stored_len(&self, pos: usize) -> Result<usize, DbError> {
        let len = self.lengths.get(pos)?;
        usize::try_from(len)
            .map_err(|_| DbError::DataCorruption(format!("negative string length at {pos}")))
    }

    /// Stores `bytes` and returns the reference entry for them.
    fn store(&mut self, bytes: &[u8]) -> Result<i64, DbError> {
        if bytes.len() <= INLINE_CAPACITY {
            return Ok(pack_inline(bytes));
        }
        let slot = self.arena.alloc(bytes)?;
        i64::try_from(slot).map_err(|_| DbError::CapacityOverflow {
            operation: "string slot numbering",
        })
    }

    fn release(&mut self, reference: i64, len: usize) -> Result<(), DbError> {
        if len <= INLINE_CAPACITY {
            return Ok(());
        }
        self.arena.free(slot_of(reference)?)
    }

    fn update_index<F>(&mut self, update: F) -> Result<(), DbError>
    where
        F: FnOnce(&mut ColumnIndex) -> Result<(), DbError>,
    {
        match self.index.as_mut() {
            Some(index) => update(index),
            None => Ok(()),
        }
    }

    /// Rebuilds the hash index after a failed update was rolled back.
    fn restore_index(&mut self) {
        if self.index.is_none() {
            return;
        }
        if let Err(e) = self.build_index() {
            tracing::warn!(error = %e, "dropping string column index that could not be rebuilt");
            self.index = None;
        }
    }

    /// Makes the next index update fail, for rollback tests.
    #[cfg(test)]
    pub(crate) fn fail_index_updates(&mut self) {
        if let Some(index) = self.index.as_mut() {
            index.fail_updates();
        }
    }
}

impl Default for StringColumn {
    fn default() -> Self {
        Self::new()
    }
}
