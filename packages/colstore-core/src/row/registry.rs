//! Per-table registry of live row handles.
//!
//! Handles live in numbered slots. A used-bitmap marks occupied slots, freed
//! slots are recycled through a free list, and every slot carries a
//! generation so that a handle whose slot was released and reused can tell
//! it no longer owns it.

use crate::error::DbError;

/// Registry entry owned by one row handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SlotKey {
    slot: usize,
    generation: u64,
}

/// Row positions of all attached handles of one table.
#[derive(Debug, Default)]
pub(crate) struct RowRegistry {
    /// Row index held by each slot; meaningful only for used slots
    rows: Vec<usize>,
    /// Generation of each slot, bumped on release
    generations: Vec<u64>,
    /// One bit per slot, set while the slot is attached
    used: Vec<u64>,
    /// Released slots available for reuse
    free: Vec<usize>,
    /// Number of used slots
    live: usize,
}

fn alloc_error<E>(_: E) -> DbError {
    DbError::CapacityOverflow {
        operation: "row handle registration",
    }
}

impl RowRegistry {
    /// Creates a registry with room for `capacity` handles.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            generations: Vec::with_capacity(capacity),
            used: Vec::with_capacity(capacity.div_ceil(64)),
            free: Vec::with_capacity(capacity),
            live: 0,
        }
    }

    /// Number of attached handles.
    pub(crate) fn len(&self) -> usize {
        self.live
    }

    /// Registers a handle on `row` and returns its key.
    pub(crate) fn attach(&mut self, row: usize) -> Result<SlotKey, DbError> {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                let slot = self.rows.len();
                self.rows.try_reserve(1).map_err(alloc_error)?;
                self.generations.try_reserve(1).map_err(alloc_error)?;
                self.free.try_reserve(slot + 1).map_err(alloc_error)?;
                if slot / 64 >= self.used.len() {
                    self.used.try_reserve(1).map_err(alloc_error)?;
                    self.used.push(0);
                }
                self.rows.push(0);
                self.generations.push(0);
                slot
            }
        };
        self.rows[slot] = row;
        self.used[slot / 64] |= 1 << (slot % 64);
        self.live += 1;
        Ok(SlotKey {
            slot,
            generation: self.generations[slot],
        })
    }

    /// Releases the slot of `key`; a stale key is ignored.
    pub(crate) fn release(&mut self, key: SlotKey) {
        if self.owns(key) {
            self.free_slot(key.slot);
        }
    }

    /// Returns the row of `key`, or `None` if its handle has been detached.
    pub(crate) fn resolve(&self, key: SlotKey) -> Option<usize> {
        self.owns(key).then(|| self.rows[key.slot])
    }

    /// A row was inserted at `ndx`: handles at or after it move up by one.
    pub(crate) fn on_insert(&mut self, ndx: usize) {
        for slot in self.used_slots() {
            if self.rows[slot] >= ndx {
                self.rows[slot] += 1;
            }
        }
    }

    /// Row `ndx` was removed: its handles detach, later handles move down.
    ///
    /// Returns the number of detached handles.
    pub(crate) fn on_remove(&mut self, ndx: usize) -> usize {
        let mut detached = 0;
        for slot in self.used_slots() {
            let row = self.rows[slot];
            if row == ndx {
                self.free_slot(slot);
                detached += 1;
            } else if row > ndx {
                self.rows[slot] = row - 1;
            }
        }
        detached
    }

    /// Row `last` was moved over row `ndx`: handles on `ndx` detach,
    /// handles on `last` now point at `ndx`.
    ///
    /// Returns the number of detached handles.
    pub(crate) fn on_move_last_over(&mut self, ndx: usize, last: usize) -> usize {
        let mut detached = 0;
        for slot in self.used_slots() {
            let row = self.rows[slot];
            if row == ndx {
                self.free_slot(slot);
                detached += 1;
            } else if row == last {
                self.rows[slot] = ndx;
            }
        }
        detached
    }

    /// Detaches every handle; returns how many were attached.
    pub(crate) fn detach_all(&mut self) -> usize {
        let detached = self.live;
        for slot in self.used_slots() {
            self.free_slot(slot);
        }
        detached
    }

    fn owns(&self, key: SlotKey) -> bool {
        key.slot < self.rows.len()
            && self.is_used(key.slot)
            && self.generations[key.slot] == key.generation
    }

    fn is_used(&self, slot: usize) -> bool {
        self.used[slot / 64] & (1 << (slot % 64)) != 0
    }

    fn free_slot(&mut self, slot: usize) {
        self.used[slot / 64] &= !(1 << (slot % 64));
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        // free list capacity covers every slot, reserved in `attach`
        self.free.push(slot);
        self.live -= 1;
    }

    /// Used slots, ascending, collected from the bitmap.
    fn used_slots(&self) -> Vec<usize> {
        let mut slots = Vec::with_capacity(self.live);
        for (word_ndx, &word) in self.used.iter().enumerate() {
            let mut bits = word;
            while bits != 0 {
                let bit = bits.trailing_zeros() as usize;
                slots.push(word_ndx * 64 + bit);
                bits &= bits - 1;
            }
        }
        slots
    }
}
