//! Slot storage for string payloads too long to inline.

use crate::error::DbError;

/// Individually allocated byte strings addressed by slot number.
///
/// Freed slots are reused; a slot's bytes never move while it is live.
#[derive(Debug, Clone, Default)]
pub(crate) struct SlotArena {
    slots: Vec<Option<Box<[u8]>>>,
    free: Vec<usize>,
    live: usize,
}

impl SlotArena {
    /// Stores a copy of `bytes` and returns its slot.
    pub(crate) fn alloc(&mut self, bytes: &[u8]) -> Result<usize, DbError> {
        let mut payload = Vec::new();
        payload
            .try_reserve_exact(bytes.len())
            .map_err(|_| DbError::CapacityOverflow {
                operation: "string payload allocation",
            })?;
        payload.extend_from_slice(bytes);

        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(payload.into_boxed_slice());
                slot
            }
            None => {
                self.slots
                    .try_reserve(1)
                    .and_then(|_| self.free.try_reserve(self.slots.len() + 1))
                    .map_err(|_| DbError::CapacityOverflow {
                        operation: "string slot allocation",
                    })?;
                self.slots.push(Some(payload.into_boxed_slice()));
                self.slots.len() - 1
            }
        };
        self.live += 1;
        Ok(slot)
    }

    /// Returns the bytes stored in `slot`.
    pub(crate) fn get(&self, slot: usize) -> Result<&[u8], DbError> {
        self.slots
            .get(slot)
            .and_then(|s| s.as_deref())
            .ok_or_else(|| DbError::DataCorruption(format!("string slot {slot} is not live")))
    }

    /// Releases `slot` for reuse.
    pub(crate) fn free(&mut self, slot: usize) -> Result<(), DbError> {
        match self.slots.get_mut(slot) {
            Some(entry) if entry.is_some() => {
                *entry = None;
                // capacity for every slot was reserved in `alloc`
                self.free.push(slot);
                self.live -= 1;
                Ok(())
            }
            _ => Err(DbError::DataCorruption(format!(
                "double free of string slot {slot}"
            ))),
        }
    }

    /// Number of live slots.
    pub(crate) fn live(&self) -> usize {
        self.live
    }

    /// Bytes held by live payloads.
    pub(crate) fn byte_size(&self) -> usize {
        self.slots.iter().flatten().map(|s| s.len()).sum()
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.live = 0;
    }
}
