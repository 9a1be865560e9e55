//! Bit-packed integer arrays used as B-tree leaves and inner-node offsets.
//!
//! A `PackedArray` stores every element at one shared bit width, the
//! narrowest of 0, 1, 2, 4, 8, 16, 32 or 64 bits that fits all current
//! values. Sub-byte widths hold non-negative values only; byte widths are
//! signed little-endian. Writing a value that needs more bits re-encodes
//! the whole array at the wider width without changing any logical value.

use crate::error::DbError;

/// Widths a packed array can take, in ascending order.
pub const WIDTHS: [u8; 8] = [0, 1, 2, 4, 8, 16, 32, 64];

/// Returns the narrowest supported bit width able to hold `value`.
pub fn bit_width(value: i64) -> u8 {
    if value >= 0 {
        match value {
            0 => 0,
            1 => 1,
            2..=3 => 2,
            4..=15 => 4,
            16..=0x7F => 8,
            0x80..=0x7FFF => 16,
            0x8000..=0x7FFF_FFFF => 32,
            _ => 64,
        }
    } else if value >= i8::MIN as i64 {
        8
    } else if value >= i16::MIN as i64 {
        16
    } else if value >= i32::MIN as i64 {
        32
    } else {
        64
    }
}

/// Number of bytes needed for `len` elements of `width` bits.
fn bytes_for(len: usize, width: u8) -> Result<usize, DbError> {
    let bits = len
        .checked_mul(width as usize)
        .ok_or(DbError::CapacityOverflow {
            operation: "packed array size calculation",
        })?;
    Ok(bits.div_ceil(8))
}

fn read(data: &[u8], width: u8, ndx: usize) -> i64 {
    match width {
        0 => 0,
        1 | 2 | 4 => {
            let bit = ndx * width as usize;
            let mask = (1u8 << width) - 1;
            ((data[bit / 8] >> (bit % 8)) & mask) as i64
        }
        8 => data[ndx] as i8 as i64,
        16 => {
            let o = ndx * 2;
            i16::from_le_bytes([data[o], data[o + 1]]) as i64
        }
        32 => {
            let o = ndx * 4;
            let mut b = [0u8; 4];
            b.copy_from_slice(&data[o..o + 4]);
            i32::from_le_bytes(b) as i64
        }
        _ => {
            let o = ndx * 8;
            let mut b = [0u8; 8];
            b.copy_from_slice(&data[o..o + 8]);
            i64::from_le_bytes(b)
        }
    }
}

fn write(data: &mut [u8], width: u8, ndx: usize, value: i64) {
    match width {
        0 => {}
        1 | 2 | 4 => {
            let bit = ndx * width as usize;
            let shift = bit % 8;
            let mask = ((1u8 << width) - 1) << shift;
            let byte = &mut data[bit / 8];
            *byte = (*byte & !mask) | (((value as u8) << shift) & mask);
        }
        8 => data[ndx] = value as i8 as u8,
        16 => {
            let o = ndx * 2;
            data[o..o + 2].copy_from_slice(&(value as i16).to_le_bytes());
        }
        32 => {
            let o = ndx * 4;
            data[o..o + 4].copy_from_slice(&(value as i32).to_le_bytes());
        }
        _ => {
            let o = ndx * 8;
            data[o..o + 8].copy_from_slice(&value.to_le_bytes());
        }
    }
}

/// Allocates a zeroed byte vector, reporting allocation failure instead of aborting.
fn alloc_bytes(bytes: usize, operation: &'static str) -> Result<Vec<u8>, DbError> {
    let mut data = Vec::new();
    data.try_reserve_exact(bytes)
        .map_err(|_| DbError::CapacityOverflow { operation })?;
    data.resize(bytes, 0);
    Ok(data)
}

/// Contiguous block of integers packed at a shared bit width.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedArray {
    /// Packed element bytes; at least `bytes_for(len, width)` long
    data: Vec<u8>,
    /// Number of elements
    len: usize,
    /// Current element width in bits
    width: u8,
}

impl PackedArray {
    /// Creates an empty array of width 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty array with room for `capacity` elements of `width` bits.
    ///
    /// # Returns
    /// `Result<PackedArray, DbError>`; `CapacityOverflow` if the allocation fails.
    pub fn with_capacity(capacity: usize, width: u8) -> Result<Self, DbError> {
        let mut array = Self::new();
        array.reserve(capacity, width)?;
        Ok(array)
    }

    /// Builds an array holding `values` in order.
    pub fn from_values(values: &[i64]) -> Result<Self, DbError> {
        let width = values.iter().map(|&v| bit_width(v)).max().unwrap_or(0);
        let mut array = PackedArray {
            data: alloc_bytes(bytes_for(values.len(), width)?, "packed array build")?,
            len: values.len(),
            width,
        };
        for (ndx, &value) in values.iter().enumerate() {
            write(&mut array.data, width, ndx, value);
        }
        Ok(array)
    }

    /// Ensures room for `capacity` elements and a width of at least `width` bits.
    ///
    /// Widening re-encodes existing elements. Fails with `CapacityOverflow`
    /// before touching the array when the allocation cannot be satisfied.
    pub fn reserve(&mut self, capacity: usize, width: u8) -> Result<(), DbError> {
        let width = WIDTHS
            .iter()
            .copied()
            .find(|&w| w >= width.max(self.width))
            .ok_or(DbError::CapacityOverflow {
                operation: "packed array width selection",
            })?;
        let needed = bytes_for(capacity.max(self.len), width)?;
        if width > self.width {
            self.upgrade(width, needed)?;
        }
        if needed > self.data.capacity() {
            self.data
                .try_reserve_exact(needed - self.data.len())
                .map_err(|_| DbError::CapacityOverflow {
                    operation: "packed array reserve",
                })?;
        }
        Ok(())
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the array holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the current element width in bits.
    pub fn width(&self) -> u8 {
        self.width
    }

    /// Returns the number of bytes used by packed elements.
    pub fn byte_size(&self) -> usize {
        self.data.len()
    }

    /// Returns the element at `ndx`.
    ///
    /// # Panics
    /// Panics if `ndx >= len()`.
    pub fn get(&self, ndx: usize) -> i64 {
        assert!(ndx < self.len, "packed array index {ndx} out of range");
        read(&self.data, self.width, ndx)
    }

    /// Returns the last element, if any.
    pub fn last(&self) -> Option<i64> {
        self.len.checked_sub(1).map(|ndx| self.get(ndx))
    }

    /// Overwrites the element at `ndx`, widening the array if needed.
    pub fn set(&mut self, ndx: usize, value: i64) -> Result<(), DbError> {
        self.check_index(ndx, self.len)?;
        self.ensure_width(bit_width(value))?;
        write(&mut self.data, self.width, ndx, value);
        Ok(())
    }

    /// Inserts `value` at `ndx`, shifting later elements up by one.
    pub fn insert(&mut self, ndx: usize, value: i64) -> Result<(), DbError> {
        self.check_index(ndx, self.len + 1)?;
        self.ensure_width(bit_width(value))?;
        self.grow_to(self.len + 1)?;

        let width = self.width;
        if width >= 8 {
            let w = width as usize / 8;
            self.data.copy_within(ndx * w..self.len * w, (ndx + 1) * w);
        } else {
            for i in (ndx..self.len).rev() {
                let moved = read(&self.data, width, i);
                write(&mut self.data, width, i + 1, moved);
            }
        }
        write(&mut self.data, width, ndx, value);
        self.len += 1;
        Ok(())
    }

    /// Appends `value`.
    pub fn push(&mut self, value: i64) -> Result<(), DbError> {
        self.insert(self.len, value)
    }

    /// Removes the element at `ndx`, shifting later elements down by one.
    pub fn erase(&mut self, ndx: usize) -> Result<(), DbError> {
        self.check_index(ndx, self.len)?;
        let width = self.width;
        if width >= 8 {
            let w = width as usize / 8;
            self.data.copy_within((ndx + 1) * w..self.len * w, ndx * w);
        } else {
            for i in ndx + 1..self.len {
                let moved = read(&self.data, width, i);
                write(&mut self.data, width, i - 1, moved);
            }
        }
        self.len -= 1;
        self.data.truncate(bytes_for(self.len, width)?);
        Ok(())
    }

    /// Shortens the array to `len` elements; no effect if already shorter.
    pub fn truncate(&mut self, len: usize) {
        if len < self.len {
            self.len = len;
            let bytes = (len * self.width as usize).div_ceil(8);
            self.data.truncate(bytes);
        }
    }

    /// Removes all elements and resets the width to 0.
    pub fn clear(&mut self) {
        self.data.clear();
        self.len = 0;
        self.width = 0;
    }

    /// Returns the first position in `[start, end)` holding `value`.
    pub fn find(&self, value: i64, start: usize, end: usize) -> Option<usize> {
        let end = end.min(self.len);
        if start >= end || bit_width(value) > self.width {
            return None;
        }
        (start..end).find(|&i| read(&self.data, self.width, i) == value)
    }

    /// Returns the first position whose element is greater than `value`.
    ///
    /// Requires the array to be sorted in ascending order.
    pub fn upper_bound(&self, value: i64) -> usize {
        let (mut lo, mut hi) = (0, self.len);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if read(&self.data, self.width, mid) <= value {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Adds `delta` to every element from `start` to the end.
    pub fn adjust_from(&mut self, start: usize, delta: i64) -> Result<(), DbError> {
        for i in start..self.len {
            let value = read(&self.data, self.width, i)
                .checked_add(delta)
                .ok_or(DbError::CapacityOverflow {
                    operation: "packed array adjustment",
                })?;
            self.set(i, value)?;
        }
        Ok(())
    }

    /// Iterates over all elements in order.
    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        (0..self.len).map(move |i| read(&self.data, self.width, i))
    }

    fn check_index(&self, ndx: usize, bound: usize) -> Result<(), DbError> {
        if ndx >= bound {
            return Err(DbError::OutOfRange {
                index: ndx,
                len: self.len,
            });
        }
        Ok(())
    }

    fn ensure_width(&mut self, width: u8) -> Result<(), DbError> {
        if width > self.width {
            let bytes = bytes_for(self.len, width)?;
            self.upgrade(width, bytes)?;
        }
        Ok(())
    }

    fn grow_to(&mut self, len: usize) -> Result<(), DbError> {
        let bytes = bytes_for(len, self.width)?;
        if bytes > self.data.len() {
            self.data
                .try_reserve(bytes - self.data.len())
                .map_err(|_| DbError::CapacityOverflow {
                    operation: "packed array growth",
                })?;
            self.data.resize(bytes, 0);
        }
        Ok(())
    }

    /// Re-encodes every element at `width`; the new block is allocated first.
    fn upgrade(&mut self, width: u8, capacity_bytes: usize) -> Result<(), DbError> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity_bytes.max(bytes_for(self.len, width)?))
            .map_err(|_| DbError::CapacityOverflow {
                operation: "packed array width upgrade",
            })?;
        data.resize(bytes_for(self.len, width)?, 0);
        for i in 0..self.len {
            write(&mut data, width, i, read(&self.data, self.width, i));
        }
        self.data = data;
        self.width = width;
        Ok(())
    }
}
