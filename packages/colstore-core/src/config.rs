//! Storage configuration.

use crate::error::DbError;

/// Smallest leaf/inner node capacity that still allows a split into two
/// non-empty halves with room to spare.
pub const MIN_LEAF_SIZE: usize = 4;

/// Storage configuration shared by the columns of a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Maximum number of elements in a leaf, and of children in an inner node
    pub max_leaf_size: usize,
    /// Build a search index for every newly added integer or string column
    pub index_new_columns: bool,
    /// Slots reserved up front in each table's row accessor registry
    pub initial_row_handle_capacity: usize,
}

impl StoreConfig {
    /// Checks that every tunable is within its supported range.
    ///
    /// # Returns
    /// `Result<(), DbError>` with `InvalidConfig` describing the first bad value.
    pub fn validate(&self) -> Result<(), DbError> {
        if self.max_leaf_size < MIN_LEAF_SIZE {
            return Err(DbError::InvalidConfig(format!(
                "max_leaf_size must be at least {}, got {}",
                MIN_LEAF_SIZE, self.max_leaf_size
            )));
        }
        if self.max_leaf_size > u32::MAX as usize {
            return Err(DbError::InvalidConfig(format!(
                "max_leaf_size {} exceeds {}",
                self.max_leaf_size,
                u32::MAX
            )));
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_leaf_size: 1000,
            index_new_columns: false,
            initial_row_handle_capacity: 16,
        }
    }
}
