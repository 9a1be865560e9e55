//! Storage error types.

use thiserror::Error;

/// Column, table and row accessor errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DbError {
    /// Position outside the valid range of a column or table
    #[error("Index {index} out of range (len: {len})")]
    OutOfRange { index: usize, len: usize },

    /// Operation on a row accessor that is not attached to any row
    #[error("Row accessor is detached")]
    DetachedRow,

    /// Attach called on a row accessor that is already attached
    #[error("Row accessor is already attached")]
    AlreadyAttached,

    /// Handover patch does not resolve in the target group
    #[error("Handover of row {row} in table #{table} could not be resolved")]
    UnresolvedHandover { table: u64, row: usize },

    /// Allocation or size calculation overflow
    #[error("Capacity overflow during {operation}")]
    CapacityOverflow { operation: &'static str },

    /// Type mismatch error
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    /// Table not found
    #[error("Table '{table}' not found")]
    TableNotFound { table: String },

    /// Table already exists
    #[error("Table '{0}' already exists")]
    TableAlreadyExists(String),

    /// Table was removed from its group while a reference was still held
    #[error("Table '{table}' is no longer part of a group")]
    TableDetached { table: String },

    /// Column not found in table
    #[error("Column '{column}' not found in table '{table}'")]
    ColumnNotFound { table: String, column: String },

    /// Column already exists in table
    #[error("Column '{column}' already exists in table '{table}'")]
    ColumnAlreadyExists { table: String, column: String },

    /// Null written to a column that does not allow nulls
    #[error("Column '{column}' of table '{table}' is not nullable")]
    ColumnNotNullable { table: String, column: String },

    /// Link target row outside the target table
    #[error("Link to row {row} of table '{table}' out of range (len: {len})")]
    LinkOutOfRange { table: String, row: usize, len: usize },

    /// Table still targeted by link columns of other tables
    #[error("Table '{table}' is the link target of table '{origin}'")]
    LinkTargetInUse { table: String, origin: String },

    /// Rejected configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Structural invariant violated
    #[error("Data corruption detected: {0}")]
    DataCorruption(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Lock poisoned (RwLock or Mutex poisoned)
    #[error("Lock poisoned")]
    LockPoisoned,
}
