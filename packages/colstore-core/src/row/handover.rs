//! Moving row identities between execution contexts.

use serde::{Deserialize, Serialize};

use crate::error::DbError;
use crate::group::Group;
use crate::table::TableKey;

use super::accessor::{ConstRow, Row};

/// Table key and row index captured from a row handle.
///
/// A patch is plain data: it can be sent to another thread or serialized,
/// and applied against a [`Group`] to get a freshly attached row view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandoverPatch {
    table: TableKey,
    row: usize,
}

impl HandoverPatch {
    pub(crate) fn new(table: TableKey, row: usize) -> Self {
        Self { table, row }
    }

    /// Key of the captured table.
    pub fn table(&self) -> TableKey {
        self.table
    }

    /// Row index at capture time.
    pub fn row(&self) -> usize {
        self.row
    }

    /// Resolves the patch in `group` as a read-write row.
    ///
    /// # Returns
    /// `Result<Row, DbError>`; `UnresolvedHandover` if the group has no table
    /// with the captured key or the table has no such row.
    pub fn apply(&self, group: &Group) -> Result<Row, DbError> {
        let table = group
            .get_table_by_key(self.table)
            .map_err(|e| self.unresolved(e))?;
        table.row(self.row).map_err(|e| self.unresolved(e))
    }

    /// Resolves the patch in `group` as a read-only row.
    pub fn apply_const(&self, group: &Group) -> Result<ConstRow, DbError> {
        let table = group
            .get_table_by_key(self.table)
            .map_err(|e| self.unresolved(e))?;
        table.const_row(self.row).map_err(|e| self.unresolved(e))
    }

    /// Serializes the patch to JSON.
    pub fn to_json(&self) -> Result<String, DbError> {
        serde_json::to_string(self).map_err(|e| DbError::SerializationError(e.to_string()))
    }

    /// Parses a patch produced by [`to_json`](Self::to_json).
    pub fn from_json(json: &str) -> Result<Self, DbError> {
        serde_json::from_str(json).map_err(|e| DbError::SerializationError(e.to_string()))
    }

    fn unresolved(&self, error: DbError) -> DbError {
        match error {
            DbError::TableNotFound { .. }
            | DbError::TableDetached { .. }
            | DbError::OutOfRange { .. } => DbError::UnresolvedHandover {
                table: self.table.0,
                row: self.row,
            },
            other => other,
        }
    }
}
