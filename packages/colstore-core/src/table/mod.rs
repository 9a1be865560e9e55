//! Table schema, column storage, and shared table references.

mod column_spec;
mod shared;
#[allow(clippy::module_inception)]
mod table;
pub(crate) mod validation;

pub use column_spec::{ColumnSpec, ColumnType};
pub use shared::TableRef;
pub(crate) use shared::{next_table_key, TableShared};
pub use table::{Table, TableKey};

#[cfg(test)]
mod tests {
    include!("tests.rs");
}
