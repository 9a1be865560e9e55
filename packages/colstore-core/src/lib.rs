//! Column storage core for an embedded database.
//!
//! Provides bit-packed leaf arrays, adaptive B-tree columns with an optional
//! secondary index, byte string columns, typed tables with nullable cells
//! and links between tables, and row handles that stay on their row while
//! the table is mutated underneath them.

pub mod column;
pub mod config;
pub mod error;
pub mod group;
pub mod packed;
pub mod row;
pub mod table;

pub use column::{Column, ColumnIndex, StringColumn};
pub use config::StoreConfig;
pub use error::DbError;
pub use group::Group;
pub use row::{ConstRow, HandoverPatch, Row, RowHandle, RowRead};
pub use table::{ColumnSpec, ColumnType, Table, TableKey, TableRef};
