//! Adaptive B-tree columns, their secondary index, and string columns.

mod arena;
#[allow(clippy::module_inception)]
mod column;
mod index;
mod node;
mod string_column;

pub use column::Column;
pub use index::ColumnIndex;
pub use string_column::{StringColumn, INLINE_CAPACITY};
