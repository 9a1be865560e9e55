//! Shared fixtures for integration tests.

use anyhow::Result;

use colstore_core::{ColumnSpec, ColumnType, Group, StoreConfig, TableRef};

pub const ID: usize = 0;
pub const NAME: usize = 1;
pub const ACTIVE: usize = 2;

/// Group whose columns split after four elements, so small tables are multi-level.
pub fn small_group() -> Group {
    Group::with_config(StoreConfig {
        max_leaf_size: 4,
        ..Default::default()
    })
    .expect("valid config")
}

/// Adds a `people` table with `rows` rows; row `i` has id `i` and name `person i`.
pub fn people(group: &Group, rows: usize) -> Result<TableRef> {
    let table = group.add_table(
        "people",
        vec![
            ColumnSpec::new("id", ColumnType::Int),
            ColumnSpec::new("name", ColumnType::String),
            ColumnSpec::new("active", ColumnType::Bool),
        ],
    )?;
    for i in 0..rows {
        let row = table.add_empty_row()?;
        let mut guard = table.write()?;
        guard.set_int(ID, row, i as i64)?;
        guard.set_string(NAME, row, &format!("person {i}"))?;
        guard.set_bool(ACTIVE, row, i % 3 == 0)?;
    }
    Ok(table)
}
