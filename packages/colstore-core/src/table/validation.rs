//! Validation of table names and column schemas.

use std::collections::HashSet;

use super::column_spec::{ColumnSpec, ColumnType};
use crate::error::DbError;

/// Validates that a table name is usable.
///
/// # Arguments
/// * `name` - Table name
///
/// # Returns
/// `Result<(), DbError>` with `InvalidConfig` for an empty or padded name.
pub(crate) fn validate_table_name(name: &str) -> Result<(), DbError> {
    if name.is_empty() {
        return Err(DbError::InvalidConfig("table name is empty".to_string()));
    }
    if name.trim() != name {
        return Err(DbError::InvalidConfig(format!(
            "table name '{name}' has leading or trailing whitespace"
        )));
    }
    Ok(())
}

/// Validates that column names are non-empty and unique, and that link
/// settings are consistent.
///
/// # Arguments
/// * `table` - Owning table name, for error context
/// * `columns` - Column definitions to validate
///
/// # Returns
/// `Result<(), DbError>`; `ColumnAlreadyExists` names the first duplicate,
/// `InvalidConfig` reports a link column without target, a target on any
/// other column, or an indexed link column.
pub(crate) fn validate_columns(table: &str, columns: &[ColumnSpec]) -> Result<(), DbError> {
    let mut seen = HashSet::new();
    for column in columns {
        if column.name.is_empty() {
            return Err(DbError::InvalidConfig(format!(
                "table '{table}' has a column with an empty name"
            )));
        }
        if !seen.insert(column.name.as_str()) {
            return Err(DbError::ColumnAlreadyExists {
                table: table.to_string(),
                column: column.name.clone(),
            });
        }
        validate_link(table, column)?;
    }
    Ok(())
}

fn validate_link(table: &str, column: &ColumnSpec) -> Result<(), DbError> {
    let is_link = column.ty == ColumnType::Link;
    match &column.link_target {
        None if is_link => Err(DbError::InvalidConfig(format!(
            "link column '{}' of table '{table}' has no target table",
            column.name
        ))),
        Some(target) if !is_link => Err(DbError::InvalidConfig(format!(
            "column '{}' of table '{table}' is {} but names link target '{target}'",
            column.name, column.ty
        ))),
        _ if is_link && column.indexed => Err(DbError::InvalidConfig(format!(
            "link column '{}' of table '{table}' cannot be indexed",
            column.name
        ))),
        _ => Ok(()),
    }
}
