//! Column definitions within a table schema.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical type of a table column.
///
/// `String` and `Binary` are stored in string columns; every other type is
/// stored in an adaptive integer column:
/// - `Float` and `Double` as their IEEE-754 bit patterns
/// - `DateTime` as seconds since the Unix epoch
/// - `Link` as the target row plus one, with 0 meaning a null link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int,
    Bool,
    Float,
    Double,
    String,
    Binary,
    DateTime,
    Link,
}

impl ColumnType {
    /// Returns the lowercase type name.
    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Int => "int",
            ColumnType::Bool => "bool",
            ColumnType::Float => "float",
            ColumnType::Double => "double",
            ColumnType::String => "string",
            ColumnType::Binary => "binary",
            ColumnType::DateTime => "datetime",
            ColumnType::Link => "link",
        }
    }

    /// Returns `true` for types backed by a string column.
    pub fn is_bytes(self) -> bool {
        matches!(self, ColumnType::String | ColumnType::Binary)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Column definition within a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name, unique within its table
    pub name: String,
    /// Logical type
    #[serde(rename = "type")]
    pub ty: ColumnType,
    /// Build a search index when the table is created
    #[serde(default)]
    pub indexed: bool,
    /// Cells may be null; new rows start out null
    #[serde(default, skip_serializing_if = "is_false")]
    pub nullable: bool,
    /// Name of the table a `Link` column points into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_target: Option<String>,
}

impl ColumnSpec {
    /// Creates an unindexed, non-nullable column definition.
    ///
    /// # Arguments
    /// * `name` - Column name
    /// * `ty` - Logical type
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            indexed: false,
            nullable: false,
            link_target: None,
        }
    }

    /// Creates a link column pointing at rows of `target`.
    ///
    /// The target is another table of the same group, or the table itself.
    pub fn link(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            link_target: Some(target.into()),
            ..Self::new(name, ColumnType::Link)
        }
    }

    /// Marks the column for indexing at table creation.
    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Allows null cells in the column.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}
