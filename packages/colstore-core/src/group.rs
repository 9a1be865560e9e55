//! Group container owning a set of named tables.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::config::StoreConfig;
use crate::error::DbError;
use crate::table::{next_table_key, ColumnSpec, Table, TableKey, TableRef};

/// Group of tables, and the context in which handover patches are resolved.
///
/// Dropping a group, or removing a table from it, detaches every row handle
/// of the affected tables.
#[derive(Debug)]
pub struct Group {
    /// Configuration applied to every table created in this group
    config: StoreConfig,
    /// Map of table name to table reference
    tables: RwLock<HashMap<String, TableRef>>,
}

impl Group {
    /// Creates an empty group with the default configuration.
    pub fn new() -> Self {
        Self {
            config: StoreConfig::default(),
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Creates an empty group with the given configuration.
    ///
    /// # Returns
    /// `Result<Group, DbError>`; `InvalidConfig` if the configuration is rejected.
    pub fn with_config(config: StoreConfig) -> Result<Self, DbError> {
        config.validate()?;
        Ok(Self {
            config,
            tables: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the group configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Creates a new table with the given name and columns.
    ///
    /// Link columns must point at the new table itself or at a table
    /// already in the group.
    ///
    /// # Arguments
    /// * `name` - Table name, unique within the group
    /// * `columns` - Column definitions
    ///
    /// # Returns
    /// `Result<TableRef, DbError>` referring to the new table; `TableNotFound`
    /// for a link to an unknown table.
    pub fn add_table(&self, name: &str, columns: Vec<ColumnSpec>) -> Result<TableRef, DbError> {
        let mut tables = self.tables.write().map_err(|_| DbError::LockPoisoned)?;
        if tables.contains_key(name) {
            return Err(DbError::TableAlreadyExists(name.to_string()));
        }
        let table = Table::create(name, columns, &self.config)?;

        let mut targets = Vec::new();
        for (col, spec) in table.columns().iter().enumerate() {
            let Some(target) = spec.link_target.as_deref() else {
                continue;
            };
            if target == name {
                continue;
            }
            let target = tables.get(target).ok_or_else(|| DbError::TableNotFound {
                table: target.to_string(),
            })?;
            targets.push((col, target.clone()));
        }

        let table = TableRef::new(next_table_key(), table, targets, &self.config);
        tracing::debug!(table = name, key = %table.key(), "added table");
        tables.insert(name.to_string(), table.clone());
        Ok(table)
    }

    /// Gets a table by name.
    ///
    /// # Returns
    /// `Result<TableRef, DbError>`; `TableNotFound` if no table has that name.
    pub fn get_table(&self, name: &str) -> Result<TableRef, DbError> {
        let tables = self.tables.read().map_err(|_| DbError::LockPoisoned)?;
        tables.get(name).cloned().ok_or_else(|| DbError::TableNotFound {
            table: name.to_string(),
        })
    }

    /// Gets a table by key.
    pub fn get_table_by_key(&self, key: TableKey) -> Result<TableRef, DbError> {
        let tables = self.tables.read().map_err(|_| DbError::LockPoisoned)?;
        tables
            .values()
            .find(|table| table.key() == key)
            .cloned()
            .ok_or_else(|| DbError::TableNotFound {
                table: key.to_string(),
            })
    }

    /// Returns `true` if the group has a table called `name`.
    pub fn has_table(&self, name: &str) -> Result<bool, DbError> {
        let tables = self.tables.read().map_err(|_| DbError::LockPoisoned)?;
        Ok(tables.contains_key(name))
    }

    /// Removes a table from the group.
    ///
    /// Outstanding [`TableRef`]s to it report `TableDetached` afterwards and
    /// all its row handles are detached.
    ///
    /// # Returns
    /// `Result<(), DbError>`; `LinkTargetInUse` while another table of the
    /// group has link columns pointing into it.
    pub fn remove_table(&self, name: &str) -> Result<(), DbError> {
        let table = {
            let mut tables = self.tables.write().map_err(|_| DbError::LockPoisoned)?;
            let table = tables.get(name).ok_or_else(|| DbError::TableNotFound {
                table: name.to_string(),
            })?;
            if let Some(origin) = table.shared().linking_table()? {
                return Err(DbError::LinkTargetInUse {
                    table: name.to_string(),
                    origin,
                });
            }
            tables.remove(name).ok_or_else(|| DbError::TableNotFound {
                table: name.to_string(),
            })?
        };
        table.invalidate();
        Ok(())
    }

    /// Names of all tables, sorted.
    pub fn table_names(&self) -> Result<Vec<String>, DbError> {
        let tables = self.tables.read().map_err(|_| DbError::LockPoisoned)?;
        let mut names: Vec<String> = tables.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Number of tables.
    pub fn table_count(&self) -> Result<usize, DbError> {
        let tables = self.tables.read().map_err(|_| DbError::LockPoisoned)?;
        Ok(tables.len())
    }
}

impl Default for Group {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Group {
    fn drop(&mut self) {
        let tables = match self.tables.get_mut() {
            Ok(tables) => tables,
            Err(poisoned) => poisoned.into_inner(),
        };
        for table in tables.values() {
            table.invalidate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnType;
    use ntest::timeout;

    fn specs() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new("id", ColumnType::Int),
            ColumnSpec::new("name", ColumnType::String),
        ]
    }

    #[timeout(1000)]
    #[test]
    fn test_add_and_get_table() {
        let group = Group::new();
        let table = group.add_table("people", specs()).unwrap();
        assert_eq!(group.get_table("people").unwrap(), table);
        assert_eq!(group.get_table_by_key(table.key()).unwrap(), table);
        assert!(group.has_table("people").unwrap());
        assert_eq!(group.table_count().unwrap(), 1);
    }

    #[timeout(1000)]
    #[test]
    fn test_duplicate_table_rejected() {
        let group = Group::new();
        group.add_table("people", specs()).unwrap();
        assert!(matches!(
            group.add_table("people", vec![]),
            Err(DbError::TableAlreadyExists(name)) if name == "people"
        ));
    }

    #[timeout(1000)]
    #[test]
    fn test_table_keys_are_never_reused() {
        let group = Group::new();
        let first = group.add_table("a", vec![]).unwrap().key();
        group.remove_table("a").unwrap();
        let second = group.add_table("a", vec![]).unwrap().key();
        assert_ne!(first, second);
        assert!(matches!(
            group.get_table_by_key(first),
            Err(DbError::TableNotFound { .. })
        ));
    }

    #[timeout(1000)]
    #[test]
    fn test_remove_table_invalidates_references() {
        let group = Group::new();
        let table = group.add_table("people", specs()).unwrap();
        table.add_empty_row().unwrap();
        let row = table.row(0).unwrap();

        group.remove_table("people").unwrap();
        assert!(!table.is_valid());
        assert!(!row.is_attached());
        assert!(matches!(table.read(), Err(DbError::TableDetached { .. })));
        assert!(matches!(
            group.remove_table("people"),
            Err(DbError::TableNotFound { .. })
        ));
    }

    #[timeout(1000)]
    #[test]
    fn test_drop_group_detaches_rows() {
        let group = Group::new();
        let table = group.add_table("people", specs()).unwrap();
        table.add_empty_row().unwrap();
        let row = table.row(0).unwrap();
        drop(group);
        assert!(!row.is_attached());
        assert!(!table.is_valid());
    }

    #[timeout(1000)]
    #[test]
    fn test_link_to_unknown_table_rejected() {
        let group = Group::new();
        let result = group.add_table("orders", vec![ColumnSpec::link("buyer", "people")]);
        assert!(matches!(
            result,
            Err(DbError::TableNotFound { table }) if table == "people"
        ));
        assert!(!group.has_table("orders").unwrap());

        group
            .add_table("tree", vec![ColumnSpec::link("parent", "tree")])
            .unwrap();
    }

    #[timeout(1000)]
    #[test]
    fn test_link_target_cannot_be_removed_while_linked() {
        let group = Group::new();
        let people = group.add_table("people", specs()).unwrap();
        let orders = group
            .add_table("orders", vec![ColumnSpec::link("buyer", "people")])
            .unwrap();
        assert_eq!(orders.link_target(0).unwrap(), people);

        assert!(matches!(
            group.remove_table("people"),
            Err(DbError::LinkTargetInUse { table, origin }) if table == "people" && origin == "orders"
        ));
        assert!(people.is_valid());

        group.remove_table("orders").unwrap();
        group.remove_table("people").unwrap();
        assert!(!people.is_valid());
    }

    #[timeout(1000)]
    #[test]
    fn test_table_names_sorted() {
        let group = Group::with_config(StoreConfig {
            max_leaf_size: 8,
            ..Default::default()
        })
        .unwrap();
        for name in ["zeta", "alpha", "mid"] {
            group.add_table(name, vec![]).unwrap();
        }
        assert_eq!(group.table_names().unwrap(), vec!["alpha", "mid", "zeta"]);
        assert_eq!(group.config().max_leaf_size, 8);
    }
}
