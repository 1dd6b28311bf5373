//! Per-row builders that turn catalog query results into schema entities.
//!
//! Each lister is fed the rows of one catalog query, in arrival order. The
//! engine clients decode their own catalog row shapes and hand the decoded
//! fields to these builders, so the grouping and bookkeeping rules live in
//! one place.

use std::collections::BTreeSet;

use crate::error::{Result, SyncError};

use super::row::Row;
use super::schema::{Column, Key, Table};

/// Fail unless a catalog result is wide enough for the fields a lister
/// reads from it. Catalog shapes vary across server versions and forks.
pub fn require_columns(table_name: &str, n_columns: usize, needed: usize) -> Result<()> {
    if n_columns < needed {
        return Err(SyncError::Schema(format!(
            "Catalog listing for table {} returned {} columns, expected at least {}",
            table_name, n_columns, needed
        )));
    }
    Ok(())
}

/// Appends one column per row; row order is the table's column order.
pub struct ColumnLister<'t> {
    table: &'t mut Table,
}

impl<'t> ColumnLister<'t> {
    pub fn new(table: &'t mut Table) -> Self {
        Self { table }
    }

    /// The column name is the first field of the row.
    pub fn add_row(&mut self, row: &dyn Row) -> Result<()> {
        self.table.columns.push(Column::new(row.string_at(0)));
        Ok(())
    }
}

/// Appends explicit primary key columns in catalog ordinal order.
pub struct PrimaryKeyLister<'t> {
    table: &'t mut Table,
}

impl<'t> PrimaryKeyLister<'t> {
    pub fn new(table: &'t mut Table) -> Self {
        Self { table }
    }

    /// The column name is the first field of the row.
    pub fn add_row(&mut self, row: &dyn Row) -> Result<()> {
        let column_index = self.table.index_of_column(&row.string_at(0))?;
        self.table.primary_key_columns.push(column_index);
        Ok(())
    }
}

/// Groups consecutive key-column rows into keys.
///
/// Catalog rows must arrive ordered by key, then by position within the key.
/// While the table has no primary key, unique keys that include a nullable
/// column are remembered: NULLs defeat uniqueness, so those keys cannot
/// stand in as row identity.
pub struct KeyLister<'t> {
    table: &'t mut Table,
    unique_but_nullable_keys: BTreeSet<String>,
}

impl<'t> KeyLister<'t> {
    pub fn new(table: &'t mut Table) -> Self {
        Self {
            table,
            unique_but_nullable_keys: BTreeSet::new(),
        }
    }

    /// Record one column of the primary key (engines that report it inline).
    pub fn add_primary_key_column(&mut self, column_name: &str) -> Result<()> {
        let column_index = self.table.index_of_column(column_name)?;
        self.table.primary_key_columns.push(column_index);
        Ok(())
    }

    /// Record one column of a secondary key.
    pub fn add_key_column(
        &mut self,
        key_name: &str,
        unique: bool,
        column_name: &str,
        nullable: bool,
    ) -> Result<()> {
        let column_index = self.table.index_of_column(column_name)?;

        let starts_new_key = self
            .table
            .keys
            .last()
            .map_or(true, |key| key.name != key_name);
        if starts_new_key {
            self.table.keys.push(Key::new(key_name, unique));
        }
        if let Some(key) = self.table.keys.last_mut() {
            key.columns.push(column_index);
        }

        if self.table.primary_key_columns.is_empty() && unique && nullable {
            self.unique_but_nullable_keys.insert(key_name.to_string());
        }

        Ok(())
    }

    /// Rule a key out as a surrogate, e.g. when part of it is an expression
    /// rather than a column.
    pub fn exclude_key(&mut self, key_name: &str) {
        self.unique_but_nullable_keys.insert(key_name.to_string());
    }

    /// Keys that are unique but cannot serve as a surrogate primary key.
    pub fn into_unique_but_nullable(self) -> BTreeSet<String> {
        self.unique_but_nullable_keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::row::OwnedRow;

    fn table_with_columns(columns: &[&str]) -> Table {
        let mut table = Table::new("sessions");
        let mut lister = ColumnLister::new(&mut table);
        for name in columns {
            lister.add_row(&OwnedRow::from_strs(&[name, "varchar(64)"])).unwrap();
        }
        table
    }

    #[test]
    fn test_column_lister_keeps_catalog_order() {
        let table = table_with_columns(&["token", "user_id", "device_id"]);
        assert_eq!(table.column_names(), vec!["token", "user_id", "device_id"]);
    }

    #[test]
    fn test_primary_key_lister_uses_indexes() {
        let mut table = table_with_columns(&["a", "b", "c"]);
        let mut lister = PrimaryKeyLister::new(&mut table);
        lister.add_row(&OwnedRow::from_strs(&["c"])).unwrap();
        lister.add_row(&OwnedRow::from_strs(&["a"])).unwrap();
        assert_eq!(table.primary_key_columns, vec![2, 0]);
    }

    #[test]
    fn test_primary_key_lister_rejects_unknown_column() {
        let mut table = table_with_columns(&["a"]);
        let mut lister = PrimaryKeyLister::new(&mut table);
        let err = lister.add_row(&OwnedRow::from_strs(&["zz"])).unwrap_err();
        assert!(matches!(err, SyncError::Schema(_)));
    }

    #[test]
    fn test_key_lister_groups_consecutive_rows() {
        let mut table = table_with_columns(&["token", "user_id", "device_id"]);
        let mut lister = KeyLister::new(&mut table);
        lister.add_key_column("user_device", true, "user_id", false).unwrap();
        lister.add_key_column("user_device", true, "device_id", false).unwrap();
        lister.add_key_column("token", true, "token", true).unwrap();
        let nullable = lister.into_unique_but_nullable();

        assert_eq!(table.keys.len(), 2);
        assert_eq!(table.keys[0].name, "user_device");
        assert_eq!(table.keys[0].columns, vec![1, 2]);
        assert_eq!(table.keys[1].columns, vec![0]);
        assert!(nullable.contains("token"));
        assert!(!nullable.contains("user_device"));
    }

    #[test]
    fn test_sessions_surrogate_resolves_to_user_device() {
        let mut table = table_with_columns(&["token", "user_id", "device_id"]);
        let mut lister = KeyLister::new(&mut table);
        lister.add_key_column("token", true, "token", true).unwrap();
        lister.add_key_column("user_device", true, "user_id", false).unwrap();
        lister.add_key_column("user_device", true, "device_id", false).unwrap();
        let nullable = lister.into_unique_but_nullable();

        table.resolve_primary_key(&nullable).unwrap();
        assert_eq!(table.primary_key_names(), vec!["user_id", "device_id"]);
    }

    #[test]
    fn test_nullable_keys_not_tracked_once_primary_key_known() {
        let mut table = table_with_columns(&["id", "email"]);
        let mut lister = KeyLister::new(&mut table);
        lister.add_primary_key_column("id").unwrap();
        lister.add_key_column("email", true, "email", true).unwrap();
        let nullable = lister.into_unique_but_nullable();

        assert!(nullable.is_empty());
        table.resolve_primary_key(&nullable).unwrap();
        assert_eq!(table.primary_key_columns, vec![0]);
    }

    #[test]
    fn test_excluded_key_is_never_a_surrogate() {
        let mut table = table_with_columns(&["a", "b"]);
        let mut lister = KeyLister::new(&mut table);
        lister.add_key_column("a_expr", true, "a", false).unwrap();
        lister.exclude_key("a_expr");
        lister.add_key_column("b_key", true, "b", false).unwrap();
        let excluded = lister.into_unique_but_nullable();

        table.resolve_primary_key(&excluded).unwrap();
        assert_eq!(table.primary_key_names(), vec!["b"]);
    }

    #[test]
    fn test_require_columns_rejects_narrow_catalog_rows() {
        assert!(require_columns("sessions", 10, 10).is_ok());
        assert!(require_columns("sessions", 13, 10).is_ok());

        let err = require_columns("sessions", 9, 10).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Schema error: Catalog listing for table sessions returned 9 columns, expected at least 10"
        );
    }

    #[test]
    fn test_non_unique_nullable_key_is_not_marked() {
        let mut table = table_with_columns(&["a"]);
        let mut lister = KeyLister::new(&mut table);
        lister.add_key_column("by_a", false, "a", true).unwrap();
        assert!(lister.into_unique_but_nullable().is_empty());
    }
}
