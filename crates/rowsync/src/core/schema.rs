//! Schema model shared by every engine: columns, keys, tables, database.
//!
//! Columns are referenced by their position in the owning table's column
//! list; keys and the primary key store those positions, never names.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A named index or constraint other than the primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    /// Key name as reported by the catalog.
    pub name: String,

    /// Whether the key enforces uniqueness.
    pub unique: bool,

    /// Indexes into the owning table's columns, in key order.
    pub columns: Vec<usize>,
}

impl Key {
    pub fn new(name: impl Into<String>, unique: bool) -> Self {
        Self {
            name: name.into(),
            unique,
            columns: Vec::new(),
        }
    }
}

/// Table metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,

    /// Columns in catalog order; this order is canonical.
    pub columns: Vec<Column>,

    /// Row identity, as column indexes.
    pub primary_key_columns: Vec<usize>,

    /// Secondary keys, sorted by name once population finishes.
    pub keys: Vec<Key>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Position of a column by name.
    ///
    /// A catalog row naming a column the table doesn't have means the
    /// catalog and the column list disagree, so this is a schema error.
    pub fn index_of_column(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| {
                SyncError::Schema(format!(
                    "Column {} is not a column of table {}",
                    name, self.name
                ))
            })
    }

    /// Check if the table has a row identity.
    pub fn has_pk(&self) -> bool {
        !self.primary_key_columns.is_empty()
    }

    /// Names of the primary key columns, in key order.
    pub fn primary_key_names(&self) -> Vec<&str> {
        self.primary_key_columns
            .iter()
            .map(|&i| self.columns[i].name.as_str())
            .collect()
    }

    /// Names of all columns, in table order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Sort keys by name and, if no explicit primary key was reported, pick
    /// the first unique key with no nullable column as the row identity.
    ///
    /// Both endpoints list keys from unordered catalogs; sorting by name is
    /// what makes them agree on which surrogate they pick.
    pub fn resolve_primary_key(&mut self, unique_but_nullable: &BTreeSet<String>) -> Result<()> {
        self.keys.sort_by(|a, b| a.name.cmp(&b.name));

        if self.primary_key_columns.is_empty() {
            if let Some(key) = self
                .keys
                .iter()
                .find(|k| k.unique && !k.columns.is_empty() && !unique_but_nullable.contains(&k.name))
            {
                self.primary_key_columns = key.columns.clone();
            }
        }

        if self.primary_key_columns.is_empty() {
            return Err(SyncError::Schema(format!(
                "Couldn't find a primary or non-nullable unique key on table {}",
                self.name
            )));
        }

        Ok(())
    }
}

/// The tables of one database, as seen by one connection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Database {
    /// Tables, largest first then by name (the order the catalog listed them).
    pub tables: Vec<Table>,

    #[serde(skip)]
    table_index: HashMap<String, usize>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the name lookup over the finished table list.
    pub fn index_tables(&mut self) {
        self.table_index = self
            .tables
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();
    }

    /// Look up a table by name.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.table_index.get(name).map(|&i| &self.tables[i])
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_table(name: &str, columns: &[&str]) -> Table {
        let mut table = Table::new(name);
        table.columns = columns.iter().map(|c| Column::new(*c)).collect();
        table
    }

    fn make_key(name: &str, unique: bool, columns: &[usize]) -> Key {
        Key {
            name: name.to_string(),
            unique,
            columns: columns.to_vec(),
        }
    }

    #[test]
    fn test_index_of_column() {
        let table = make_table("orders", &["id", "customer_id", "total"]);
        assert_eq!(table.index_of_column("customer_id").unwrap(), 1);
        assert!(matches!(
            table.index_of_column("missing"),
            Err(SyncError::Schema(_))
        ));
    }

    #[test]
    fn test_explicit_primary_key_is_kept() {
        let mut table = make_table("orders", &["id", "customer_id", "total"]);
        table.primary_key_columns = vec![0];
        table.keys.push(make_key("by_customer", true, &[1]));

        table.resolve_primary_key(&BTreeSet::new()).unwrap();
        assert_eq!(table.primary_key_columns, vec![0]);
        assert_eq!(table.primary_key_names(), vec!["id"]);
    }

    #[test]
    fn test_surrogate_skips_nullable_unique_key() {
        let mut table = make_table("sessions", &["token", "user_id", "device_id"]);
        table.keys.push(make_key("user_device", true, &[1, 2]));
        table.keys.push(make_key("token", true, &[0]));

        let nullable: BTreeSet<String> = ["token".to_string()].into();
        table.resolve_primary_key(&nullable).unwrap();

        assert_eq!(table.primary_key_columns, vec![1, 2]);
        assert_eq!(table.primary_key_names(), vec!["user_id", "device_id"]);
    }

    #[test]
    fn test_surrogate_is_first_by_name() {
        let mut table = make_table("t", &["a", "b", "c"]);
        table.keys.push(make_key("zeta", true, &[2]));
        table.keys.push(make_key("beta", false, &[0]));
        table.keys.push(make_key("alpha", true, &[1]));

        table.resolve_primary_key(&BTreeSet::new()).unwrap();

        let names: Vec<&str> = table.keys.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "zeta"]);
        assert_eq!(table.primary_key_columns, vec![1]);
    }

    #[test]
    fn test_no_usable_key_is_an_error() {
        let mut table = make_table("logs", &["message", "ref"]);
        table.keys.push(make_key("by_message", false, &[0]));
        table.keys.push(make_key("ref", true, &[1]));

        let nullable: BTreeSet<String> = ["ref".to_string()].into();
        let err = table.resolve_primary_key(&nullable).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Schema error: Couldn't find a primary or non-nullable unique key on table logs"
        );
        assert!(table.primary_key_columns.is_empty());
    }

    #[test]
    fn test_database_lookup() {
        let mut db = Database::new();
        db.tables.push(make_table("big", &["id"]));
        db.tables.push(make_table("small", &["id"]));
        assert!(db.table("big").is_none());

        db.index_tables();
        assert_eq!(db.table("small").unwrap().name, "small");
        assert!(db.table("missing").is_none());
        assert_eq!(db.len(), 2);
    }
}
