//! Core traits shared by every engine.
//!
//! - [`DatabaseClient`]: one connection, one long-lived transaction, one
//!   populated schema, and ranged row retrieval over it
//! - [`Dialect`]: SQL text strategy for an engine (quoting, escaping, ranged
//!   retrieval statements)

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::Engine;
use crate::error::{Result, SyncError};

use super::row::Row;
use super::schema::{Database, Table};

/// Isolation level a transaction was started with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IsolationLevel {
    ReadCommitted,
    RepeatableRead,
}

impl IsolationLevel {
    /// Snapshot sessions get the engine's repeatable view.
    pub fn for_snapshot(snapshot: bool) -> Self {
        if snapshot {
            IsolationLevel::RepeatableRead
        } else {
            IsolationLevel::ReadCommitted
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
        }
    }
}

/// What became of a read-only request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReadOnly {
    /// The caller did not ask for a read-only transaction.
    NotRequested,
    /// The transaction was started read-only.
    Enforced,
    /// The server cannot start a read-only transaction; only the isolation
    /// level was applied and writes are not rejected.
    Degraded,
}

/// How the session's transaction was actually started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransactionInfo {
    pub isolation: IsolationLevel,
    pub snapshot: bool,
    pub read_only: ReadOnly,
}

impl fmt::Display for TransactionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.isolation.as_sql())?;
        if self.snapshot {
            f.write_str(", consistent snapshot")?;
        }
        match self.read_only {
            ReadOnly::NotRequested => Ok(()),
            ReadOnly::Enforced => f.write_str(", read only"),
            ReadOnly::Degraded => f.write_str(", read only requested but not enforced"),
        }
    }
}

/// Upper bound of a ranged retrieval.
#[derive(Debug, Clone, Copy)]
pub enum RowBound<'a> {
    /// At most this many rows.
    Count(usize),
    /// Up to and including this key.
    LastKey(&'a [Vec<u8>]),
}

/// SQL syntax strategy for one engine.
///
/// Escaping depends on session settings read at connect time, so dialect
/// values carry that state rather than being unit structs.
pub trait Dialect: Send + Sync {
    /// Get the dialect identifier (e.g., "mysql", "postgres").
    fn name(&self) -> &str;

    /// Quote an identifier (table name, column name, etc.).
    fn quote_ident(&self, name: &str) -> String;

    /// Escape a value for inclusion between single quotes.
    ///
    /// Binary-safe. The output never exceeds `2 * value.len() + 1` bytes.
    fn escape_value(&self, value: &[u8]) -> Vec<u8>;

    /// Render a value as a complete SQL literal.
    fn quote_value(&self, value: &[u8]) -> String;

    /// Build the statement for a ranged retrieval: rows with a primary key
    /// strictly greater than `prev_key`, in primary key order, limited by
    /// `bound`. An empty `prev_key` starts from the first row.
    fn retrieve_rows_sql(&self, table: &Table, prev_key: &[Vec<u8>], bound: RowBound<'_>) -> Result<String> {
        if !table.has_pk() {
            return Err(SyncError::key_bounds(&table.name, "table has no primary key"));
        }

        let columns = table
            .columns
            .iter()
            .map(|c| self.quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let pk_columns = table
            .primary_key_columns
            .iter()
            .map(|&i| self.quote_ident(&table.columns[i].name))
            .collect::<Vec<_>>();

        let mut conditions = Vec::new();
        if !prev_key.is_empty() {
            conditions.push(self.key_comparison(table, &pk_columns, ">", prev_key)?);
        }
        if let RowBound::LastKey(last_key) = bound {
            conditions.push(self.key_comparison(table, &pk_columns, "<=", last_key)?);
        }

        let mut sql = format!("SELECT {} FROM {}", columns, self.quote_ident(&table.name));
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&pk_columns.join(", "));
        if let RowBound::Count(row_count) = bound {
            sql.push_str(&format!(" LIMIT {}", row_count));
        }

        Ok(sql)
    }

    /// `(pk1, pk2) op (v1, v2)`, or `pk op v` for single-column keys.
    fn key_comparison(
        &self,
        table: &Table,
        pk_columns: &[String],
        op: &str,
        key: &[Vec<u8>],
    ) -> Result<String> {
        if key.len() != pk_columns.len() {
            return Err(SyncError::key_bounds(
                &table.name,
                format!(
                    "key has {} values but the primary key has {} columns",
                    key.len(),
                    pk_columns.len()
                ),
            ));
        }

        let values: Vec<String> = key.iter().map(|v| self.quote_value(v)).collect();
        if pk_columns.len() == 1 {
            Ok(format!("{} {} {}", pk_columns[0], op, values[0]))
        } else {
            Ok(format!(
                "({}) {} ({})",
                pk_columns.join(", "),
                op,
                values.join(", ")
            ))
        }
    }
}

/// Engine-neutral client contract.
///
/// A client owns exactly one connection and is not clonable. Construction
/// connects, starts the session transaction and populates the schema; the
/// client is then ready to serve ranged retrievals. Calls take `&mut self`,
/// so one client serializes its own operations.
///
/// Row handlers run inline, in row order, and must not issue queries of
/// their own. A handler error stops the retrieval and is returned once the
/// result has been released.
#[async_trait]
pub trait DatabaseClient: Send {
    /// The engine this client talks to.
    fn engine(&self) -> Engine;

    /// The schema populated at connect time.
    fn database(&self) -> &Database;

    /// How the session transaction was started.
    fn transaction(&self) -> TransactionInfo;

    /// Start a transaction with the nearest isolation the engine offers.
    async fn start_transaction(&mut self, readonly: bool, snapshot: bool)
        -> Result<TransactionInfo>;

    /// Run a statement that returns no rows.
    async fn execute(&mut self, sql: &str) -> Result<()>;

    /// Retrieve at most `row_count` rows after `prev_key`.
    async fn retrieve_rows<F>(
        &mut self,
        table: &Table,
        prev_key: &[Vec<u8>],
        row_count: usize,
        handler: F,
    ) -> Result<()>
    where
        F: FnMut(&dyn Row) -> Result<()> + Send;

    /// Retrieve the rows in `(prev_key, last_key]`.
    async fn retrieve_rows_until<F>(
        &mut self,
        table: &Table,
        prev_key: &[Vec<u8>],
        last_key: &[Vec<u8>],
        handler: F,
    ) -> Result<()>
    where
        F: FnMut(&dyn Row) -> Result<()> + Send;

    /// Escape a value for inclusion in a quoted SQL literal.
    fn escape_value(&self, value: &[u8]) -> Vec<u8>;

    /// Best-effort suspension of constraint enforcement for bulk changes.
    async fn disable_referential_integrity(&mut self) -> Result<()>;

    /// Undo [`DatabaseClient::disable_referential_integrity`].
    async fn enable_referential_integrity(&mut self) -> Result<()>;

    /// Commit the session transaction.
    async fn commit_transaction(&mut self) -> Result<()>;

    /// Close the connection.
    async fn close(self) -> Result<()>
    where
        Self: Sized;
}
