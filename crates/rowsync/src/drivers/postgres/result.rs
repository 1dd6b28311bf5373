//! Result guard over tokio-postgres simple-query results.
//!
//! The simple query protocol hands back every row of a statement at once,
//! so nothing is left queued on the connection and release is a plain drop.

use tokio_postgres::{Client, SimpleQueryMessage, SimpleQueryRow};
use tracing::debug;

use crate::core::row::Row;
use crate::error::{Result, SyncError};

/// Engine diagnostic text for an error: `SEVERITY: message` when the server
/// reported one.
pub(crate) fn diagnostic(err: &tokio_postgres::Error) -> String {
    match err.as_db_error() {
        Some(db) => format!("{}: {}", db.severity(), db.message()),
        None => err.to_string(),
    }
}

/// One fetched row, in text format.
pub struct PostgresRow(SimpleQueryRow);

impl Row for PostgresRow {
    fn n_columns(&self) -> usize {
        self.0.len()
    }

    fn null_at(&self, column: usize) -> bool {
        self.0.get(column).is_none()
    }

    fn result_at(&self, column: usize) -> &[u8] {
        self.0.get(column).map(str::as_bytes).unwrap_or_default()
    }
}

/// Materialized result of one statement.
pub struct PostgresResult {
    rows: Vec<PostgresRow>,
    n_columns: usize,
}

impl PostgresResult {
    /// Submit `sql` and read its whole result.
    pub async fn query(client: &Client, sql: &str) -> Result<Self> {
        if client.is_closed() {
            return Err(SyncError::Resource(
                "connection to the PostgreSQL server is closed".into(),
            ));
        }

        debug!(sql, "query");
        let messages = client
            .simple_query(sql)
            .await
            .map_err(|e| SyncError::query(diagnostic(&e), sql))?;

        let mut rows = Vec::new();
        let mut n_columns = 0;
        for message in messages {
            match message {
                SimpleQueryMessage::RowDescription(columns) => n_columns = columns.len(),
                SimpleQueryMessage::Row(row) => {
                    n_columns = row.len();
                    rows.push(PostgresRow(row));
                }
                _ => {}
            }
        }

        Ok(Self { rows, n_columns })
    }

    pub fn n_columns(&self) -> usize {
        self.n_columns
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[PostgresRow] {
        &self.rows
    }

    /// Hand every row to `handler` in arrival order. A handler error stops
    /// iteration.
    pub fn for_each<F>(self, mut handler: F) -> Result<()>
    where
        F: FnMut(&dyn Row) -> Result<()>,
    {
        for row in &self.rows {
            handler(row)?;
        }
        Ok(())
    }
}
