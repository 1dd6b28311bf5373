//! Result guards over mysql_async text-protocol results.
//!
//! A streamed MySQL result keeps its unread rows queued on the connection,
//! and the next command cannot be sent until they are consumed. The guard
//! drains them in [`MysqlResult::finish`], which every query path calls
//! whether the rows were all read or not.

use mysql_async::prelude::*;
use mysql_async::{Conn, QueryResult, TextProtocol, Value};
use tracing::debug;

use crate::core::row::Row;
use crate::error::{Result, SyncError};

/// Engine diagnostic text for an error.
pub(crate) fn diagnostic(err: &mysql_async::Error) -> String {
    match err {
        mysql_async::Error::Server(e) => e.message.clone(),
        other => other.to_string(),
    }
}

/// One fetched row. Text protocol: every non-NULL cell arrives as bytes.
#[derive(Debug)]
pub struct MysqlRow(mysql_async::Row);

impl Row for MysqlRow {
    fn n_columns(&self) -> usize {
        self.0.len()
    }

    fn null_at(&self, column: usize) -> bool {
        matches!(self.0.as_ref(column), None | Some(Value::NULL))
    }

    fn result_at(&self, column: usize) -> &[u8] {
        match self.0.as_ref(column) {
            Some(Value::Bytes(bytes)) => bytes,
            _ => &[],
        }
    }
}

/// Streaming guard: rows are pulled from the wire as they are consumed.
pub struct MysqlResult<'c> {
    result: Option<QueryResult<'c, 'static, TextProtocol>>,
    sql: String,
    n_columns: usize,
    rows_read: usize,
    exhausted: bool,
}

impl<'c> MysqlResult<'c> {
    /// Submit `sql` and wrap its result.
    pub async fn streaming(conn: &'c mut Conn, sql: &str) -> Result<Self> {
        debug!(sql, "query");
        let result = conn
            .query_iter(sql.to_string())
            .await
            .map_err(|e| SyncError::query(diagnostic(&e), sql))?;
        let n_columns = result.columns_ref().len();

        Ok(Self {
            result: Some(result),
            sql: sql.to_string(),
            n_columns,
            rows_read: 0,
            exhausted: false,
        })
    }

    pub fn n_columns(&self) -> usize {
        self.n_columns
    }

    /// Unknown until the last row has been read.
    pub fn n_rows(&self) -> Option<usize> {
        self.exhausted.then_some(self.rows_read)
    }

    /// The next row, or `None` once the result is exhausted.
    pub async fn next_row(&mut self) -> Result<Option<MysqlRow>> {
        let Some(result) = self.result.as_mut() else {
            return Ok(None);
        };
        let row = result
            .next()
            .await
            .map_err(|e| SyncError::query(diagnostic(&e), self.sql.as_str()))?;
        match row {
            Some(row) => {
                self.rows_read += 1;
                Ok(Some(MysqlRow(row)))
            }
            None => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }

    /// Drain unread rows and release the result.
    pub async fn finish(mut self) -> Result<()> {
        match self.result.take() {
            Some(result) => result
                .drop_result()
                .await
                .map_err(|e| SyncError::query(diagnostic(&e), self.sql.as_str())),
            None => Ok(()),
        }
    }

    /// Hand every row to `handler` in arrival order, then release the
    /// result. A handler or fetch error stops iteration; the result is
    /// drained either way and the first error wins.
    pub async fn for_each<F>(mut self, mut handler: F) -> Result<()>
    where
        F: FnMut(&dyn Row) -> Result<()> + Send,
    {
        let outcome = self.feed(&mut handler).await;
        match self.n_rows() {
            Some(n_rows) => debug!(sql = %self.sql, n_rows, "result read"),
            None => debug!(sql = %self.sql, rows_read = self.rows_read, "result abandoned"),
        }
        let released = self.finish().await;
        outcome.and(released)
    }

    async fn feed<F>(&mut self, handler: &mut F) -> Result<()>
    where
        F: FnMut(&dyn Row) -> Result<()> + Send,
    {
        while let Some(row) = self.next_row().await? {
            handler(&row)?;
        }
        Ok(())
    }
}

impl Drop for MysqlResult<'_> {
    fn drop(&mut self) {
        if self.result.is_some() {
            // mysql_async discards the pending rows before the next command
            debug!(sql = %self.sql, "result released before it was drained");
        }
    }
}

/// Buffered result: every row is read before any is visible, so the
/// connection is free for other queries while these rows are walked.
pub struct MysqlRows {
    rows: Vec<MysqlRow>,
    n_columns: usize,
}

impl MysqlRows {
    /// Submit `sql` and read its whole result.
    pub async fn collect(conn: &mut Conn, sql: &str) -> Result<Self> {
        debug!(sql, "buffered query");
        let result = conn
            .query_iter(sql.to_string())
            .await
            .map_err(|e| SyncError::query(diagnostic(&e), sql))?;
        let n_columns = result.columns_ref().len();
        let rows: Vec<mysql_async::Row> = result
            .collect_and_drop()
            .await
            .map_err(|e| SyncError::query(diagnostic(&e), sql))?;

        Ok(Self {
            rows: rows.into_iter().map(MysqlRow).collect(),
            n_columns,
        })
    }

    pub fn n_columns(&self) -> usize {
        self.n_columns
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[MysqlRow] {
        &self.rows
    }
}
