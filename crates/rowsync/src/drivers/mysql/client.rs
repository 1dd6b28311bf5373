//! MySQL/MariaDB client.
//!
//! One `mysql_async::Conn`, one session transaction, one populated schema.
//! Ranged retrievals stream their rows; the table enumeration is buffered so
//! the per-table catalog queries can run while it is walked.

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, OptsBuilder};
use tracing::{debug, info, warn};

use crate::config::{ConnectionConfig, Engine};
use crate::core::lister::{require_columns, ColumnLister, KeyLister};
use crate::core::row::Row;
use crate::core::schema::{Database, Table};
use crate::core::traits::{
    DatabaseClient, Dialect, IsolationLevel, ReadOnly, RowBound, TransactionInfo,
};
use crate::drivers::common::TlsBuilder;
use crate::error::{Result, SyncError};

use super::dialect::MysqlDialect;
use super::result::{diagnostic, MysqlResult, MysqlRows};

/// First server version that accepts `START TRANSACTION READ ONLY`.
const READ_ONLY_MIN_VERSION: (u16, u16, u16) = (5, 6, 5);

const LIST_TABLES_SQL: &str = "SELECT table_name \
     FROM information_schema.tables \
     WHERE table_schema = schema() AND table_type = 'BASE TABLE' \
     ORDER BY data_length DESC, table_name ASC";

// SHOW KEYS result columns
const KEY_NON_UNIQUE: usize = 1;
const KEY_NAME: usize = 2;
const KEY_COLUMN_NAME: usize = 4;
const KEY_NULL: usize = 9;

/// MySQL/MariaDB client over a single connection.
pub struct MysqlClient {
    conn: Conn,
    dialect: MysqlDialect,
    database: Database,
    transaction: TransactionInfo,
}

impl MysqlClient {
    /// Connect, start the session transaction and populate the schema.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let tls = TlsBuilder::parse(&config.ssl_mode)?;

        let mut builder = OptsBuilder::default()
            .db_name(Some(&config.database))
            .user((!config.user.is_empty()).then_some(&config.user))
            .pass((!config.password.is_empty()).then_some(&config.password))
            .ssl_opts(tls.mysql_ssl_opts())
            .init(vec!["SET NAMES utf8mb4"]);

        builder = match config.port.tcp_port(Engine::Mysql) {
            Some(port) => builder.ip_or_hostname(&config.host).tcp_port(port),
            None => builder
                .socket(Some(config.port.to_string()))
                .prefer_socket(true),
        };

        let mut conn = Conn::new(builder)
            .await
            .map_err(|e| SyncError::Connection(diagnostic(&e)))?;

        let sql_mode: Option<String> = conn
            .query_first("SELECT @@SESSION.sql_mode")
            .await
            .map_err(|e| SyncError::query(diagnostic(&e), "SELECT @@SESSION.sql_mode"))?;
        let dialect = MysqlDialect::for_sql_mode(sql_mode.as_deref().unwrap_or_default());

        let transaction = begin(&mut conn, config.readonly, config.snapshot).await?;

        let mut client = Self {
            conn,
            dialect,
            database: Database::new(),
            transaction,
        };
        client.populate_database_schema().await?;

        info!(
            "Connected to MySQL: {} ({} tables, {})",
            config.display_target(),
            client.database.len(),
            client.transaction
        );

        Ok(client)
    }

    /// Run an arbitrary query, handing each row to `handler`.
    pub async fn query<F>(&mut self, sql: &str, handler: F) -> Result<()>
    where
        F: FnMut(&dyn Row) -> Result<()> + Send,
    {
        MysqlResult::streaming(&mut self.conn, sql)
            .await?
            .for_each(handler)
            .await
    }

    /// Like [`query`](Self::query), for catalog results read by position.
    async fn query_catalog<F>(
        &mut self,
        table_name: &str,
        sql: &str,
        needed: usize,
        handler: F,
    ) -> Result<()>
    where
        F: FnMut(&dyn Row) -> Result<()> + Send,
    {
        let result = MysqlResult::streaming(&mut self.conn, sql).await?;
        if let Err(e) = require_columns(table_name, result.n_columns(), needed) {
            result.finish().await?;
            return Err(e);
        }
        result.for_each(handler).await
    }

    async fn populate_database_schema(&mut self) -> Result<()> {
        let table_names = MysqlRows::collect(&mut self.conn, LIST_TABLES_SQL).await?;
        debug!("Listing {} tables", table_names.n_rows());

        let mut database = Database::new();
        for row in table_names.rows() {
            let table = self.list_table(&row.string_at(0)).await?;
            database.tables.push(table);
        }
        database.index_tables();

        self.database = database;
        Ok(())
    }

    /// Columns and keys of one table, with its row identity resolved.
    async fn list_table(&mut self, table_name: &str) -> Result<Table> {
        debug!("Listing table {}", table_name);
        let mut table = Table::new(table_name);
        let quoted = self.dialect.quote_ident(table_name);

        let mut columns = ColumnLister::new(&mut table);
        self.query_catalog(table_name, &format!("SHOW COLUMNS FROM {}", quoted), 1, |row| {
            columns.add_row(row)
        })
        .await?;

        // PRIMARY comes first, then the other keys, each in key-part order
        let mut keys = KeyLister::new(&mut table);
        let sql = format!("SHOW KEYS FROM {}", quoted);
        self.query_catalog(table_name, &sql, KEY_NULL + 1, |row| {
            let key_name = row.string_at(KEY_NAME);
            if row.null_at(KEY_COLUMN_NAME) {
                // functional key part
                keys.exclude_key(&key_name);
                return Ok(());
            }
            let column_name = row.string_at(KEY_COLUMN_NAME);
            if key_name == "PRIMARY" {
                keys.add_primary_key_column(&column_name)
            } else {
                keys.add_key_column(
                    &key_name,
                    row.string_at(KEY_NON_UNIQUE) == "0",
                    &column_name,
                    row.string_at(KEY_NULL) == "YES",
                )
            }
        })
        .await?;
        let unique_but_nullable = keys.into_unique_but_nullable();

        table.resolve_primary_key(&unique_but_nullable)?;
        Ok(table)
    }

    async fn retrieve(
        &mut self,
        table: &Table,
        prev_key: &[Vec<u8>],
        bound: RowBound<'_>,
        handler: impl FnMut(&dyn Row) -> Result<()> + Send,
    ) -> Result<()> {
        let sql = self.dialect.retrieve_rows_sql(table, prev_key, bound)?;
        self.query(&sql, handler).await
    }
}

async fn execute_sql(conn: &mut Conn, sql: &str) -> Result<()> {
    debug!(sql, "execute");
    conn.query_drop(sql)
        .await
        .map_err(|e| SyncError::query(diagnostic(&e), sql))
}

/// `SET TRANSACTION` applies to the next transaction only, so it must
/// directly precede `START TRANSACTION`.
async fn begin(conn: &mut Conn, readonly: bool, snapshot: bool) -> Result<TransactionInfo> {
    let isolation = IsolationLevel::for_snapshot(snapshot);
    execute_sql(
        conn,
        &format!("SET TRANSACTION ISOLATION LEVEL {}", isolation.as_sql()),
    )
    .await?;

    let read_only = if !readonly {
        ReadOnly::NotRequested
    } else if conn.server_version() >= READ_ONLY_MIN_VERSION {
        ReadOnly::Enforced
    } else {
        let (major, minor, patch) = conn.server_version();
        warn!(
            "MySQL {}.{}.{} cannot start a read-only transaction; \
             only the isolation level is applied",
            major, minor, patch
        );
        ReadOnly::Degraded
    };

    let mut characteristics = Vec::new();
    if snapshot {
        characteristics.push("WITH CONSISTENT SNAPSHOT");
    }
    if read_only == ReadOnly::Enforced {
        characteristics.push("READ ONLY");
    }
    let mut sql = String::from("START TRANSACTION");
    if !characteristics.is_empty() {
        sql.push(' ');
        sql.push_str(&characteristics.join(", "));
    }
    execute_sql(conn, &sql).await?;

    Ok(TransactionInfo {
        isolation,
        snapshot,
        read_only,
    })
}

#[async_trait]
impl DatabaseClient for MysqlClient {
    fn engine(&self) -> Engine {
        Engine::Mysql
    }

    fn database(&self) -> &Database {
        &self.database
    }

    fn transaction(&self) -> TransactionInfo {
        self.transaction
    }

    async fn start_transaction(&mut self, readonly: bool, snapshot: bool) -> Result<TransactionInfo> {
        self.transaction = begin(&mut self.conn, readonly, snapshot).await?;
        Ok(self.transaction)
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        execute_sql(&mut self.conn, sql).await
    }

    async fn retrieve_rows<F>(
        &mut self,
        table: &Table,
        prev_key: &[Vec<u8>],
        row_count: usize,
        handler: F,
    ) -> Result<()>
    where
        F: FnMut(&dyn Row) -> Result<()> + Send,
    {
        self.retrieve(table, prev_key, RowBound::Count(row_count), handler)
            .await
    }

    async fn retrieve_rows_until<F>(
        &mut self,
        table: &Table,
        prev_key: &[Vec<u8>],
        last_key: &[Vec<u8>],
        handler: F,
    ) -> Result<()>
    where
        F: FnMut(&dyn Row) -> Result<()> + Send,
    {
        self.retrieve(table, prev_key, RowBound::LastKey(last_key), handler)
            .await
    }

    fn escape_value(&self, value: &[u8]) -> Vec<u8> {
        self.dialect.escape_value(value)
    }

    async fn disable_referential_integrity(&mut self) -> Result<()> {
        execute_sql(&mut self.conn, "SET foreign_key_checks = 0").await
    }

    async fn enable_referential_integrity(&mut self) -> Result<()> {
        execute_sql(&mut self.conn, "SET foreign_key_checks = 1").await
    }

    async fn commit_transaction(&mut self) -> Result<()> {
        execute_sql(&mut self.conn, "COMMIT").await
    }

    async fn close(self) -> Result<()> {
        self.conn
            .disconnect()
            .await
            .map_err(|e| SyncError::Connection(diagnostic(&e)))
    }
}
