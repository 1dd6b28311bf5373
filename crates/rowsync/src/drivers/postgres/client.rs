//! PostgreSQL client.
//!
//! One `tokio_postgres::Client` whose connection future runs on its own
//! task, one session transaction, one populated schema. Every statement goes
//! through the simple query protocol, which materializes its rows, so the
//! table enumeration can be walked while per-table catalog queries run.

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_postgres::tls::{MakeTlsConnect, TlsConnect};
use tokio_postgres::{Client, Config as PgConfig, NoTls, Socket};
use tracing::{debug, error, info};

use crate::config::{ConnectionConfig, Engine};
use crate::core::lister::{require_columns, ColumnLister, KeyLister, PrimaryKeyLister};
use crate::core::row::Row;
use crate::core::schema::{Database, Table};
use crate::core::traits::{
    DatabaseClient, Dialect, IsolationLevel, ReadOnly, RowBound, TransactionInfo,
};
use crate::drivers::common::TlsBuilder;
use crate::error::{Result, SyncError};

use super::dialect::PostgresDialect;
use super::result::{diagnostic, PostgresResult};

// a name shadowed by an earlier schema on the search path is listed once,
// as the relation it resolves to
const LIST_TABLES_SQL: &str = "SELECT pg_class.relname \
     FROM pg_class \
     JOIN pg_namespace ON pg_namespace.oid = pg_class.relnamespace \
     WHERE pg_class.relkind IN ('r', 'p') \
       AND pg_namespace.nspname = ANY (current_schemas(false)) \
       AND pg_table_is_visible(pg_class.oid) \
     ORDER BY pg_relation_size(pg_class.oid) DESC, pg_class.relname ASC";

// key query result columns
const KEY_NAME: usize = 0;
const KEY_UNIQUE: usize = 1;
const KEY_COLUMN_NAME: usize = 2;
const KEY_NOT_NULL: usize = 3;
const KEY_PARTIAL: usize = 4;

/// PostgreSQL client over a single connection.
pub struct PostgresClient {
    client: Client,
    connection: JoinHandle<()>,
    dialect: PostgresDialect,
    database: Database,
    transaction: TransactionInfo,
}

impl PostgresClient {
    /// Connect, start the session transaction and populate the schema.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        match config.port.tcp_port(Engine::Postgres) {
            Some(port) => {
                pg_config.host(&config.host);
                pg_config.port(port);
            }
            // a host starting with '/' is a socket directory
            None => {
                pg_config.host(&config.port.to_string());
            }
        }
        pg_config.dbname(&config.database);
        if !config.user.is_empty() {
            pg_config.user(&config.user);
        }
        if !config.password.is_empty() {
            pg_config.password(&config.password);
        }
        pg_config.application_name("rowsync");

        let tls = TlsBuilder::parse(&config.ssl_mode)?;
        let (client, connection) = match tls.postgres_connector()? {
            Some(connector) => spawn_connection(&pg_config, connector).await?,
            None => spawn_connection(&pg_config, NoTls).await?,
        };

        let setting = PostgresResult::query(&client, "SHOW standard_conforming_strings").await?;
        let dialect = match setting.rows().first() {
            Some(row) => PostgresDialect::for_standard_conforming_strings(&row.string_at(0)),
            None => PostgresDialect::new(),
        };

        let transaction = begin(&client, config.readonly, config.snapshot).await?;

        let mut client = Self {
            client,
            connection,
            dialect,
            database: Database::new(),
            transaction,
        };
        client.populate_database_schema().await?;

        info!(
            "Connected to PostgreSQL: {} ({} tables, {})",
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
        PostgresResult::query(&self.client, sql)
            .await?
            .for_each(handler)
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
        let result = PostgresResult::query(&self.client, sql).await?;
        require_columns(table_name, result.n_columns(), needed)?;
        result.for_each(handler)
    }

    async fn populate_database_schema(&mut self) -> Result<()> {
        let table_names = PostgresResult::query(&self.client, LIST_TABLES_SQL).await?;
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
        // resolved through the search path, like the table enumeration
        let relation = self
            .dialect
            .quote_value(self.dialect.quote_ident(table_name).as_bytes());
        let name = self.dialect.quote_value(table_name.as_bytes());

        let mut columns = ColumnLister::new(&mut table);
        self.query_catalog(
            table_name,
            &format!(
                "SELECT attname \
                 FROM pg_attribute \
                 WHERE attrelid = {}::regclass AND attnum > 0 AND NOT attisdropped \
                 ORDER BY attnum",
                relation
            ),
            1,
            |row| columns.add_row(row),
        )
        .await?;

        // same schema as the relation the name resolves to
        let mut primary_key = PrimaryKeyLister::new(&mut table);
        self.query_catalog(
            table_name,
            &format!(
                "SELECT kcu.column_name \
                 FROM information_schema.table_constraints tc \
                 JOIN information_schema.key_column_usage kcu \
                   ON kcu.constraint_schema = tc.constraint_schema \
                  AND kcu.constraint_name = tc.constraint_name \
                  AND kcu.table_name = tc.table_name \
                 WHERE tc.table_name = {} \
                   AND tc.table_schema = (SELECT pg_namespace.nspname \
                                          FROM pg_class \
                                          JOIN pg_namespace \
                                            ON pg_namespace.oid = pg_class.relnamespace \
                                          WHERE pg_class.oid = {}::regclass) \
                   AND tc.constraint_type = 'PRIMARY KEY' \
                 ORDER BY kcu.ordinal_position",
                name, relation
            ),
            1,
            |row| primary_key.add_row(row),
        )
        .await?;

        // ordered by key, then by position within the key. Only the first
        // indnkeyatts attributes are key columns; the rest are INCLUDE
        // payload and play no part in uniqueness.
        let mut keys = KeyLister::new(&mut table);
        self.query_catalog(
            table_name,
            &format!(
                "SELECT index_class.relname, pg_index.indisunique, attname, attnotnull, \
                        pg_index.indexprs IS NOT NULL OR pg_index.indpred IS NOT NULL \
                 FROM pg_index \
                 JOIN pg_class index_class \
                   ON pg_index.indexrelid = index_class.oid AND index_class.relkind = 'i' \
                 CROSS JOIN LATERAL \
                   (SELECT (pg_index.indkey::int2[])[0:pg_index.indnkeyatts - 1] AS attnums) \
                   key_part \
                 JOIN pg_attribute \
                   ON pg_attribute.attrelid = pg_index.indrelid \
                  AND pg_attribute.attnum = ANY (key_part.attnums) \
                 WHERE pg_index.indrelid = {}::regclass AND NOT pg_index.indisprimary \
                 ORDER BY index_class.relname, \
                          array_position(key_part.attnums, pg_attribute.attnum)",
                relation
            ),
            KEY_PARTIAL + 1,
            |row| {
                let key_name = row.string_at(KEY_NAME);
                keys.add_key_column(
                    &key_name,
                    row.string_at(KEY_UNIQUE) == "t",
                    &row.string_at(KEY_COLUMN_NAME),
                    row.string_at(KEY_NOT_NULL) == "f",
                )?;
                // expression and partial indexes do not identify rows
                if row.string_at(KEY_PARTIAL) == "t" {
                    keys.exclude_key(&key_name);
                }
                Ok(())
            },
        )
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

/// Connect and drive the connection on its own task.
async fn spawn_connection<T>(config: &PgConfig, tls: T) -> Result<(Client, JoinHandle<()>)>
where
    T: MakeTlsConnect<Socket> + Send,
    T::Stream: Send + 'static,
    T::TlsConnect: Send,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    let (client, connection) = config
        .connect(tls)
        .await
        .map_err(|e| SyncError::Connection(diagnostic(&e)))?;

    let handle = tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("PostgreSQL connection error: {}", e);
        }
    });

    Ok((client, handle))
}

async fn execute_sql(client: &Client, sql: &str) -> Result<()> {
    debug!(sql, "execute");
    client
        .batch_execute(sql)
        .await
        .map_err(|e| SyncError::query(diagnostic(&e), sql))
}

async fn begin(client: &Client, readonly: bool, snapshot: bool) -> Result<TransactionInfo> {
    let isolation = IsolationLevel::for_snapshot(snapshot);
    let sql = if readonly {
        format!("START TRANSACTION READ ONLY ISOLATION LEVEL {}", isolation.as_sql())
    } else {
        format!("START TRANSACTION ISOLATION LEVEL {}", isolation.as_sql())
    };
    execute_sql(client, &sql).await?;

    Ok(TransactionInfo {
        isolation,
        snapshot,
        read_only: if readonly {
            ReadOnly::Enforced
        } else {
            ReadOnly::NotRequested
        },
    })
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    fn engine(&self) -> Engine {
        Engine::Postgres
    }

    fn database(&self) -> &Database {
        &self.database
    }

    fn transaction(&self) -> TransactionInfo {
        self.transaction
    }

    async fn start_transaction(&mut self, readonly: bool, snapshot: bool) -> Result<TransactionInfo> {
        self.transaction = begin(&self.client, readonly, snapshot).await?;
        Ok(self.transaction)
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        execute_sql(&self.client, sql).await
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

    /// Defers deferrable constraints only. `ALTER TABLE .. DISABLE TRIGGER`
    /// waits for an exclusive lock that concurrent read transactions hold
    /// off, so triggers stay enabled.
    async fn disable_referential_integrity(&mut self) -> Result<()> {
        execute_sql(&self.client, "SET CONSTRAINTS ALL DEFERRED").await
    }

    /// Deferred constraints are checked at commit; nothing to undo.
    async fn enable_referential_integrity(&mut self) -> Result<()> {
        debug!("Deferred constraints are checked at commit");
        Ok(())
    }

    async fn commit_transaction(&mut self) -> Result<()> {
        execute_sql(&self.client, "COMMIT").await
    }

    async fn close(self) -> Result<()> {
        // dropping the client ends the connection future
        drop(self.client);
        self.connection
            .await
            .map_err(|e| SyncError::Resource(format!("PostgreSQL connection task failed: {}", e)))
    }
}
