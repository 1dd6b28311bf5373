//! Database driver implementations.
//!
//! This module provides database-specific implementations of the core traits:
//!
//! - [`mysql`]: MySQL/MariaDB driver (`mysql_async`)
//! - [`postgres`]: PostgreSQL driver (`tokio-postgres`)
//! - [`common`]: Shared utilities (TLS)
//!
//! # Architecture
//!
//! Each driver module implements:
//! - `Dialect`: SQL syntax strategy for the database engine
//! - `DatabaseClient`: connection, session transaction, schema population
//!   and ranged row retrieval
//!
//! [`ClientImpl`] picks the driver once, from configuration, and dispatches
//! statically from then on.
//!
//! # Adding New Databases
//!
//! 1. Create a new module under `drivers/`
//! 2. Implement `Dialect` and `DatabaseClient`
//! 3. Add an `Engine` variant and a `ClientImpl` variant

pub mod common;
pub mod mysql;
pub mod postgres;

// Re-export common utilities
pub use common::{SslMode, TlsBuilder};

// Re-export driver types
pub use mysql::{MysqlClient, MysqlDialect};
pub use postgres::{PostgresClient, PostgresDialect};

use async_trait::async_trait;
use tracing::info;

use crate::config::{ConnectionConfig, Engine};
use crate::core::row::Row;
use crate::core::schema::{Database, Table};
use crate::core::traits::{DatabaseClient, TransactionInfo};
use crate::error::Result;

/// Enum-based static dispatch for clients.
///
/// The engine is chosen once at connect time; every call is a match rather
/// than a vtable lookup, which also keeps the generic row-handler methods
/// usable.
pub enum ClientImpl {
    Mysql(MysqlClient),
    Postgres(PostgresClient),
}

impl ClientImpl {
    /// Connect to the engine named by `config`.
    ///
    /// The returned client has started its session transaction and
    /// populated its schema.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        config.validate()?;
        info!("Connecting to {} at {}", config.engine, config.display_target());

        match config.engine {
            Engine::Mysql => Ok(ClientImpl::Mysql(MysqlClient::connect(config).await?)),
            Engine::Postgres => Ok(ClientImpl::Postgres(PostgresClient::connect(config).await?)),
        }
    }

    /// Run an arbitrary query, handing each row to `handler`.
    pub async fn query<F>(&mut self, sql: &str, handler: F) -> Result<()>
    where
        F: FnMut(&dyn Row) -> Result<()> + Send,
    {
        match self {
            ClientImpl::Mysql(c) => c.query(sql, handler).await,
            ClientImpl::Postgres(c) => c.query(sql, handler).await,
        }
    }
}

#[async_trait]
impl DatabaseClient for ClientImpl {
    fn engine(&self) -> Engine {
        match self {
            ClientImpl::Mysql(c) => c.engine(),
            ClientImpl::Postgres(c) => c.engine(),
        }
    }

    fn database(&self) -> &Database {
        match self {
            ClientImpl::Mysql(c) => c.database(),
            ClientImpl::Postgres(c) => c.database(),
        }
    }

    fn transaction(&self) -> TransactionInfo {
        match self {
            ClientImpl::Mysql(c) => c.transaction(),
            ClientImpl::Postgres(c) => c.transaction(),
        }
    }

    async fn start_transaction(&mut self, readonly: bool, snapshot: bool) -> Result<TransactionInfo> {
        match self {
            ClientImpl::Mysql(c) => c.start_transaction(readonly, snapshot).await,
            ClientImpl::Postgres(c) => c.start_transaction(readonly, snapshot).await,
        }
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        match self {
            ClientImpl::Mysql(c) => c.execute(sql).await,
            ClientImpl::Postgres(c) => c.execute(sql).await,
        }
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
        match self {
            ClientImpl::Mysql(c) => c.retrieve_rows(table, prev_key, row_count, handler).await,
            ClientImpl::Postgres(c) => c.retrieve_rows(table, prev_key, row_count, handler).await,
        }
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
        match self {
            ClientImpl::Mysql(c) => {
                c.retrieve_rows_until(table, prev_key, last_key, handler)
                    .await
            }
            ClientImpl::Postgres(c) => {
                c.retrieve_rows_until(table, prev_key, last_key, handler)
                    .await
            }
        }
    }

    fn escape_value(&self, value: &[u8]) -> Vec<u8> {
        match self {
            ClientImpl::Mysql(c) => c.escape_value(value),
            ClientImpl::Postgres(c) => c.escape_value(value),
        }
    }

    async fn disable_referential_integrity(&mut self) -> Result<()> {
        match self {
            ClientImpl::Mysql(c) => c.disable_referential_integrity().await,
            ClientImpl::Postgres(c) => c.disable_referential_integrity().await,
        }
    }

    async fn enable_referential_integrity(&mut self) -> Result<()> {
        match self {
            ClientImpl::Mysql(c) => c.enable_referential_integrity().await,
            ClientImpl::Postgres(c) => c.enable_referential_integrity().await,
        }
    }

    async fn commit_transaction(&mut self) -> Result<()> {
        match self {
            ClientImpl::Mysql(c) => c.commit_transaction().await,
            ClientImpl::Postgres(c) => c.commit_transaction().await,
        }
    }

    async fn close(self) -> Result<()> {
        match self {
            ClientImpl::Mysql(c) => c.close().await,
            ClientImpl::Postgres(c) => c.close().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;

    #[tokio::test]
    async fn test_connect_rejects_invalid_config_before_dialing() {
        let mut config = ConnectionConfig::new(Engine::Mysql, "shop");
        config.ssl_mode = "sometimes".into();

        let err = ClientImpl::connect(&config).await.err().unwrap();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[tokio::test]
    async fn test_connect_requires_database_name() {
        let config = ConnectionConfig::new(Engine::Postgres, "");
        let err = ClientImpl::connect(&config).await.err().unwrap();
        assert!(matches!(err, SyncError::Config(_)));
    }
}
