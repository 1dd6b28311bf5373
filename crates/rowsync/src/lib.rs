//! # rowsync
//!
//! Engine-neutral database clients for table synchronization tools.
//!
//! One client owns one connection to MySQL/MariaDB or PostgreSQL and
//! provides:
//!
//! - **A populated schema**: every table with its columns, keys and a row
//!   identity (the primary key, or a non-nullable unique key standing in
//!   for it)
//! - **Ranged row retrieval** in primary key order, bounded by a row count
//!   or by a last key
//! - **Session transactions** with snapshot and read-only requests mapped to
//!   what the engine supports
//! - **Value escaping** that follows the session's quoting rules
//!
//! ## Example
//!
//! ```rust,no_run
//! use rowsync::{ClientImpl, ConnectionConfig, DatabaseClient, Row};
//!
//! #[tokio::main]
//! async fn main() -> rowsync::Result<()> {
//!     let config = ConnectionConfig::load("mysql.yaml")?;
//!     let mut client = ClientImpl::connect(&config).await?;
//!
//!     let orders = client.database().table("orders").cloned().unwrap();
//!     client
//!         .retrieve_rows(&orders, &[b"5".to_vec()], 2, |row: &dyn Row| {
//!             println!("{}", row.string_at(0));
//!             Ok(())
//!         })
//!         .await?;
//!
//!     client.commit_transaction().await?;
//!     client.close().await
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;

// Re-exports for convenient access
pub use config::{ConnectionConfig, Engine, PortOrSocket};
pub use self::core::{
    Database, DatabaseClient, Dialect, IsolationLevel, Key, OwnedRow, ReadOnly, Row, RowBound,
    Table, TransactionInfo,
};
pub use drivers::{ClientImpl, MysqlClient, PostgresClient};
pub use error::{Result, SyncError};
