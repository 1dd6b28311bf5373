//! MySQL/MariaDB database driver.
//!
//! This module provides MySQL-specific implementations for:
//! - [`MysqlDialect`]: identifier quoting, `sql_mode`-aware value escaping
//! - [`MysqlResult`] / [`MysqlRows`]: streaming and buffered result guards
//! - [`MysqlClient`]: the [`DatabaseClient`](crate::core::DatabaseClient)
//!
//! # Supported Versions
//!
//! - MySQL 5.5+ (read-only transactions need 5.6.5+)
//! - MariaDB 10.0+
//!
//! # Connection
//!
//! A numeric `port` connects over TCP to `host`; anything else is taken as
//! the path of the server's Unix socket.

mod client;
mod dialect;
mod result;

pub use client::MysqlClient;
pub use dialect::MysqlDialect;
pub use result::{MysqlResult, MysqlRow, MysqlRows};
