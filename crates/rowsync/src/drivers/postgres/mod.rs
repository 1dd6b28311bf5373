//! PostgreSQL driver.
//!
//! This module provides PostgreSQL-specific implementations:
//!
//! - [`PostgresDialect`]: identifier quoting, `standard_conforming_strings`-aware escaping
//! - [`PostgresResult`]: materialized result guard
//! - [`PostgresClient`]: the [`DatabaseClient`](crate::core::DatabaseClient)
//!
//! Tables are enumerated from every schema on the session's search path.

mod client;
mod dialect;
mod result;

pub use client::PostgresClient;
pub use dialect::PostgresDialect;
pub use result::{PostgresResult, PostgresRow};
