//! Engine-neutral building blocks.
//!
//! - [`schema`]: Column, key, table and database metadata
//! - [`row`]: The row accessor handed to row callbacks
//! - [`lister`]: Builders that turn catalog rows into schema entities
//! - [`traits`]: The client contract and the SQL dialect strategy
//!
//! Driver modules (`drivers/mysql`, `drivers/postgres`) implement the traits
//! against their native protocols; nothing in here knows about either one.

pub mod lister;
pub mod row;
pub mod schema;
pub mod traits;

pub use lister::{ColumnLister, KeyLister, PrimaryKeyLister};
pub use row::{OwnedRow, Row};
pub use schema::{Column, Database, Key, Table};
pub use traits::{DatabaseClient, Dialect, IsolationLevel, ReadOnly, RowBound, TransactionInfo};
