//! Utilities shared by the engine drivers.
//!
//! - [`tls`]: TLS configuration for both engines

pub mod tls;

pub use tls::{SslMode, TlsBuilder};
