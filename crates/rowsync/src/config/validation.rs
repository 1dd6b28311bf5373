//! Configuration validation.

use super::ConnectionConfig;
use crate::drivers::common::SslMode;
use crate::error::{Result, SyncError};

/// Validate the configuration.
pub fn validate(config: &ConnectionConfig) -> Result<()> {
    if config.host.is_empty() {
        return Err(SyncError::Config("host is required".into()));
    }
    if config.database.is_empty() {
        return Err(SyncError::Config("database is required".into()));
    }
    if config.database.contains('\0') || config.host.contains('\0') {
        return Err(SyncError::Config(
            "host and database must not contain NUL bytes".into(),
        ));
    }

    SslMode::parse(&config.ssl_mode)?;

    Ok(())
}
