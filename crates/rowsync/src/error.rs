//! Error types for the rowsync clients.

use thiserror::Error;

/// Exit code for configuration errors.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code for connection failures.
pub const EXIT_CONNECTION_ERROR: u8 = 2;
/// Exit code for statement failures.
pub const EXIT_QUERY_ERROR: u8 = 3;
/// Exit code for schema population failures.
pub const EXIT_SCHEMA_ERROR: u8 = 4;
/// Exit code for native resource failures.
pub const EXIT_RESOURCE_ERROR: u8 = 5;
/// Exit code for malformed key bounds.
pub const EXIT_KEY_BOUNDS_ERROR: u8 = 6;
/// Exit code for file system errors.
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for client operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connecting to the engine failed; carries the engine's diagnostic text.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A statement was submitted and the engine rejected it.
    ///
    /// Rendered as the engine message, a newline, then the statement text.
    #[error("{message}\n{sql}")]
    Query { message: String, sql: String },

    /// A table has no usable row identity, or the catalog is inconsistent.
    #[error("Schema error: {0}")]
    Schema(String),

    /// The driver could not hand back a usable native resource.
    #[error("Resource error: {0}")]
    Resource(String),

    /// Key bounds passed to a ranged retrieval do not fit the table.
    #[error("Invalid key bounds for table {table}: {message}")]
    KeyBounds { table: String, message: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Create a Query error from an engine message and the failing statement.
    pub fn query(message: impl Into<String>, sql: impl Into<String>) -> Self {
        SyncError::Query {
            message: message.into(),
            sql: sql.into(),
        }
    }

    /// Create a KeyBounds error
    pub fn key_bounds(table: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::KeyBounds {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            SyncError::Config(_) | SyncError::Yaml(_) | SyncError::Json(_) => EXIT_CONFIG_ERROR,
            SyncError::Connection(_) => EXIT_CONNECTION_ERROR,
            SyncError::Query { .. } => EXIT_QUERY_ERROR,
            SyncError::Schema(_) => EXIT_SCHEMA_ERROR,
            SyncError::Resource(_) => EXIT_RESOURCE_ERROR,
            SyncError::KeyBounds { .. } => EXIT_KEY_BOUNDS_ERROR,
            SyncError::Io(_) => EXIT_IO_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_is_message_newline_statement() {
        let err = SyncError::query("Table 'shop.ordrs' doesn't exist", "SELECT * FROM ordrs");
        assert_eq!(
            err.to_string(),
            "Table 'shop.ordrs' doesn't exist\nSELECT * FROM ordrs"
        );
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(SyncError::Config("x".into()).exit_code(), EXIT_CONFIG_ERROR);
        assert_eq!(
            SyncError::Connection("refused".into()).exit_code(),
            EXIT_CONNECTION_ERROR
        );
        assert_eq!(SyncError::query("m", "s").exit_code(), EXIT_QUERY_ERROR);
        assert_eq!(SyncError::Schema("t".into()).exit_code(), EXIT_SCHEMA_ERROR);
        assert_eq!(
            SyncError::key_bounds("t", "arity").exit_code(),
            EXIT_KEY_BOUNDS_ERROR
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(SyncError::from(io).exit_code(), EXIT_IO_ERROR);
    }

    #[test]
    fn test_format_detailed_includes_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "config.yaml");
        let detailed = SyncError::from(io).format_detailed();
        assert!(detailed.starts_with("Error: IO error: config.yaml"));
    }
}
