//! PostgreSQL SQL dialect (Strategy pattern).
//!
//! Provides PostgreSQL-specific identifier quoting and value escaping.

use crate::core::traits::Dialect;

/// PostgreSQL dialect implementation.
///
/// Escaping follows `PQescapeStringConn`: quotes are always doubled, and
/// backslashes too when the session has `standard_conforming_strings` off.
#[derive(Debug, Clone)]
pub struct PostgresDialect {
    standard_conforming_strings: bool,
}

impl Default for PostgresDialect {
    fn default() -> Self {
        Self {
            standard_conforming_strings: true,
        }
    }
}

impl PostgresDialect {
    /// Create a new PostgreSQL dialect instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Dialect for a session reporting `standard_conforming_strings`.
    pub fn for_standard_conforming_strings(setting: &str) -> Self {
        Self {
            standard_conforming_strings: !setting.trim().eq_ignore_ascii_case("off"),
        }
    }

    pub fn standard_conforming_strings(&self) -> bool {
        self.standard_conforming_strings
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn quote_ident(&self, name: &str) -> String {
        // PostgreSQL uses double quotes for identifier quoting
        // Handle names that contain double quotes by doubling them
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn escape_value(&self, value: &[u8]) -> Vec<u8> {
        let mut escaped = Vec::with_capacity(value.len() * 2 + 1);

        // text values cannot hold NUL
        for &b in value.iter().take_while(|&&b| b != 0) {
            if b == b'\'' || (b == b'\\' && !self.standard_conforming_strings) {
                escaped.push(b);
            }
            escaped.push(b);
        }

        escaped.shrink_to_fit();
        escaped
    }

    fn quote_value(&self, value: &[u8]) -> String {
        if !value.contains(&0) {
            if let Ok(escaped) = String::from_utf8(self.escape_value(value)) {
                return format!("'{}'", escaped);
            }
        }

        // bytea hex input; the backslash is itself escaped outside
        // standard-conforming mode
        let prefix = if self.standard_conforming_strings {
            "\\x"
        } else {
            "\\\\x"
        };
        format!("'{}{}'", prefix, hex::encode(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{Column, Table};
    use crate::core::traits::RowBound;

    #[test]
    fn test_quote_ident() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.quote_ident("name"), "\"name\"");
        assert_eq!(dialect.quote_ident("table\"name"), "\"table\"\"name\"");
    }

    #[test]
    fn test_escape_standard_conforming() {
        let dialect = PostgresDialect::new();
        assert!(dialect.standard_conforming_strings());
        assert_eq!(dialect.escape_value(b"it's a\\b"), b"it''s a\\b".to_vec());
    }

    #[test]
    fn test_escape_legacy_backslashes() {
        let dialect = PostgresDialect::for_standard_conforming_strings("off");
        assert!(!dialect.standard_conforming_strings());
        assert_eq!(dialect.escape_value(b"it's a\\b"), b"it''s a\\\\b".to_vec());
    }

    #[test]
    fn test_escape_stops_at_nul() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.escape_value(b"abc\0def"), b"abc".to_vec());
    }

    #[test]
    fn test_escape_worst_case_bound() {
        let dialect = PostgresDialect::for_standard_conforming_strings("off");
        let value = b"'\\'\\".to_vec();
        let escaped = dialect.escape_value(&value);
        assert_eq!(escaped.len(), 8);
        assert!(escaped.len() <= value.len() * 2 + 1);
    }

    #[test]
    fn test_quote_value() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.quote_value(b"O'Brien"), "'O''Brien'");
        assert_eq!(dialect.quote_value(&[0xde, 0xad, 0x00]), "'\\xdead00'");

        let legacy = PostgresDialect::for_standard_conforming_strings("off");
        assert_eq!(legacy.quote_value(&[0xff]), "'\\\\xff'");
    }

    #[test]
    fn test_retrieve_rows_sql_until_last_key() {
        let mut table = Table::new("orders");
        table.columns = vec![Column::new("id"), Column::new("total")];
        table.primary_key_columns = vec![0];
        let last = vec![b"9".to_vec()];

        let sql = PostgresDialect::new()
            .retrieve_rows_sql(&table, &[b"5".to_vec()], RowBound::LastKey(&last))
            .unwrap();
        assert_eq!(
            sql,
            "SELECT \"id\", \"total\" FROM \"orders\" \
             WHERE \"id\" > '5' AND \"id\" <= '9' ORDER BY \"id\""
        );
    }
}
