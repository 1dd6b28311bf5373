//! MySQL/MariaDB SQL dialect (Strategy pattern).
//!
//! Provides MySQL-specific identifier quoting and value escaping. Ranged
//! retrieval SQL comes from the [`Dialect`] default method; MySQL accepts
//! row-value comparisons and `LIMIT`, so nothing needs overriding.

use crate::core::traits::Dialect;

/// MySQL/MariaDB dialect implementation.
///
/// Escaping follows `mysql_real_escape_string`: backslash escapes unless the
/// session runs with `NO_BACKSLASH_ESCAPES`, in which case only quotes are
/// doubled.
#[derive(Debug, Clone, Default)]
pub struct MysqlDialect {
    no_backslash_escapes: bool,
}

impl MysqlDialect {
    /// Create a new MySQL dialect instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Dialect for a session whose `sql_mode` is known.
    pub fn for_sql_mode(sql_mode: &str) -> Self {
        Self {
            no_backslash_escapes: sql_mode
                .split(',')
                .any(|mode| mode.trim().eq_ignore_ascii_case("NO_BACKSLASH_ESCAPES")),
        }
    }

    pub fn no_backslash_escapes(&self) -> bool {
        self.no_backslash_escapes
    }
}

impl Dialect for MysqlDialect {
    fn name(&self) -> &str {
        "mysql"
    }

    fn quote_ident(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn escape_value(&self, value: &[u8]) -> Vec<u8> {
        let mut escaped = Vec::with_capacity(value.len() * 2 + 1);

        if self.no_backslash_escapes {
            for &b in value {
                if b == b'\'' {
                    escaped.push(b'\'');
                }
                escaped.push(b);
            }
        } else {
            for &b in value {
                match b {
                    0 => escaped.extend_from_slice(b"\\0"),
                    b'\n' => escaped.extend_from_slice(b"\\n"),
                    b'\r' => escaped.extend_from_slice(b"\\r"),
                    b'\\' => escaped.extend_from_slice(b"\\\\"),
                    b'\'' => escaped.extend_from_slice(b"\\'"),
                    b'"' => escaped.extend_from_slice(b"\\\""),
                    0x1a => escaped.extend_from_slice(b"\\Z"),
                    _ => escaped.push(b),
                }
            }
        }

        escaped.shrink_to_fit();
        escaped
    }

    fn quote_value(&self, value: &[u8]) -> String {
        // statement text must be UTF-8; anything else goes in as a hex literal
        match String::from_utf8(self.escape_value(value)) {
            Ok(escaped) => format!("'{}'", escaped),
            Err(_) => format!("X'{}'", hex::encode(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{Column, Table};
    use crate::core::traits::RowBound;

    #[test]
    fn test_quote_ident() {
        let dialect = MysqlDialect::new();
        assert_eq!(dialect.quote_ident("name"), "`name`");
        assert_eq!(dialect.quote_ident("table`name"), "`table``name`");
    }

    #[test]
    fn test_escape_special_bytes() {
        let dialect = MysqlDialect::new();
        assert_eq!(
            dialect.escape_value(b"it's \"a\\b\"\0\n\r\x1a"),
            b"it\\'s \\\"a\\\\b\\\"\\0\\n\\r\\Z".to_vec()
        );
        assert_eq!(dialect.escape_value(b"plain"), b"plain".to_vec());
    }

    #[test]
    fn test_escape_worst_case_bound() {
        let dialect = MysqlDialect::new();
        let value = vec![b'\''; 100];
        let escaped = dialect.escape_value(&value);
        assert_eq!(escaped.len(), 200);
        assert!(escaped.len() <= value.len() * 2 + 1);
    }

    #[test]
    fn test_no_backslash_escapes_mode() {
        let dialect = MysqlDialect::for_sql_mode("STRICT_TRANS_TABLES,NO_BACKSLASH_ESCAPES");
        assert!(dialect.no_backslash_escapes());
        assert_eq!(dialect.escape_value(b"a'b\\c"), b"a''b\\c".to_vec());

        let dialect = MysqlDialect::for_sql_mode("STRICT_TRANS_TABLES,ONLY_FULL_GROUP_BY");
        assert!(!dialect.no_backslash_escapes());
    }

    #[test]
    fn test_quote_value() {
        let dialect = MysqlDialect::new();
        assert_eq!(dialect.quote_value(b"O'Brien"), "'O\\'Brien'");
        assert_eq!(dialect.quote_value(&[0xde, 0xad, 0xbe, 0xef]), "X'deadbeef'");
    }

    #[test]
    fn test_retrieve_rows_sql() {
        let mut table = Table::new("orders");
        table.columns = vec![Column::new("id"), Column::new("total")];
        table.primary_key_columns = vec![0];

        let sql = MysqlDialect::new()
            .retrieve_rows_sql(&table, &[b"5".to_vec()], RowBound::Count(2))
            .unwrap();
        assert_eq!(
            sql,
            "SELECT `id`, `total` FROM `orders` WHERE `id` > '5' ORDER BY `id` LIMIT 2"
        );
    }
}
