//! Read-only access to the cells of one fetched row.
//!
//! Each engine hands its row callbacks a borrowed view over the driver's row
//! buffer. The view is only valid for the duration of the callback; callers
//! that need to keep a row copy it into an [`OwnedRow`].

/// Ordinal-indexed view over one row's cells.
///
/// Cells carry the engine's text-format bytes. Check [`Row::null_at`] before
/// reading a cell: a NULL cell has no bytes.
pub trait Row: Send + Sync {
    /// Number of columns in the row.
    fn n_columns(&self) -> usize;

    /// Whether the cell is SQL NULL.
    fn null_at(&self, column: usize) -> bool;

    /// Raw bytes of the cell. Empty for NULL cells.
    fn result_at(&self, column: usize) -> &[u8];

    /// Byte length of the cell. Binary-safe; no terminator is assumed.
    fn length_of(&self, column: usize) -> usize {
        self.result_at(column).len()
    }

    /// Cell decoded as a string. Invalid UTF-8 is replaced, not rejected.
    fn string_at(&self, column: usize) -> String {
        String::from_utf8_lossy(self.result_at(column)).into_owned()
    }
}

/// A row copied out of a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnedRow {
    pub cells: Vec<Option<Vec<u8>>>,
}

impl OwnedRow {
    pub fn new(cells: Vec<Option<Vec<u8>>>) -> Self {
        Self { cells }
    }

    /// Copy every cell of a borrowed row.
    pub fn from_row(row: &dyn Row) -> Self {
        let cells = (0..row.n_columns())
            .map(|i| (!row.null_at(i)).then(|| row.result_at(i).to_vec()))
            .collect();
        Self { cells }
    }

    /// Build a row of non-NULL text cells.
    pub fn from_strs(values: &[&str]) -> Self {
        Self::new(values.iter().map(|v| Some(v.as_bytes().to_vec())).collect())
    }
}

impl Row for OwnedRow {
    fn n_columns(&self) -> usize {
        self.cells.len()
    }

    fn null_at(&self, column: usize) -> bool {
        self.cells[column].is_none()
    }

    fn result_at(&self, column: usize) -> &[u8] {
        self.cells[column].as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_safe_cells() {
        let row = OwnedRow::new(vec![Some(b"a\0b".to_vec()), None, Some(Vec::new())]);

        assert_eq!(row.n_columns(), 3);
        assert!(!row.null_at(0));
        assert_eq!(row.length_of(0), 3);
        assert_eq!(row.result_at(0), b"a\0b");

        assert!(row.null_at(1));
        assert_eq!(row.length_of(1), 0);

        // empty string is not NULL
        assert!(!row.null_at(2));
        assert_eq!(row.string_at(2), "");
    }

    #[test]
    fn test_string_at_replaces_invalid_utf8() {
        let row = OwnedRow::new(vec![Some(vec![b'o', 0xff, b'k'])]);
        assert_eq!(row.string_at(0), "o\u{fffd}k");
        assert_eq!(row.length_of(0), 3);
    }

    #[test]
    fn test_from_row_copies_nulls() {
        let source_row = OwnedRow::new(vec![Some(b"7".to_vec()), None]);
        let copy = OwnedRow::from_row(&source_row);
        assert_eq!(copy, source_row);
    }
}
