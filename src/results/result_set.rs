use std::sync::Arc;

use super::row::FirebirdRow;

/// A fully materialized result.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub results: Vec<FirebirdRow>,
    /// Rows affected as reported by the server (DML without RETURNING).
    pub rows_affected: Option<u64>,
    column_names: Arc<Vec<String>>,
}

impl ResultSet {
    pub(crate) fn new(
        column_names: Arc<Vec<String>>,
        results: Vec<FirebirdRow>,
        rows_affected: Option<u64>,
    ) -> Self {
        Self {
            results,
            rows_affected,
            column_names,
        }
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<&FirebirdRow> {
        self.results.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FirebirdRow> {
        self.results.iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a FirebirdRow;
    type IntoIter = std::slice::Iter<'a, FirebirdRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}
