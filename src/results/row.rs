use std::collections::HashMap;
use std::sync::Arc;

use crate::types::RowValues;

/// Column-name lookup shared by every row of one result.
///
/// Firebird reports unquoted names in upper case, so lookups fall back to a
/// case-insensitive match.
#[derive(Debug, Clone, Default)]
pub(crate) struct ColumnIndex {
    names: Arc<Vec<String>>,
    exact: HashMap<String, usize>,
    folded: HashMap<String, usize>,
}

impl ColumnIndex {
    pub(crate) fn new(names: Vec<String>) -> Arc<Self> {
        let mut exact = HashMap::with_capacity(names.len());
        let mut folded = HashMap::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            exact.entry(name.clone()).or_insert(idx);
            folded.entry(name.to_lowercase()).or_insert(idx);
        }
        Arc::new(Self {
            names: Arc::new(names),
            exact,
            folded,
        })
    }

    pub(crate) fn names(&self) -> &Arc<Vec<String>> {
        &self.names
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.exact
            .get(name)
            .or_else(|| self.folded.get(&name.to_lowercase()))
            .copied()
    }
}

/// One decoded row.
#[derive(Debug, Clone)]
pub struct FirebirdRow {
    index: Arc<ColumnIndex>,
    values: Vec<RowValues>,
}

impl FirebirdRow {
    pub(crate) fn new(index: Arc<ColumnIndex>, values: Vec<RowValues>) -> Self {
        Self { index, values }
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        self.index.names()
    }

    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        self.index.position(column_name)
    }

    /// Value of `column_name`, matched exactly first and then case-insensitively.
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.get_column_index(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)
    }

    #[must_use]
    pub fn values(&self) -> &[RowValues] {
        &self.values
    }

    #[must_use]
    pub fn into_values(self) -> Vec<RowValues> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_folds_case() {
        let index = ColumnIndex::new(vec!["ID".into(), "Name".into()]);
        let row = FirebirdRow::new(index, vec![RowValues::Int(7), RowValues::Text("x".into())]);
        assert_eq!(row.get("id"), Some(&RowValues::Int(7)));
        assert_eq!(row.get("Name"), Some(&RowValues::Text("x".into())));
        assert_eq!(row.get("NAME"), Some(&RowValues::Text("x".into())));
        assert!(row.get("missing").is_none());
    }
}
