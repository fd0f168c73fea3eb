use std::collections::VecDeque;
use std::sync::Arc;

use super::row::ColumnIndex;
use crate::driver::ColumnDescription;
use crate::types::{RowValues, SqlType};

/// Decoding metadata for one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    /// Abstract type used for decoding; `None` decodes by the driver value's own kind.
    pub sql_type: Option<SqlType>,
    pub description: ColumnDescription,
}

/// Where a handle's rows come from.
#[derive(Debug)]
pub(crate) enum RowSource {
    /// Open server cursor, numbered per connection.
    Cursor { cursor_id: u64 },
    /// Rows produced ahead of time (executemany with RETURNING, emulated RETURNING).
    Buffered(VecDeque<Vec<RowValues>>),
    /// No result set, or fully consumed and closed.
    Empty,
}

/// The result of one `execute`: an open cursor or buffered rows, plus column metadata.
///
/// A handle with an open cursor must be drained or closed before the owning connection
/// can run another statement.
#[derive(Debug)]
pub struct ResultHandle {
    pub(crate) connection_id: u64,
    pub(crate) columns: Arc<Vec<ColumnMeta>>,
    pub(crate) index: Arc<ColumnIndex>,
    pub(crate) source: RowSource,
    pub(crate) rows_affected: Option<u64>,
}

impl ResultHandle {
    pub(crate) fn new(
        connection_id: u64,
        columns: Vec<ColumnMeta>,
        source: RowSource,
        rows_affected: Option<u64>,
    ) -> Self {
        let index = ColumnIndex::new(columns.iter().map(|c| c.name.clone()).collect());
        Self {
            connection_id,
            columns: Arc::new(columns),
            index,
            source,
            rows_affected,
        }
    }

    pub(crate) fn empty(connection_id: u64, rows_affected: Option<u64>) -> Self {
        Self::new(connection_id, Vec::new(), RowSource::Empty, rows_affected)
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        self.index.names()
    }

    #[must_use]
    pub fn rows_affected(&self) -> Option<u64> {
        self.rows_affected
    }

    #[must_use]
    pub fn returns_rows(&self) -> bool {
        !self.columns.is_empty()
    }

    /// True while a server cursor is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self.source, RowSource::Cursor { .. })
    }

    #[must_use]
    pub fn is_buffered(&self) -> bool {
        matches!(self.source, RowSource::Buffered(_))
    }
}
