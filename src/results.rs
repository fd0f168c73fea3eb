//! Rows, materialized result sets, and open result handles.

mod handle;
mod result_set;
mod row;

pub use handle::{ColumnMeta, ResultHandle};
pub(crate) use handle::RowSource;
pub use result_set::ResultSet;
pub use row::FirebirdRow;
pub(crate) use row::ColumnIndex;
