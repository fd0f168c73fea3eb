//! Convenient imports for common functionality.

pub use crate::adapter::{
    FirebirdConnection, FirebirdManager, FirebirdPool, PooledFirebirdConnection, TxState,
};
pub use crate::ast::{
    BinaryOp, ColumnDef, CompoundSelect, CreateTable, Delete, Expr, Insert, JoinKind, Literal,
    Select, Sequence, SetOperator, Statement, TextStatement, Update,
};
pub use crate::capability::{CapabilityDescriptor, Degradation, DriverKind};
pub use crate::compiler::{CompiledStatement, FirebirdCompiler, StatementCompiler};
pub use crate::config::{ConnectParams, DialectConfig, ServerVersion};
pub use crate::dialect::{DialectDescriptor, DriverSet, FirebirdDialect};
pub use crate::driver::{
    AsyncConnection, AsyncDriver, BlockingConnection, BlockingDriver, ColumnDescription,
    DbValue, DriverFailure, ExecuteOutcome, IsolationLevel,
};
pub use crate::error::DialectError;
pub use crate::results::{FirebirdRow, ResultHandle, ResultSet};
pub use crate::type_compiler::{FirebirdTypeCompiler, TypeCompiler};
pub use crate::types::{Decimal, Params, RowValues, SqlType};
