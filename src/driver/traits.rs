use async_trait::async_trait;

use crate::config::ConnectParams;

use super::IsolationLevel;
use super::failure::DriverFailure;
use super::value::{ColumnDescription, DbValue};

/// What the driver reports after executing one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecuteOutcome {
    /// Result columns; empty when the statement produced no result set.
    pub columns: Vec<ColumnDescription>,
    pub rows_affected: Option<u64>,
}

impl ExecuteOutcome {
    #[must_use]
    pub fn has_rows(&self) -> bool {
        !self.columns.is_empty()
    }
}

/// A thread-blocking Firebird client connection.
///
/// Implementations may bind internal state to the thread that created them: the bridge
/// creates, uses and closes every `BlockingConnection` on one dedicated worker thread,
/// which is why the trait does not require `Send`.
///
/// `execute` runs inside the connection's current transaction and starts one implicitly
/// when none is active. At most one cursor is open at a time.
pub trait BlockingConnection {
    fn begin(&mut self, isolation: IsolationLevel) -> Result<(), DriverFailure>;
    fn execute(&mut self, sql: &str, params: &[DbValue]) -> Result<ExecuteOutcome, DriverFailure>;
    fn fetch(&mut self, max_rows: usize) -> Result<Vec<Vec<DbValue>>, DriverFailure>;
    fn close_cursor(&mut self) -> Result<(), DriverFailure>;
    /// First phase of a two-phase commit.
    fn prepare_commit(&mut self) -> Result<(), DriverFailure>;
    fn commit(&mut self) -> Result<(), DriverFailure>;
    fn rollback(&mut self) -> Result<(), DriverFailure>;
    fn close(&mut self) -> Result<(), DriverFailure>;
}

/// Factory for blocking connections. Called on the worker thread that will own the connection.
pub trait BlockingDriver: Send + Sync + 'static {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn BlockingConnection>, DriverFailure>;
}

/// A natively asynchronous Firebird client connection. Same semantics as
/// [`BlockingConnection`], expressed as awaitable calls.
#[async_trait]
pub trait AsyncConnection: Send + 'static {
    async fn begin(&mut self, isolation: IsolationLevel) -> Result<(), DriverFailure>;
    async fn execute(
        &mut self,
        sql: &str,
        params: &[DbValue],
    ) -> Result<ExecuteOutcome, DriverFailure>;
    async fn fetch(&mut self, max_rows: usize) -> Result<Vec<Vec<DbValue>>, DriverFailure>;
    async fn close_cursor(&mut self) -> Result<(), DriverFailure>;
    async fn prepare_commit(&mut self) -> Result<(), DriverFailure>;
    async fn commit(&mut self) -> Result<(), DriverFailure>;
    async fn rollback(&mut self) -> Result<(), DriverFailure>;
    async fn close(&mut self) -> Result<(), DriverFailure>;

    /// Whether dropping an in-flight call leaves the connection in a consistent state.
    /// When `false`, a dropped call taints the connection.
    fn cancel_safe(&self) -> bool {
        false
    }
}

#[async_trait]
pub trait AsyncDriver: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn connect(&self, params: &ConnectParams) -> Result<Box<dyn AsyncConnection>, DriverFailure>;
}
