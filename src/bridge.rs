//! Runs driver calls for one connection without blocking the async runtime.
//!
//! Blocking drivers get a dedicated worker thread per connection (`bridge::manager`,
//! `bridge::dispatcher`, `bridge::channel`); native-async drivers are awaited directly
//! (`bridge::native`). Both share the reentrancy and taint rules in `bridge::state`.

mod channel;
mod dispatcher;
mod manager;
mod native;
mod state;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::ConnectParams;
use crate::driver::{AsyncDriver, BlockingDriver, DbValue, ExecuteOutcome, IsolationLevel};
use crate::error::DialectError;

use manager::ThreadedBridge;
use native::NativeBridge;
use state::CallState;
pub(crate) use state::InFlight;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_connection_id() -> u64 {
    NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)
}

/// Execution strategy for one connection, chosen once from the driver kind.
pub(crate) enum Bridge {
    Threaded(ThreadedBridge),
    Native(NativeBridge),
}

macro_rules! dispatch {
    ($self:ident, $method:ident ( $($arg:expr),* )) => {
        match $self {
            Bridge::Threaded(bridge) => bridge.$method($($arg),*).await,
            Bridge::Native(bridge) => bridge.$method($($arg),*).await,
        }
    };
}

impl Bridge {
    pub(crate) async fn connect_threaded(
        driver: Arc<dyn BlockingDriver>,
        params: ConnectParams,
    ) -> Result<Self, DialectError> {
        ThreadedBridge::spawn(next_connection_id(), driver, params)
            .await
            .map(Bridge::Threaded)
    }

    pub(crate) async fn connect_native(
        driver: Arc<dyn AsyncDriver>,
        params: ConnectParams,
    ) -> Result<Self, DialectError> {
        NativeBridge::connect(next_connection_id(), driver, params)
            .await
            .map(Bridge::Native)
    }

    pub(crate) fn connection_id(&self) -> u64 {
        match self {
            Bridge::Threaded(bridge) => bridge.connection_id(),
            Bridge::Native(bridge) => bridge.connection_id(),
        }
    }

    fn state(&self) -> &CallState {
        match self {
            Bridge::Threaded(bridge) => bridge.state().as_ref(),
            Bridge::Native(bridge) => bridge.state().as_ref(),
        }
    }

    pub(crate) fn is_tainted(&self) -> bool {
        self.state().is_tainted()
    }

    pub(crate) fn is_broken(&self) -> bool {
        self.state().is_broken()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state().is_closed()
    }

    pub(crate) fn mark_broken(&self) {
        self.state().mark_broken();
    }

    pub(crate) fn mark_tainted(&self) {
        self.state().mark_tainted();
    }

    /// Claim the connection for one adapter operation; every driver call the operation
    /// makes takes the claim.
    ///
    /// # Errors
    /// `ConcurrentUse` while another operation holds the connection, and the closed,
    /// tainted or lost state otherwise.
    pub(crate) fn claim(&self, op: &'static str) -> Result<InFlight, DialectError> {
        match self {
            Bridge::Threaded(bridge) => bridge.claim(op),
            Bridge::Native(bridge) => bridge.claim(op),
        }
    }

    pub(crate) async fn begin(&self, claim: &InFlight, isolation: IsolationLevel) -> Result<(), DialectError> {
        dispatch!(self, begin(claim, isolation))
    }

    pub(crate) async fn execute(
        &self,
        claim: &InFlight,
        sql: String,
        params: Vec<DbValue>,
    ) -> Result<ExecuteOutcome, DialectError> {
        dispatch!(self, execute(claim, sql, params))
    }

    pub(crate) async fn fetch(
        &self,
        claim: &InFlight,
        max_rows: usize,
    ) -> Result<Vec<Vec<DbValue>>, DialectError> {
        dispatch!(self, fetch(claim, max_rows))
    }

    pub(crate) async fn close_cursor(&self, claim: &InFlight) -> Result<(), DialectError> {
        dispatch!(self, close_cursor(claim))
    }

    pub(crate) async fn prepare_commit(&self, claim: &InFlight) -> Result<(), DialectError> {
        dispatch!(self, prepare_commit(claim))
    }

    pub(crate) async fn commit(&self, claim: &InFlight) -> Result<(), DialectError> {
        dispatch!(self, commit(claim))
    }

    pub(crate) async fn rollback(&self, claim: &InFlight) -> Result<(), DialectError> {
        dispatch!(self, rollback(claim))
    }

    pub(crate) async fn close(&self) -> Result<(), DialectError> {
        dispatch!(self, close())
    }

    pub(crate) fn terminate(&self) {
        match self {
            Bridge::Threaded(bridge) => bridge.terminate(),
            Bridge::Native(bridge) => bridge.terminate(),
        }
    }
}
