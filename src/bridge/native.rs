use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::ConnectParams;
use crate::driver::{AsyncConnection, AsyncDriver, DbValue, ExecuteOutcome, IsolationLevel};
use crate::error::DialectError;

use super::state::{CallState, InFlight};

/// Pass-through for natively asynchronous drivers; adds only reentrancy and taint tracking.
pub(crate) struct NativeBridge {
    conn: Mutex<Option<Box<dyn AsyncConnection>>>,
    connection_id: u64,
    cancel_safe: bool,
    state: Arc<CallState>,
}

macro_rules! native_call {
    ($self:ident, $claim:ident, |$conn:ident| $call:expr) => {{
        let mut slot = $self.conn.try_lock().map_err(|_| {
            DialectError::ConcurrentUse(format!(
                "{} issued while the driver handle is held",
                $claim.op()
            ))
        })?;
        let Some($conn) = slot.as_mut() else {
            return $claim.lost(format!("{} on a released driver handle", $claim.op()));
        };
        let result = $call.await;
        drop(slot);
        $claim.settle(result)
    }};
}

impl NativeBridge {
    pub(crate) async fn connect(
        connection_id: u64,
        driver: Arc<dyn AsyncDriver>,
        params: ConnectParams,
    ) -> Result<Self, DialectError> {
        let conn = driver
            .connect(&params)
            .await
            .map_err(DialectError::from_driver)?;
        let cancel_safe = conn.cancel_safe();
        tracing::debug!(connection_id, driver = driver.name(), cancel_safe, "native connection opened");
        Ok(Self {
            conn: Mutex::new(Some(conn)),
            connection_id,
            cancel_safe,
            state: CallState::new(),
        })
    }

    pub(crate) fn state(&self) -> &Arc<CallState> {
        &self.state
    }

    pub(crate) fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// Claim the connection for one adapter operation. Abandoning the claim taints unless
    /// the driver is cancel-safe and no driver call under it has completed yet.
    pub(crate) fn claim(&self, op: &'static str) -> Result<InFlight, DialectError> {
        self.state.try_enter(op, !self.cancel_safe)
    }

    pub(crate) async fn begin(&self, claim: &InFlight, isolation: IsolationLevel) -> Result<(), DialectError> {
        native_call!(self, claim, |conn| conn.begin(isolation))
    }

    pub(crate) async fn execute(
        &self,
        claim: &InFlight,
        sql: String,
        params: Vec<DbValue>,
    ) -> Result<ExecuteOutcome, DialectError> {
        native_call!(self, claim, |conn| conn.execute(&sql, &params))
    }

    pub(crate) async fn fetch(&self, claim: &InFlight, max_rows: usize) -> Result<Vec<Vec<DbValue>>, DialectError> {
        native_call!(self, claim, |conn| conn.fetch(max_rows))
    }

    pub(crate) async fn close_cursor(&self, claim: &InFlight) -> Result<(), DialectError> {
        native_call!(self, claim, |conn| conn.close_cursor())
    }

    pub(crate) async fn prepare_commit(&self, claim: &InFlight) -> Result<(), DialectError> {
        native_call!(self, claim, |conn| conn.prepare_commit())
    }

    pub(crate) async fn commit(&self, claim: &InFlight) -> Result<(), DialectError> {
        native_call!(self, claim, |conn| conn.commit())
    }

    pub(crate) async fn rollback(&self, claim: &InFlight) -> Result<(), DialectError> {
        native_call!(self, claim, |conn| conn.rollback())
    }

    pub(crate) async fn close(&self) -> Result<(), DialectError> {
        if !self.state.mark_closed() {
            return Ok(());
        }
        let healthy = !self.state.is_tainted() && !self.state.is_broken();
        let Some(mut conn) = self.conn.lock().await.take() else {
            return Ok(());
        };
        match conn.close().await {
            Err(failure) if healthy => Err(DialectError::from_driver(failure)),
            Err(failure) => {
                tracing::warn!(connection_id = self.connection_id, error = %failure, "close of unusable connection failed");
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    /// Release the driver handle without closing it gracefully.
    pub(crate) fn terminate(&self) {
        self.state.mark_closed();
        if let Ok(mut slot) = self.conn.try_lock() {
            slot.take();
        }
    }
}
