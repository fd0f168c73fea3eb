use std::sync::Arc;
use std::sync::mpsc::{self, Sender};
use std::thread;

use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::config::ConnectParams;
use crate::driver::{BlockingDriver, DbValue, ExecuteOutcome, IsolationLevel};
use crate::error::DialectError;

use super::channel::{Command, Responder};
use super::dispatcher::run_firebird_worker;
use super::state::{CallState, InFlight};

/// Offloads a blocking driver connection onto its own worker thread.
pub(crate) struct ThreadedBridge {
    sender: Sender<Command>,
    connection_id: u64,
    state: Arc<CallState>,
}

impl ThreadedBridge {
    /// Spawn the worker, connect on it, and wait until the connection is ready.
    pub(crate) async fn spawn(
        connection_id: u64,
        driver: Arc<dyn BlockingDriver>,
        params: ConnectParams,
    ) -> Result<Self, DialectError> {
        let (sender, receiver) = mpsc::channel::<Command>();
        let (ready_tx, ready_rx) = oneshot::channel();
        let handle = Handle::try_current().ok();
        thread::Builder::new()
            .name(format!("firebird-worker-{connection_id}"))
            .spawn(move || {
                let runtime_guard = handle.as_ref().map(Handle::enter);
                run_firebird_worker(connection_id, driver.as_ref(), &params, &receiver, ready_tx);
                drop(runtime_guard);
            })
            .map_err(|err| {
                DialectError::connection_lost(format!(
                    "failed to spawn Firebird worker thread: {err}"
                ))
            })?;

        match ready_rx.await {
            Ok(Ok(())) => Ok(Self {
                sender,
                connection_id,
                state: CallState::new(),
            }),
            Ok(Err(failure)) => Err(DialectError::from_driver(failure)),
            Err(_) => Err(DialectError::connection_lost(
                "Firebird worker exited before connecting",
            )),
        }
    }

    pub(crate) fn state(&self) -> &Arc<CallState> {
        &self.state
    }

    pub(crate) fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// Claim the connection for one adapter operation. Abandoning the claim always
    /// taints: the worker keeps running whatever it was sent.
    pub(crate) fn claim(&self, op: &'static str) -> Result<InFlight, DialectError> {
        self.state.try_enter(op, true)
    }

    async fn request<T>(
        &self,
        claim: &InFlight,
        build: impl FnOnce(Responder<T>) -> Command,
    ) -> Result<T, DialectError> {
        let (tx, rx) = oneshot::channel();
        if self.sender.send(build(tx)).is_err() {
            return claim.lost("Firebird worker closed".into());
        }
        match rx.await {
            Ok(result) => claim.settle(result),
            Err(_) => claim.lost(format!("Firebird worker dropped during {}", claim.op())),
        }
    }

    pub(crate) async fn begin(&self, claim: &InFlight, isolation: IsolationLevel) -> Result<(), DialectError> {
        self.request(claim, |respond_to| Command::Begin {
            isolation,
            respond_to,
        })
        .await
    }

    pub(crate) async fn execute(
        &self,
        claim: &InFlight,
        sql: String,
        params: Vec<DbValue>,
    ) -> Result<ExecuteOutcome, DialectError> {
        self.request(claim, |respond_to| Command::Execute {
            sql,
            params,
            respond_to,
        })
        .await
    }

    pub(crate) async fn fetch(&self, claim: &InFlight, max_rows: usize) -> Result<Vec<Vec<DbValue>>, DialectError> {
        self.request(claim, |respond_to| Command::Fetch {
            max_rows,
            respond_to,
        })
        .await
    }

    pub(crate) async fn close_cursor(&self, claim: &InFlight) -> Result<(), DialectError> {
        self.request(claim, |respond_to| Command::CloseCursor { respond_to })
            .await
    }

    pub(crate) async fn prepare_commit(&self, claim: &InFlight) -> Result<(), DialectError> {
        self.request(claim, |respond_to| Command::PrepareCommit {
            respond_to,
        })
        .await
    }

    pub(crate) async fn commit(&self, claim: &InFlight) -> Result<(), DialectError> {
        self.request(claim, |respond_to| Command::Commit { respond_to })
            .await
    }

    pub(crate) async fn rollback(&self, claim: &InFlight) -> Result<(), DialectError> {
        self.request(claim, |respond_to| Command::Rollback { respond_to })
            .await
    }

    /// Close the driver connection on the worker and stop it. Queued behind any call still
    /// running there, so it also runs after an abandoned call finishes.
    pub(crate) async fn close(&self) -> Result<(), DialectError> {
        if !self.state.mark_closed() {
            return Ok(());
        }
        let healthy = !self.state.is_tainted() && !self.state.is_broken();
        let (tx, rx) = oneshot::channel();
        if self.sender.send(Command::Close { respond_to: tx }).is_err() {
            return Ok(());
        }
        match rx.await {
            Ok(Err(failure)) if healthy => Err(DialectError::from_driver(failure)),
            Ok(Err(failure)) => {
                tracing::warn!(connection_id = self.connection_id, error = %failure, "close of unusable connection failed");
                Ok(())
            }
            Ok(Ok(())) | Err(_) => Ok(()),
        }
    }

    /// Stop the worker without waiting for it.
    pub(crate) fn terminate(&self) {
        self.state.mark_closed();
        let _ = self.sender.send(Command::Shutdown);
    }
}

impl Drop for ThreadedBridge {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Shutdown);
    }
}
