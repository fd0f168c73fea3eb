use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::driver::DriverFailure;
use crate::error::DialectError;

/// Per-connection flags shared between the caller side and in-flight guards.
#[derive(Debug, Default)]
pub(crate) struct CallState {
    busy: AtomicBool,
    tainted: AtomicBool,
    broken: AtomicBool,
    closed: AtomicBool,
}

impl CallState {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claim the connection for one adapter operation. Every driver call the operation
    /// makes runs under the returned guard.
    ///
    /// `taint_on_drop` decides whether abandoning the guard before any driver call has
    /// completed poisons the connection.
    pub(crate) fn try_enter(
        self: &Arc<Self>,
        op: &'static str,
        taint_on_drop: bool,
    ) -> Result<InFlight, DialectError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DialectError::InvalidState(format!(
                "{op} on a closed connection"
            )));
        }
        if self.tainted.load(Ordering::Acquire) {
            return Err(DialectError::CancelledBeforeCompletion);
        }
        if self.broken.load(Ordering::Acquire) {
            return Err(DialectError::connection_lost(format!(
                "{op} on a connection that was lost earlier"
            )));
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(DialectError::ConcurrentUse(format!(
                "{op} issued while another operation is in flight"
            )));
        }
        Ok(InFlight {
            state: Arc::clone(self),
            op,
            taint_on_drop,
            progressed: AtomicBool::new(false),
            completed: false,
        })
    }

    pub(crate) fn is_tainted(&self) -> bool {
        self.tainted.load(Ordering::Acquire)
    }

    pub(crate) fn is_broken(&self) -> bool {
        self.broken.load(Ordering::Acquire)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub(crate) fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub(crate) fn mark_broken(&self) {
        self.broken.store(true, Ordering::Release);
    }

    pub(crate) fn mark_tainted(&self) {
        self.tainted.store(true, Ordering::Release);
    }

    /// Returns whether the connection was open before this call.
    pub(crate) fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }
}

/// Claim on a connection for one adapter operation. Dropping it before
/// [`InFlight::release`] means the awaiting task went away mid-operation.
pub(crate) struct InFlight {
    state: Arc<CallState>,
    op: &'static str,
    taint_on_drop: bool,
    /// Set once a driver call under this claim has completed; the driver then holds
    /// state only the rest of the operation would settle.
    progressed: AtomicBool,
    completed: bool,
}

impl InFlight {
    pub(crate) fn op(&self) -> &'static str {
        self.op
    }

    /// Settle one driver call: classify a failure and record a lost connection.
    pub(crate) fn settle<T>(&self, result: Result<T, DriverFailure>) -> Result<T, DialectError> {
        self.progressed.store(true, Ordering::Release);
        result.map_err(|failure| {
            let err = DialectError::from_driver(failure);
            if err.is_disconnect() {
                self.state.mark_broken();
                tracing::warn!(op = self.op, error = %err, "connection lost");
            }
            err
        })
    }

    /// Settle one driver call with a transport failure between caller and driver.
    pub(crate) fn lost<T>(&self, message: String) -> Result<T, DialectError> {
        self.progressed.store(true, Ordering::Release);
        self.state.mark_broken();
        tracing::warn!(op = self.op, %message, "connection lost");
        Err(DialectError::connection_lost(message))
    }

    /// End the operation and give the connection back.
    pub(crate) fn release(mut self) {
        self.completed = true;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let progressed = self.progressed.load(Ordering::Acquire);
        if !self.completed && (self.taint_on_drop || progressed) {
            self.state.tainted.store(true, Ordering::Release);
            tracing::warn!(
                op = self.op,
                "operation abandoned before completion; connection tainted"
            );
        }
        self.state.busy.store(false, Ordering::Release);
    }
}
