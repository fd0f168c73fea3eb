use std::sync::{Mutex, PoisonError};

use crate::driver::IsolationLevel;
use crate::error::DialectError;

/// Transaction state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxState {
    /// No explicit transaction; every statement is committed by the adapter.
    #[default]
    None,
    Active(IsolationLevel),
    /// First phase of a two-phase commit has completed.
    PreparedForCommit(IsolationLevel),
}

impl TxState {
    #[must_use]
    pub fn is_explicit(self) -> bool {
        !matches!(self, TxState::None)
    }
}

/// Interior-mutable holder for [`TxState`]; never locked across an await.
#[derive(Debug, Default)]
pub(crate) struct TxTracker {
    state: Mutex<TxState>,
}

impl TxTracker {
    pub(crate) fn get(&self) -> TxState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set(&self, next: TxState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    pub(crate) fn check_can_begin(&self) -> Result<(), DialectError> {
        match self.get() {
            TxState::None => Ok(()),
            _ => Err(DialectError::InvalidState(
                "a transaction is already active; use savepoints for nesting".into(),
            )),
        }
    }

    /// Isolation of the open transaction, for commit/rollback.
    pub(crate) fn check_can_finish(&self, op: &str) -> Result<IsolationLevel, DialectError> {
        match self.get() {
            TxState::Active(isolation) | TxState::PreparedForCommit(isolation) => Ok(isolation),
            TxState::None => Err(DialectError::InvalidState(format!(
                "{op} without an active transaction"
            ))),
        }
    }

    pub(crate) fn check_active(&self, op: &str) -> Result<IsolationLevel, DialectError> {
        match self.get() {
            TxState::Active(isolation) => Ok(isolation),
            TxState::PreparedForCommit(_) => Err(DialectError::InvalidState(format!(
                "{op} after prepare_commit; only commit or rollback are allowed"
            ))),
            TxState::None => Err(DialectError::InvalidState(format!(
                "{op} requires an active transaction"
            ))),
        }
    }
}
