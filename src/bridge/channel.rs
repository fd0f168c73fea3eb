use tokio::sync::oneshot;

use crate::driver::{DbValue, DriverFailure, ExecuteOutcome, IsolationLevel};

pub(super) type Responder<T> = oneshot::Sender<Result<T, DriverFailure>>;

/// One blocking driver call shipped to the worker thread.
pub(super) enum Command {
    Begin {
        isolation: IsolationLevel,
        respond_to: Responder<()>,
    },
    Execute {
        sql: String,
        params: Vec<DbValue>,
        respond_to: Responder<ExecuteOutcome>,
    },
    Fetch {
        max_rows: usize,
        respond_to: Responder<Vec<Vec<DbValue>>>,
    },
    CloseCursor {
        respond_to: Responder<()>,
    },
    PrepareCommit {
        respond_to: Responder<()>,
    },
    Commit {
        respond_to: Responder<()>,
    },
    Rollback {
        respond_to: Responder<()>,
    },
    /// Close the driver connection and stop the worker.
    Close {
        respond_to: Responder<()>,
    },
    Shutdown,
}

impl Command {
    pub(super) fn name(&self) -> &'static str {
        match self {
            Command::Begin { .. } => "begin",
            Command::Execute { .. } => "execute",
            Command::Fetch { .. } => "fetch",
            Command::CloseCursor { .. } => "close_cursor",
            Command::PrepareCommit { .. } => "prepare_commit",
            Command::Commit { .. } => "commit",
            Command::Rollback { .. } => "rollback",
            Command::Close { .. } => "close",
            Command::Shutdown => "shutdown",
        }
    }
}
