use std::sync::mpsc::Receiver;

use tokio::sync::oneshot;

use crate::config::ConnectParams;
use crate::driver::{BlockingConnection, BlockingDriver, DriverFailure};

use super::channel::Command;

/// Body of a connection's worker thread: connect, serve commands in order, close.
///
/// The driver connection is created, used and closed on this thread only.
pub(super) fn run_firebird_worker(
    connection_id: u64,
    driver: &dyn BlockingDriver,
    params: &ConnectParams,
    receiver: &Receiver<Command>,
    ready: oneshot::Sender<Result<(), DriverFailure>>,
) {
    let mut conn = match driver.connect(params) {
        Ok(conn) => conn,
        Err(failure) => {
            let _ = ready.send(Err(failure));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        // Nobody is waiting for this connection any more.
        release(connection_id, conn.as_mut());
        return;
    }
    tracing::debug!(connection_id, driver = driver.name(), "worker connected");

    while let Ok(command) = receiver.recv() {
        tracing::trace!(connection_id, command = command.name(), "dispatch");
        match command {
            Command::Begin {
                isolation,
                respond_to,
            } => {
                let _ = respond_to.send(conn.begin(isolation));
            }
            Command::Execute {
                sql,
                params,
                respond_to,
            } => {
                let _ = respond_to.send(conn.execute(&sql, &params));
            }
            Command::Fetch {
                max_rows,
                respond_to,
            } => {
                let _ = respond_to.send(conn.fetch(max_rows));
            }
            Command::CloseCursor { respond_to } => {
                let _ = respond_to.send(conn.close_cursor());
            }
            Command::PrepareCommit { respond_to } => {
                let _ = respond_to.send(conn.prepare_commit());
            }
            Command::Commit { respond_to } => {
                let _ = respond_to.send(conn.commit());
            }
            Command::Rollback { respond_to } => {
                let _ = respond_to.send(conn.rollback());
            }
            Command::Close { respond_to } => {
                let _ = respond_to.send(conn.close());
                tracing::debug!(connection_id, "worker closed connection");
                return;
            }
            Command::Shutdown => break,
        }
    }

    release(connection_id, conn.as_mut());
}

fn release(connection_id: u64, conn: &mut dyn BlockingConnection) {
    if let Err(failure) = conn.close() {
        tracing::debug!(connection_id, error = %failure, "close during worker shutdown failed");
    }
    tracing::debug!(connection_id, "worker stopped");
}
