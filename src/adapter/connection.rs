use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

use super::errors::StatementContext;
use super::tx::{TxState, TxTracker};
use crate::ast::Statement;
use crate::bridge::{Bridge, InFlight};
use crate::compiler::{CompiledStatement, SequencePrefetch, StatementCompiler};
use crate::dialect::{Backend, FirebirdDialect};
use crate::driver::{ColumnDescription, DbValue, ExecuteOutcome, IsolationLevel};
use crate::error::DialectError;
use crate::results::{ColumnMeta, FirebirdRow, ResultHandle, ResultSet, RowSource};
use crate::type_compiler::{TypeCompiler, decode_untyped};
use crate::types::{Params, RowValues};

/// Statement the pool runs before handing out a connection.
pub const PING_SQL: &str = "SELECT 1 FROM RDB$DATABASE";

const NO_CURSOR: u64 = 0;

/// Run one public operation under a single claim on the connection. The claim is given
/// back on success and failure alike; only an abandoned future leaves it to its drop.
macro_rules! with_claim {
    ($self:ident, $op:expr, |$claim:ident| $body:expr) => {{
        let $claim = $self.bridge.claim($op)?;
        let result = $body.await;
        $claim.release();
        result
    }};
}

/// One Firebird connection behind the async contract.
///
/// Outside an explicit transaction every statement is committed as soon as it (and its
/// cursor, if any) completes. Inside one, DDL is committed immediately and a new
/// transaction with the same isolation level is started so later statements see it.
///
/// Only one operation may be in flight at a time, from its first driver call to its
/// last (an `execute` may also fetch, close the cursor and commit). Overlapping calls
/// fail with [`DialectError::ConcurrentUse`] before reaching the driver; they are never
/// queued.
pub struct FirebirdConnection {
    bridge: Bridge,
    dialect: FirebirdDialect,
    tx: TxTracker,
    open_cursor: AtomicU64,
    next_cursor: AtomicU64,
}

impl std::fmt::Debug for FirebirdConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebirdConnection")
            .field("id", &self.id())
            .field("tx", &self.tx.get())
            .field("unusable", &self.is_unusable())
            .finish_non_exhaustive()
    }
}

impl FirebirdConnection {
    /// Open a connection with the dialect's driver and connection parameters.
    ///
    /// # Errors
    /// Returns `DialectError::Driver` or `DialectError::ConnectionLost` when the driver
    /// cannot connect.
    pub async fn connect(dialect: FirebirdDialect) -> Result<Self, DialectError> {
        let params = dialect.config().connect.clone();
        let bridge = match dialect.backend() {
            Backend::Threaded(driver) => Bridge::connect_threaded(Arc::clone(driver), params).await?,
            Backend::Native(driver) => Bridge::connect_native(Arc::clone(driver), params).await?,
        };
        tracing::debug!(
            connection = bridge.connection_id(),
            driver = %dialect.descriptor().driver_kind,
            "connected"
        );
        Ok(Self {
            bridge,
            dialect,
            tx: TxTracker::default(),
            open_cursor: AtomicU64::new(NO_CURSOR),
            next_cursor: AtomicU64::new(1),
        })
    }

    /// Process-unique id of this connection.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.bridge.connection_id()
    }

    #[must_use]
    pub fn dialect(&self) -> &FirebirdDialect {
        &self.dialect
    }

    #[must_use]
    pub fn transaction_state(&self) -> TxState {
        self.tx.get()
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.tx.get().is_explicit()
    }

    /// True once the connection was lost, tainted by an abandoned call, or closed.
    #[must_use]
    pub fn is_unusable(&self) -> bool {
        self.bridge.is_tainted() || self.bridge.is_broken() || self.bridge.is_closed()
    }

    #[must_use]
    pub fn is_tainted(&self) -> bool {
        self.bridge.is_tainted()
    }

    /// True while a result handle with an open server cursor exists.
    #[must_use]
    pub fn has_open_cursor(&self) -> bool {
        self.open_cursor.load(Ordering::Acquire) != NO_CURSOR
    }

    /// Begin a transaction with the dialect's default isolation level.
    ///
    /// # Errors
    /// Returns `DialectError::InvalidState` if a transaction is already active.
    pub async fn begin(&self) -> Result<(), DialectError> {
        self.begin_with(self.dialect.descriptor().default_isolation)
            .await
    }

    /// Begin a transaction with an explicit isolation level.
    ///
    /// # Errors
    /// Returns `DialectError::InvalidState` if a transaction is already active or a
    /// result handle is still open.
    pub async fn begin_with(&self, isolation: IsolationLevel) -> Result<(), DialectError> {
        with_claim!(self, "begin", |claim| self.begin_claimed(&claim, isolation))
    }

    async fn begin_claimed(&self, claim: &InFlight, isolation: IsolationLevel) -> Result<(), DialectError> {
        self.check_idle("begin")?;
        self.tx.check_can_begin()?;
        self.bridge.begin(claim, isolation).await?;
        self.tx.set(TxState::Active(isolation));
        tracing::debug!(connection = self.id(), %isolation, "transaction started");
        Ok(())
    }

    /// # Errors
    /// Returns `DialectError::InvalidState` without an active transaction.
    pub async fn commit(&self) -> Result<(), DialectError> {
        with_claim!(self, "commit", |claim| self.finish_claimed(&claim, true))
    }

    /// # Errors
    /// Returns `DialectError::InvalidState` without an active transaction.
    pub async fn rollback(&self) -> Result<(), DialectError> {
        with_claim!(self, "rollback", |claim| self.finish_claimed(&claim, false))
    }

    async fn finish_claimed(&self, claim: &InFlight, commit: bool) -> Result<(), DialectError> {
        let op = claim.op();
        self.tx.check_can_finish(op)?;
        self.check_idle(op)?;
        let result = if commit {
            self.bridge.commit(claim).await
        } else {
            self.bridge.rollback(claim).await
        };
        self.settle_transaction(&result);
        result
    }

    /// First phase of a two-phase commit. Afterwards only `commit` or `rollback` are allowed.
    ///
    /// # Errors
    /// Returns `DialectError::InvalidState` unless a transaction is active and unprepared.
    pub async fn prepare_commit(&self) -> Result<(), DialectError> {
        with_claim!(self, "prepare_commit", |claim| self.prepare_claimed(&claim))
    }

    async fn prepare_claimed(&self, claim: &InFlight) -> Result<(), DialectError> {
        let isolation = self.tx.check_active("prepare_commit")?;
        self.check_idle("prepare_commit")?;
        self.bridge.prepare_commit(claim).await?;
        self.tx.set(TxState::PreparedForCommit(isolation));
        Ok(())
    }

    fn settle_transaction(&self, result: &Result<(), DialectError>) {
        match result {
            Ok(()) => self.tx.set(TxState::None),
            Err(err) if err.is_disconnect() => self.tx.set(TxState::None),
            Err(_) => {}
        }
    }

    /// # Errors
    /// Returns `DialectError::InvalidState` outside an active transaction.
    pub async fn savepoint(&self, name: &str) -> Result<(), DialectError> {
        self.savepoint_command("savepoint", "SAVEPOINT", name).await
    }

    /// # Errors
    /// Returns `DialectError::InvalidState` outside an active transaction.
    pub async fn rollback_to_savepoint(&self, name: &str) -> Result<(), DialectError> {
        self.savepoint_command("rollback_to_savepoint", "ROLLBACK TO SAVEPOINT", name)
            .await
    }

    /// # Errors
    /// Returns `DialectError::InvalidState` outside an active transaction.
    pub async fn release_savepoint(&self, name: &str) -> Result<(), DialectError> {
        self.savepoint_command("release_savepoint", "RELEASE SAVEPOINT", name)
            .await
    }

    async fn savepoint_command(
        &self,
        op: &'static str,
        keyword: &str,
        name: &str,
    ) -> Result<(), DialectError> {
        with_claim!(self, op, |claim| self.savepoint_claimed(&claim, keyword, name))
    }

    async fn savepoint_claimed(
        &self,
        claim: &InFlight,
        keyword: &str,
        name: &str,
    ) -> Result<(), DialectError> {
        let op = claim.op();
        self.tx.check_active(op)?;
        self.check_idle(op)?;
        let sql = format!(
            "{keyword} {}",
            self.dialect.compiler().quote_identifier(name)?
        );
        self.run(claim, &sql, Vec::new()).await.map(|_| ())
    }

    /// Compile and execute a statement tree.
    ///
    /// # Errors
    /// Propagates compilation, binding and execution failures.
    pub async fn execute_statement(
        &self,
        statement: &Statement,
        params: &Params,
    ) -> Result<ResultHandle, DialectError> {
        let compiled = self.dialect.compile(statement)?;
        self.execute(&compiled, params).await
    }

    /// Execute one compiled statement.
    ///
    /// Queries return a handle over an open cursor; DML with RETURNING returns its rows
    /// buffered; everything else returns an empty handle carrying the affected row count.
    ///
    /// # Errors
    /// - `DialectError::InvalidState` if another result handle is still open
    /// - `DialectError::Parameter` for missing or out-of-domain bind values
    /// - `DialectError::Driver` / `DialectError::Integrity` when the server rejects the statement
    /// - `DialectError::ConnectionLost`, `DialectError::ConcurrentUse`,
    ///   `DialectError::CancelledBeforeCompletion` from the bridge
    pub async fn execute(
        &self,
        statement: &CompiledStatement,
        params: &Params,
    ) -> Result<ResultHandle, DialectError> {
        with_claim!(self, "execute", |claim| self.execute_claimed(&claim, statement, params))
    }

    async fn execute_claimed(
        &self,
        claim: &InFlight,
        statement: &CompiledStatement,
        params: &Params,
    ) -> Result<ResultHandle, DialectError> {
        self.check_idle("execute")?;
        if statement.is_ddl {
            return self.execute_ddl_statement(claim, statement, params).await;
        }
        if let Some(prefetch) = &statement.sequence_prefetch {
            return self
                .execute_with_prefetch(claim, statement, prefetch, params)
                .await;
        }

        let binds = self.bind_values(statement, params, None)?;
        let outcome = self.run(claim, &statement.sql, binds).await?;
        if !outcome.has_rows() {
            self.autocommit(claim).await?;
            return Ok(ResultHandle::empty(self.id(), outcome.rows_affected));
        }

        let columns = self.column_meta(&outcome);
        if statement.returning.is_some() {
            let rows = self.drain_cursor(claim, &columns).await?;
            self.autocommit(claim).await?;
            return Ok(ResultHandle::new(
                self.id(),
                columns,
                RowSource::Buffered(rows),
                outcome.rows_affected,
            ));
        }

        let cursor_id = self.next_cursor.fetch_add(1, Ordering::Relaxed);
        self.open_cursor.store(cursor_id, Ordering::Release);
        Ok(ResultHandle::new(
            self.id(),
            columns,
            RowSource::Cursor { cursor_id },
            outcome.rows_affected,
        ))
    }

    /// [`FirebirdConnection::execute`] that gives up when `token` fires.
    ///
    /// A cancelled call taints the connection: it refuses further work and the pool
    /// discards it.
    ///
    /// # Errors
    /// Returns `DialectError::CancelledBeforeCompletion` when cancelled, otherwise as
    /// [`FirebirdConnection::execute`].
    pub async fn execute_cancellable(
        &self,
        statement: &CompiledStatement,
        params: &Params,
        token: &CancellationToken,
    ) -> Result<ResultHandle, DialectError> {
        tokio::select! {
            biased;
            () = token.cancelled() => {
                self.bridge.mark_tainted();
                tracing::warn!(connection = self.id(), "execute cancelled; connection tainted");
                Err(DialectError::CancelledBeforeCompletion)
            }
            result = self.execute(statement, params) => result,
        }
    }

    /// Execute one statement per parameter set.
    ///
    /// Statements that produce rows (RETURNING, emulated RETURNING, queries) run once per
    /// set and their rows are collected into one buffered handle. Other statements run in
    /// a single unit of work and report the summed affected row count.
    ///
    /// # Errors
    /// Stops at the first failing set and returns its error.
    pub async fn execute_many(
        &self,
        statement: &CompiledStatement,
        param_sets: &[Params],
    ) -> Result<ResultHandle, DialectError> {
        with_claim!(self, "execute_many", |claim| self
            .execute_many_claimed(&claim, statement, param_sets))
    }

    async fn execute_many_claimed(
        &self,
        claim: &InFlight,
        statement: &CompiledStatement,
        param_sets: &[Params],
    ) -> Result<ResultHandle, DialectError> {
        self.check_idle("execute_many")?;
        if statement.is_ddl {
            return Err(DialectError::InvalidState(
                "execute_many does not accept DDL".into(),
            ));
        }

        if statement.returns_rows || statement.sequence_prefetch.is_some() {
            let mut columns: Option<Vec<ColumnMeta>> = None;
            let mut rows = VecDeque::new();
            let mut affected = 0;
            for params in param_sets {
                let mut handle = self.execute_claimed(claim, statement, params).await?;
                let batch = self.fetch_all_claimed(claim, &mut handle).await?;
                affected += handle.rows_affected.unwrap_or(0);
                if columns.is_none() {
                    columns = Some(handle.columns().to_vec());
                }
                rows.extend(batch.into_iter().map(FirebirdRow::into_values));
            }
            return Ok(ResultHandle::new(
                self.id(),
                columns.unwrap_or_default(),
                RowSource::Buffered(rows),
                Some(affected),
            ));
        }

        let mut affected = 0;
        for params in param_sets {
            let binds = self.bind_values(statement, params, None)?;
            let outcome = self.run(claim, &statement.sql, binds).await?;
            affected += outcome.rows_affected.unwrap_or(0);
        }
        self.autocommit(claim).await?;
        Ok(ResultHandle::empty(self.id(), Some(affected)))
    }

    /// Run every statement of a multi-statement DDL compilation, in order.
    ///
    /// # Errors
    /// Stops at the first failing statement.
    pub async fn execute_ddl(&self, statements: &[CompiledStatement]) -> Result<(), DialectError> {
        with_claim!(self, "execute_ddl", |claim| self.execute_ddl_claimed(&claim, statements))
    }

    async fn execute_ddl_claimed(
        &self,
        claim: &InFlight,
        statements: &[CompiledStatement],
    ) -> Result<(), DialectError> {
        let empty = Params::new();
        for statement in statements {
            self.execute_claimed(claim, statement, &empty).await?;
        }
        Ok(())
    }

    /// Fetch up to `max_rows` rows. Fewer rows than requested means the result is exhausted;
    /// the cursor is then closed (and committed outside a transaction).
    ///
    /// # Errors
    /// Returns `DialectError::InvalidState` for a handle from another connection or a
    /// cursor that was already closed, and driver failures otherwise.
    pub async fn fetch(
        &self,
        handle: &mut ResultHandle,
        max_rows: usize,
    ) -> Result<Vec<FirebirdRow>, DialectError> {
        self.check_owner(handle)?;
        if max_rows == 0 {
            return Ok(Vec::new());
        }
        if !handle.is_open() {
            return Ok(take_buffered(handle, max_rows));
        }
        with_claim!(self, "fetch", |claim| self.fetch_claimed(&claim, handle, max_rows))
    }

    async fn fetch_claimed(
        &self,
        claim: &InFlight,
        handle: &mut ResultHandle,
        max_rows: usize,
    ) -> Result<Vec<FirebirdRow>, DialectError> {
        let RowSource::Cursor { cursor_id } = handle.source else {
            return Ok(take_buffered(handle, max_rows));
        };
        self.check_cursor(cursor_id)?;
        let raw = match self.bridge.fetch(claim, max_rows).await {
            Ok(raw) => raw,
            Err(err) => {
                if err.is_disconnect() {
                    self.open_cursor.store(NO_CURSOR, Ordering::Release);
                    handle.source = RowSource::Empty;
                }
                return Err(err);
            }
        };
        let exhausted = raw.len() < max_rows;
        let decoded = self.decode_rows(&handle.columns, raw)?;
        if exhausted {
            self.finish_cursor(claim, handle).await?;
        }
        Ok(wrap_rows(handle, decoded))
    }

    /// Fetch every remaining row in batches of the configured fetch size.
    ///
    /// # Errors
    /// As [`FirebirdConnection::fetch`].
    pub async fn fetch_all(&self, handle: &mut ResultHandle) -> Result<Vec<FirebirdRow>, DialectError> {
        self.check_owner(handle)?;
        if !handle.is_open() {
            return Ok(take_buffered(handle, usize::MAX));
        }
        with_claim!(self, "fetch_all", |claim| self.fetch_all_claimed(&claim, handle))
    }

    async fn fetch_all_claimed(
        &self,
        claim: &InFlight,
        handle: &mut ResultHandle,
    ) -> Result<Vec<FirebirdRow>, DialectError> {
        let batch_size = self.dialect.config().fetch_batch_size.max(1);
        let mut rows = Vec::new();
        loop {
            let batch = self.fetch_claimed(claim, handle, batch_size).await?;
            let done = batch.len() < batch_size;
            rows.extend(batch);
            if done {
                return Ok(rows);
            }
        }
    }

    /// Close a result handle, releasing its server cursor.
    ///
    /// # Errors
    /// Returns `DialectError::InvalidState` for a handle from another connection.
    pub async fn close_result(&self, handle: &mut ResultHandle) -> Result<(), DialectError> {
        self.check_owner(handle)?;
        match handle.source {
            RowSource::Cursor { cursor_id } if self.open_cursor.load(Ordering::Acquire) == cursor_id => {
                with_claim!(self, "close_result", |claim| self.close_result_claimed(&claim, handle, cursor_id))
            }
            _ => {
                handle.source = RowSource::Empty;
                Ok(())
            }
        }
    }

    async fn close_result_claimed(
        &self,
        claim: &InFlight,
        handle: &mut ResultHandle,
        cursor_id: u64,
    ) -> Result<(), DialectError> {
        // Re-checked under the claim: the cursor may have been closed meanwhile.
        if self.open_cursor.load(Ordering::Acquire) != cursor_id {
            handle.source = RowSource::Empty;
            return Ok(());
        }
        self.finish_cursor(claim, handle).await
    }

    /// Execute and materialize every row.
    ///
    /// # Errors
    /// As [`FirebirdConnection::execute`] and [`FirebirdConnection::fetch`].
    pub async fn query(
        &self,
        statement: &CompiledStatement,
        params: &Params,
    ) -> Result<ResultSet, DialectError> {
        with_claim!(self, "query", |claim| self.query_claimed(&claim, statement, params))
    }

    async fn query_claimed(
        &self,
        claim: &InFlight,
        statement: &CompiledStatement,
        params: &Params,
    ) -> Result<ResultSet, DialectError> {
        let mut handle = self.execute_claimed(claim, statement, params).await?;
        let rows = self.fetch_all_claimed(claim, &mut handle).await?;
        Ok(ResultSet::new(
            Arc::clone(handle.index.names()),
            rows,
            handle.rows_affected,
        ))
    }

    /// Round-trip to the server.
    ///
    /// # Errors
    /// Returns the failure that made the connection unusable.
    pub async fn ping(&self) -> Result<(), DialectError> {
        with_claim!(self, "ping", |claim| self.ping_claimed(&claim))
    }

    async fn ping_claimed(&self, claim: &InFlight) -> Result<(), DialectError> {
        let ping = CompiledStatement::internal(PING_SQL, true);
        self.query_claimed(claim, &ping, &Params::new())
            .await
            .map(|_| ())
    }

    /// Bring a connection handed back by its previous user to a clean state: close a
    /// leaked cursor, roll back a forgotten transaction, and ping.
    pub(crate) async fn reset(&self) -> Result<(), DialectError> {
        with_claim!(self, "reset", |claim| self.reset_claimed(&claim))
    }

    async fn reset_claimed(&self, claim: &InFlight) -> Result<(), DialectError> {
        if self.has_open_cursor() {
            tracing::debug!(connection = self.id(), "closing cursor left open by previous user");
            self.bridge.close_cursor(claim).await?;
            self.open_cursor.store(NO_CURSOR, Ordering::Release);
        }
        if self.in_transaction() {
            tracing::debug!(connection = self.id(), "rolling back transaction left open by previous user");
            let result = self.bridge.rollback(claim).await;
            self.settle_transaction(&result);
            result?;
        }
        self.ping_claimed(claim).await
    }

    /// Close the driver connection. The handle is released even when the close call fails.
    ///
    /// # Errors
    /// Returns the driver's close failure for a connection that was still healthy.
    pub async fn close(&self) -> Result<(), DialectError> {
        let result = self.bridge.close().await;
        self.open_cursor.store(NO_CURSOR, Ordering::Release);
        self.tx.set(TxState::None);
        result
    }

    /// Close without waiting for an in-flight call to drain.
    pub fn terminate(&self) {
        self.bridge.terminate();
        self.open_cursor.store(NO_CURSOR, Ordering::Release);
        self.tx.set(TxState::None);
    }

    fn check_idle(&self, op: &str) -> Result<(), DialectError> {
        if self.has_open_cursor() {
            return Err(DialectError::InvalidState(format!(
                "{op} while a result handle is still open; fetch it to the end or close it first"
            )));
        }
        Ok(())
    }

    fn check_owner(&self, handle: &ResultHandle) -> Result<(), DialectError> {
        if handle.connection_id != self.id() {
            return Err(DialectError::InvalidState(format!(
                "result handle belongs to connection {}, not {}",
                handle.connection_id,
                self.id()
            )));
        }
        Ok(())
    }

    fn check_cursor(&self, cursor_id: u64) -> Result<(), DialectError> {
        if self.open_cursor.load(Ordering::Acquire) != cursor_id {
            return Err(DialectError::InvalidState(
                "result handle's cursor is already closed".into(),
            ));
        }
        Ok(())
    }

    async fn finish_cursor(&self, claim: &InFlight, handle: &mut ResultHandle) -> Result<(), DialectError> {
        let closed = self.bridge.close_cursor(claim).await;
        if closed.is_ok() || self.bridge.is_broken() {
            self.open_cursor.store(NO_CURSOR, Ordering::Release);
            handle.source = RowSource::Empty;
        }
        closed?;
        self.autocommit(claim).await
    }

    async fn autocommit(&self, claim: &InFlight) -> Result<(), DialectError> {
        if self.tx.get().is_explicit() {
            return Ok(());
        }
        self.bridge.commit(claim).await
    }

    /// Execute on the driver, attaching the SQL to server-side failures. Outside a
    /// transaction a rejected statement's implicit transaction is rolled back.
    async fn run(
        &self,
        claim: &InFlight,
        sql: &str,
        binds: Vec<DbValue>,
    ) -> Result<ExecuteOutcome, DialectError> {
        tracing::debug!(connection = self.id(), sql, binds = binds.len(), "execute");
        let result = self
            .bridge
            .execute(claim, sql.to_string(), binds)
            .await
            .for_statement(sql);
        if let Err(err) = &result {
            let rejected = matches!(
                err,
                DialectError::Driver { .. } | DialectError::Integrity { .. }
            );
            if rejected && !self.tx.get().is_explicit() {
                if let Err(rollback) = self.bridge.rollback(claim).await {
                    tracing::debug!(connection = self.id(), error = %rollback, "implicit rollback failed");
                }
            }
        }
        result
    }

    async fn execute_ddl_statement(
        &self,
        claim: &InFlight,
        statement: &CompiledStatement,
        params: &Params,
    ) -> Result<ResultHandle, DialectError> {
        let state = self.tx.get();
        if let TxState::PreparedForCommit(_) = state {
            return Err(DialectError::InvalidState(
                "DDL after prepare_commit".into(),
            ));
        }
        let binds = self.bind_values(statement, params, None)?;
        let outcome = self.run(claim, &statement.sql, binds).await?;
        let committed = self.bridge.commit(claim).await;
        if let TxState::Active(isolation) = state {
            match committed {
                Ok(()) => {
                    self.tx.set(TxState::None);
                    self.bridge.begin(claim, isolation).await?;
                    self.tx.set(TxState::Active(isolation));
                    tracing::debug!(connection = self.id(), "DDL committed; transaction restarted");
                }
                Err(err) => {
                    if err.is_disconnect() {
                        self.tx.set(TxState::None);
                    }
                    return Err(err);
                }
            }
        } else {
            committed?;
        }
        Ok(ResultHandle::empty(self.id(), outcome.rows_affected))
    }

    async fn execute_with_prefetch(
        &self,
        claim: &InFlight,
        statement: &CompiledStatement,
        prefetch: &SequencePrefetch,
        params: &Params,
    ) -> Result<ResultHandle, DialectError> {
        let key = self.fetch_sequence_value(claim, prefetch).await?;
        let binds = self.bind_values(statement, params, Some((prefetch.column.as_str(), &key)))?;
        let outcome = self.run(claim, &statement.sql, binds).await?;
        self.autocommit(claim).await?;

        let columns = vec![ColumnMeta {
            name: prefetch.column.clone(),
            sql_type: None,
            description: ColumnDescription::new(prefetch.column.clone(), key.kind()),
        }];
        let row = vec![decode_untyped(key)?];
        Ok(ResultHandle::new(
            self.id(),
            columns,
            RowSource::Buffered(VecDeque::from([row])),
            outcome.rows_affected,
        ))
    }

    async fn fetch_sequence_value(
        &self,
        claim: &InFlight,
        prefetch: &SequencePrefetch,
    ) -> Result<DbValue, DialectError> {
        let outcome = self.run(claim, &prefetch.sql, Vec::new()).await?;
        if !outcome.has_rows() {
            return Err(DialectError::InvalidState(format!(
                "`{}` produced no result set",
                prefetch.sql
            )));
        }
        let rows = self
            .bridge
            .fetch(claim, 1)
            .await
            .for_statement(&prefetch.sql)?;
        self.bridge.close_cursor(claim).await?;
        rows.into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .filter(|value| !value.is_null())
            .ok_or_else(|| {
                DialectError::InvalidState(format!("`{}` returned no value", prefetch.sql))
            })
    }

    /// Read every row of the open cursor and close it.
    async fn drain_cursor(
        &self,
        claim: &InFlight,
        columns: &[ColumnMeta],
    ) -> Result<VecDeque<Vec<RowValues>>, DialectError> {
        let read = self.read_cursor(claim, columns).await;
        let closed = self.bridge.close_cursor(claim).await;
        let rows = read?;
        closed?;
        Ok(rows)
    }

    async fn read_cursor(
        &self,
        claim: &InFlight,
        columns: &[ColumnMeta],
    ) -> Result<VecDeque<Vec<RowValues>>, DialectError> {
        let batch_size = self.dialect.config().fetch_batch_size.max(1);
        let mut rows = VecDeque::new();
        loop {
            let raw = self.bridge.fetch(claim, batch_size).await?;
            let done = raw.len() < batch_size;
            rows.extend(self.decode_rows(columns, raw)?);
            if done {
                return Ok(rows);
            }
        }
    }

    /// Encode bind values in placeholder order. `injected` supplies a value fetched by
    /// the adapter itself, keyed by bind name.
    fn bind_values(
        &self,
        statement: &CompiledStatement,
        params: &Params,
        injected: Option<(&str, &DbValue)>,
    ) -> Result<Vec<DbValue>, DialectError> {
        let types = self.dialect.type_compiler();
        statement
            .binds
            .iter()
            .map(|slot| {
                if let Some((name, value)) = injected {
                    if slot.name == name {
                        return Ok(value.clone());
                    }
                }
                let value = params
                    .get(&slot.name)
                    .or(slot.value.as_ref())
                    .ok_or_else(|| {
                        DialectError::Parameter(format!("no value for bind `{}`", slot.name))
                    })?;
                match slot.sql_type.clone().or_else(|| value.inferred_type()) {
                    Some(ty) => types.encode(&ty, value),
                    None => Ok(DbValue::Null),
                }
            })
            .collect()
    }

    fn column_meta(&self, outcome: &ExecuteOutcome) -> Vec<ColumnMeta> {
        let types = self.dialect.type_compiler();
        outcome
            .columns
            .iter()
            .map(|column| ColumnMeta {
                name: column.name.clone(),
                sql_type: types.reflect(column),
                description: column.clone(),
            })
            .collect()
    }

    fn decode_rows(
        &self,
        columns: &[ColumnMeta],
        raw: Vec<Vec<DbValue>>,
    ) -> Result<Vec<Vec<RowValues>>, DialectError> {
        let types = self.dialect.type_compiler();
        raw.into_iter()
            .map(|row| {
                row.into_iter()
                    .enumerate()
                    .map(|(idx, value)| {
                        match columns.get(idx).and_then(|c| c.sql_type.as_ref()) {
                            Some(ty) => types.decode(ty, value),
                            None => decode_untyped(value),
                        }
                    })
                    .collect()
            })
            .collect()
    }
}

/// Take up to `max_rows` rows a handle already holds; no driver call.
fn take_buffered(handle: &mut ResultHandle, max_rows: usize) -> Vec<FirebirdRow> {
    let values = match &mut handle.source {
        RowSource::Buffered(rows) => {
            let take = max_rows.min(rows.len());
            let batch: Vec<_> = rows.drain(..take).collect();
            if rows.is_empty() {
                handle.source = RowSource::Empty;
            }
            batch
        }
        RowSource::Cursor { .. } | RowSource::Empty => Vec::new(),
    };
    wrap_rows(handle, values)
}

fn wrap_rows(handle: &ResultHandle, values: Vec<Vec<RowValues>>) -> Vec<FirebirdRow> {
    values
        .into_iter()
        .map(|row| FirebirdRow::new(Arc::clone(&handle.index), row))
        .collect()
}
