//! In-memory Firebird stand-in for tests and benchmarks.
//!
//! `MemoryServer` scripts responses by SQL fragment and records every driver call,
//! including the thread it ran on. It exposes the same script through a blocking driver
//! (for `fdb_async`) and a native async driver (for `firebird_async`).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{ConnectParams, DialectConfig, ServerVersion};
use crate::dialect::{DriverSet, FirebirdDialect};
use crate::driver::{
    AsyncConnection, AsyncDriver, BlockingConnection, BlockingDriver, ColumnDescription,
    DbValue, DriverFailure, ExecuteOutcome, IsolationLevel,
};
use crate::error::DialectError;

/// One recorded driver call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    /// Server-side connection number, starting at 1.
    pub connection: usize,
    pub op: &'static str,
    pub sql: Option<String>,
    pub params: Vec<DbValue>,
    pub thread: Option<String>,
}

#[derive(Debug, Clone)]
enum Response {
    Rows {
        columns: Vec<ColumnDescription>,
        rows: Vec<Vec<DbValue>>,
    },
    Affected(u64),
    Fail(DriverFailure),
    FailOnFetch {
        columns: Vec<ColumnDescription>,
        failure: DriverFailure,
    },
    /// One row holding the bound parameters.
    Echo,
}

#[derive(Debug, Clone)]
struct Rule {
    fragment: String,
    response: Response,
    delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct ServerState {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<CallRecord>>,
    sequences: Mutex<HashMap<String, i64>>,
    connect_failure: Mutex<Option<DriverFailure>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
    cancel_safe: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scriptable in-memory server shared by every connection opened through its drivers.
#[derive(Debug, Clone, Default)]
pub struct MemoryServer {
    state: Arc<ServerState>,
}

impl MemoryServer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn add_rule(&self, fragment: &str, response: Response, delay: Option<Duration>) {
        lock(&self.state.rules).push(Rule {
            fragment: fragment.to_string(),
            response,
            delay,
        });
    }

    /// Statements containing `fragment` produce `rows`. Later rules win over earlier ones.
    pub fn respond_rows(
        &self,
        fragment: &str,
        columns: Vec<ColumnDescription>,
        rows: Vec<Vec<DbValue>>,
    ) {
        self.add_rule(fragment, Response::Rows { columns, rows }, None);
    }

    pub fn respond_affected(&self, fragment: &str, rows_affected: u64) {
        self.add_rule(fragment, Response::Affected(rows_affected), None);
    }

    /// Statements containing `fragment` are rejected with `failure`.
    pub fn fail(&self, fragment: &str, failure: DriverFailure) {
        self.add_rule(fragment, Response::Fail(failure), None);
    }

    /// Statements containing `fragment` open a cursor whose first fetch fails.
    pub fn fail_on_fetch(
        &self,
        fragment: &str,
        columns: Vec<ColumnDescription>,
        failure: DriverFailure,
    ) {
        self.add_rule(fragment, Response::FailOnFetch { columns, failure }, None);
    }

    /// Statements containing `fragment` return their parameters as one row.
    pub fn echo_params(&self, fragment: &str) {
        self.add_rule(fragment, Response::Echo, None);
    }

    /// Statements containing `fragment` take `delay` before affecting no rows.
    pub fn respond_slowly(&self, fragment: &str, delay: Duration) {
        self.add_rule(fragment, Response::Affected(0), Some(delay));
    }

    pub fn fail_connect(&self, failure: Option<DriverFailure>) {
        *lock(&self.state.connect_failure) = failure;
    }

    /// Whether async connections report dropped calls as harmless.
    pub fn set_cancel_safe(&self, cancel_safe: bool) {
        self.state.cancel_safe.store(cancel_safe, Ordering::Release);
    }

    pub fn set_sequence(&self, name: &str, value: i64) {
        lock(&self.state.sequences).insert(name.to_string(), value);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<CallRecord> {
        lock(&self.state.calls).clone()
    }

    /// Operation names in call order, e.g. `["connect", "execute", "commit"]`.
    #[must_use]
    pub fn ops(&self) -> Vec<&'static str> {
        lock(&self.state.calls).iter().map(|call| call.op).collect()
    }

    /// SQL text of every `execute`, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        lock(&self.state.calls)
            .iter()
            .filter_map(|call| call.sql.clone())
            .collect()
    }

    pub fn clear_calls(&self) {
        lock(&self.state.calls).clear();
    }

    #[must_use]
    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn blocking_driver(&self) -> Arc<dyn BlockingDriver> {
        Arc::new(BlockingMemoryDriver {
            server: self.clone(),
        })
    }

    #[must_use]
    pub fn async_driver(&self) -> Arc<dyn AsyncDriver> {
        Arc::new(AsyncMemoryDriver {
            server: self.clone(),
        })
    }

    /// Both drivers, so any driver id resolves against this server.
    #[must_use]
    pub fn driver_set(&self) -> DriverSet {
        DriverSet::new()
            .with_blocking(self.blocking_driver())
            .with_async(self.async_driver())
    }

    /// A dialect for `driver` against a server of `version`.
    ///
    /// # Errors
    /// Returns `DialectError::UnsupportedDriver` for an unknown driver id.
    pub fn dialect(&self, driver: &str, version: ServerVersion) -> Result<FirebirdDialect, DialectError> {
        let config = DialectConfig::new(driver, "memory").with_server_version(version);
        FirebirdDialect::new(config, &self.driver_set())
    }

    fn open(&self) -> Result<MemoryConnection, DriverFailure> {
        if let Some(failure) = lock(&self.state.connect_failure).clone() {
            return Err(failure);
        }
        let number = self.state.opened.fetch_add(1, Ordering::AcqRel) + 1;
        let conn = MemoryConnection {
            server: self.clone(),
            number,
            in_tx: false,
            prepared: false,
            cursor: None,
        };
        conn.record("connect", None, &[]);
        Ok(conn)
    }

    fn delay_for(&self, sql: &str) -> Option<Duration> {
        lock(&self.state.rules)
            .iter()
            .rev()
            .find(|rule| sql.contains(&rule.fragment))
            .and_then(|rule| rule.delay)
    }

    fn response_for(&self, sql: &str) -> Option<Response> {
        if let Some(rule) = lock(&self.state.rules)
            .iter()
            .rev()
            .find(|rule| sql.contains(&rule.fragment))
        {
            return Some(rule.response.clone());
        }
        if sql == crate::adapter::PING_SQL {
            return Some(Response::Rows {
                columns: vec![ColumnDescription::new("CONSTANT", "INTEGER")],
                rows: vec![vec![DbValue::Integer(1)]],
            });
        }
        self.next_sequence_value(sql)
    }

    fn next_sequence_value(&self, sql: &str) -> Option<Response> {
        let name = if let Some(rest) = sql.strip_prefix("SELECT NEXT VALUE FOR ") {
            rest.split(" FROM").next()?
        } else {
            sql.strip_prefix("SELECT GEN_ID(")?.split(',').next()?
        };
        let name = name.trim().trim_matches('"').to_string();
        let mut sequences = lock(&self.state.sequences);
        let value = sequences.entry(name).or_insert(0);
        *value += 1;
        Some(Response::Rows {
            columns: vec![ColumnDescription::new("NEXT_VALUE", "BIGINT")],
            rows: vec![vec![DbValue::BigInt(*value)]],
        })
    }
}

enum Cursor {
    Rows(VecDeque<Vec<DbValue>>),
    Failing(DriverFailure),
}

/// A connection to a [`MemoryServer`].
struct MemoryConnection {
    server: MemoryServer,
    number: usize,
    in_tx: bool,
    prepared: bool,
    cursor: Option<Cursor>,
}

impl MemoryConnection {
    fn record(&self, op: &'static str, sql: Option<&str>, params: &[DbValue]) {
        lock(&self.server.state.calls).push(CallRecord {
            connection: self.number,
            op,
            sql: sql.map(str::to_string),
            params: params.to_vec(),
            thread: std::thread::current().name().map(str::to_string),
        });
    }

    fn begin(&mut self, isolation: IsolationLevel) -> Result<(), DriverFailure> {
        self.record("begin", None, &[]);
        if self.in_tx {
            return Err(DriverFailure::new(format!(
                "cannot start {} transaction: a transaction is already active",
                isolation.as_native()
            )));
        }
        self.in_tx = true;
        Ok(())
    }

    fn execute(&mut self, sql: &str, params: &[DbValue]) -> Result<ExecuteOutcome, DriverFailure> {
        self.record("execute", Some(sql), params);
        if self.cursor.is_some() {
            return Err(DriverFailure::new("Attempt to reopen an open cursor").with_sqlcode(-502));
        }
        self.in_tx = true;
        match self.server.response_for(sql) {
            None => Ok(ExecuteOutcome::default()),
            Some(Response::Affected(rows)) => Ok(ExecuteOutcome {
                columns: Vec::new(),
                rows_affected: Some(rows),
            }),
            Some(Response::Fail(failure)) => Err(failure),
            Some(Response::Rows { columns, rows }) => {
                self.cursor = Some(Cursor::Rows(rows.into()));
                Ok(ExecuteOutcome {
                    columns,
                    rows_affected: None,
                })
            }
            Some(Response::FailOnFetch { columns, failure }) => {
                self.cursor = Some(Cursor::Failing(failure));
                Ok(ExecuteOutcome {
                    columns,
                    rows_affected: None,
                })
            }
            Some(Response::Echo) => {
                let columns = params
                    .iter()
                    .enumerate()
                    .map(|(idx, value)| ColumnDescription::new(format!("P{}", idx + 1), value.kind()))
                    .collect();
                self.cursor = Some(Cursor::Rows(VecDeque::from([params.to_vec()])));
                Ok(ExecuteOutcome {
                    columns,
                    rows_affected: Some(1),
                })
            }
        }
    }

    fn fetch(&mut self, max_rows: usize) -> Result<Vec<Vec<DbValue>>, DriverFailure> {
        self.record("fetch", None, &[]);
        match self.cursor.as_mut() {
            None => Err(DriverFailure::new("Attempt to fetch from a closed cursor").with_sqlcode(-501)),
            Some(Cursor::Failing(failure)) => Err(failure.clone()),
            Some(Cursor::Rows(rows)) => {
                let take = max_rows.min(rows.len());
                Ok(rows.drain(..take).collect())
            }
        }
    }

    fn close_cursor(&mut self) -> Result<(), DriverFailure> {
        self.record("close_cursor", None, &[]);
        self.cursor = None;
        Ok(())
    }

    fn prepare_commit(&mut self) -> Result<(), DriverFailure> {
        self.record("prepare_commit", None, &[]);
        if !self.in_tx {
            return Err(DriverFailure::new("no transaction to prepare"));
        }
        self.prepared = true;
        Ok(())
    }

    fn finish(&mut self, op: &'static str) -> Result<(), DriverFailure> {
        self.record(op, None, &[]);
        self.in_tx = false;
        self.prepared = false;
        self.cursor = None;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DriverFailure> {
        self.record("close", None, &[]);
        self.cursor = None;
        self.in_tx = false;
        self.server.state.closed.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

struct BlockingMemoryDriver {
    server: MemoryServer,
}

struct BlockingMemoryConnection(MemoryConnection);

impl BlockingDriver for BlockingMemoryDriver {
    fn name(&self) -> &str {
        "memory-blocking"
    }

    fn connect(&self, _params: &ConnectParams) -> Result<Box<dyn BlockingConnection>, DriverFailure> {
        Ok(Box::new(BlockingMemoryConnection(self.server.open()?)))
    }
}

impl BlockingConnection for BlockingMemoryConnection {
    fn begin(&mut self, isolation: IsolationLevel) -> Result<(), DriverFailure> {
        self.0.begin(isolation)
    }

    fn execute(&mut self, sql: &str, params: &[DbValue]) -> Result<ExecuteOutcome, DriverFailure> {
        if let Some(delay) = self.0.server.delay_for(sql) {
            std::thread::sleep(delay);
        }
        self.0.execute(sql, params)
    }

    fn fetch(&mut self, max_rows: usize) -> Result<Vec<Vec<DbValue>>, DriverFailure> {
        self.0.fetch(max_rows)
    }

    fn close_cursor(&mut self) -> Result<(), DriverFailure> {
        self.0.close_cursor()
    }

    fn prepare_commit(&mut self) -> Result<(), DriverFailure> {
        self.0.prepare_commit()
    }

    fn commit(&mut self) -> Result<(), DriverFailure> {
        self.0.finish("commit")
    }

    fn rollback(&mut self) -> Result<(), DriverFailure> {
        self.0.finish("rollback")
    }

    fn close(&mut self) -> Result<(), DriverFailure> {
        self.0.close()
    }
}

struct AsyncMemoryDriver {
    server: MemoryServer,
}

struct AsyncMemoryConnection {
    inner: MemoryConnection,
    cancel_safe: bool,
}

#[async_trait]
impl AsyncDriver for AsyncMemoryDriver {
    fn name(&self) -> &str {
        "memory-async"
    }

    async fn connect(&self, _params: &ConnectParams) -> Result<Box<dyn AsyncConnection>, DriverFailure> {
        Ok(Box::new(AsyncMemoryConnection {
            inner: self.server.open()?,
            cancel_safe: self.server.state.cancel_safe.load(Ordering::Acquire),
        }))
    }
}

#[async_trait]
impl AsyncConnection for AsyncMemoryConnection {
    async fn begin(&mut self, isolation: IsolationLevel) -> Result<(), DriverFailure> {
        self.inner.begin(isolation)
    }

    async fn execute(&mut self, sql: &str, params: &[DbValue]) -> Result<ExecuteOutcome, DriverFailure> {
        if let Some(delay) = self.inner.server.delay_for(sql) {
            tokio::time::sleep(delay).await;
        }
        self.inner.execute(sql, params)
    }

    async fn fetch(&mut self, max_rows: usize) -> Result<Vec<Vec<DbValue>>, DriverFailure> {
        self.inner.fetch(max_rows)
    }

    async fn close_cursor(&mut self) -> Result<(), DriverFailure> {
        self.inner.close_cursor()
    }

    async fn prepare_commit(&mut self) -> Result<(), DriverFailure> {
        self.inner.prepare_commit()
    }

    async fn commit(&mut self) -> Result<(), DriverFailure> {
        self.inner.finish("commit")
    }

    async fn rollback(&mut self) -> Result<(), DriverFailure> {
        self.inner.finish("rollback")
    }

    async fn close(&mut self) -> Result<(), DriverFailure> {
        self.inner.close()
    }

    fn cancel_safe(&self) -> bool {
        self.cancel_safe
    }
}
