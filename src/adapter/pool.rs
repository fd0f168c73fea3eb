use std::future::Future;

use bb8::{ManageConnection, Pool, PooledConnection};

use super::connection::FirebirdConnection;
use crate::dialect::FirebirdDialect;
use crate::error::DialectError;

/// bb8 manager for Firebird connections.
#[derive(Debug, Clone)]
pub struct FirebirdManager {
    dialect: FirebirdDialect,
}

impl FirebirdManager {
    #[must_use]
    pub fn new(dialect: FirebirdDialect) -> Self {
        Self { dialect }
    }

    /// Build a pool from this manager.
    ///
    /// # Errors
    /// Returns `DialectError::Pool` if creating the pool fails.
    pub async fn build_pool(self, max_size: u32) -> Result<FirebirdPool, DialectError> {
        let pool = Pool::builder()
            .max_size(max_size.max(1))
            .test_on_check_out(true)
            .build(self)
            .await
            .map_err(|e| DialectError::Pool(format!("firebird pool error: {e}")))?;
        Ok(FirebirdPool { pool })
    }
}

impl ManageConnection for FirebirdManager {
    type Connection = FirebirdConnection;
    type Error = DialectError;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let dialect = self.dialect.clone();
        async move { FirebirdConnection::connect(dialect).await }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move { conn.reset().await }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.is_unusable()
    }
}

/// A pooled Firebird connection; returns to the pool on drop unless it became unusable.
pub type PooledFirebirdConnection = PooledConnection<'static, FirebirdManager>;

/// Pool of [`FirebirdConnection`]s.
#[derive(Debug, Clone)]
pub struct FirebirdPool {
    pool: Pool<FirebirdManager>,
}

impl FirebirdPool {
    /// Check out a connection; it is pinged (and cleaned up) first.
    ///
    /// # Errors
    /// Returns the connect failure, or `DialectError::Pool` on timeout.
    pub async fn acquire(&self) -> Result<PooledFirebirdConnection, DialectError> {
        Ok(self.pool.get_owned().await?)
    }

    #[must_use]
    pub fn inner(&self) -> &Pool<FirebirdManager> {
        &self.pool
    }

    /// Connections currently held by the pool, idle or checked out.
    #[must_use]
    pub fn connections(&self) -> u32 {
        self.pool.state().connections
    }
}
