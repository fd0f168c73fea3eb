use std::fmt;
use std::sync::Arc;

use crate::adapter::{FirebirdConnection, FirebirdManager, FirebirdPool};
use crate::ast::Statement;
use crate::capability::{self, CapabilityDescriptor, DriverKind};
use crate::compiler::{CompiledStatement, FirebirdCompiler, StatementCompiler};
use crate::config::{DialectConfig, ServerVersion};
use crate::driver::{AsyncDriver, BlockingDriver, IsolationLevel};
use crate::error::DialectError;
use crate::type_compiler::{FirebirdTypeCompiler, TypeCompiler};

/// Identifier limit before Firebird 4.0.
pub const LEGACY_MAX_IDENTIFIER_LENGTH: usize = 31;
/// Identifier limit from Firebird 4.0 on.
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Everything the engine needs to know about this dialect, resolved once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialectDescriptor {
    pub name: &'static str,
    pub driver_kind: DriverKind,
    pub server_version: ServerVersion,
    /// Always `qmark`.
    pub paramstyle: &'static str,
    pub max_identifier_length: usize,
    pub isolation_levels: Vec<IsolationLevel>,
    pub default_isolation: IsolationLevel,
    pub supports_transactions: bool,
    pub supports_savepoints: bool,
    pub supports_statement_cache: bool,
    pub is_async: bool,
    pub capabilities: CapabilityDescriptor,
}

impl DialectDescriptor {
    #[must_use]
    pub fn resolve(
        driver_kind: DriverKind,
        capabilities: CapabilityDescriptor,
        config: &DialectConfig,
    ) -> Self {
        let max_identifier_length = if config.server_version.at_least(4, 0) {
            MAX_IDENTIFIER_LENGTH
        } else {
            LEGACY_MAX_IDENTIFIER_LENGTH
        };
        Self {
            name: "firebird",
            driver_kind,
            server_version: config.server_version,
            paramstyle: "qmark",
            max_identifier_length,
            isolation_levels: IsolationLevel::ALL.to_vec(),
            default_isolation: config.default_isolation,
            supports_transactions: true,
            supports_savepoints: true,
            supports_statement_cache: false,
            is_async: true,
            capabilities,
        }
    }
}

/// How connections reach the server: a blocking driver on worker threads, or a
/// natively async driver.
#[derive(Clone)]
pub enum Backend {
    Threaded(Arc<dyn BlockingDriver>),
    Native(Arc<dyn AsyncDriver>),
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Threaded(driver) => f.debug_tuple("Threaded").field(&driver.name()).finish(),
            Backend::Native(driver) => f.debug_tuple("Native").field(&driver.name()).finish(),
        }
    }
}

/// The client drivers available to the dialect, one per driver kind.
#[derive(Clone, Default)]
pub struct DriverSet {
    legacy: Option<Arc<dyn BlockingDriver>>,
    native: Option<Arc<dyn AsyncDriver>>,
}

impl DriverSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Driver used for `fdb_async`.
    #[must_use]
    pub fn with_blocking(mut self, driver: Arc<dyn BlockingDriver>) -> Self {
        self.legacy = Some(driver);
        self
    }

    /// Driver used for `firebird_async`.
    #[must_use]
    pub fn with_async(mut self, driver: Arc<dyn AsyncDriver>) -> Self {
        self.native = Some(driver);
        self
    }

    fn backend_for(&self, kind: DriverKind) -> Result<Backend, DialectError> {
        let backend = match kind {
            DriverKind::Legacy => self.legacy.clone().map(Backend::Threaded),
            DriverKind::Native => self.native.clone().map(Backend::Native),
        };
        backend.ok_or_else(|| {
            DialectError::UnsupportedDriver(format!(
                "no client driver registered for `{}`",
                kind.driver_id()
            ))
        })
    }
}

struct DialectInner {
    config: DialectConfig,
    descriptor: Arc<DialectDescriptor>,
    types: Arc<FirebirdTypeCompiler>,
    compiler: FirebirdCompiler,
    backend: Backend,
}

/// The Firebird dialect: metadata, compilation, connections and pooling.
///
/// Cheap to clone; every clone shares the same resolved descriptor.
#[derive(Clone)]
pub struct FirebirdDialect {
    inner: Arc<DialectInner>,
}

impl fmt::Debug for FirebirdDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirebirdDialect")
            .field("descriptor", &self.inner.descriptor)
            .field("backend", &self.inner.backend)
            .finish_non_exhaustive()
    }
}

impl FirebirdDialect {
    /// Resolve the driver and capabilities for `config`.
    ///
    /// # Errors
    /// Returns `DialectError::UnsupportedDriver` for an unknown driver id or when no
    /// client driver of the selected kind is registered.
    pub fn new(config: DialectConfig, drivers: &DriverSet) -> Result<Self, DialectError> {
        let (kind, capabilities) = capability::select(&config)?;
        let backend = drivers.backend_for(kind)?;
        let types = Arc::new(FirebirdTypeCompiler::new(capabilities.clone()));
        let descriptor = Arc::new(DialectDescriptor::resolve(kind, capabilities, &config));
        let compiler = FirebirdCompiler::new(
            Arc::clone(&descriptor),
            Arc::clone(&types) as Arc<dyn TypeCompiler>,
        );
        tracing::debug!(
            driver = %kind,
            server = %config.server_version,
            ?backend,
            "firebird dialect resolved"
        );
        Ok(Self {
            inner: Arc::new(DialectInner {
                config,
                descriptor,
                types,
                compiler,
                backend,
            }),
        })
    }

    /// Parse `url`, apply the `FIREBIRD_ASYNC_DRIVER` override, and resolve.
    ///
    /// # Errors
    /// As [`DialectConfig::from_url`] and [`FirebirdDialect::new`].
    pub fn from_url(url: &str, drivers: &DriverSet) -> Result<Self, DialectError> {
        Self::new(DialectConfig::from_url(url)?.apply_env_override(), drivers)
    }

    #[must_use]
    pub fn descriptor(&self) -> &DialectDescriptor {
        &self.inner.descriptor
    }

    #[must_use]
    pub fn capabilities(&self) -> &CapabilityDescriptor {
        &self.inner.descriptor.capabilities
    }

    #[must_use]
    pub fn config(&self) -> &DialectConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn compiler(&self) -> &FirebirdCompiler {
        &self.inner.compiler
    }

    #[must_use]
    pub fn type_compiler(&self) -> &FirebirdTypeCompiler {
        &self.inner.types
    }

    pub(crate) fn backend(&self) -> &Backend {
        &self.inner.backend
    }

    /// # Errors
    /// See [`StatementCompiler::compile`].
    pub fn compile(&self, statement: &Statement) -> Result<CompiledStatement, DialectError> {
        self.inner.compiler.compile(statement)
    }

    /// # Errors
    /// See [`StatementCompiler::compile_ddl`].
    pub fn compile_ddl(&self, statement: &Statement) -> Result<Vec<CompiledStatement>, DialectError> {
        self.inner.compiler.compile_ddl(statement)
    }

    /// Open a connection outside any pool.
    ///
    /// # Errors
    /// Propagates driver connect failures.
    pub async fn connect(&self) -> Result<FirebirdConnection, DialectError> {
        FirebirdConnection::connect(self.clone()).await
    }

    #[must_use]
    pub fn manager(&self) -> FirebirdManager {
        FirebirdManager::new(self.clone())
    }

    /// # Errors
    /// Returns `DialectError::Pool` if the pool cannot be built.
    pub async fn build_pool(&self, max_size: u32) -> Result<FirebirdPool, DialectError> {
        self.manager().build_pool(max_size).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_length_follows_server_version() {
        let config = DialectConfig::new("fdb_async", "employee")
            .with_server_version(ServerVersion::new(3, 0));
        let (kind, caps) = capability::select(&config).unwrap();
        let descriptor = DialectDescriptor::resolve(kind, caps, &config);
        assert_eq!(descriptor.max_identifier_length, 31);
        assert_eq!(descriptor.paramstyle, "qmark");
        assert!(!descriptor.supports_statement_cache);

        let config = config.with_server_version(ServerVersion::new(4, 0));
        let (kind, caps) = capability::select(&config).unwrap();
        assert_eq!(
            DialectDescriptor::resolve(kind, caps, &config).max_identifier_length,
            63
        );
    }

    #[test]
    fn missing_driver_is_unsupported() {
        let config = DialectConfig::new("firebird_async", "employee");
        let err = FirebirdDialect::new(config, &DriverSet::new()).unwrap_err();
        assert!(matches!(err, DialectError::UnsupportedDriver(_)));
    }
}
