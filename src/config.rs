//! Connection-string parsing and dialect configuration.
//!
//! Accepted form: `firebird+<driver>://user:password@host:port/<database path or alias>?charset=UTF8`.
//! A doubled slash after the authority denotes an absolute server-side path
//! (`...@host:3050//var/lib/firebird/data/app.fdb`).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::driver::IsolationLevel;
use crate::error::DialectError;

/// Environment variable that overrides the driver named in the connection URL.
pub const DRIVER_ENV_VAR: &str = "FIREBIRD_ASYNC_DRIVER";

const DEFAULT_FETCH_BATCH: usize = 256;

/// Parameters handed to a driver's `connect`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectParams {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Database file path or server-side alias.
    pub database: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub charset: Option<String>,
    /// Driver-specific options not interpreted by the dialect.
    pub options: BTreeMap<String, String>,
}

impl ConnectParams {
    /// Firebird-style DSN (`host/port:database`) many drivers accept.
    #[must_use]
    pub fn dsn(&self) -> String {
        match (&self.host, self.port) {
            (Some(host), Some(port)) => format!("{host}/{port}:{}", self.database),
            (Some(host), None) => format!("{host}:{}", self.database),
            _ => self.database.clone(),
        }
    }
}

/// Server major/minor version the dialect compiles for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServerVersion {
    pub major: u8,
    pub minor: u8,
}

impl ServerVersion {
    #[must_use]
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    #[must_use]
    pub fn at_least(self, major: u8, minor: u8) -> bool {
        self >= ServerVersion::new(major, minor)
    }
}

impl Default for ServerVersion {
    fn default() -> Self {
        ServerVersion::new(4, 0)
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for ServerVersion {
    type Err = DialectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DialectError::Config(format!("invalid server version `{s}`"));
        let mut parts = s.trim().split('.');
        let major = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(invalid)?;
        let minor = match parts.next() {
            Some(p) => p.parse().map_err(|_| invalid())?,
            None => 0,
        };
        Ok(ServerVersion::new(major, minor))
    }
}

/// Everything resolved from the connection URL before the dialect is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialectConfig {
    /// Driver-selection token (`fdb_async`, `firebird_async` or an alias).
    pub driver: String,
    pub server_version: ServerVersion,
    pub default_isolation: IsolationLevel,
    /// Rows requested per fetch when materializing results.
    pub fetch_batch_size: usize,
    pub connect: ConnectParams,
}

impl DialectConfig {
    #[must_use]
    pub fn new(driver: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            server_version: ServerVersion::default(),
            default_isolation: IsolationLevel::default(),
            fetch_batch_size: DEFAULT_FETCH_BATCH,
            connect: ConnectParams {
                database: database.into(),
                ..ConnectParams::default()
            },
        }
    }

    #[must_use]
    pub fn with_server_version(mut self, version: ServerVersion) -> Self {
        self.server_version = version;
        self
    }

    #[must_use]
    pub fn with_default_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.default_isolation = isolation;
        self
    }

    /// Parse a `firebird+<driver>://` URL.
    ///
    /// # Errors
    /// Returns `DialectError::Config` when the URL is malformed or carries an invalid option.
    pub fn from_url(dsn: &str) -> Result<Self, DialectError> {
        let normalized = normalize_scheme(dsn);
        let (scheme, rest) = normalized
            .split_once("://")
            .ok_or_else(|| DialectError::Config(format!("not a connection URL: `{dsn}`")))?;
        let driver = scheme
            .strip_prefix("firebird+")
            .ok_or_else(|| {
                DialectError::Config(format!("unsupported URL scheme `{scheme}`"))
            })?
            .to_string();

        // The driver token may contain characters a URL scheme cannot, so parse the rest
        // under a neutral scheme.
        let parsed = Url::parse(&format!("firebird://{rest}"))
            .map_err(|e| DialectError::Config(format!("invalid connection URL: {e}")))?;

        let mut config = DialectConfig::new(driver, database_from_path(parsed.path()));
        config.connect.host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .map(str::to_string);
        config.connect.port = parsed.port();
        if !parsed.username().is_empty() {
            config.connect.user = Some(percent_decode(parsed.username())?);
        }
        config.connect.password = parsed.password().map(percent_decode).transpose()?;

        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "charset" => config.connect.charset = Some(value.into_owned()),
                "role" => config.connect.role = Some(value.into_owned()),
                "server_version" => config.server_version = value.parse()?,
                "isolation_level" => config.default_isolation = value.parse()?,
                "fetch_batch_size" => {
                    config.fetch_batch_size = value.parse().map_err(|_| {
                        DialectError::Config(format!("invalid fetch_batch_size `{value}`"))
                    })?;
                }
                _ => {
                    config
                        .connect
                        .options
                        .insert(key.into_owned(), value.into_owned());
                }
            }
        }

        if config.connect.database.is_empty() {
            return Err(DialectError::Config(
                "connection URL does not name a database".into(),
            ));
        }
        Ok(config)
    }

    /// Replace the driver token when `driver` is set.
    #[must_use]
    pub fn with_driver_override(mut self, driver: Option<&str>) -> Self {
        if let Some(driver) = driver.map(str::trim).filter(|d| !d.is_empty()) {
            tracing::debug!(from = %self.driver, to = %driver, "driver overridden");
            self.driver = driver.to_string();
        }
        self
    }

    /// Apply [`DRIVER_ENV_VAR`] if it is set.
    #[must_use]
    pub fn apply_env_override(self) -> Self {
        let value = std::env::var(DRIVER_ENV_VAR).ok();
        self.with_driver_override(value.as_deref())
    }
}

/// Rewrite legacy and alias URL schemes onto the two canonical async driver schemes.
#[must_use]
pub fn normalize_scheme(dsn: &str) -> String {
    const ALIASES: [(&str, &str); 6] = [
        ("firebird+async_fdb://", "firebird+fdb_async://"),
        ("firebird+fdb://", "firebird+fdb_async://"),
        ("firebird+firebird://", "firebird+firebird_async://"),
        ("firebird+firebird_driver://", "firebird+firebird_async://"),
        ("firebird+async_firebird://", "firebird+firebird_async://"),
        ("firebird://", "firebird+fdb_async://"),
    ];
    for (alias, canonical) in ALIASES {
        if let Some(rest) = dsn.strip_prefix(alias) {
            return format!("{canonical}{rest}");
        }
    }
    dsn.to_string()
}

fn database_from_path(path: &str) -> String {
    path.strip_prefix('/').unwrap_or(path).to_string()
}

fn percent_decode(raw: &str) -> Result<String, DialectError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| DialectError::Config("credentials are not valid UTF-8".into()))
}
