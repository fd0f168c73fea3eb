//! Resolve which driver family and feature set a dialect instance runs with.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::config::{DialectConfig, ServerVersion};
use crate::error::DialectError;

/// The two client-driver families the dialect can run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum DriverKind {
    /// Thread-blocking driver, offloaded to a worker thread per connection.
    #[value(name = "fdb_async", alias = "fdb", alias = "async_fdb")]
    Legacy,
    /// Natively asynchronous driver.
    #[value(
        name = "firebird_async",
        alias = "firebird",
        alias = "firebird-driver",
        alias = "firebird_driver"
    )]
    Native,
}

impl DriverKind {
    /// Canonical driver identifier.
    #[must_use]
    pub fn driver_id(self) -> &'static str {
        match self {
            DriverKind::Legacy => "fdb_async",
            DriverKind::Native => "firebird_async",
        }
    }

    /// Resolve a driver identifier or one of its aliases.
    ///
    /// # Errors
    /// Returns `DialectError::UnsupportedDriver` for unknown identifiers.
    pub fn from_identifier(id: &str) -> Result<Self, DialectError> {
        <DriverKind as ValueEnum>::from_str(id.trim(), true)
            .map_err(|_| DialectError::UnsupportedDriver(id.to_string()))
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.driver_id())
    }
}

/// A type served through a documented fallback instead of its native form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Degradation {
    /// `INT128` stored as `VARCHAR(40)` holding the exact decimal string.
    Int128AsText,
    /// Time-zone aware values stored as `VARCHAR(40)` holding RFC 3339 text.
    TimeZoneAsText,
    /// `BOOLEAN` stored as `SMALLINT` 0/1.
    BooleanAsSmallint,
    /// Identity columns emulated with a generator and a `BEFORE INSERT` trigger.
    IdentityAsTrigger,
}

/// Feature flags the compiler and connection adapter consult. Immutable once selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub native_async: bool,
    pub int128: bool,
    pub time_zones: bool,
    pub insert_returning: bool,
    pub update_delete_returning: bool,
    pub boolean: bool,
    pub identity_columns: bool,
    pub offset_fetch: bool,
    /// `CREATE SEQUENCE` rather than `CREATE GENERATOR`.
    pub sequences: bool,
    degradations: Vec<Degradation>,
}

impl CapabilityDescriptor {
    #[must_use]
    pub fn for_driver(kind: DriverKind, server: ServerVersion) -> Self {
        let native = kind == DriverKind::Native;
        let fb3 = server.at_least(3, 0);
        let fb4 = server.at_least(4, 0);

        let mut caps = CapabilityDescriptor {
            native_async: native,
            int128: native && fb4,
            time_zones: native && fb4,
            insert_returning: server.at_least(2, 0),
            update_delete_returning: server.at_least(2, 1),
            boolean: fb3,
            identity_columns: fb3,
            offset_fetch: fb3,
            sequences: fb3,
            degradations: Vec::new(),
        };

        if !caps.int128 {
            caps.degradations.push(Degradation::Int128AsText);
        }
        if !caps.time_zones {
            caps.degradations.push(Degradation::TimeZoneAsText);
        }
        if !caps.boolean {
            caps.degradations.push(Degradation::BooleanAsSmallint);
        }
        if !caps.identity_columns {
            caps.degradations.push(Degradation::IdentityAsTrigger);
        }
        caps
    }

    #[must_use]
    pub fn degradations(&self) -> &[Degradation] {
        &self.degradations
    }

    #[must_use]
    pub fn is_degraded(&self, degradation: Degradation) -> bool {
        self.degradations.contains(&degradation)
    }
}

/// Pick the driver family and capabilities for `config`.
///
/// # Errors
/// Returns `DialectError::UnsupportedDriver` when the configured driver is unknown.
pub fn select(config: &DialectConfig) -> Result<(DriverKind, CapabilityDescriptor), DialectError> {
    let kind = DriverKind::from_identifier(&config.driver)?;
    let caps = CapabilityDescriptor::for_driver(kind, config.server_version);
    if !caps.degradations.is_empty() {
        tracing::debug!(
            driver = %kind,
            server = %config.server_version,
            degradations = ?caps.degradations,
            "capabilities degraded"
        );
    }
    Ok((kind, caps))
}
