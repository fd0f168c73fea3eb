//! Contracts for the two families of Firebird client drivers the dialect can sit on.
//!
//! - `driver::traits`: the blocking (`BlockingDriver`) and native-async (`AsyncDriver`) surfaces
//! - `driver::value`: driver-native values and column descriptions
//! - `driver::failure`: the native failure type every driver reports

pub mod failure;
pub mod traits;
pub mod value;

pub use failure::DriverFailure;
pub use traits::{AsyncConnection, AsyncDriver, BlockingConnection, BlockingDriver, ExecuteOutcome};
pub use value::{ColumnDescription, DbValue};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DialectError;

/// Transaction isolation levels Firebird understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IsolationLevel {
    #[default]
    ReadCommitted,
    /// Firebird `SNAPSHOT`, reported to the engine as `REPEATABLE READ`.
    Snapshot,
    /// Firebird `SNAPSHOT TABLE STABILITY`, reported to the engine as `SERIALIZABLE`.
    SnapshotTableStability,
}

impl IsolationLevel {
    pub const ALL: [IsolationLevel; 3] = [
        IsolationLevel::ReadCommitted,
        IsolationLevel::Snapshot,
        IsolationLevel::SnapshotTableStability,
    ];

    /// Native `SET TRANSACTION` clause.
    #[must_use]
    pub fn as_native(self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::Snapshot => "SNAPSHOT",
            IsolationLevel::SnapshotTableStability => "SNAPSHOT TABLE STABILITY",
        }
    }

    /// Name the engine framework uses for this level.
    #[must_use]
    pub fn engine_name(self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::Snapshot => "REPEATABLE READ",
            IsolationLevel::SnapshotTableStability => "SERIALIZABLE",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.engine_name())
    }
}

impl FromStr for IsolationLevel {
    type Err = DialectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('_', " ").to_ascii_uppercase();
        match normalized.as_str() {
            "READ COMMITTED" => Ok(IsolationLevel::ReadCommitted),
            "REPEATABLE READ" | "SNAPSHOT" => Ok(IsolationLevel::Snapshot),
            "SERIALIZABLE" | "SNAPSHOT TABLE STABILITY" => {
                Ok(IsolationLevel::SnapshotTableStability)
            }
            other => Err(DialectError::Config(format!(
                "unknown isolation level `{other}`"
            ))),
        }
    }
}
