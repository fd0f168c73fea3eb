use thiserror::Error;

use crate::driver::DriverFailure;

/// Every failure the dialect surfaces to the engine framework.
///
/// Native driver failures are never discarded: they travel as the `source` of the
/// `Driver`, `Integrity` and `ConnectionLost` variants so the server's GDS codes and
/// message stay reachable through [`std::error::Error::source`].
#[derive(Debug, Error)]
pub enum DialectError {
    /// The server rejected the statement.
    #[error("Driver error: {source}")]
    Driver {
        #[source]
        source: DriverFailure,
        statement: Option<String>,
    },

    /// The server rejected the statement because it violates a constraint.
    #[error("Integrity error: {source}")]
    Integrity {
        #[source]
        source: DriverFailure,
        statement: Option<String>,
    },

    /// Transport-level failure; the connection is unusable and must be discarded.
    #[error("Connection lost: {message}")]
    ConnectionLost {
        message: String,
        #[source]
        source: Option<DriverFailure>,
    },

    /// A second operation was issued while another was still in flight on the same connection.
    #[error("Concurrent use of connection: {0}")]
    ConcurrentUse(String),

    /// Transaction or cursor API misuse.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Unsupported driver: {0}")]
    UnsupportedDriver(String),

    /// The abstract type has no safe native mapping under the current capabilities.
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// The awaiting task went away before the driver call finished; the connection was
    /// tainted and will be recycled.
    #[error("Operation cancelled before completion; connection must be recycled")]
    CancelledBeforeCompletion,

    /// The statement tree uses a construct Firebird cannot express.
    #[error("Compile error: {0}")]
    Compile(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A bound value falls outside the domain of its declared type.
    #[error("Parameter error: {0}")]
    Parameter(String),

    #[error("Pool error: {0}")]
    Pool(String),
}

impl DialectError {
    /// Classify a raw driver failure into `ConnectionLost` or `Driver`.
    #[must_use]
    pub fn from_driver(failure: DriverFailure) -> Self {
        if failure.is_disconnect() {
            DialectError::ConnectionLost {
                message: failure.message.clone(),
                source: Some(failure),
            }
        } else {
            DialectError::Driver {
                source: failure,
                statement: None,
            }
        }
    }

    pub(crate) fn connection_lost(message: impl Into<String>) -> Self {
        DialectError::ConnectionLost {
            message: message.into(),
            source: None,
        }
    }

    /// True when the connection that produced this error must never be reused.
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            DialectError::ConnectionLost { .. } | DialectError::CancelledBeforeCompletion
        )
    }

    /// The native failure carried by this error, if any.
    #[must_use]
    pub fn driver_failure(&self) -> Option<&DriverFailure> {
        match self {
            DialectError::Driver { source, .. } | DialectError::Integrity { source, .. } => {
                Some(source)
            }
            DialectError::ConnectionLost { source, .. } => source.as_ref(),
            _ => None,
        }
    }

    /// Primary GDS code reported by the server, if any.
    #[must_use]
    pub fn native_code(&self) -> Option<i64> {
        self.driver_failure()
            .and_then(|failure| failure.gds_codes.first().copied())
    }

    /// The SQL text that was executing when the server reported the failure.
    #[must_use]
    pub fn statement(&self) -> Option<&str> {
        match self {
            DialectError::Driver { statement, .. } | DialectError::Integrity { statement, .. } => {
                statement.as_deref()
            }
            _ => None,
        }
    }
}

impl From<bb8::RunError<DialectError>> for DialectError {
    fn from(err: bb8::RunError<DialectError>) -> Self {
        match err {
            bb8::RunError::User(inner) => inner,
            bb8::RunError::TimedOut => {
                DialectError::Pool("timed out waiting for a Firebird connection".into())
            }
        }
    }
}
