use std::fmt;

/// GDS codes the server reports when the network link is gone.
pub const DISCONNECT_GDS_CODES: [i64; 3] = [335_546_001, 335_546_003, 335_546_005];

const DISCONNECT_MESSAGE: &str = "Error writing data to the connection";

/// A failure reported by a client driver, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverFailure {
    /// Legacy SQLCODE, when the driver provides one.
    pub sqlcode: Option<i32>,
    /// GDS status vector codes, most significant first.
    pub gds_codes: Vec<i64>,
    pub message: String,
    /// Set by drivers when the failure happened below the protocol (socket, TLS, ...).
    pub transport: bool,
}

impl DriverFailure {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            sqlcode: None,
            gds_codes: Vec::new(),
            message: message.into(),
            transport: false,
        }
    }

    #[must_use]
    pub fn with_sqlcode(mut self, sqlcode: i32) -> Self {
        self.sqlcode = Some(sqlcode);
        self
    }

    #[must_use]
    pub fn with_gds_code(mut self, code: i64) -> Self {
        self.gds_codes.push(code);
        self
    }

    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            transport: true,
            ..Self::new(message)
        }
    }

    /// True when the failure means the connection can no longer be used.
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        self.transport
            || self
                .gds_codes
                .iter()
                .any(|code| DISCONNECT_GDS_CODES.contains(code))
            || self.message.contains(DISCONNECT_MESSAGE)
    }

    /// True when the message describes a constraint violation.
    #[must_use]
    pub fn is_integrity_violation(&self) -> bool {
        let msg = self.message.to_lowercase();
        msg.contains("violation")
            && ["primary", "unique", "foreign", "constraint"]
                .iter()
                .any(|kind| msg.contains(kind))
    }
}

impl fmt::Display for DriverFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.gds_codes.first() {
            write!(f, "[{code}] ")?;
        }
        if let Some(sqlcode) = self.sqlcode {
            write!(f, "(SQLCODE {sqlcode}) ")?;
        }
        f.write_str(&self.message)
    }
}

impl std::error::Error for DriverFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnect_detection_uses_codes_and_message() {
        assert!(DriverFailure::new("x").with_gds_code(335_546_003).is_disconnect());
        assert!(DriverFailure::new("Error writing data to the connection.").is_disconnect());
        assert!(DriverFailure::transport("socket closed").is_disconnect());
        assert!(!DriverFailure::new("table unknown").with_gds_code(335_544_580).is_disconnect());
    }

    #[test]
    fn integrity_detection_requires_violation_and_kind() {
        let pk = DriverFailure::new(
            "violation of PRIMARY or UNIQUE KEY constraint \"INTEG_2\" on table \"USERS\"",
        );
        assert!(pk.is_integrity_violation());
        assert!(!DriverFailure::new("access violation").is_integrity_violation());
    }
}
