use crate::error::DialectError;

/// Attach the failing SQL text and promote constraint violations to `Integrity`.
pub(crate) fn refine(err: DialectError, sql: &str) -> DialectError {
    match err {
        DialectError::Driver { source, .. } if source.is_integrity_violation() => {
            DialectError::Integrity {
                source,
                statement: Some(sql.to_string()),
            }
        }
        DialectError::Driver { source, .. } => DialectError::Driver {
            source,
            statement: Some(sql.to_string()),
        },
        other => other,
    }
}

pub(crate) trait StatementContext<T> {
    fn for_statement(self, sql: &str) -> Result<T, DialectError>;
}

impl<T> StatementContext<T> for Result<T, DialectError> {
    fn for_statement(self, sql: &str) -> Result<T, DialectError> {
        self.map_err(|err| refine(err, sql))
    }
}
