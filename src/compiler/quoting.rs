use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::DialectError;

/// Firebird reserved words, plus `asc` and `key` which break in column position.
static RESERVED_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "add", "admin", "all", "alter", "and", "any", "as", "asc", "at", "avg", "begin",
        "between", "bigint", "binary", "bit_length", "blob", "boolean", "both", "by", "case",
        "cast", "char", "char_length", "character", "character_length", "check", "close",
        "collate", "column", "comment", "commit", "connect", "constraint", "corr", "count",
        "covar_pop", "covar_samp", "create", "cross", "current", "current_connection",
        "current_date", "current_role", "current_time", "current_timestamp",
        "current_transaction", "current_user", "cursor", "date", "day", "dec", "decfloat",
        "decimal", "declare", "default", "delete", "deleting", "deterministic", "disconnect",
        "distinct", "double", "drop", "else", "end", "escape", "execute", "exists", "external",
        "extract", "false", "fetch", "filter", "float", "for", "foreign", "from", "full",
        "function", "gdscode", "global", "grant", "group", "having", "hour", "in", "index",
        "inner", "insensitive", "insert", "inserting", "int", "int128", "integer", "into", "is",
        "join", "key", "lag", "lead", "leading", "left", "like", "local", "localtime",
        "localtimestamp", "long", "lower", "max", "merge", "min", "minute", "month", "national",
        "natural", "nchar", "no", "not", "null", "numeric", "octet_length", "of", "offset", "on",
        "only", "open", "or", "order", "outer", "over", "parameter", "plan", "position",
        "post_event", "precision", "primary", "procedure", "publication", "rdb$db_key",
        "rdb$error", "rdb$get_context", "rdb$get_transaction_cn", "rdb$record_version",
        "rdb$role_in_use", "rdb$set_context", "rdb$system_privilege", "real", "record_version",
        "recreate", "recursive", "references", "regr_avgx", "regr_avgy", "regr_count",
        "regr_intercept", "regr_r2", "regr_slope", "regr_sxx", "regr_sxy", "regr_syy",
        "release", "resetting", "return", "returning_values", "returns", "revoke", "right",
        "rollback", "row", "row_count", "rows", "savepoint", "scroll", "second", "select",
        "sensitive", "set", "similar", "smallint", "some", "sqlcode", "sqlstate", "start",
        "stddev_pop", "stddev_samp", "sum", "table", "then", "time", "timestamp",
        "timezone_hour", "timezone_minute", "to", "trailing", "trigger", "trim", "true",
        "unbounded", "union", "unique", "unknown", "update", "updating", "upper", "user",
        "using", "value", "values", "var_pop", "var_samp", "varbinary", "varchar", "variable",
        "varying", "view", "when", "where", "while", "window", "with", "without", "year",
    ]
    .into_iter()
    .collect()
});

static LEGAL_CHARACTERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-z0-9_$]*$").expect("identifier pattern compiles")
});

#[must_use]
pub fn is_reserved(name: &str) -> bool {
    RESERVED_WORDS.contains(name.to_ascii_lowercase().as_str())
}

/// True when `name` must be double-quoted to reach the server unchanged.
#[must_use]
pub fn needs_quoting(name: &str) -> bool {
    is_reserved(name) || !LEGAL_CHARACTERS.is_match(name)
}

/// Quote `name` when required, enforcing the identifier length limit.
///
/// # Errors
/// Returns `DialectError::Compile` when `name` is empty or longer than `max_length`.
pub fn quote_identifier(name: &str, max_length: usize) -> Result<String, DialectError> {
    if name.is_empty() {
        return Err(DialectError::Compile("empty identifier".into()));
    }
    let length = name.chars().count();
    if length > max_length {
        return Err(DialectError::Compile(format!(
            "identifier `{name}` is {length} characters, the server allows {max_length}"
        )));
    }
    if needs_quoting(name) {
        Ok(format!("\"{}\"", name.replace('"', "\"\"")))
    } else {
        Ok(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_rules() {
        assert_eq!(quote_identifier("users", 31).unwrap(), "users");
        assert_eq!(quote_identifier("user_id$2", 31).unwrap(), "user_id$2");
        assert_eq!(quote_identifier("key", 31).unwrap(), "\"key\"");
        assert_eq!(quote_identifier("ASC", 31).unwrap(), "\"ASC\"");
        assert_eq!(quote_identifier("Users", 31).unwrap(), "\"Users\"");
        assert_eq!(quote_identifier("my col", 31).unwrap(), "\"my col\"");
        assert_eq!(quote_identifier("a\"b", 31).unwrap(), "\"a\"\"b\"");
        assert_eq!(quote_identifier("_x", 31).unwrap(), "\"_x\"");
    }

    #[test]
    fn length_limit() {
        let long = "a".repeat(32);
        assert!(quote_identifier(&long, 31).is_err());
        assert!(quote_identifier(&long, 63).is_ok());
        assert!(quote_identifier("", 63).is_err());
    }
}
