//! Placeholder translation and light classification for raw SQL text.
//!
//! Firebird drivers take positional `?` parameters only. Raw statements may use `:name`
//! placeholders instead; they are rewritten to `?` and reported in order of appearance.

use std::borrow::Cow;

mod parsers;
mod scanner;

use parsers::{
    at_word_boundary, is_block_comment_end, is_block_comment_start, is_line_comment_start,
    is_named_placeholder_start,
};
use scanner::{State, scan_word};

use crate::error::DialectError;

/// What a raw statement does, judged from its leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlKind {
    Query,
    Dml,
    Ddl,
    Other,
}

impl SqlKind {
    fn from_keyword(word: &str) -> Self {
        match word.to_ascii_uppercase().as_str() {
            "SELECT" | "WITH" => SqlKind::Query,
            "INSERT" | "UPDATE" | "DELETE" | "MERGE" => SqlKind::Dml,
            "CREATE" | "ALTER" | "DROP" | "RECREATE" | "COMMENT" | "GRANT" | "REVOKE"
            | "DECLARE" => SqlKind::Ddl,
            _ => SqlKind::Other,
        }
    }
}

/// Result of scanning one raw statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedSql<'a> {
    pub sql: Cow<'a, str>,
    /// Parameter names in placeholder order; positional `?` markers are named `"1"`, `"2"`, ...
    pub placeholders: Vec<String>,
    pub kind: SqlKind,
    pub has_returning: bool,
}

/// Rewrite `:name` placeholders to `?`, skipping string literals, quoted identifiers and
/// comments. Returns a borrowed `Cow` when no changes are needed.
///
/// ```rust
/// use firebird_async_dialect::translation::{translate_named_placeholders, SqlKind};
///
/// let out = translate_named_placeholders(
///     "SELECT ':skip' FROM t WHERE a = :a AND b = :b",
/// ).unwrap();
/// assert_eq!(out.sql, "SELECT ':skip' FROM t WHERE a = ? AND b = ?");
/// assert_eq!(out.placeholders, vec!["a", "b"]);
/// assert_eq!(out.kind, SqlKind::Query);
/// ```
///
/// # Errors
/// Returns `DialectError::Compile` when named and positional placeholders are mixed.
pub fn translate_named_placeholders(sql: &str) -> Result<TranslatedSql<'_>, DialectError> {
    let mut out: Option<String> = None;
    let mut state = State::Normal;
    let mut placeholders = Vec::new();
    let mut named = false;
    let mut positional = 0usize;
    let mut kind = None;
    let mut has_returning = false;
    let bytes = sql.as_bytes();
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                _ if is_line_comment_start(bytes, idx) => state = State::LineComment,
                _ if is_block_comment_start(bytes, idx) => {
                    state = State::BlockComment;
                    if let Some(buf) = out.as_mut() {
                        buf.push_str("/*");
                    }
                    idx += 2;
                    continue;
                }
                b'?' => {
                    positional += 1;
                    placeholders.push(positional.to_string());
                    if let Some(buf) = out.as_mut() {
                        buf.push('?');
                    }
                    idx += 1;
                    continue;
                }
                _ if is_named_placeholder_start(bytes, idx) => {
                    if let Some((end, name)) = scan_word(bytes, idx + 1) {
                        named = true;
                        placeholders.push(name.to_string());
                        let buf = out.get_or_insert_with(|| sql[..idx].to_string());
                        buf.push('?');
                        idx = end;
                        continue;
                    }
                }
                _ if (b.is_ascii_alphabetic() || b == b'_') && at_word_boundary(bytes, idx) => {
                    if let Some((end, word)) = scan_word(bytes, idx) {
                        if kind.is_none() {
                            kind = Some(SqlKind::from_keyword(word));
                        }
                        if word.eq_ignore_ascii_case("RETURNING") {
                            has_returning = true;
                        }
                        if let Some(buf) = out.as_mut() {
                            buf.push_str(word);
                        }
                        idx = end;
                        continue;
                    }
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    state = State::Normal;
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    state = State::Normal;
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment => {
                if is_block_comment_end(bytes, idx) {
                    if let Some(buf) = out.as_mut() {
                        buf.push_str("*/");
                    }
                    state = State::Normal;
                    idx += 2;
                    continue;
                }
            }
        }

        let end = (idx + utf8_len(b)).min(sql.len());
        if let Some(buf) = out.as_mut() {
            buf.push_str(&sql[idx..end]);
        }
        idx = end;
    }

    if named && positional > 0 {
        return Err(DialectError::Compile(
            "named and positional placeholders cannot be mixed".into(),
        ));
    }

    Ok(TranslatedSql {
        sql: out.map_or(Cow::Borrowed(sql), Cow::Owned),
        placeholders,
        kind: kind.unwrap_or(SqlKind::Other),
        has_returning,
    })
}

fn utf8_len(first: u8) -> usize {
    match first {
        0xF0..=0xFF => 4,
        0xE0..=0xEF => 3,
        0xC0..=0xDF => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_quotes_and_comments() {
        let sql = "SELECT \"a:b\", 'x :y' FROM t -- :c\n WHERE id = :id /* :d */";
        let out = translate_named_placeholders(sql).unwrap();
        assert_eq!(
            out.sql,
            "SELECT \"a:b\", 'x :y' FROM t -- :c\n WHERE id = ? /* :d */"
        );
        assert_eq!(out.placeholders, vec!["id"]);
    }

    #[test]
    fn positional_markers_are_numbered() {
        let out = translate_named_placeholders("UPDATE t SET a = ? WHERE b = ?").unwrap();
        assert!(matches!(out.sql, Cow::Borrowed(_)));
        assert_eq!(out.placeholders, vec!["1", "2"]);
        assert_eq!(out.kind, SqlKind::Dml);
    }

    #[test]
    fn detects_kind_and_returning() {
        let out = translate_named_placeholders(
            "  /* lead */ INSERT INTO t (a) VALUES (:a) RETURNING id",
        )
        .unwrap();
        assert_eq!(out.kind, SqlKind::Dml);
        assert!(out.has_returning);
        let ddl = translate_named_placeholders("create table t (id integer)").unwrap();
        assert_eq!(ddl.kind, SqlKind::Ddl);
        assert!(!ddl.has_returning);
    }

    #[test]
    fn rejects_mixed_styles() {
        assert!(translate_named_placeholders("SELECT ? FROM t WHERE a = :a").is_err());
    }

    #[test]
    fn keeps_non_ascii_text() {
        let out = translate_named_placeholders("SELECT 'тест' FROM t WHERE a = :a").unwrap();
        assert_eq!(out.sql, "SELECT 'тест' FROM t WHERE a = ?");
    }
}
