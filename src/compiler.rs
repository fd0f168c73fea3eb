//! Abstract statements to Firebird SQL text with `qmark` binds.
//!
//! - `compiler::quoting`: reserved words and identifier quoting
//! - `compiler::expr`: expressions, with casts for binds in the select list
//! - `compiler::select`: simple and compound selects
//! - `compiler::limit`: `FIRST`/`OFFSET .. FETCH` pagination and the row-number rewrite
//! - `compiler::dml`: insert/update/delete with native or emulated RETURNING
//! - `compiler::ddl`: tables, sequences, identity emulation

mod ddl;
mod dml;
mod expr;
mod limit;
pub mod quoting;
mod select;

use std::sync::Arc;

use crate::ast::Statement;
use crate::dialect::DialectDescriptor;
use crate::error::DialectError;
use crate::translation::{SqlKind, translate_named_placeholders};
use crate::type_compiler::TypeCompiler;
use crate::types::{RowValues, SqlType};

/// Compiles statement trees for one dialect instance.
pub trait StatementCompiler: Send + Sync {
    /// Compile a statement that maps to exactly one SQL statement.
    ///
    /// # Errors
    /// Returns `DialectError::Compile` for constructs the server cannot express, and
    /// `DialectError::UnsupportedType` for types without a native mapping.
    fn compile(&self, statement: &Statement) -> Result<CompiledStatement, DialectError>;

    /// Compile a statement that may need several SQL statements, in execution order.
    ///
    /// # Errors
    /// Same as [`StatementCompiler::compile`].
    fn compile_ddl(&self, statement: &Statement) -> Result<Vec<CompiledStatement>, DialectError>;

    /// Quote `name` if the server would otherwise fold or reject it.
    ///
    /// # Errors
    /// Returns `DialectError::Compile` when the identifier is too long.
    fn quote_identifier(&self, name: &str) -> Result<String, DialectError>;
}

/// One placeholder in a compiled statement, in `?` order.
#[derive(Debug, Clone, PartialEq)]
pub struct BindSlot {
    pub name: String,
    pub sql_type: Option<SqlType>,
    /// Value attached when the statement was built.
    pub value: Option<RowValues>,
}

/// Statement that fetches a sequence value before an insert whose key the server cannot return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencePrefetch {
    pub sql: String,
    /// Bind (and returned column) the fetched value is delivered as.
    pub column: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub sql: String,
    pub binds: Vec<BindSlot>,
    pub is_ddl: bool,
    /// Whether executing the statement produces a result set.
    pub returns_rows: bool,
    /// Names of RETURNING columns; empty names when only the text revealed a RETURNING clause.
    pub returning: Option<Vec<String>>,
    pub sequence_prefetch: Option<SequencePrefetch>,
}

impl CompiledStatement {
    pub(crate) fn new(sql: String, binds: Vec<BindSlot>) -> Self {
        Self {
            sql,
            binds,
            is_ddl: false,
            returns_rows: false,
            returning: None,
            sequence_prefetch: None,
        }
    }

    /// A parameterless statement issued by the adapter itself.
    pub(crate) fn internal(sql: impl Into<String>, returns_rows: bool) -> Self {
        Self {
            returns_rows,
            ..Self::new(sql.into(), Vec::new())
        }
    }

    pub(crate) fn ddl(sql: String) -> Self {
        Self {
            is_ddl: true,
            ..Self::new(sql, Vec::new())
        }
    }
}

/// SQL text and binds accumulated while rendering one statement.
#[derive(Debug, Default)]
pub(crate) struct Fragment {
    pub sql: String,
    pub binds: Vec<BindSlot>,
}

impl Fragment {
    fn push(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    fn into_statement(self) -> CompiledStatement {
        CompiledStatement::new(self.sql, self.binds)
    }
}

/// The Firebird statement compiler.
#[derive(Clone)]
pub struct FirebirdCompiler {
    descriptor: Arc<DialectDescriptor>,
    types: Arc<dyn TypeCompiler>,
}

impl std::fmt::Debug for FirebirdCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebirdCompiler")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl FirebirdCompiler {
    #[must_use]
    pub fn new(descriptor: Arc<DialectDescriptor>, types: Arc<dyn TypeCompiler>) -> Self {
        Self { descriptor, types }
    }

    #[must_use]
    pub fn descriptor(&self) -> &DialectDescriptor {
        &self.descriptor
    }

    pub(crate) fn types(&self) -> &dyn TypeCompiler {
        self.types.as_ref()
    }

    fn quote(&self, name: &str) -> Result<String, DialectError> {
        quoting::quote_identifier(name, self.descriptor.max_identifier_length)
    }

    fn compile_text(&self, text: &crate::ast::TextStatement) -> Result<CompiledStatement, DialectError> {
        let translated = translate_named_placeholders(&text.sql)?;
        let sql = if text.translate {
            translated.sql.into_owned()
        } else {
            text.sql.clone()
        };
        let binds = if text.translate {
            translated
                .placeholders
                .into_iter()
                .map(|name| BindSlot {
                    sql_type: text
                        .bind_types
                        .iter()
                        .find(|(declared, _)| *declared == name)
                        .map(|(_, ty)| ty.clone()),
                    name,
                    value: None,
                })
                .collect()
        } else {
            Vec::new()
        };
        let mut compiled = CompiledStatement::new(sql, binds);
        compiled.is_ddl = translated.kind == SqlKind::Ddl;
        compiled.returns_rows = translated.kind == SqlKind::Query || translated.has_returning;
        if translated.has_returning {
            compiled.returning = Some(Vec::new());
        }
        Ok(compiled)
    }
}

impl StatementCompiler for FirebirdCompiler {
    fn compile(&self, statement: &Statement) -> Result<CompiledStatement, DialectError> {
        let mut compiled = self.compile_ddl(statement)?;
        if compiled.len() != 1 {
            return Err(DialectError::Compile(format!(
                "statement compiles to {} statements; use compile_ddl",
                compiled.len()
            )));
        }
        compiled
            .pop()
            .ok_or_else(|| DialectError::Compile("statement compiled to nothing".into()))
    }

    fn compile_ddl(&self, statement: &Statement) -> Result<Vec<CompiledStatement>, DialectError> {
        let single = match statement {
            Statement::Select(select) => self.compile_select(select)?,
            Statement::Compound(compound) => self.compile_compound(compound)?,
            Statement::Insert(insert) => self.compile_insert(insert)?,
            Statement::Update(update) => self.compile_update(update)?,
            Statement::Delete(delete) => self.compile_delete(delete)?,
            Statement::Text(text) => self.compile_text(text)?,
            Statement::CreateTable(table) => return self.compile_create_table(table),
            Statement::DropTable(name) => self.compile_drop_table(name)?,
            Statement::CreateSequence(sequence) => return self.compile_create_sequence(sequence),
            Statement::DropSequence(name) => self.compile_drop_sequence(name)?,
        };
        Ok(vec![single])
    }

    fn quote_identifier(&self, name: &str) -> Result<String, DialectError> {
        self.quote(name)
    }
}
