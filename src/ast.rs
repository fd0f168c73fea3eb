//! Abstract statement trees the engine hands to the compiler.
//!
//! ```rust
//! use firebird_async_dialect::ast::{Expr, Select};
//!
//! let query = Select::new()
//!     .column(Expr::col("id"))
//!     .column(Expr::col("name"))
//!     .from("users")
//!     .filter(Expr::col("id").gt(Expr::bind("min_id")))
//!     .order_by(Expr::col("id"), false)
//!     .limit(10);
//! # let _ = query;
//! ```

use crate::types::{RowValues, SqlType};

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Select),
    Compound(CompoundSelect),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
    CreateTable(CreateTable),
    DropTable(String),
    CreateSequence(Sequence),
    DropSequence(String),
    /// Raw SQL text with `:name` or `?` placeholders.
    Text(TextStatement),
}

impl From<Select> for Statement {
    fn from(value: Select) -> Self {
        Statement::Select(value)
    }
}

impl From<CompoundSelect> for Statement {
    fn from(value: CompoundSelect) -> Self {
        Statement::Compound(value)
    }
}

impl From<Insert> for Statement {
    fn from(value: Insert) -> Self {
        Statement::Insert(value)
    }
}

impl From<Update> for Statement {
    fn from(value: Update) -> Self {
        Statement::Update(value)
    }
}

impl From<Delete> for Statement {
    fn from(value: Delete) -> Self {
        Statement::Delete(value)
    }
}

impl From<CreateTable> for Statement {
    fn from(value: CreateTable) -> Self {
        Statement::CreateTable(value)
    }
}

impl From<TextStatement> for Statement {
    fn from(value: TextStatement) -> Self {
        Statement::Text(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStatement {
    pub sql: String,
    /// Declared types for named placeholders; others are inferred from the bound value.
    pub bind_types: Vec<(String, SqlType)>,
    /// When false the text is sent unchanged (PSQL bodies that use `:var` themselves).
    pub translate: bool,
}

impl TextStatement {
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            bind_types: Vec::new(),
            translate: true,
        }
    }

    #[must_use]
    pub fn verbatim(sql: impl Into<String>) -> Self {
        Self {
            translate: false,
            ..Self::new(sql)
        }
    }

    #[must_use]
    pub fn bind_type(mut self, name: impl Into<String>, sql_type: SqlType) -> Self {
        self.bind_types.push((name.into(), sql_type));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Null,
}

/// A bind parameter. Its value comes from the execution `Params` by `name`, falling back to
/// `value` when one was attached at build time.
#[derive(Debug, Clone, PartialEq)]
pub struct BindParam {
    pub name: String,
    pub sql_type: Option<SqlType>,
    pub value: Option<RowValues>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Like,
    Concat,
}

impl BinaryOp {
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Like => "LIKE",
            BinaryOp::Concat => "||",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column {
        table: Option<String>,
        name: String,
    },
    Star {
        table: Option<String>,
    },
    Literal(Literal),
    Bind(BindParam),
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    Function {
        name: String,
        args: Vec<Expr>,
    },
    Cast {
        expr: Box<Expr>,
        sql_type: SqlType,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    /// Next value of a sequence.
    NextValue(String),
    /// SQL text emitted unchanged.
    Raw(String),
}

impl Expr {
    #[must_use]
    pub fn col(name: impl Into<String>) -> Self {
        Expr::Column {
            table: None,
            name: name.into(),
        }
    }

    #[must_use]
    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Expr::Column {
            table: Some(table.into()),
            name: name.into(),
        }
    }

    #[must_use]
    pub fn star() -> Self {
        Expr::Star { table: None }
    }

    #[must_use]
    pub fn bind(name: impl Into<String>) -> Self {
        Expr::Bind(BindParam {
            name: name.into(),
            sql_type: None,
            value: None,
        })
    }

    #[must_use]
    pub fn typed_bind(name: impl Into<String>, sql_type: SqlType) -> Self {
        Expr::Bind(BindParam {
            name: name.into(),
            sql_type: Some(sql_type),
            value: None,
        })
    }

    /// A bind parameter carrying its own value.
    #[must_use]
    pub fn value(name: impl Into<String>, value: impl Into<RowValues>) -> Self {
        Expr::Bind(BindParam {
            name: name.into(),
            sql_type: None,
            value: Some(value.into()),
        })
    }

    #[must_use]
    pub fn lit(literal: Literal) -> Self {
        Expr::Literal(literal)
    }

    #[must_use]
    pub fn func(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.into(),
            args,
        }
    }

    #[must_use]
    pub fn cast(self, sql_type: SqlType) -> Self {
        Expr::Cast {
            expr: Box::new(self),
            sql_type,
        }
    }

    #[must_use]
    pub fn binary(self, op: BinaryOp, right: Expr) -> Self {
        Expr::Binary {
            left: Box::new(self),
            op,
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn eq(self, right: Expr) -> Self {
        self.binary(BinaryOp::Eq, right)
    }

    #[must_use]
    pub fn gt(self, right: Expr) -> Self {
        self.binary(BinaryOp::Gt, right)
    }

    #[must_use]
    pub fn lt(self, right: Expr) -> Self {
        self.binary(BinaryOp::Lt, right)
    }

    #[must_use]
    pub fn and(self, right: Expr) -> Self {
        self.binary(BinaryOp::And, right)
    }

    #[must_use]
    pub fn or(self, right: Expr) -> Self {
        self.binary(BinaryOp::Or, right)
    }

    #[must_use]
    pub fn is_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    #[must_use]
    pub fn in_list(self, list: Vec<Expr>) -> Self {
        Expr::InList {
            expr: Box::new(self),
            list,
            negated: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectItem {
    /// Name the column has in the result, when it has one.
    #[must_use]
    pub fn output_name(&self) -> Option<&str> {
        match (&self.alias, &self.expr) {
            (Some(alias), _) => Some(alias),
            (None, Expr::Column { name, .. }) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: TableRef,
    pub on: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub expr: Expr,
    pub descending: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Select {
    pub distinct: bool,
    pub columns: Vec<SelectItem>,
    pub from: Option<TableRef>,
    pub joins: Vec<Join>,
    pub filter: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Select {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    #[must_use]
    pub fn column(mut self, expr: Expr) -> Self {
        self.columns.push(SelectItem { expr, alias: None });
        self
    }

    #[must_use]
    pub fn column_as(mut self, expr: Expr, alias: impl Into<String>) -> Self {
        self.columns.push(SelectItem {
            expr,
            alias: Some(alias.into()),
        });
        self
    }

    #[must_use]
    pub fn from(mut self, table: impl Into<String>) -> Self {
        self.from = Some(TableRef {
            name: table.into(),
            alias: None,
        });
        self
    }

    #[must_use]
    pub fn from_as(mut self, table: impl Into<String>, alias: impl Into<String>) -> Self {
        self.from = Some(TableRef {
            name: table.into(),
            alias: Some(alias.into()),
        });
        self
    }

    #[must_use]
    pub fn join(mut self, kind: JoinKind, table: impl Into<String>, on: Expr) -> Self {
        self.joins.push(Join {
            kind,
            table: TableRef {
                name: table.into(),
                alias: None,
            },
            on,
        });
        self
    }

    #[must_use]
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }

    #[must_use]
    pub fn group_by(mut self, expr: Expr) -> Self {
        self.group_by.push(expr);
        self
    }

    #[must_use]
    pub fn order_by(mut self, expr: Expr, descending: bool) -> Self {
        self.order_by.push(OrderBy { expr, descending });
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    Union,
    UnionAll,
    Intersect,
    Except,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompoundSelect {
    pub op: SetOperator,
    pub selects: Vec<Select>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl CompoundSelect {
    #[must_use]
    pub fn new(op: SetOperator, selects: Vec<Select>) -> Self {
        Self {
            op,
            selects,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    #[must_use]
    pub fn order_by(mut self, expr: Expr, descending: bool) -> Self {
        self.order_by.push(OrderBy { expr, descending });
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Key column whose value is drawn from a sequence when the server cannot return it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceKey {
    pub column: String,
    pub sequence: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<Expr>,
    pub returning: Vec<String>,
    pub sequence_key: Option<SequenceKey>,
}

impl Insert {
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            values: Vec::new(),
            returning: Vec::new(),
            sequence_key: None,
        }
    }

    #[must_use]
    pub fn value(mut self, column: impl Into<String>, expr: Expr) -> Self {
        self.columns.push(column.into());
        self.values.push(expr);
        self
    }

    /// Shorthand for a column bound to a parameter of the same name.
    #[must_use]
    pub fn bind(self, column: impl Into<String>) -> Self {
        let column = column.into();
        let expr = Expr::bind(column.clone());
        self.value(column, expr)
    }

    #[must_use]
    pub fn returning(mut self, column: impl Into<String>) -> Self {
        self.returning.push(column.into());
        self
    }

    #[must_use]
    pub fn sequence_key(mut self, column: impl Into<String>, sequence: impl Into<String>) -> Self {
        self.sequence_key = Some(SequenceKey {
            column: column.into(),
            sequence: sequence.into(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: String,
    pub assignments: Vec<(String, Expr)>,
    pub filter: Option<Expr>,
    pub returning: Vec<String>,
}

impl Update {
    #[must_use]
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            assignments: Vec::new(),
            filter: None,
            returning: Vec::new(),
        }
    }

    #[must_use]
    pub fn set(mut self, column: impl Into<String>, expr: Expr) -> Self {
        self.assignments.push((column.into(), expr));
        self
    }

    #[must_use]
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(expr);
        self
    }

    #[must_use]
    pub fn returning(mut self, column: impl Into<String>) -> Self {
        self.returning.push(column.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub table: String,
    pub filter: Option<Expr>,
    pub returning: Vec<String>,
}

impl Delete {
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: None,
            returning: Vec::new(),
        }
    }

    #[must_use]
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(expr);
        self
    }

    #[must_use]
    pub fn returning(mut self, column: impl Into<String>) -> Self {
        self.returning.push(column.into());
        self
    }
}

/// Auto-increment behavior for one column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutoIncrement {
    /// Generator name used when identity columns are unavailable (default `gen_<table>_<column>`).
    pub sequence: Option<String>,
    /// Trigger name used when identity columns are unavailable (default `trg_<table>_<column>`).
    pub trigger: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: SqlType,
    pub nullable: bool,
    pub primary_key: bool,
    pub default: Option<Expr>,
    pub autoincrement: Option<AutoIncrement>,
}

impl ColumnDef {
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: true,
            primary_key: false,
            default: None,
            autoincrement: None,
        }
    }

    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    #[must_use]
    pub fn default_value(mut self, expr: Expr) -> Self {
        self.default = Some(expr);
        self
    }

    #[must_use]
    pub fn autoincrement(mut self) -> Self {
        self.autoincrement = Some(AutoIncrement::default());
        self
    }

    #[must_use]
    pub fn autoincrement_with(mut self, auto: AutoIncrement) -> Self {
        self.autoincrement = Some(auto);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl CreateTable {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    #[must_use]
    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    pub name: String,
    pub start: Option<i64>,
}

impl Sequence {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: None,
        }
    }

    #[must_use]
    pub fn start_with(mut self, start: i64) -> Self {
        self.start = Some(start);
        self
    }
}
