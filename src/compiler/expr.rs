use super::{BindSlot, FirebirdCompiler, Fragment};
use crate::ast::{BinaryOp, Expr, Literal};
use crate::error::DialectError;

/// Where an expression is rendered; binds in the select list need an explicit cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Position {
    SelectList,
    Predicate,
}

fn precedence(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Or => 1,
        BinaryOp::And => 2,
        BinaryOp::Eq
        | BinaryOp::NotEq
        | BinaryOp::Lt
        | BinaryOp::LtEq
        | BinaryOp::Gt
        | BinaryOp::GtEq
        | BinaryOp::Like => 3,
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Concat => 4,
        BinaryOp::Mul | BinaryOp::Div => 5,
    }
}

impl FirebirdCompiler {
    pub(super) fn render_expr(
        &self,
        expr: &Expr,
        out: &mut Fragment,
        position: Position,
    ) -> Result<(), DialectError> {
        match expr {
            Expr::Column { table, name } => {
                if let Some(table) = table {
                    out.push(&self.quote(table)?);
                    out.push(".");
                }
                out.push(&self.quote(name)?);
            }
            Expr::Star { table } => {
                if let Some(table) = table {
                    out.push(&self.quote(table)?);
                    out.push(".");
                }
                out.push("*");
            }
            Expr::Literal(literal) => self.render_literal(literal, out)?,
            Expr::Bind(bind) => {
                if position == Position::SelectList {
                    let ty = bind
                        .sql_type
                        .clone()
                        .or_else(|| bind.value.as_ref().and_then(|v| v.inferred_type()))
                        .ok_or_else(|| {
                            DialectError::Compile(format!(
                                "bind `{}` in the select list needs a type",
                                bind.name
                            ))
                        })?;
                    out.push(&self.types().bind_cast(&ty)?);
                } else {
                    out.push("?");
                }
                out.binds.push(BindSlot {
                    name: bind.name.clone(),
                    sql_type: bind.sql_type.clone(),
                    value: bind.value.clone(),
                });
            }
            Expr::Binary { left, op, right } => {
                let own = precedence(*op);
                self.render_operand(left, own, false, out, position)?;
                out.push(" ");
                out.push(op.as_sql());
                out.push(" ");
                let strict = matches!(op, BinaryOp::Sub | BinaryOp::Div);
                self.render_operand(right, own, strict, out, position)?;
            }
            Expr::Not(inner) => {
                out.push("NOT (");
                self.render_expr(inner, out, position)?;
                out.push(")");
            }
            Expr::IsNull { expr, negated } => {
                self.render_expr(expr, out, position)?;
                out.push(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Expr::Function { name, args } => {
                out.push(name);
                out.push("(");
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        out.push(", ");
                    }
                    self.render_expr(arg, out, position)?;
                }
                out.push(")");
            }
            Expr::Cast { expr, sql_type } => {
                out.push("CAST(");
                self.render_expr(expr, out, Position::Predicate)?;
                out.push(" AS ");
                out.push(&self.types().native_type_for(sql_type)?);
                out.push(")");
            }
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                if list.is_empty() {
                    out.push(if *negated { "1 = 1" } else { "1 = 0" });
                    return Ok(());
                }
                self.render_expr(expr, out, position)?;
                out.push(if *negated { " NOT IN (" } else { " IN (" });
                for (idx, item) in list.iter().enumerate() {
                    if idx > 0 {
                        out.push(", ");
                    }
                    self.render_expr(item, out, Position::Predicate)?;
                }
                out.push(")");
            }
            Expr::NextValue(sequence) => {
                let sequence = self.quote(sequence)?;
                if self.descriptor.capabilities.sequences {
                    out.push(&format!("NEXT VALUE FOR {sequence}"));
                } else {
                    out.push(&format!("GEN_ID({sequence}, 1)"));
                }
            }
            Expr::Raw(text) => out.push(text),
        }
        Ok(())
    }

    fn render_operand(
        &self,
        operand: &Expr,
        parent: u8,
        strict: bool,
        out: &mut Fragment,
        position: Position,
    ) -> Result<(), DialectError> {
        let wrap = match operand {
            Expr::Binary { op, .. } => {
                let own = precedence(*op);
                own < parent || (strict && own == parent)
            }
            _ => false,
        };
        if wrap {
            out.push("(");
        }
        self.render_expr(operand, out, position)?;
        if wrap {
            out.push(")");
        }
        Ok(())
    }

    fn render_literal(&self, literal: &Literal, out: &mut Fragment) -> Result<(), DialectError> {
        match literal {
            Literal::Int(v) => out.push(&v.to_string()),
            Literal::Float(v) => {
                if !v.is_finite() {
                    return Err(DialectError::Compile(format!(
                        "{v} cannot be written as a literal"
                    )));
                }
                out.push(&format!("{v:?}"));
            }
            Literal::Text(text) => {
                out.push("'");
                out.push(&text.replace('\'', "''"));
                out.push("'");
            }
            Literal::Bool(b) => {
                let text = match (self.descriptor.capabilities.boolean, b) {
                    (true, true) => "TRUE",
                    (true, false) => "FALSE",
                    (false, true) => "1",
                    (false, false) => "0",
                };
                out.push(text);
            }
            Literal::Null => out.push("NULL"),
        }
        Ok(())
    }
}
