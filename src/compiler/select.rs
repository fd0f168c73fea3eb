use super::expr::Position;
use super::{CompiledStatement, FirebirdCompiler, Fragment};
use crate::ast::{CompoundSelect, Expr, JoinKind, OrderBy, Select, SetOperator, TableRef};
use crate::error::DialectError;

/// Table that always has exactly one row.
pub(super) const DUAL: &str = "RDB$DATABASE";

impl FirebirdCompiler {
    pub(super) fn compile_select(&self, select: &Select) -> Result<CompiledStatement, DialectError> {
        let mut out = Fragment::default();
        match select.offset {
            Some(offset) if !self.descriptor.capabilities.offset_fetch => {
                self.render_row_number_window(select, offset, &mut out)?;
            }
            _ => self.render_select(select, &mut out, true)?,
        }
        let mut compiled = out.into_statement();
        compiled.returns_rows = true;
        Ok(compiled)
    }

    /// Render one SELECT; with `paginate`, limit/offset are applied in the server's native form.
    pub(super) fn render_select(
        &self,
        select: &Select,
        out: &mut Fragment,
        paginate: bool,
    ) -> Result<(), DialectError> {
        let offset_fetch = self.descriptor.capabilities.offset_fetch;
        out.push("SELECT ");
        if paginate && !offset_fetch {
            if let Some(limit) = select.limit {
                out.push(&format!("FIRST {limit} "));
            }
        }
        if select.distinct {
            out.push("DISTINCT ");
        }
        self.render_items(select, out)?;
        self.render_tail(select, out)?;
        self.render_order_by(&select.order_by, out)?;
        if paginate && offset_fetch {
            out.push(&Self::offset_fetch_clause(select.limit, select.offset));
        }
        Ok(())
    }

    pub(super) fn render_items(&self, select: &Select, out: &mut Fragment) -> Result<(), DialectError> {
        if select.columns.is_empty() {
            return Err(DialectError::Compile("SELECT without columns".into()));
        }
        for (idx, item) in select.columns.iter().enumerate() {
            if idx > 0 {
                out.push(", ");
            }
            self.render_expr(&item.expr, out, Position::SelectList)?;
            if let Some(alias) = &item.alias {
                out.push(" AS ");
                out.push(&self.quote(alias)?);
            }
        }
        Ok(())
    }

    /// FROM, joins, WHERE and GROUP BY.
    pub(super) fn render_tail(&self, select: &Select, out: &mut Fragment) -> Result<(), DialectError> {
        out.push(" FROM ");
        match &select.from {
            Some(table) => self.render_table(table, out)?,
            None => out.push(DUAL),
        }
        for join in &select.joins {
            out.push(match join.kind {
                JoinKind::Inner => " JOIN ",
                JoinKind::Left => " LEFT OUTER JOIN ",
            });
            self.render_table(&join.table, out)?;
            out.push(" ON ");
            self.render_expr(&join.on, out, Position::Predicate)?;
        }
        if let Some(filter) = &select.filter {
            out.push(" WHERE ");
            self.render_expr(filter, out, Position::Predicate)?;
        }
        if !select.group_by.is_empty() {
            out.push(" GROUP BY ");
            for (idx, expr) in select.group_by.iter().enumerate() {
                if idx > 0 {
                    out.push(", ");
                }
                self.render_expr(expr, out, Position::Predicate)?;
            }
        }
        Ok(())
    }

    fn render_table(&self, table: &TableRef, out: &mut Fragment) -> Result<(), DialectError> {
        out.push(&self.quote(&table.name)?);
        if let Some(alias) = &table.alias {
            out.push(" ");
            out.push(&self.quote(alias)?);
        }
        Ok(())
    }

    pub(super) fn render_order_terms(
        &self,
        order_by: &[OrderBy],
        out: &mut Fragment,
    ) -> Result<(), DialectError> {
        for (idx, term) in order_by.iter().enumerate() {
            if idx > 0 {
                out.push(", ");
            }
            self.render_expr(&term.expr, out, Position::Predicate)?;
            if term.descending {
                out.push(" DESC");
            }
        }
        Ok(())
    }

    fn render_order_by(&self, order_by: &[OrderBy], out: &mut Fragment) -> Result<(), DialectError> {
        if order_by.is_empty() {
            return Ok(());
        }
        out.push(" ORDER BY ");
        self.render_order_terms(order_by, out)
    }

    pub(super) fn compile_compound(
        &self,
        compound: &CompoundSelect,
    ) -> Result<CompiledStatement, DialectError> {
        let joiner = match compound.op {
            SetOperator::Union => " UNION ",
            SetOperator::UnionAll => " UNION ALL ",
            SetOperator::Intersect | SetOperator::Except => {
                return Err(DialectError::Compile(format!(
                    "{:?} is not supported by Firebird",
                    compound.op
                )));
            }
        };
        if compound.selects.len() < 2 {
            return Err(DialectError::Compile(
                "a compound select needs at least two members".into(),
            ));
        }
        if compound
            .selects
            .iter()
            .any(|s| !s.order_by.is_empty() || s.limit.is_some() || s.offset.is_some())
        {
            return Err(DialectError::Compile(
                "members of a compound select cannot carry ORDER BY, LIMIT or OFFSET".into(),
            ));
        }
        let offset_fetch = self.descriptor.capabilities.offset_fetch;
        if compound.offset.is_some() && !offset_fetch {
            return Err(DialectError::Compile(
                "OFFSET on a compound select needs OFFSET/FETCH support".into(),
            ));
        }

        let mut out = Fragment::default();
        let wrap_first = match compound.limit {
            Some(limit) if !offset_fetch => {
                out.push(&format!("SELECT FIRST {limit} * FROM ("));
                true
            }
            _ => false,
        };
        for (idx, member) in compound.selects.iter().enumerate() {
            if idx > 0 {
                out.push(joiner);
            }
            self.render_select(member, &mut out, false)?;
        }
        self.render_compound_order_by(compound, &mut out)?;
        if wrap_first {
            out.push(") anon_1");
        } else if offset_fetch {
            out.push(&Self::offset_fetch_clause(compound.limit, compound.offset));
        }

        let mut compiled = out.into_statement();
        compiled.returns_rows = true;
        Ok(compiled)
    }

    /// ORDER BY terms naming a selected column become 1-based positions.
    fn render_compound_order_by(
        &self,
        compound: &CompoundSelect,
        out: &mut Fragment,
    ) -> Result<(), DialectError> {
        if compound.order_by.is_empty() {
            return Ok(());
        }
        let names: Vec<Option<&str>> = compound.selects[0]
            .columns
            .iter()
            .map(|item| item.output_name())
            .collect();

        out.push(" ORDER BY ");
        for (idx, term) in compound.order_by.iter().enumerate() {
            if idx > 0 {
                out.push(", ");
            }
            let position = match &term.expr {
                Expr::Column { name, .. } => names.iter().position(|n| *n == Some(name.as_str())),
                _ => None,
            };
            match position {
                Some(pos) => out.push(&(pos + 1).to_string()),
                None => self.render_expr(&term.expr, out, Position::Predicate)?,
            }
            if term.descending {
                out.push(" DESC");
            }
        }
        Ok(())
    }
}
