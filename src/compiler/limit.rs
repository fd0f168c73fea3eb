use std::collections::HashSet;

use super::expr::Position;
use super::select::DUAL;
use super::{FirebirdCompiler, Fragment};
use crate::ast::{Expr, Select};
use crate::error::DialectError;

const ROW_NUMBER_COLUMN: &str = "fb_rownum";
const WINDOW_ALIAS: &str = "anon_1";

impl FirebirdCompiler {
    /// `OFFSET n ROWS` / `FETCH {FIRST|NEXT} m ROWS ONLY`, with a leading space.
    pub(super) fn offset_fetch_clause(limit: Option<u64>, offset: Option<u64>) -> String {
        let mut clause = String::new();
        if let Some(offset) = offset {
            clause.push_str(&format!(" OFFSET {offset} ROWS"));
        }
        if let Some(limit) = limit {
            let which = if offset.is_some() { "NEXT" } else { "FIRST" };
            clause.push_str(&format!(" FETCH {which} {limit} ROWS ONLY"));
        }
        clause
    }

    /// Paginate with a `ROW_NUMBER()` window over the original query. Row numbers follow
    /// the query's ORDER BY so the page boundaries are deterministic.
    pub(super) fn render_row_number_window(
        &self,
        select: &Select,
        offset: u64,
        out: &mut Fragment,
    ) -> Result<(), DialectError> {
        if select.distinct {
            return Err(DialectError::Compile(
                "DISTINCT with OFFSET needs OFFSET/FETCH support".into(),
            ));
        }
        let mut names = Vec::with_capacity(select.columns.len());
        let mut seen = HashSet::new();
        let mut has_star = false;
        for item in &select.columns {
            if matches!(item.expr, Expr::Star { .. }) {
                has_star = true;
                continue;
            }
            let name = item.output_name().ok_or_else(|| {
                DialectError::Compile(
                    "OFFSET without OFFSET/FETCH support needs every column to be named".into(),
                )
            })?;
            if !seen.insert(name) {
                return Err(DialectError::Compile(format!(
                    "column name `{name}` is ambiguous in the paginated query"
                )));
            }
            names.push(self.quote(name)?);
        }

        out.push("SELECT ");
        if has_star {
            // Star projections keep the row-number column as their last column.
            out.push(&format!("{WINDOW_ALIAS}.*"));
        } else {
            let outer: Vec<String> = names
                .iter()
                .map(|name| format!("{WINDOW_ALIAS}.{name}"))
                .collect();
            out.push(&outer.join(", "));
        }
        out.push(" FROM (SELECT ");
        self.render_window_items(select, out)?;
        out.push(", ROW_NUMBER() OVER (");
        if !select.order_by.is_empty() {
            out.push("ORDER BY ");
            self.render_order_terms(&select.order_by, out)?;
        }
        out.push(&format!(") AS {ROW_NUMBER_COLUMN}"));
        self.render_tail(select, out)?;
        out.push(&format!(
            ") {WINDOW_ALIAS} WHERE {WINDOW_ALIAS}.{ROW_NUMBER_COLUMN} > {offset}"
        ));
        if let Some(limit) = select.limit {
            let upper = offset.saturating_add(limit);
            out.push(&format!(" AND {WINDOW_ALIAS}.{ROW_NUMBER_COLUMN} <= {upper}"));
        }
        out.push(&format!(" ORDER BY {WINDOW_ALIAS}.{ROW_NUMBER_COLUMN}"));
        Ok(())
    }

    /// Select list of the windowed subquery. A bare `*` is qualified with every table in
    /// scope, since Firebird rejects an unqualified star next to other columns.
    fn render_window_items(&self, select: &Select, out: &mut Fragment) -> Result<(), DialectError> {
        let mut scope: Vec<&str> = Vec::new();
        match &select.from {
            Some(table) => scope.push(table.alias.as_deref().unwrap_or(&table.name)),
            None => scope.push(DUAL),
        }
        for join in &select.joins {
            scope.push(join.table.alias.as_deref().unwrap_or(&join.table.name));
        }

        for (idx, item) in select.columns.iter().enumerate() {
            if idx > 0 {
                out.push(", ");
            }
            if let Expr::Star { table: None } = item.expr {
                let qualified = scope
                    .iter()
                    .map(|table| {
                        if *table == DUAL {
                            Ok(format!("{DUAL}.*"))
                        } else {
                            self.quote(table).map(|quoted| format!("{quoted}.*"))
                        }
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                out.push(&qualified.join(", "));
                continue;
            }
            self.render_expr(&item.expr, out, Position::SelectList)?;
            if let Some(alias) = &item.alias {
                out.push(" AS ");
                out.push(&self.quote(alias)?);
            }
        }
        Ok(())
    }
}
