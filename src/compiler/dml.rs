use super::expr::Position;
use super::select::DUAL;
use super::{BindSlot, CompiledStatement, FirebirdCompiler, Fragment, SequencePrefetch};
use crate::ast::{Delete, Insert, Update};
use crate::error::DialectError;

impl FirebirdCompiler {
    pub(super) fn compile_insert(&self, insert: &Insert) -> Result<CompiledStatement, DialectError> {
        if insert.columns.len() != insert.values.len() {
            return Err(DialectError::Compile(format!(
                "INSERT into `{}` has {} columns but {} values",
                insert.table,
                insert.columns.len(),
                insert.values.len()
            )));
        }
        let caps = &self.descriptor.capabilities;

        let mut columns = insert.columns.clone();
        let mut prefetch = None;
        if !insert.returning.is_empty() && !caps.insert_returning {
            let key = insert
                .sequence_key
                .as_ref()
                .filter(|key| insert.returning.len() == 1 && insert.returning[0] == key.column)
                .ok_or_else(|| {
                    DialectError::Compile(
                        "RETURNING is not supported by this server except for a sequence-backed key"
                            .into(),
                    )
                })?;
            if columns.contains(&key.column) {
                return Err(DialectError::Compile(format!(
                    "key column `{}` is drawn from `{}` and cannot also be supplied",
                    key.column, key.sequence
                )));
            }
            let sequence = self.quote(&key.sequence)?;
            let next = if caps.sequences {
                format!("NEXT VALUE FOR {sequence}")
            } else {
                format!("GEN_ID({sequence}, 1)")
            };
            prefetch = Some(SequencePrefetch {
                sql: format!("SELECT {next} FROM {DUAL}"),
                column: key.column.clone(),
            });
            columns.push(key.column.clone());
        }

        let mut out = Fragment::default();
        out.push("INSERT INTO ");
        out.push(&self.quote(&insert.table)?);
        if columns.is_empty() {
            out.push(" DEFAULT VALUES");
        } else {
            let quoted = columns
                .iter()
                .map(|c| self.quote(c))
                .collect::<Result<Vec<_>, _>>()?;
            out.push(&format!(" ({}) VALUES (", quoted.join(", ")));
            for (idx, value) in insert.values.iter().enumerate() {
                if idx > 0 {
                    out.push(", ");
                }
                self.render_expr(value, &mut out, Position::Predicate)?;
            }
            if let Some(prefetch) = &prefetch {
                if !insert.values.is_empty() {
                    out.push(", ");
                }
                out.push("?");
                out.binds.push(BindSlot {
                    name: prefetch.column.clone(),
                    sql_type: None,
                    value: None,
                });
            }
            out.push(")");
        }

        let native_returning = prefetch.is_none() && !insert.returning.is_empty();
        if native_returning {
            self.render_returning(&insert.returning, &mut out)?;
        }

        let mut compiled = out.into_statement();
        compiled.returns_rows = native_returning;
        if !insert.returning.is_empty() {
            compiled.returning = Some(insert.returning.clone());
        }
        compiled.sequence_prefetch = prefetch;
        Ok(compiled)
    }

    pub(super) fn compile_update(&self, update: &Update) -> Result<CompiledStatement, DialectError> {
        if update.assignments.is_empty() {
            return Err(DialectError::Compile(format!(
                "UPDATE of `{}` has no assignments",
                update.table
            )));
        }
        self.check_update_delete_returning(&update.returning)?;

        let mut out = Fragment::default();
        out.push("UPDATE ");
        out.push(&self.quote(&update.table)?);
        out.push(" SET ");
        for (idx, (column, value)) in update.assignments.iter().enumerate() {
            if idx > 0 {
                out.push(", ");
            }
            out.push(&self.quote(column)?);
            out.push(" = ");
            self.render_expr(value, &mut out, Position::Predicate)?;
        }
        if let Some(filter) = &update.filter {
            out.push(" WHERE ");
            self.render_expr(filter, &mut out, Position::Predicate)?;
        }
        self.finish_returning(out, &update.returning)
    }

    pub(super) fn compile_delete(&self, delete: &Delete) -> Result<CompiledStatement, DialectError> {
        self.check_update_delete_returning(&delete.returning)?;

        let mut out = Fragment::default();
        out.push("DELETE FROM ");
        out.push(&self.quote(&delete.table)?);
        if let Some(filter) = &delete.filter {
            out.push(" WHERE ");
            self.render_expr(filter, &mut out, Position::Predicate)?;
        }
        self.finish_returning(out, &delete.returning)
    }

    fn check_update_delete_returning(&self, returning: &[String]) -> Result<(), DialectError> {
        if !returning.is_empty() && !self.descriptor.capabilities.update_delete_returning {
            return Err(DialectError::Compile(
                "UPDATE/DELETE ... RETURNING is not supported by this server".into(),
            ));
        }
        Ok(())
    }

    fn finish_returning(
        &self,
        mut out: Fragment,
        returning: &[String],
    ) -> Result<CompiledStatement, DialectError> {
        if !returning.is_empty() {
            self.render_returning(returning, &mut out)?;
        }
        let mut compiled = out.into_statement();
        if !returning.is_empty() {
            compiled.returns_rows = true;
            compiled.returning = Some(returning.to_vec());
        }
        Ok(compiled)
    }

    fn render_returning(&self, returning: &[String], out: &mut Fragment) -> Result<(), DialectError> {
        let quoted = returning
            .iter()
            .map(|c| self.quote(c))
            .collect::<Result<Vec<_>, _>>()?;
        out.push(" RETURNING ");
        out.push(&quoted.join(", "));
        Ok(())
    }
}
