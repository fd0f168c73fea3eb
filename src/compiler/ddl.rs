use super::expr::Position;
use super::{CompiledStatement, FirebirdCompiler, Fragment};
use crate::ast::{ColumnDef, CreateTable, Sequence};
use crate::error::DialectError;
use crate::types::SqlType;

impl FirebirdCompiler {
    pub(super) fn compile_create_table(
        &self,
        table: &CreateTable,
    ) -> Result<Vec<CompiledStatement>, DialectError> {
        if table.columns.is_empty() {
            return Err(DialectError::Compile(format!(
                "table `{}` has no columns",
                table.name
            )));
        }
        let caps = &self.descriptor.capabilities;
        let table_name = self.quote(&table.name)?;

        let mut definitions = Vec::with_capacity(table.columns.len() + 1);
        let mut primary_key = Vec::new();
        let mut emulated = Vec::new();
        for column in &table.columns {
            definitions.push(self.column_definition(column)?);
            if column.primary_key {
                primary_key.push(self.quote(&column.name)?);
            }
            if column.autoincrement.is_some() && !caps.identity_columns {
                emulated.push(column);
            }
        }
        if !primary_key.is_empty() {
            definitions.push(format!("PRIMARY KEY ({})", primary_key.join(", ")));
        }

        let mut statements = vec![CompiledStatement::ddl(format!(
            "CREATE TABLE {table_name} ({})",
            definitions.join(", ")
        ))];

        for column in emulated {
            let auto = column.autoincrement.clone().unwrap_or_default();
            let generator = auto
                .sequence
                .unwrap_or_else(|| format!("gen_{}_{}", table.name, column.name));
            let trigger = auto
                .trigger
                .unwrap_or_else(|| format!("trg_{}_{}", table.name, column.name));
            statements.extend(self.compile_create_sequence(&Sequence::new(generator.clone()))?);
            let generator = self.quote(&generator)?;
            let column = self.quote(&column.name)?;
            statements.push(CompiledStatement::ddl(format!(
                "CREATE TRIGGER {} FOR {table_name} ACTIVE BEFORE INSERT POSITION 0 AS BEGIN \
                 IF (NEW.{column} IS NULL) THEN NEW.{column} = GEN_ID({generator}, 1); END",
                self.quote(&trigger)?
            )));
        }
        Ok(statements)
    }

    fn column_definition(&self, column: &ColumnDef) -> Result<String, DialectError> {
        let mut text = format!(
            "{} {}",
            self.quote(&column.name)?,
            self.types().native_type_for(&column.sql_type)?
        );

        if column.autoincrement.is_some() {
            let integral = matches!(
                column.sql_type,
                SqlType::SmallInteger
                    | SqlType::Integer
                    | SqlType::BigInteger
                    | SqlType::Numeric { scale: 0, .. }
            );
            if !integral {
                return Err(DialectError::Compile(format!(
                    "auto-increment column `{}` must have an integer type",
                    column.name
                )));
            }
            if self.descriptor.capabilities.identity_columns {
                text.push_str(" GENERATED BY DEFAULT AS IDENTITY");
                return Ok(text);
            }
        }

        if let Some(default) = &column.default {
            let mut fragment = Fragment::default();
            self.render_expr(default, &mut fragment, Position::Predicate)?;
            if !fragment.binds.is_empty() {
                return Err(DialectError::Compile(format!(
                    "default of `{}` cannot use bind parameters",
                    column.name
                )));
            }
            text.push_str(" DEFAULT ");
            text.push_str(&fragment.sql);
        }
        if !column.nullable {
            text.push_str(" NOT NULL");
        }
        Ok(text)
    }

    pub(super) fn compile_drop_table(&self, name: &str) -> Result<CompiledStatement, DialectError> {
        Ok(CompiledStatement::ddl(format!("DROP TABLE {}", self.quote(name)?)))
    }

    pub(super) fn compile_create_sequence(
        &self,
        sequence: &Sequence,
    ) -> Result<Vec<CompiledStatement>, DialectError> {
        let name = self.quote(&sequence.name)?;
        if self.descriptor.capabilities.sequences {
            let mut sql = format!("CREATE SEQUENCE {name}");
            if let Some(start) = sequence.start {
                sql.push_str(&format!(" START WITH {start}"));
            }
            return Ok(vec![CompiledStatement::ddl(sql)]);
        }
        let mut statements = vec![CompiledStatement::ddl(format!("CREATE GENERATOR {name}"))];
        if let Some(start) = sequence.start {
            statements.push(CompiledStatement::ddl(format!("SET GENERATOR {name} TO {start}")));
        }
        Ok(statements)
    }

    pub(super) fn compile_drop_sequence(&self, name: &str) -> Result<CompiledStatement, DialectError> {
        let keyword = if self.descriptor.capabilities.sequences {
            "SEQUENCE"
        } else {
            "GENERATOR"
        };
        Ok(CompiledStatement::ddl(format!("DROP {keyword} {}", self.quote(name)?)))
    }
}
