//! DDL script generation.
//!
//! The [`ScriptGenerator`] turns a [`Diff`] into a script by filling the
//! statement templates supplied by a [`TemplateProvider`]. Statements come out
//! in a fixed order:
//!
//! 1. database selection
//! 2. dropped tables
//! 3. dropped schemas
//! 4. created schemas
//! 5. created tables, with their columns, primary key and foreign keys
//!
//! Altered tables and columns are reported by the diff but not scripted.

mod column;

pub use column::ColumnTypeFamily;

use tracing::{debug, warn};

use crate::comparer::{Diff, DiffState};
use crate::error::{DbMapError, Result};
use crate::model::{Column, ConstraintColumn, DatabaseType};
use crate::snapshot::{ConstraintRef, SchemaRef, TableRef};
use crate::templates::{placeholder, TemplateName, TemplateProvider, TemplateSet};

/// Quotes an identifier with brackets, doubling embedded closing brackets.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("[{}]", escape_identifier(name))
}

fn escape_identifier(name: &str) -> String {
    name.replace(']', "]]")
}

/// Generates DDL scripts from diffs.
#[derive(Debug, Clone)]
pub struct ScriptGenerator<T> {
    templates: T,
}

impl ScriptGenerator<TemplateSet> {
    /// Creates a generator using the built-in templates of a database type.
    #[must_use]
    pub fn for_database_type(database_type: DatabaseType) -> Self {
        Self::new(TemplateSet::builtin(database_type))
    }
}

impl<T: TemplateProvider> ScriptGenerator<T> {
    /// Creates a generator over a template provider.
    #[must_use]
    pub const fn new(templates: T) -> Self {
        Self { templates }
    }

    /// Returns the template provider.
    #[must_use]
    pub const fn templates(&self) -> &T {
        &self.templates
    }

    /// Generates the script for a diff.
    ///
    /// # Errors
    ///
    /// Fails when neither snapshot names its database, when a template is
    /// missing, or when any statement cannot be generated.
    pub fn generate(&self, diff: &Diff<'_>) -> Result<String> {
        let database_name = diff
            .current()
            .database_name()
            .or_else(|| diff.previous().database_name());

        let mut statements = vec![self.generate_use_stmt(database_name)?];

        for entry in diff.tables_in(DiffState::Deleted) {
            if let Some(table) = entry.previous {
                statements.push(self.generate_drop_table_stmt(table)?);
            }
        }

        for entry in diff.schemas_in(DiffState::Deleted) {
            if let Some(schema) = entry.previous {
                statements.push(self.generate_drop_schema_stmt(schema)?);
            }
        }

        for entry in diff.schemas_in(DiffState::Created) {
            if let Some(schema) = entry.current {
                statements.push(self.generate_create_schema_stmt(schema)?);
            }
        }

        for entry in diff.tables_in(DiffState::Created) {
            if let Some(table) = entry.current {
                statements.push(self.generate_create_table_stmt(table)?);
            }
        }

        debug!(statements = statements.len(), "Generated script");

        let mut script = statements.join("\n\n");
        script.push('\n');
        Ok(script)
    }

    /// Generates the database selection statement.
    ///
    /// # Errors
    ///
    /// Returns [`DbMapError::InvalidArgument`] if the name is missing or empty.
    pub fn generate_use_stmt(&self, database_name: Option<&str>) -> Result<String> {
        let database_name = database_name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| DbMapError::invalid("database name", &database_name))?;

        self.fill(
            TemplateName::UseStmt,
            &[(placeholder::DATABASE_NAME, escape_identifier(database_name))],
        )
    }

    /// Generates a DROP TABLE statement, qualified with the table's schema.
    ///
    /// # Errors
    ///
    /// Returns [`DbMapError::UnresolvedSchema`] if the table has no schema.
    pub fn generate_drop_table_stmt(&self, table: TableRef<'_>) -> Result<String> {
        let schema = table_schema(table)?;

        self.fill(
            TemplateName::DropTableStmt,
            &[
                (placeholder::SCHEMA_NAME, escape_identifier(&schema.name)),
                (
                    placeholder::TABLE_NAME,
                    escape_identifier(required("table name", &table.name)?),
                ),
            ],
        )
    }

    /// Generates a DROP SCHEMA statement.
    ///
    /// # Errors
    ///
    /// Fails on an empty schema name or a missing template.
    pub fn generate_drop_schema_stmt(&self, schema: SchemaRef<'_>) -> Result<String> {
        let name = escape_identifier(required("schema name", &schema.name)?);
        self.fill(
            TemplateName::DropSchemaStmt,
            &[(placeholder::SCHEMA_NAME, name)],
        )
    }

    /// Generates a CREATE SCHEMA statement.
    ///
    /// # Errors
    ///
    /// Fails on an empty schema name or a missing template.
    pub fn generate_create_schema_stmt(&self, schema: SchemaRef<'_>) -> Result<String> {
        let name = escape_identifier(required("schema name", &schema.name)?);
        self.fill(
            TemplateName::CreateSchemaStmt,
            &[(placeholder::SCHEMA_NAME, name)],
        )
    }

    /// Generates a CREATE TABLE statement with its columns and keys.
    ///
    /// Only the first primary key is rendered; foreign keys follow in table
    /// order. Foreign keys whose referenced table is unresolved are left out.
    ///
    /// # Errors
    ///
    /// Returns [`DbMapError::EmptyTable`] if the table has no columns, and
    /// propagates column and key errors.
    pub fn generate_create_table_stmt(&self, table: TableRef<'_>) -> Result<String> {
        let schema = table_schema(table)?;
        let table_name = required("table name", &table.name)?;

        let mut lines = Vec::new();
        for (position, column) in table.columns().enumerate() {
            let definition = self.generate_create_table_column_stmt(column.get())?;
            if position == 0 {
                lines.push(definition);
            } else {
                lines.push(format!(", {definition}"));
            }
        }

        if lines.is_empty() {
            return Err(DbMapError::EmptyTable(table_name.to_string()));
        }

        if let Some(primary_key) = table.primary_key() {
            lines.push(self.generate_create_table_primary_key_stmt(primary_key)?);
        }

        for foreign_key in table.foreign_keys() {
            let referenced = foreign_key.destination_table();
            if referenced.and_then(|t| t.schema()).is_none() {
                warn!(
                    constraint = %foreign_key.name,
                    "Skipping foreign key with unresolved referenced table"
                );
                continue;
            }
            lines.push(self.generate_create_table_foreign_key_stmt(foreign_key)?);
        }

        debug!(table = %table_name, lines = lines.len(), "Rendered CREATE TABLE");

        self.fill(
            TemplateName::CreateTableStmt,
            &[
                (placeholder::SCHEMA_NAME, escape_identifier(&schema.name)),
                (placeholder::TABLE_NAME, escape_identifier(table_name)),
                (placeholder::CREATE_TABLE_BODY_CONTENT, lines.join("\n")),
            ],
        )
    }

    /// Generates one column definition.
    ///
    /// # Errors
    ///
    /// Fails on an empty name or type, or a missing template.
    pub fn generate_create_table_column_stmt(&self, column: &Column) -> Result<String> {
        let name = required("column name", &column.name)?;
        required("column type", &column.type_name)?;

        let template = self.templates.template(TemplateName::CreateTableColumnStmt)?;
        Ok(column::render(template, column, &escape_identifier(name)))
    }

    /// Generates the primary key fragment, prefixed with a separating comma.
    ///
    /// # Errors
    ///
    /// Fails if the constraint is not a resolved primary key or names an
    /// unknown column.
    pub fn generate_create_table_primary_key_stmt(
        &self,
        constraint: ConstraintRef<'_>,
    ) -> Result<String> {
        if !constraint.is_primary_key() {
            return Err(DbMapError::invalid("primary key", &constraint.constraint_type));
        }
        let name = required("constraint name", &constraint.name)?;
        let table = constraint
            .source_table()
            .ok_or_else(|| DbMapError::invalid("primary key table", &constraint.name))?;

        let columns = key_columns(
            constraint,
            table,
            &constraint.source_target.constraint_columns,
            true,
        )?;

        let fragment = self.fill(
            TemplateName::CreateTablePrimaryKeyStmt,
            &[
                (placeholder::CONSTRAINT_NAME, escape_identifier(name)),
                (placeholder::CONSTRAINT_COLUMNS, columns),
            ],
        )?;
        Ok(format!(", {fragment}"))
    }

    /// Generates a foreign key fragment, prefixed with a separating comma.
    ///
    /// # Errors
    ///
    /// Fails if the constraint is not a foreign key with both tables resolved,
    /// or names an unknown column.
    pub fn generate_create_table_foreign_key_stmt(
        &self,
        constraint: ConstraintRef<'_>,
    ) -> Result<String> {
        if !constraint.is_foreign_key() {
            return Err(DbMapError::invalid("foreign key", &constraint.constraint_type));
        }
        let name = required("constraint name", &constraint.name)?;
        let source = constraint
            .source_table()
            .ok_or_else(|| DbMapError::invalid("foreign key table", &constraint.name))?;
        let destination = constraint
            .destination_table()
            .ok_or_else(|| DbMapError::invalid("referenced table", &constraint.name))?;
        let destination_target = constraint
            .destination_target
            .as_ref()
            .ok_or_else(|| DbMapError::invalid("referenced columns", &constraint.name))?;

        let destination_schema = table_schema(destination)?;
        let parent_columns = key_columns(
            constraint,
            source,
            &constraint.source_target.constraint_columns,
            false,
        )?;
        let referenced_columns = key_columns(
            constraint,
            destination,
            &destination_target.constraint_columns,
            false,
        )?;

        let fragment = self.fill(
            TemplateName::CreateTableForeignKeyStmt,
            &[
                (placeholder::CONSTRAINT_NAME, escape_identifier(name)),
                (placeholder::CONSTRAINT_PARENT_COLUMNS, parent_columns),
                (
                    placeholder::CONSTRAINT_REFERENCED_TABLE,
                    format!(
                        "{}.{}",
                        quote_identifier(&destination_schema.name),
                        quote_identifier(&destination.name)
                    ),
                ),
                (placeholder::CONSTRAINT_REFERENCED_COLUMNS, referenced_columns),
            ],
        )?;
        Ok(format!(", {fragment}"))
    }

    /// Looks up a template and replaces every occurrence of each placeholder.
    fn fill(&self, name: TemplateName, values: &[(&str, String)]) -> Result<String> {
        let mut statement = self.templates.template(name)?.to_string();
        for (token, value) in values {
            statement = statement.replace(token, value);
        }
        Ok(statement.trim_end().to_string())
    }
}

fn required<'a>(argument: &'static str, value: &'a str) -> Result<&'a str> {
    if value.trim().is_empty() {
        return Err(DbMapError::invalid(argument, &value));
    }
    Ok(value)
}

fn table_schema<'a>(table: TableRef<'a>) -> Result<SchemaRef<'a>> {
    table.schema().ok_or_else(|| DbMapError::UnresolvedSchema {
        table: table.name.clone(),
        schema_id: table.schema_id,
    })
}

/// Renders key columns as a comma-separated, bracket-quoted list.
fn key_columns(
    constraint: ConstraintRef<'_>,
    table: TableRef<'_>,
    columns: &[ConstraintColumn],
    with_order: bool,
) -> Result<String> {
    if columns.is_empty() {
        return Err(DbMapError::invalid("constraint columns", &constraint.name));
    }

    let mut rendered = Vec::with_capacity(columns.len());
    for key_column in columns {
        let column = table.column_by_id(key_column.column_id).ok_or_else(|| {
            DbMapError::UnknownConstraintColumn {
                constraint: constraint.name.clone(),
                table: table.name.clone(),
                column_id: key_column.column_id,
            }
        })?;

        let quoted = quote_identifier(&column.name);
        if with_order {
            let order = if key_column.is_descending_key { "DESC" } else { "ASC" };
            rendered.push(format!("{quoted} {order}"));
        } else {
            rendered.push(quoted);
        }
    }

    Ok(rendered.join(", "))
}
