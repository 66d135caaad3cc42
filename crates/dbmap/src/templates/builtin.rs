//! Statement templates compiled into the crate.

use super::{TemplateName, TemplateSet};
use crate::model::DatabaseType;

const MSSQL: [(TemplateName, &str); 8] = [
    (TemplateName::UseStmt, include_str!("../../templates/mssql/use_stmt.sql")),
    (TemplateName::DropSchemaStmt, include_str!("../../templates/mssql/drop_schema_stmt.sql")),
    (TemplateName::DropTableStmt, include_str!("../../templates/mssql/drop_table_stmt.sql")),
    (TemplateName::CreateSchemaStmt, include_str!("../../templates/mssql/create_schema_stmt.sql")),
    (TemplateName::CreateTableStmt, include_str!("../../templates/mssql/create_table_stmt.sql")),
    (
        TemplateName::CreateTableColumnStmt,
        include_str!("../../templates/mssql/create_table_column_stmt.sql"),
    ),
    (
        TemplateName::CreateTablePrimaryKeyStmt,
        include_str!("../../templates/mssql/create_table_primary_key_stmt.sql"),
    ),
    (
        TemplateName::CreateTableForeignKeyStmt,
        include_str!("../../templates/mssql/create_table_foreign_key_stmt.sql"),
    ),
];

const MSSQL_2016: [(TemplateName, &str); 2] = [
    (
        TemplateName::DropSchemaStmt,
        include_str!("../../templates/mssql/mssql_2016/drop_schema_stmt.sql"),
    ),
    (
        TemplateName::DropTableStmt,
        include_str!("../../templates/mssql/mssql_2016/drop_table_stmt.sql"),
    ),
];

pub(super) fn load(database_type: DatabaseType) -> TemplateSet {
    let (generic, overrides): (&[(TemplateName, &str)], &[(TemplateName, &str)]) =
        match database_type {
            DatabaseType::Mssql2016 => (&MSSQL, &MSSQL_2016),
        };

    let mut templates = TemplateSet::new();
    for (name, text) in generic {
        templates.insert_generic(name.as_str(), *text);
    }
    for (name, text) in overrides {
        templates.insert_override(name.as_str(), *text);
    }
    templates
}
