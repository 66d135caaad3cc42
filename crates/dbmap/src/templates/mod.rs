//! Statement templates.
//!
//! Scripts are rendered from dialect-specific statement skeletons containing
//! `{Placeholder}` tokens. A [`TemplateProvider`] looks skeletons up by
//! [`TemplateName`]; [`TemplateSet`] is the in-memory provider, filled either
//! from the templates compiled into the crate or from a directory tree.
//!
//! Lookups prefer the version-specific layer (e.g. `mssql/mssql_2016/`) over
//! the dialect-generic one (`mssql/`).

mod builtin;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use tracing::debug;

use crate::error::{DbMapError, Result};
use crate::model::DatabaseType;

/// Placeholder tokens understood by the script generator.
pub mod placeholder {
    /// Database name.
    pub const DATABASE_NAME: &str = "{DatabaseName}";
    /// Schema name.
    pub const SCHEMA_NAME: &str = "{SchemaName}";
    /// Table name.
    pub const TABLE_NAME: &str = "{TableName}";
    /// Column name.
    pub const COLUMN_NAME: &str = "{ColumnName}";
    /// Uppercased column type keyword.
    pub const COLUMN_TYPE: &str = "{ColumnType}";
    /// `NULL` or `NOT NULL`.
    pub const IS_NULLABLE: &str = "{IsNullable}";
    /// Identity clause.
    pub const IDENTITY: &str = "{Identity}";
    /// Precision and/or scale.
    pub const PRECISION_AND_SCALE: &str = "{PrecisionAndScale}";
    /// Collation clause.
    pub const COLLATE: &str = "{Collate}";
    /// Maximum length.
    pub const COLUMN_MAX_LENGTH: &str = "{ColumnMaxLength}";
    /// Column and constraint lines of a CREATE TABLE statement.
    pub const CREATE_TABLE_BODY_CONTENT: &str = "{CreateTableBodyContent}";
    /// Constraint name.
    pub const CONSTRAINT_NAME: &str = "{ConstraintName}";
    /// Primary key columns.
    pub const CONSTRAINT_COLUMNS: &str = "{ConstraintColumns}";
    /// Foreign key columns on the owning table.
    pub const CONSTRAINT_PARENT_COLUMNS: &str = "{ConstraintParentColumns}";
    /// Schema-qualified referenced table.
    pub const CONSTRAINT_REFERENCED_TABLE: &str = "{ConstraintReferencedTable}";
    /// Foreign key columns on the referenced table.
    pub const CONSTRAINT_REFERENCED_COLUMNS: &str = "{ConstraintReferencedColumns}";
}

/// Logical template names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateName {
    /// Database selection.
    UseStmt,
    /// DROP SCHEMA.
    DropSchemaStmt,
    /// DROP TABLE.
    DropTableStmt,
    /// CREATE SCHEMA.
    CreateSchemaStmt,
    /// CREATE TABLE.
    CreateTableStmt,
    /// Column definition inside CREATE TABLE.
    CreateTableColumnStmt,
    /// Primary key fragment inside CREATE TABLE.
    CreateTablePrimaryKeyStmt,
    /// Foreign key fragment inside CREATE TABLE.
    CreateTableForeignKeyStmt,
}

impl TemplateName {
    /// Every template name.
    pub const ALL: [Self; 8] = [
        Self::UseStmt,
        Self::DropSchemaStmt,
        Self::DropTableStmt,
        Self::CreateSchemaStmt,
        Self::CreateTableStmt,
        Self::CreateTableColumnStmt,
        Self::CreateTablePrimaryKeyStmt,
        Self::CreateTableForeignKeyStmt,
    ];

    /// Returns the name as used for template files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UseStmt => "use_stmt",
            Self::DropSchemaStmt => "drop_schema_stmt",
            Self::DropTableStmt => "drop_table_stmt",
            Self::CreateSchemaStmt => "create_schema_stmt",
            Self::CreateTableStmt => "create_table_stmt",
            Self::CreateTableColumnStmt => "create_table_column_stmt",
            Self::CreateTablePrimaryKeyStmt => "create_table_primary_key_stmt",
            Self::CreateTableForeignKeyStmt => "create_table_foreign_key_stmt",
        }
    }

    /// Looks a name up from its file stem.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for TemplateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supplies statement templates by name.
pub trait TemplateProvider {
    /// Returns the template registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`DbMapError::TemplateNotFound`] if no template is registered
    /// under `name`.
    fn template(&self, name: TemplateName) -> Result<&str>;
}

impl<T: TemplateProvider + ?Sized> TemplateProvider for &T {
    fn template(&self, name: TemplateName) -> Result<&str> {
        (**self).template(name)
    }
}

/// Templates held in memory, in two layers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateSet {
    generic: HashMap<String, String>,
    overrides: HashMap<String, String>,
}

impl TemplateSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the templates compiled into the crate for a database type.
    #[must_use]
    pub fn builtin(database_type: DatabaseType) -> Self {
        builtin::load(database_type)
    }

    /// Loads templates from `<root>/<family>/*.sql` and the version-specific
    /// overrides from `<root>/<family>/<version>/*.sql`.
    ///
    /// Missing directories contribute nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory or template file cannot be read.
    pub fn from_dir(root: impl AsRef<Path>, database_type: DatabaseType) -> Result<Self> {
        let family_dir = root.as_ref().join(database_type.family());
        let version_dir = family_dir.join(database_type.version_dir());

        let templates = Self {
            generic: read_sql_files(&family_dir)?,
            overrides: read_sql_files(&version_dir)?,
        };

        debug!(
            dir = %family_dir.display(),
            generic = templates.generic.len(),
            overrides = templates.overrides.len(),
            "Loaded statement templates"
        );

        Ok(templates)
    }

    /// Registers a dialect-generic template.
    pub fn insert_generic(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.generic.insert(name.into(), text.into());
    }

    /// Registers a version-specific template.
    pub fn insert_override(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.overrides.insert(name.into(), text.into());
    }

    /// Returns true if no template is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.generic.is_empty() && self.overrides.is_empty()
    }
}

impl TemplateProvider for TemplateSet {
    fn template(&self, name: TemplateName) -> Result<&str> {
        let key = name.as_str();
        self.overrides
            .get(key)
            .or_else(|| self.generic.get(key))
            .map(String::as_str)
            .ok_or_else(|| DbMapError::TemplateNotFound(key.to_string()))
    }
}

fn read_sql_files(dir: &Path) -> Result<HashMap<String, String>> {
    let mut files = HashMap::new();
    if !dir.is_dir() {
        return Ok(files);
    }

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("sql") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let text = std::fs::read_to_string(&path).map_err(|source| DbMapError::ReadFile {
            path: path.clone(),
            source,
        })?;
        files.insert(stem.to_string(), text);
    }

    Ok(files)
}
