//! Error types for mapping, comparing and scripting.

use std::path::PathBuf;

/// Errors that can occur while building, comparing or scripting database maps.
#[derive(Debug, thiserror::Error)]
pub enum DbMapError {
    /// A required argument was missing or empty.
    #[error("Invalid {argument}: {value}")]
    InvalidArgument {
        /// Name of the offending argument.
        argument: &'static str,
        /// The value that was received, rendered for diagnostics.
        value: String,
    },

    /// A table was used before its schema reference was resolved.
    #[error(
        "No schema associated with table '{table}' (schema id {schema_id}), \
         cannot resolve full table name"
    )]
    UnresolvedSchema {
        /// Table name.
        table: String,
        /// Raw schema id carried by the table.
        schema_id: i64,
    },

    /// A constraint names a column that the owning table does not have.
    #[error(
        "Constraint '{constraint}' references unknown column id {column_id} on table '{table}'"
    )]
    UnknownConstraintColumn {
        /// Constraint name.
        constraint: String,
        /// Table the column was looked up in.
        table: String,
        /// Raw column id.
        column_id: i64,
    },

    /// A CREATE TABLE statement was requested for a table without columns.
    #[error("Table '{0}' has no columns, cannot generate CREATE TABLE statement")]
    EmptyTable(String),

    /// No statement template is registered under the requested name.
    #[error("Template {0} not found")]
    TemplateNotFound(String),

    /// The database type tag is not supported.
    #[error("Not supported database type: {0}")]
    UnsupportedDatabase(String),

    /// The introspection provider failed.
    #[error("Introspection error: {0}")]
    Introspection(String),

    /// Failed to read a template or snapshot file.
    #[error("Failed to read '{path}': {source}")]
    ReadFile {
        /// Path of the file.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DbMapError {
    /// Builds an [`DbMapError::InvalidArgument`] from any debuggable value.
    pub(crate) fn invalid(argument: &'static str, value: &impl std::fmt::Debug) -> Self {
        Self::InvalidArgument {
            argument,
            value: format!("{value:?}"),
        }
    }
}

/// Result type for dbmap operations.
pub type Result<T> = std::result::Result<T, DbMapError>;
