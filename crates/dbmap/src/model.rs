//! Metadata model types.
//!
//! These are the flat rows produced by introspection: every entity carries
//! its own id and the raw id of its parent. Navigable references between
//! entities are not stored here; they are computed by the
//! [`ReferenceResolver`](crate::resolver::ReferenceResolver) and exposed
//! through the views in [`snapshot`](crate::snapshot).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DbMapError;

/// Database engines (and versions) the scripts can be generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatabaseType {
    /// Microsoft SQL Server 2016.
    #[serde(rename = "MSSQL_2016")]
    Mssql2016,
}

impl DatabaseType {
    /// Returns the tag used in snapshot files and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mssql2016 => "MSSQL_2016",
        }
    }

    /// Returns the dialect family, shared by every version of an engine.
    #[must_use]
    pub const fn family(self) -> &'static str {
        match self {
            Self::Mssql2016 => "mssql",
        }
    }

    /// Returns the directory name holding version-specific templates.
    #[must_use]
    pub fn version_dir(self) -> String {
        self.as_str().to_lowercase()
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseType {
    type Err = DbMapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "MSSQL_2016" => Ok(Self::Mssql2016),
            _ => Err(DbMapError::UnsupportedDatabase(s.to_string())),
        }
    }
}

/// A database schema (namespace).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Schema id, stable per server.
    #[serde(deserialize_with = "loose::number")]
    pub id: i64,
    /// Schema name, unique within a snapshot.
    pub name: String,
}

impl Schema {
    /// Creates a new schema row.
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A user table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    /// Table id.
    #[serde(deserialize_with = "loose::number")]
    pub id: i64,
    /// Table name (without schema).
    pub name: String,
    /// When the table was created.
    pub create_date: DateTime<Utc>,
    /// When the table definition was last modified.
    pub modify_date: DateTime<Utc>,
    /// Raw id of the owning schema.
    #[serde(deserialize_with = "loose::number")]
    pub schema_id: i64,
    /// Whether the table held rows when it was captured.
    #[serde(default, deserialize_with = "loose::boolean")]
    pub has_data: bool,
}

impl Table {
    /// Creates a new table row. The creation date defaults to `modify_date`.
    #[must_use]
    pub fn new(
        id: i64,
        name: impl Into<String>,
        schema_id: i64,
        modify_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            create_date: modify_date,
            modify_date,
            schema_id,
            has_data: false,
        }
    }

    /// Sets the creation date.
    #[must_use]
    pub const fn created(mut self, create_date: DateTime<Utc>) -> Self {
        self.create_date = create_date;
        self
    }

    /// Marks the table as holding data.
    #[must_use]
    pub const fn with_data(mut self) -> Self {
        self.has_data = true;
        self
    }
}

/// A table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    /// Column id (unique within its table).
    #[serde(deserialize_with = "loose::number")]
    pub id: i64,
    /// Column name.
    pub name: String,
    /// Type name as reported by the server, e.g. `varchar`.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Maximum length in bytes; `-1` stands for `MAX`.
    #[serde(default, deserialize_with = "loose::number")]
    pub type_max_length: i32,
    /// Numeric precision.
    #[serde(default, deserialize_with = "loose::number")]
    pub type_precision: i32,
    /// Numeric or fractional-seconds scale.
    #[serde(default, deserialize_with = "loose::number")]
    pub type_scale: i32,
    /// Collation of character columns.
    #[serde(default)]
    pub collation_name: Option<String>,
    /// Whether the column accepts NULL.
    #[serde(default, deserialize_with = "loose::boolean")]
    pub is_nullable: bool,
    /// Whether the column is an identity column.
    #[serde(default, deserialize_with = "loose::boolean")]
    pub is_identity: bool,
    /// Identity seed, only meaningful for identity columns.
    #[serde(default, deserialize_with = "loose::optional_number")]
    pub identity_seed_value: Option<i64>,
    /// Identity increment, only meaningful for identity columns.
    #[serde(default, deserialize_with = "loose::optional_number")]
    pub identity_increment_value: Option<i64>,
    /// Whether the column is computed.
    #[serde(default, deserialize_with = "loose::boolean")]
    pub is_computed: bool,
    /// Raw id of the owning table.
    #[serde(deserialize_with = "loose::number")]
    pub table_id: i64,
}

impl Column {
    /// Creates a new nullable column row.
    #[must_use]
    pub fn new(
        id: i64,
        name: impl Into<String>,
        type_name: impl Into<String>,
        table_id: i64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            type_name: type_name.into(),
            type_max_length: 0,
            type_precision: 0,
            type_scale: 0,
            collation_name: None,
            is_nullable: true,
            is_identity: false,
            identity_seed_value: None,
            identity_increment_value: None,
            is_computed: false,
            table_id,
        }
    }

    /// Sets the maximum length in bytes (`-1` for `MAX`).
    #[must_use]
    pub const fn max_length(mut self, bytes: i32) -> Self {
        self.type_max_length = bytes;
        self
    }

    /// Sets precision and scale.
    #[must_use]
    pub const fn precision(mut self, precision: i32, scale: i32) -> Self {
        self.type_precision = precision;
        self.type_scale = scale;
        self
    }

    /// Sets the collation.
    #[must_use]
    pub fn collation(mut self, collation: impl Into<String>) -> Self {
        self.collation_name = Some(collation.into());
        self
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.is_nullable = false;
        self
    }

    /// Makes the column an identity column.
    #[must_use]
    pub const fn identity(mut self, seed: i64, increment: i64) -> Self {
        self.is_identity = true;
        self.identity_seed_value = Some(seed);
        self.identity_increment_value = Some(increment);
        self
    }
}

/// Kind of key constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintType {
    /// Primary key.
    #[serde(rename = "PRIMARY_KEY", alias = "PK")]
    PrimaryKey,
    /// Foreign key.
    #[serde(rename = "FOREIGN_KEY", alias = "F", alias = "FK")]
    ForeignKey,
}

/// One member column of a key, in declared order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintColumn {
    /// Raw column id.
    #[serde(deserialize_with = "loose::number")]
    pub column_id: i64,
    /// Whether the key sorts this column descending.
    #[serde(default, deserialize_with = "loose::boolean")]
    pub is_descending_key: bool,
}

impl ConstraintColumn {
    /// An ascending key column.
    #[must_use]
    pub const fn asc(column_id: i64) -> Self {
        Self {
            column_id,
            is_descending_key: false,
        }
    }

    /// A descending key column.
    #[must_use]
    pub const fn desc(column_id: i64) -> Self {
        Self {
            column_id,
            is_descending_key: true,
        }
    }
}

/// One side of a key: a table and its member columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintTarget {
    /// Raw table id.
    #[serde(deserialize_with = "loose::number")]
    pub table_id: i64,
    /// Member columns in declared order.
    #[serde(default)]
    pub constraint_columns: Vec<ConstraintColumn>,
}

impl ConstraintTarget {
    /// Creates a target over the given columns.
    #[must_use]
    pub const fn new(table_id: i64, constraint_columns: Vec<ConstraintColumn>) -> Self {
        Self {
            table_id,
            constraint_columns,
        }
    }
}

/// A primary or foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    /// Constraint id.
    #[serde(deserialize_with = "loose::number")]
    pub id: i64,
    /// Constraint name.
    pub name: String,
    /// Key kind.
    #[serde(rename = "type")]
    pub constraint_type: ConstraintType,
    /// The owning table and its key columns.
    pub source_target: ConstraintTarget,
    /// The referenced table and columns (foreign keys only).
    #[serde(default)]
    pub destination_target: Option<ConstraintTarget>,
}

impl Constraint {
    /// Creates a primary key constraint.
    #[must_use]
    pub fn primary_key(
        id: i64,
        name: impl Into<String>,
        table_id: i64,
        columns: Vec<ConstraintColumn>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            constraint_type: ConstraintType::PrimaryKey,
            source_target: ConstraintTarget::new(table_id, columns),
            destination_target: None,
        }
    }

    /// Creates a foreign key constraint from `source` referencing `destination`.
    #[must_use]
    pub fn foreign_key(
        id: i64,
        name: impl Into<String>,
        source: ConstraintTarget,
        destination: ConstraintTarget,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            constraint_type: ConstraintType::ForeignKey,
            source_target: source,
            destination_target: Some(destination),
        }
    }

    /// Returns whether this is a primary key.
    #[must_use]
    pub fn is_primary_key(&self) -> bool {
        self.constraint_type == ConstraintType::PrimaryKey
    }

    /// Returns whether this is a foreign key.
    #[must_use]
    pub fn is_foreign_key(&self) -> bool {
        self.constraint_type == ConstraintType::ForeignKey
    }
}

/// Lenient deserializers for values that may arrive as numbers or strings.
mod loose {
    use std::fmt::Display;
    use std::str::FromStr;

    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText<T> {
        Number(T),
        Text(String),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Number(i64),
        Text(String),
    }

    pub fn number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + FromStr,
        T::Err: Display,
    {
        match NumberOrText::<T>::deserialize(deserializer)? {
            NumberOrText::Number(n) => Ok(n),
            NumberOrText::Text(s) => s.trim().parse().map_err(D::Error::custom),
        }
    }

    pub fn optional_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + FromStr,
        T::Err: Display,
    {
        match Option::<NumberOrText<T>>::deserialize(deserializer)? {
            None => Ok(None),
            Some(NumberOrText::Number(n)) => Ok(Some(n)),
            Some(NumberOrText::Text(s)) if s.trim().is_empty() => Ok(None),
            Some(NumberOrText::Text(s)) => s.trim().parse().map(Some).map_err(D::Error::custom),
        }
    }

    pub fn boolean<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Flag::deserialize(deserializer)? {
            Flag::Bool(b) => Ok(b),
            Flag::Number(n) => Ok(n != 0),
            Flag::Text(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" | "" => Ok(false),
                other => Err(D::Error::custom(format!("invalid boolean: {other}"))),
            },
        }
    }
}
