//! Snapshot comparison.
//!
//! This module compares two resolved snapshots and reports which schemas,
//! tables and columns were created, deleted or altered between them.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::{debug, info};

use crate::error::Result;
use crate::model::Column;
use crate::snapshot::{ColumnRef, SchemaRef, Snapshot, TableRef};

/// What happened to an object between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiffState {
    /// The object only exists in the current snapshot.
    Created,
    /// The object only exists in the previous snapshot.
    Deleted,
    /// The object exists in both snapshots but changed.
    Altered,
}

impl fmt::Display for DiffState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Created => "CREATED",
            Self::Deleted => "DELETED",
            Self::Altered => "ALTERED",
        })
    }
}

/// Column properties checked for changes, in check order.
///
/// The identity seed is not compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnProperty {
    /// Type name.
    Type,
    /// Maximum length in bytes.
    TypeMaxLength,
    /// Numeric precision.
    TypePrecision,
    /// Numeric scale.
    TypeScale,
    /// Collation.
    CollationName,
    /// Nullability.
    IsNullable,
    /// Identity flag.
    IsIdentity,
    /// Identity increment.
    IdentityIncrementValue,
}

impl ColumnProperty {
    /// Every compared property, in check order.
    pub const ALL: [Self; 8] = [
        Self::Type,
        Self::TypeMaxLength,
        Self::TypePrecision,
        Self::TypeScale,
        Self::CollationName,
        Self::IsNullable,
        Self::IsIdentity,
        Self::IdentityIncrementValue,
    ];

    /// Returns the property name as used in snapshot files.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::TypeMaxLength => "typeMaxLength",
            Self::TypePrecision => "typePrecision",
            Self::TypeScale => "typeScale",
            Self::CollationName => "collationName",
            Self::IsNullable => "isNullable",
            Self::IsIdentity => "isIdentity",
            Self::IdentityIncrementValue => "identityIncrementValue",
        }
    }

    /// Reads this property from a column.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn value(self, column: &Column) -> LooseValue<'_> {
        match self {
            Self::Type => LooseValue::Text(&column.type_name),
            Self::TypeMaxLength => LooseValue::Number(f64::from(column.type_max_length)),
            Self::TypePrecision => LooseValue::Number(f64::from(column.type_precision)),
            Self::TypeScale => LooseValue::Number(f64::from(column.type_scale)),
            Self::CollationName => column
                .collation_name
                .as_deref()
                .map_or(LooseValue::Null, LooseValue::Text),
            Self::IsNullable => LooseValue::Bool(column.is_nullable),
            Self::IsIdentity => LooseValue::Bool(column.is_identity),
            Self::IdentityIncrementValue => column
                .identity_increment_value
                .map_or(LooseValue::Null, |v| LooseValue::Number(v as f64)),
        }
    }
}

impl fmt::Display for ColumnProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// A property value normalized for loose comparison.
///
/// Numbers, numeric text and booleans are compared by numeric value, so
/// `20` equals `"20"` and `true` equals `1`. Null only equals null.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LooseValue<'a> {
    /// Absent value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Numeric value.
    Number(f64),
    /// Text value.
    Text(&'a str),
}

impl LooseValue<'_> {
    /// Compares two values after normalizing them to a common representation.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn loose_eq(&self, other: &LooseValue<'_>) -> bool {
        match (self, other) {
            (Self::Null, LooseValue::Null) => true,
            (Self::Null, _) | (_, LooseValue::Null) => false,
            (Self::Text(a), LooseValue::Text(b)) => a == b,
            (Self::Bool(a), LooseValue::Bool(b)) => a == b,
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Number(n) => Some(*n),
            Self::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    Some(0.0)
                } else {
                    s.parse().ok()
                }
            }
        }
    }
}

/// One entry of a diff: the two versions of an object and what changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDiff<T> {
    /// The object in the previous snapshot.
    pub previous: Option<T>,
    /// The object in the current snapshot.
    pub current: Option<T>,
    /// What happened to the object.
    pub state: DiffState,
    /// Changed properties (altered columns only), in check order.
    pub changed_properties: Vec<ColumnProperty>,
}

impl<T> ObjectDiff<T> {
    /// An object that only exists in the current snapshot.
    #[must_use]
    pub const fn created(current: T) -> Self {
        Self {
            previous: None,
            current: Some(current),
            state: DiffState::Created,
            changed_properties: Vec::new(),
        }
    }

    /// An object that only exists in the previous snapshot.
    #[must_use]
    pub const fn deleted(previous: T) -> Self {
        Self {
            previous: Some(previous),
            current: None,
            state: DiffState::Deleted,
            changed_properties: Vec::new(),
        }
    }

    /// An object present in both snapshots that changed.
    #[must_use]
    pub const fn altered(previous: T, current: T, changed_properties: Vec<ColumnProperty>) -> Self {
        Self {
            previous: Some(previous),
            current: Some(current),
            state: DiffState::Altered,
            changed_properties,
        }
    }

    /// Returns the most recent version of the object.
    #[must_use]
    pub fn latest(&self) -> Option<&T> {
        self.current.as_ref().or(self.previous.as_ref())
    }
}

/// The differences between two snapshots.
#[derive(Debug, Clone)]
pub struct Diff<'a> {
    previous: &'a Snapshot,
    current: &'a Snapshot,
    /// Schema entries: deleted, then created.
    pub schemas: Vec<ObjectDiff<SchemaRef<'a>>>,
    /// Table entries: deleted, then created, then altered.
    pub tables: Vec<ObjectDiff<TableRef<'a>>>,
    /// Column entries of altered tables: deleted, then created, then altered.
    pub columns: Vec<ObjectDiff<ColumnRef<'a>>>,
}

impl<'a> Diff<'a> {
    /// Creates an empty diff between two snapshots.
    #[must_use]
    pub const fn new(previous: &'a Snapshot, current: &'a Snapshot) -> Self {
        Self {
            previous,
            current,
            schemas: Vec::new(),
            tables: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// The earlier snapshot.
    #[must_use]
    pub const fn previous(&self) -> &'a Snapshot {
        self.previous
    }

    /// The later snapshot.
    #[must_use]
    pub const fn current(&self) -> &'a Snapshot {
        self.current
    }

    /// Returns true if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty() && self.tables.is_empty() && self.columns.is_empty()
    }

    /// Schema entries in the given state.
    pub fn schemas_in(
        &self,
        state: DiffState,
    ) -> impl Iterator<Item = &ObjectDiff<SchemaRef<'a>>> {
        self.schemas.iter().filter(move |d| d.state == state)
    }

    /// Table entries in the given state.
    pub fn tables_in(&self, state: DiffState) -> impl Iterator<Item = &ObjectDiff<TableRef<'a>>> {
        self.tables.iter().filter(move |d| d.state == state)
    }

    /// Column entries in the given state.
    pub fn columns_in(
        &self,
        state: DiffState,
    ) -> impl Iterator<Item = &ObjectDiff<ColumnRef<'a>>> {
        self.columns.iter().filter(move |d| d.state == state)
    }
}

/// Compares snapshots.
#[derive(Debug, Default)]
pub struct MapComparer;

impl MapComparer {
    /// Creates a new comparer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Compares `previous` with `current`.
    ///
    /// Both snapshots must be resolved.
    ///
    /// # Errors
    ///
    /// Returns [`DbMapError::UnresolvedSchema`](crate::error::DbMapError::UnresolvedSchema)
    /// if a table of either snapshot has no resolved schema.
    pub fn compare<'a>(&self, previous: &'a Snapshot, current: &'a Snapshot) -> Result<Diff<'a>> {
        let mut diff = Diff::new(previous, current);

        Self::compare_schemas(&mut diff);
        Self::compare_tables(&mut diff)?;

        info!(
            schemas = diff.schemas.len(),
            tables = diff.tables.len(),
            columns = diff.columns.len(),
            "Compared database maps"
        );

        Ok(diff)
    }

    fn compare_schemas(diff: &mut Diff<'_>) {
        let (previous, current) = (diff.previous, diff.current);
        if previous.schemas.is_empty() && current.schemas.is_empty() {
            return;
        }

        let previous_names: HashSet<&str> =
            previous.schemas.iter().map(|s| s.name.as_str()).collect();
        let current_names: HashSet<&str> =
            current.schemas.iter().map(|s| s.name.as_str()).collect();

        // Deleted schemas (in previous but not in current)
        for schema in previous.schema_refs() {
            if !current_names.contains(schema.get().name.as_str()) {
                debug!(schema = %schema.name, "Schema deleted");
                diff.schemas.push(ObjectDiff::deleted(schema));
            }
        }

        // Created schemas (in current but not in previous)
        for schema in current.schema_refs() {
            if !previous_names.contains(schema.get().name.as_str()) {
                debug!(schema = %schema.name, "Schema created");
                diff.schemas.push(ObjectDiff::created(schema));
            }
        }
    }

    fn compare_tables(diff: &mut Diff<'_>) -> Result<()> {
        let (previous, current) = (diff.previous, diff.current);
        if previous.tables.is_empty() && current.tables.is_empty() {
            return Ok(());
        }

        let previous_tables = tables_by_full_name(previous)?;
        let current_tables = tables_by_full_name(current)?;

        let previous_lookup: HashMap<&str, TableRef<'_>> = first_by_name(&previous_tables);
        let current_lookup: HashMap<&str, TableRef<'_>> = first_by_name(&current_tables);

        // Deleted tables
        for (full_name, table) in &previous_tables {
            if !current_lookup.contains_key(full_name.as_str()) {
                debug!(table = %full_name, "Table deleted");
                diff.tables.push(ObjectDiff::deleted(*table));
            }
        }

        // Created tables
        for (full_name, table) in &current_tables {
            if !previous_lookup.contains_key(full_name.as_str()) {
                debug!(table = %full_name, "Table created");
                diff.tables.push(ObjectDiff::created(*table));
            }
        }

        // Altered tables: present in both, modification date moved
        let mut altered = Vec::new();
        for (full_name, _) in &previous_tables {
            let (Some(&before), Some(&after)) = (
                previous_lookup.get(full_name.as_str()),
                current_lookup.get(full_name.as_str()),
            ) else {
                continue;
            };
            if altered.iter().any(|(b, _): &(TableRef<'_>, TableRef<'_>)| *b == before) {
                continue;
            }
            if before.modify_date != after.modify_date {
                debug!(table = %full_name, "Table altered");
                altered.push((before, after));
            }
        }
        diff.tables.extend(
            altered
                .iter()
                .map(|&(before, after)| ObjectDiff::altered(before, after, Vec::new())),
        );

        Self::compare_columns(diff, &altered);
        Ok(())
    }

    fn compare_columns<'a>(diff: &mut Diff<'a>, altered: &[(TableRef<'a>, TableRef<'a>)]) {
        if altered.is_empty() {
            return;
        }

        let mut deleted = Vec::new();
        let mut created = Vec::new();
        let mut changed = Vec::new();

        for (before, after) in altered {
            let before_columns = columns_by_name(before);
            let after_columns = columns_by_name(after);

            for column in before.columns() {
                if !after_columns.contains_key(column.get().name.as_str()) {
                    deleted.push(ObjectDiff::deleted(column));
                }
            }

            for column in after.columns() {
                if !before_columns.contains_key(column.get().name.as_str()) {
                    created.push(ObjectDiff::created(column));
                }
            }

            let mut seen = HashSet::new();
            for column in before.columns() {
                let name = column.get().name.as_str();
                if !seen.insert(name) {
                    continue;
                }
                let (Some(&old), Some(&new)) = (before_columns.get(name), after_columns.get(name))
                else {
                    continue;
                };
                let properties = changed_properties(&old, &new);
                if !properties.is_empty() {
                    debug!(
                        table = %after.name,
                        column = name,
                        changes = ?properties,
                        "Column altered"
                    );
                    changed.push(ObjectDiff::altered(old, new, properties));
                }
            }
        }

        diff.columns.extend(deleted);
        diff.columns.extend(created);
        diff.columns.extend(changed);
    }
}

/// Returns the properties that differ between two versions of a column.
#[must_use]
pub fn changed_properties(previous: &Column, current: &Column) -> Vec<ColumnProperty> {
    ColumnProperty::ALL
        .into_iter()
        .filter(|property| !property.value(previous).loose_eq(&property.value(current)))
        .collect()
}

fn tables_by_full_name(snapshot: &Snapshot) -> Result<Vec<(String, TableRef<'_>)>> {
    snapshot
        .table_refs()
        .map(|table| Ok((table.full_name()?, table)))
        .collect()
}

fn first_by_name<'s, 'a>(tables: &'s [(String, TableRef<'a>)]) -> HashMap<&'s str, TableRef<'a>> {
    let mut map = HashMap::new();
    for (name, table) in tables {
        map.entry(name.as_str()).or_insert(*table);
    }
    map
}

fn columns_by_name<'a>(table: &TableRef<'a>) -> HashMap<&'a str, ColumnRef<'a>> {
    let mut map = HashMap::new();
    for column in table.columns() {
        map.entry(column.get().name.as_str()).or_insert(column);
    }
    map
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::model::{DatabaseType, Schema, Table};

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 5, 1, 10, minute, 0).unwrap()
    }

    fn base() -> Snapshot {
        Snapshot::new("TestDB", DatabaseType::Mssql2016).schema(Schema::new(1, "dbo"))
    }

    #[test]
    fn test_empty_snapshots() {
        let previous = Snapshot::default().resolved();
        let current = Snapshot::default().resolved();

        let diff = MapComparer::new().compare(&previous, &current).unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn test_detect_deleted_and_created_schemas() {
        let previous = base().schema(Schema::new(2, "old")).resolved();
        let current = base().schema(Schema::new(3, "new")).resolved();

        let diff = MapComparer::new().compare(&previous, &current).unwrap();
        assert_eq!(diff.schemas.len(), 2);

        assert_eq!(diff.schemas[0].state, DiffState::Deleted);
        assert_eq!(diff.schemas[0].previous.unwrap().name, "old");
        assert!(diff.schemas[0].current.is_none());

        assert_eq!(diff.schemas[1].state, DiffState::Created);
        assert_eq!(diff.schemas[1].current.unwrap().name, "new");
        assert!(diff.schemas[1].previous.is_none());
    }

    #[test]
    fn test_schema_identity_is_name() {
        let previous = base().resolved();
        let current = Snapshot::new("TestDB", DatabaseType::Mssql2016)
            .schema(Schema::new(42, "dbo"))
            .resolved();

        let diff = MapComparer::new().compare(&previous, &current).unwrap();
        assert!(diff.schemas.is_empty());
    }

    #[test]
    fn test_detect_created_and_deleted_tables() {
        let previous = base().table(Table::new(1, "Gone", 1, at(0))).resolved();
        let current = base().table(Table::new(2, "Fresh", 1, at(0))).resolved();

        let diff = MapComparer::new().compare(&previous, &current).unwrap();
        assert_eq!(diff.tables.len(), 2);
        assert_eq!(diff.tables[0].state, DiffState::Deleted);
        assert_eq!(diff.tables[0].previous.unwrap().name, "Gone");
        assert_eq!(diff.tables[1].state, DiffState::Created);
        assert_eq!(diff.tables[1].current.unwrap().name, "Fresh");
        assert!(diff.columns.is_empty());
    }

    #[test]
    fn test_unchanged_modify_date_is_not_altered() {
        let previous = base()
            .table(Table::new(1, "Table1", 1, at(0)))
            .column(Column::new(1, "Id", "int", 1))
            .resolved();
        let current = base()
            .table(Table::new(1, "Table1", 1, at(0)))
            .column(Column::new(1, "Id", "bigint", 1))
            .resolved();

        let diff = MapComparer::new().compare(&previous, &current).unwrap();
        assert!(diff.tables.is_empty());
        assert!(diff.columns.is_empty());
    }

    #[test]
    fn test_detect_altered_table() {
        let previous = base().table(Table::new(1, "Table1", 1, at(0))).resolved();
        let current = base().table(Table::new(1, "Table1", 1, at(5))).resolved();

        let diff = MapComparer::new().compare(&previous, &current).unwrap();
        assert_eq!(diff.tables.len(), 1);

        let entry = &diff.tables[0];
        assert_eq!(entry.state, DiffState::Altered);
        assert_eq!(entry.previous.unwrap().modify_date, at(0));
        assert_eq!(entry.current.unwrap().modify_date, at(5));
        assert!(entry.changed_properties.is_empty());
    }

    #[test]
    fn test_detect_column_changes_in_altered_table() {
        let previous = base()
            .table(Table::new(1, "Table1", 1, at(0)))
            .column(Column::new(1, "Id", "int", 1).not_null())
            .column(Column::new(2, "Name", "varchar", 1).max_length(20))
            .column(Column::new(3, "Code", "char", 1).max_length(4))
            .resolved();
        let current = base()
            .table(Table::new(1, "Table1", 1, at(1)))
            .column(Column::new(1, "Id", "int", 1).not_null())
            .column(Column::new(3, "Code", "nchar", 1).max_length(8).not_null())
            .column(Column::new(4, "Email", "nvarchar", 1).max_length(200))
            .resolved();

        let diff = MapComparer::new().compare(&previous, &current).unwrap();
        assert_eq!(diff.columns.len(), 3);

        assert_eq!(diff.columns[0].state, DiffState::Deleted);
        assert_eq!(diff.columns[0].previous.unwrap().name, "Name");

        assert_eq!(diff.columns[1].state, DiffState::Created);
        assert_eq!(diff.columns[1].current.unwrap().name, "Email");

        let code = &diff.columns[2];
        assert_eq!(code.state, DiffState::Altered);
        assert_eq!(
            code.changed_properties,
            vec![
                ColumnProperty::Type,
                ColumnProperty::TypeMaxLength,
                ColumnProperty::IsNullable
            ]
        );
    }

    #[test]
    fn test_identity_seed_is_ignored() {
        let before = Column::new(1, "Id", "int", 1).identity(1, 1);
        let after = Column::new(1, "Id", "int", 1).identity(1000, 1);
        assert!(changed_properties(&before, &after).is_empty());

        let after = Column::new(1, "Id", "int", 1).identity(1, 5);
        assert_eq!(
            changed_properties(&before, &after),
            vec![ColumnProperty::IdentityIncrementValue]
        );
    }

    #[test]
    fn test_every_property_in_check_order() {
        let before = Column::new(1, "Amount", "decimal", 1).precision(10, 2);
        let after = Column::new(1, "Amount", "varchar", 1)
            .max_length(30)
            .precision(0, 0)
            .collation("Latin1_General_CI_AS")
            .not_null()
            .identity(1, 1);

        assert_eq!(changed_properties(&before, &after), ColumnProperty::ALL.to_vec());
    }

    #[test]
    fn test_loose_equality() {
        assert!(LooseValue::Number(20.0).loose_eq(&LooseValue::Text("20")));
        assert!(LooseValue::Text("20").loose_eq(&LooseValue::Number(20.0)));
        assert!(LooseValue::Bool(true).loose_eq(&LooseValue::Number(1.0)));
        assert!(LooseValue::Bool(false).loose_eq(&LooseValue::Text("0")));
        assert!(LooseValue::Null.loose_eq(&LooseValue::Null));
        assert!(!LooseValue::Null.loose_eq(&LooseValue::Number(0.0)));
        assert!(!LooseValue::Text("abc").loose_eq(&LooseValue::Number(0.0)));
        assert!(!LooseValue::Text("20").loose_eq(&LooseValue::Text("20.0")));
    }

    #[test]
    fn test_self_comparison_is_empty() {
        let snapshot = base()
            .table(Table::new(1, "Table1", 1, at(0)))
            .column(Column::new(1, "Id", "int", 1))
            .resolved();

        let diff = MapComparer::new().compare(&snapshot, &snapshot).unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn test_unresolved_table_fails() {
        let previous = base().table(Table::new(1, "Table1", 1, at(0)));
        let current = base().resolved();

        let result = MapComparer::new().compare(&previous, &current);
        assert!(result.is_err());
    }
}
