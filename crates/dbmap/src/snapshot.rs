//! Database snapshots and their resolved object graph.
//!
//! A [`Snapshot`] keeps the flat rows returned by introspection. Relationships
//! between them live in a separate [`References`] table of indices that the
//! [`ReferenceResolver`] fills in; the borrowed views ([`SchemaRef`],
//! [`TableRef`], [`ColumnRef`], [`ConstraintRef`]) walk that table.

use std::fmt;
use std::ops::Deref;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DbMapError, Result};
use crate::model::{Column, Constraint, DatabaseType, Schema, Table};
use crate::resolver::ReferenceResolver;

/// Resolved relationships between the rows of a snapshot, stored as indices
/// into the snapshot's vectors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct References {
    pub(crate) schema_tables: Vec<Vec<usize>>,
    pub(crate) table_schema: Vec<Option<usize>>,
    pub(crate) table_columns: Vec<Vec<usize>>,
    pub(crate) column_table: Vec<Option<usize>>,
    pub(crate) table_constraints: Vec<Vec<usize>>,
    pub(crate) constraint_source: Vec<Option<usize>>,
    pub(crate) constraint_destination: Vec<Option<usize>>,
}

impl References {
    /// Creates an empty reference table sized for `snapshot`.
    ///
    /// The resolver steps only record links whose indices fit the table, so
    /// callers driving them directly should start from this.
    #[must_use]
    pub fn sized_for(snapshot: &Snapshot) -> Self {
        Self {
            schema_tables: vec![Vec::new(); snapshot.schemas.len()],
            table_schema: vec![None; snapshot.tables.len()],
            table_columns: vec![Vec::new(); snapshot.tables.len()],
            column_table: vec![None; snapshot.columns.len()],
            table_constraints: vec![Vec::new(); snapshot.tables.len()],
            constraint_source: vec![None; snapshot.constraints.len()],
            constraint_destination: vec![None; snapshot.constraints.len()],
        }
    }

    fn children(list: &[Vec<usize>], index: usize) -> &[usize] {
        list.get(index).map_or(&[][..], Vec::as_slice)
    }

    fn parent(list: &[Option<usize>], index: usize) -> Option<usize> {
        list.get(index).copied().flatten()
    }
}

/// A point-in-time capture of a database's structure (a "database map").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Name of the captured database.
    #[serde(default)]
    pub database_name: Option<String>,
    /// Engine the snapshot was captured from.
    #[serde(default)]
    pub database_type: Option<DatabaseType>,
    /// Schemas, in discovery order.
    #[serde(default)]
    pub schemas: Vec<Schema>,
    /// Tables, in discovery order.
    #[serde(default)]
    pub tables: Vec<Table>,
    /// Columns, in discovery order.
    #[serde(default)]
    pub columns: Vec<Column>,
    /// Primary and foreign keys.
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(skip)]
    pub(crate) references: References,
}

impl Snapshot {
    /// Creates an empty snapshot of the named database.
    #[must_use]
    pub fn new(database_name: impl Into<String>, database_type: DatabaseType) -> Self {
        Self {
            database_name: Some(database_name.into()),
            database_type: Some(database_type),
            ..Self::default()
        }
    }

    /// Adds a schema row.
    #[must_use]
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schemas.push(schema);
        self
    }

    /// Adds a table row.
    #[must_use]
    pub fn table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    /// Adds a column row.
    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds a constraint.
    #[must_use]
    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Resolves references with the default resolver and returns the snapshot.
    #[must_use]
    pub fn resolved(mut self) -> Self {
        ReferenceResolver::new().resolve(&mut self);
        self
    }

    /// Returns the resolved reference table.
    #[must_use]
    pub const fn references(&self) -> &References {
        &self.references
    }

    /// Returns the database name if it is set and not empty.
    #[must_use]
    pub fn database_name(&self) -> Option<&str> {
        self.database_name.as_deref().filter(|name| !name.is_empty())
    }

    /// Iterates over the schemas.
    pub fn schema_refs(&self) -> impl Iterator<Item = SchemaRef<'_>> {
        (0..self.schemas.len()).map(move |index| SchemaRef {
            snapshot: self,
            index,
        })
    }

    /// Iterates over the tables.
    pub fn table_refs(&self) -> impl Iterator<Item = TableRef<'_>> {
        (0..self.tables.len()).map(move |index| TableRef {
            snapshot: self,
            index,
        })
    }

    /// Iterates over the columns.
    pub fn column_refs(&self) -> impl Iterator<Item = ColumnRef<'_>> {
        (0..self.columns.len()).map(move |index| ColumnRef {
            snapshot: self,
            index,
        })
    }

    /// Iterates over the constraints.
    pub fn constraint_refs(&self) -> impl Iterator<Item = ConstraintRef<'_>> {
        (0..self.constraints.len()).map(move |index| ConstraintRef {
            snapshot: self,
            index,
        })
    }

    /// Finds a schema by name.
    #[must_use]
    pub fn find_schema(&self, name: &str) -> Option<SchemaRef<'_>> {
        self.schema_refs().find(|s| s.name == name)
    }

    /// Finds a table by its schema-qualified name. Unresolved tables never match.
    #[must_use]
    pub fn find_table(&self, full_name: &str) -> Option<TableRef<'_>> {
        self.table_refs()
            .find(|t| t.full_name().is_ok_and(|n| n == full_name))
    }

    /// Serializes the snapshot to JSON. Resolved references are not written.
    ///
    /// # Errors
    ///
    /// Returns [`DbMapError::Serialization`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserializes a snapshot from JSON and resolves its references.
    ///
    /// # Errors
    ///
    /// Returns [`DbMapError::Serialization`] if the JSON does not describe a
    /// snapshot.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut snapshot: Self = serde_json::from_str(json)?;
        ReferenceResolver::new().resolve(&mut snapshot);
        Ok(snapshot)
    }

    /// Reads and resolves a snapshot file.
    ///
    /// # Errors
    ///
    /// Returns [`DbMapError::ReadFile`] if the file cannot be read and
    /// [`DbMapError::Serialization`] if it cannot be parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| DbMapError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Writes the snapshot to a file as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

macro_rules! entity_ref {
    ($(#[$doc:meta])* $name:ident, $entity:ty, $field:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy)]
        pub struct $name<'a> {
            snapshot: &'a Snapshot,
            index: usize,
        }

        impl<'a> $name<'a> {
            /// Returns the snapshot this entity belongs to.
            #[must_use]
            pub const fn snapshot(&self) -> &'a Snapshot {
                self.snapshot
            }

            /// Returns the position of the entity in its snapshot.
            #[must_use]
            pub const fn index(&self) -> usize {
                self.index
            }

            /// Returns the underlying row.
            #[must_use]
            pub fn get(&self) -> &'a $entity {
                &self.snapshot.$field[self.index]
            }
        }

        impl Deref for $name<'_> {
            type Target = $entity;

            fn deref(&self) -> &Self::Target {
                self.get()
            }
        }

        impl PartialEq for $name<'_> {
            fn eq(&self, other: &Self) -> bool {
                std::ptr::eq(self.snapshot, other.snapshot) && self.index == other.index
            }
        }

        impl fmt::Debug for $name<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(self.get(), f)
            }
        }
    };
}

entity_ref!(
    /// A schema together with the snapshot it belongs to.
    SchemaRef,
    Schema,
    schemas
);
entity_ref!(
    /// A table together with the snapshot it belongs to.
    TableRef,
    Table,
    tables
);
entity_ref!(
    /// A column together with the snapshot it belongs to.
    ColumnRef,
    Column,
    columns
);
entity_ref!(
    /// A constraint together with the snapshot it belongs to.
    ConstraintRef,
    Constraint,
    constraints
);

impl<'a> SchemaRef<'a> {
    /// Tables resolved into this schema, in discovery order.
    pub fn tables(&self) -> impl Iterator<Item = TableRef<'a>> + 'a {
        let snapshot = self.snapshot;
        References::children(&snapshot.references.schema_tables, self.index)
            .iter()
            .map(move |&index| TableRef { snapshot, index })
    }
}

impl<'a> TableRef<'a> {
    /// The owning schema, if resolved.
    #[must_use]
    pub fn schema(&self) -> Option<SchemaRef<'a>> {
        References::parent(&self.snapshot.references.table_schema, self.index).map(|index| {
            SchemaRef {
                snapshot: self.snapshot,
                index,
            }
        })
    }

    /// Returns `schema.table`.
    ///
    /// # Errors
    ///
    /// Returns [`DbMapError::UnresolvedSchema`] when the schema has not been
    /// resolved.
    pub fn full_name(&self) -> Result<String> {
        let schema = self.schema().ok_or_else(|| DbMapError::UnresolvedSchema {
            table: self.name.clone(),
            schema_id: self.schema_id,
        })?;
        Ok(format!("{}.{}", schema.name, self.name))
    }

    /// Columns resolved into this table, in discovery order.
    pub fn columns(&self) -> impl Iterator<Item = ColumnRef<'a>> + 'a {
        let snapshot = self.snapshot;
        References::children(&snapshot.references.table_columns, self.index)
            .iter()
            .map(move |&index| ColumnRef { snapshot, index })
    }

    /// Finds one of this table's columns by id.
    #[must_use]
    pub fn column_by_id(&self, column_id: i64) -> Option<ColumnRef<'a>> {
        self.columns().find(|c| c.id == column_id)
    }

    /// Constraints owned by this table, in resolution order.
    pub fn constraints(&self) -> impl Iterator<Item = ConstraintRef<'a>> + 'a {
        let snapshot = self.snapshot;
        References::children(&snapshot.references.table_constraints, self.index)
            .iter()
            .map(move |&index| ConstraintRef { snapshot, index })
    }

    /// The first primary key owned by this table.
    #[must_use]
    pub fn primary_key(&self) -> Option<ConstraintRef<'a>> {
        self.constraints().find(|c| c.is_primary_key())
    }

    /// Foreign keys owned by this table.
    pub fn foreign_keys(&self) -> impl Iterator<Item = ConstraintRef<'a>> + 'a {
        self.constraints().filter(|c| c.is_foreign_key())
    }
}

impl<'a> ColumnRef<'a> {
    /// The owning table, if resolved.
    #[must_use]
    pub fn table(&self) -> Option<TableRef<'a>> {
        References::parent(&self.snapshot.references.column_table, self.index).map(|index| {
            TableRef {
                snapshot: self.snapshot,
                index,
            }
        })
    }
}

impl<'a> ConstraintRef<'a> {
    /// The owning table, if resolved.
    #[must_use]
    pub fn source_table(&self) -> Option<TableRef<'a>> {
        References::parent(&self.snapshot.references.constraint_source, self.index).map(
            |index| TableRef {
                snapshot: self.snapshot,
                index,
            },
        )
    }

    /// The referenced table of a foreign key, if resolved.
    #[must_use]
    pub fn destination_table(&self) -> Option<TableRef<'a>> {
        References::parent(&self.snapshot.references.constraint_destination, self.index).map(
            |index| TableRef {
                snapshot: self.snapshot,
                index,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::model::{ConstraintColumn, ConstraintTarget};

    fn sample() -> Snapshot {
        let modified = Utc.with_ymd_and_hms(2018, 3, 1, 12, 0, 0).unwrap();
        Snapshot::new("Shop", DatabaseType::Mssql2016)
            .schema(Schema::new(1, "dbo"))
            .table(Table::new(10, "Orders", 1, modified).with_data())
            .table(Table::new(11, "Customers", 1, modified))
            .column(Column::new(1, "Id", "int", 10).not_null().identity(1, 1))
            .column(Column::new(2, "CustomerId", "int", 10).not_null())
            .column(Column::new(1, "Id", "int", 11).not_null())
            .constraint(Constraint::primary_key(
                100,
                "PK_Orders",
                10,
                vec![ConstraintColumn::asc(1)],
            ))
            .constraint(Constraint::foreign_key(
                101,
                "FK_Orders_Customers",
                ConstraintTarget::new(10, vec![ConstraintColumn::asc(2)]),
                ConstraintTarget::new(11, vec![ConstraintColumn::asc(1)]),
            ))
    }

    #[test]
    fn test_full_name_requires_resolution() {
        let snapshot = sample();
        let table = snapshot.table_refs().next().unwrap();

        assert!(matches!(
            table.full_name(),
            Err(DbMapError::UnresolvedSchema { .. })
        ));
    }

    #[test]
    fn test_navigation_after_resolution() {
        let snapshot = sample().resolved();

        let orders = snapshot.find_table("dbo.Orders").unwrap();
        assert_eq!(orders.full_name().unwrap(), "dbo.Orders");
        assert_eq!(orders.columns().count(), 2);
        assert_eq!(orders.primary_key().unwrap().name, "PK_Orders");

        let fk = orders.foreign_keys().next().unwrap();
        assert_eq!(fk.source_table().unwrap(), orders);
        assert_eq!(fk.destination_table().unwrap().name, "Customers");

        let dbo = snapshot.find_schema("dbo").unwrap();
        let names: Vec<_> = dbo.tables().map(|t| t.name.clone()).collect();
        assert_eq!(names, vec!["Orders", "Customers"]);

        let column = orders.column_by_id(2).unwrap();
        assert_eq!(column.table().unwrap(), orders);
    }

    #[test]
    fn test_json_round_trip_resolves_references() {
        let snapshot = sample().resolved();
        let json = snapshot.to_json().unwrap();

        assert!(!json.contains("references"));

        let restored = Snapshot::from_json(&json).unwrap();
        assert_eq!(restored, snapshot);
        assert!(restored.find_table("dbo.Customers").is_some());
    }

    #[test]
    fn test_foreign_key_destination_keeps_its_table() {
        let json = sample().to_json().unwrap();
        let restored = Snapshot::from_json(&json).unwrap();

        let fk = &restored.constraints[1];
        assert_eq!(fk.destination_target.as_ref().unwrap().table_id, 11);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.json");

        let snapshot = sample().resolved();
        snapshot.save(&path).unwrap();

        let loaded = Snapshot::load(&path).unwrap();
        assert_eq!(loaded.database_name(), Some("Shop"));
        assert_eq!(loaded.tables.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Snapshot::load("/nonexistent/snapshot.json");
        assert!(matches!(result, Err(DbMapError::ReadFile { .. })));
    }
}
