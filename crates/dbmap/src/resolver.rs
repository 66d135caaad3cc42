//! Reference resolution.
//!
//! Introspection returns flat rows that point at their parents through raw
//! ids. The resolver turns those ids into the index table held by
//! [`References`], which is what makes a [`Snapshot`] navigable.
//!
//! Rows pointing at parents that do not exist (stale metadata, rows captured
//! from another snapshot) are skipped, never reported as errors.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::model::{Column, Constraint, ConstraintType, Schema, Table};
use crate::snapshot::{References, Snapshot};

/// How the referenced table of a foreign key is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForeignKeyResolution {
    /// The referenced table is only resolved when the owning table is.
    #[default]
    RequireSource,
    /// Both sides are resolved independently.
    Independent,
}

/// Options for the reference resolver.
#[derive(Debug, Clone, Default)]
pub struct ResolverOptions {
    /// Foreign key resolution policy.
    pub foreign_keys: ForeignKeyResolution,
}

impl ResolverOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves foreign key destinations even when the owning table is missing.
    #[must_use]
    pub const fn with_independent_foreign_keys(mut self) -> Self {
        self.foreign_keys = ForeignKeyResolution::Independent;
        self
    }
}

/// Wires the rows of a snapshot into a navigable graph.
#[derive(Debug, Default)]
pub struct ReferenceResolver {
    options: ResolverOptions,
}

impl ReferenceResolver {
    /// Creates a resolver with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver with custom options.
    #[must_use]
    pub const fn with_options(options: ResolverOptions) -> Self {
        Self { options }
    }

    /// Resolves every reference in `snapshot`, replacing any earlier resolution.
    pub fn resolve(&self, snapshot: &mut Snapshot) {
        let mut references = References::sized_for(snapshot);

        Self::resolve_schema_tables(&snapshot.schemas, &snapshot.tables, &mut references);
        Self::resolve_table_columns(&snapshot.tables, &snapshot.columns, &mut references);
        Self::resolve_primary_keys(&snapshot.tables, &snapshot.constraints, &mut references);
        self.resolve_foreign_keys(&snapshot.tables, &snapshot.constraints, &mut references);

        debug!(
            database = snapshot.database_name.as_deref().unwrap_or_default(),
            schemas = snapshot.schemas.len(),
            tables = snapshot.tables.len(),
            columns = snapshot.columns.len(),
            constraints = snapshot.constraints.len(),
            "Resolved snapshot references"
        );

        snapshot.references = references;
    }

    /// Links every table to the schema whose id matches its `schema_id`.
    ///
    /// Like the other steps, it only writes links that fit `references`, which
    /// should come from [`References::sized_for`].
    pub fn resolve_schema_tables(
        schemas: &[Schema],
        tables: &[Table],
        references: &mut References,
    ) {
        if schemas.is_empty() || tables.is_empty() {
            return;
        }

        let schema_index = index_by_id(schemas.iter().map(|s| s.id));
        for (table_index, table) in tables.iter().enumerate() {
            let Some(&schema) = schema_index.get(&table.schema_id) else {
                trace!(
                    table = %table.name,
                    schema_id = table.schema_id,
                    "Table has no matching schema"
                );
                continue;
            };
            link(
                &mut references.table_schema,
                &mut references.schema_tables,
                table_index,
                schema,
            );
        }
    }

    /// Links every column to the table whose id matches its `table_id`.
    pub fn resolve_table_columns(
        tables: &[Table],
        columns: &[Column],
        references: &mut References,
    ) {
        if tables.is_empty() || columns.is_empty() {
            return;
        }

        let table_index = index_by_id(tables.iter().map(|t| t.id));
        for (column_index, column) in columns.iter().enumerate() {
            let Some(&table) = table_index.get(&column.table_id) else {
                trace!(
                    column = %column.name,
                    table_id = column.table_id,
                    "Column has no matching table"
                );
                continue;
            };
            link(
                &mut references.column_table,
                &mut references.table_columns,
                column_index,
                table,
            );
        }
    }

    /// Attaches primary keys to their owning tables.
    pub fn resolve_primary_keys(
        tables: &[Table],
        constraints: &[Constraint],
        references: &mut References,
    ) {
        if tables.is_empty() || constraints.is_empty() {
            return;
        }

        let table_index = index_by_id(tables.iter().map(|t| t.id));
        for (constraint_index, constraint) in constraints.iter().enumerate() {
            if constraint.constraint_type != ConstraintType::PrimaryKey {
                continue;
            }

            let Some(&table) = table_index.get(&constraint.source_target.table_id) else {
                trace!(constraint = %constraint.name, "Skipping primary key of unknown table");
                continue;
            };

            link(
                &mut references.constraint_source,
                &mut references.table_constraints,
                constraint_index,
                table,
            );
        }
    }

    /// Attaches foreign keys to their owning tables and resolves the
    /// referenced tables according to the configured policy.
    pub fn resolve_foreign_keys(
        &self,
        tables: &[Table],
        constraints: &[Constraint],
        references: &mut References,
    ) {
        if tables.is_empty() || constraints.is_empty() {
            return;
        }

        let table_index = index_by_id(tables.iter().map(|t| t.id));
        for (constraint_index, constraint) in constraints.iter().enumerate() {
            if constraint.constraint_type != ConstraintType::ForeignKey {
                continue;
            }

            let source = table_index.get(&constraint.source_target.table_id).copied();
            match source {
                Some(table) => link(
                    &mut references.constraint_source,
                    &mut references.table_constraints,
                    constraint_index,
                    table,
                ),
                None => {
                    trace!(constraint = %constraint.name, "Foreign key owner not found");
                    if self.options.foreign_keys == ForeignKeyResolution::RequireSource {
                        continue;
                    }
                }
            }

            let destination = constraint
                .destination_target
                .as_ref()
                .and_then(|target| table_index.get(&target.table_id).copied());
            if destination.is_none() {
                trace!(constraint = %constraint.name, "Foreign key target not found");
            }
            if let Some(slot) = references.constraint_destination.get_mut(constraint_index) {
                *slot = destination;
            }
        }
    }
}

/// Records a child-to-parent link and its reverse. Indices outside the
/// reference table are ignored.
fn link(parents: &mut [Option<usize>], children: &mut [Vec<usize>], child: usize, parent: usize) {
    let parent_slot = parents.get_mut(child);
    let siblings = children.get_mut(parent);
    let (Some(parent_slot), Some(siblings)) = (parent_slot, siblings) else {
        trace!(child, parent, "Reference table too small, link dropped");
        return;
    };
    *parent_slot = Some(parent);
    siblings.push(child);
}

/// Maps ids to their first position.
fn index_by_id(ids: impl Iterator<Item = i64>) -> HashMap<i64, usize> {
    let mut map = HashMap::new();
    for (index, id) in ids.enumerate() {
        map.entry(id).or_insert(index);
    }
    map
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::model::{ConstraintColumn, ConstraintTarget, DatabaseType};

    fn snapshot() -> Snapshot {
        let modified = Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap();
        Snapshot::new("TestDB", DatabaseType::Mssql2016)
            .schema(Schema::new(1, "dbo"))
            .schema(Schema::new(2, "sales"))
            .table(Table::new(10, "Table1", 1, modified))
            .table(Table::new(11, "Table2", 2, modified))
            .table(Table::new(12, "Orphan", 99, modified))
            .column(Column::new(1, "Id", "int", 10))
            .column(Column::new(2, "Name", "varchar", 10))
            .column(Column::new(1, "Id", "int", 11))
            .column(Column::new(1, "Lost", "int", 500))
    }

    #[test]
    fn test_resolve_schema_tables() {
        let mut snapshot = snapshot();
        ReferenceResolver::new().resolve(&mut snapshot);

        let dbo = snapshot.find_schema("dbo").unwrap();
        let sales = snapshot.find_schema("sales").unwrap();
        assert_eq!(dbo.tables().map(|t| t.id).collect::<Vec<_>>(), vec![10]);
        assert_eq!(sales.tables().map(|t| t.id).collect::<Vec<_>>(), vec![11]);

        let orphan = snapshot.table_refs().nth(2).unwrap();
        assert!(orphan.schema().is_none());
        assert!(orphan.full_name().is_err());
    }

    #[test]
    fn test_resolve_table_columns() {
        let mut snapshot = snapshot();
        ReferenceResolver::new().resolve(&mut snapshot);

        let table1 = snapshot.find_table("dbo.Table1").unwrap();
        let names: Vec<_> = table1.columns().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["Id", "Name"]);

        let lost = snapshot.column_refs().nth(3).unwrap();
        assert!(lost.table().is_none());
    }

    #[test]
    fn test_empty_lists_are_noop() {
        let mut snapshot = Snapshot::default();
        ReferenceResolver::new().resolve(&mut snapshot);
        assert_eq!(snapshot.references(), &References::default());

        let mut references = References::default();
        ReferenceResolver::resolve_schema_tables(&[], &[], &mut references);
        ReferenceResolver::resolve_table_columns(&[], &[], &mut references);
        assert_eq!(references, References::default());
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let mut snapshot = snapshot();
        let resolver = ReferenceResolver::new();
        resolver.resolve(&mut snapshot);
        let first = snapshot.references().clone();
        resolver.resolve(&mut snapshot);

        assert_eq!(snapshot.references(), &first);
        let table1 = snapshot.find_table("dbo.Table1").unwrap();
        assert_eq!(table1.columns().count(), 2);
    }

    #[test]
    fn test_primary_key_of_unknown_table_is_skipped() {
        let mut snapshot = snapshot()
            .constraint(Constraint::primary_key(
                1,
                "PK_Table1",
                10,
                vec![ConstraintColumn::asc(1)],
            ))
            .constraint(Constraint::primary_key(
                2,
                "PK_Ghost",
                404,
                vec![ConstraintColumn::asc(1)],
            ));
        ReferenceResolver::new().resolve(&mut snapshot);

        let table1 = snapshot.find_table("dbo.Table1").unwrap();
        assert_eq!(table1.primary_key().unwrap().name, "PK_Table1");

        let ghost = snapshot.constraint_refs().nth(1).unwrap();
        assert!(ghost.source_table().is_none());
    }

    #[test]
    fn test_foreign_key_resolution() {
        let mut snapshot = snapshot().constraint(Constraint::foreign_key(
            3,
            "FK_Table1_Table2",
            ConstraintTarget::new(10, vec![ConstraintColumn::asc(1)]),
            ConstraintTarget::new(11, vec![ConstraintColumn::asc(1)]),
        ));
        ReferenceResolver::new().resolve(&mut snapshot);

        let fk = snapshot.constraint_refs().next().unwrap();
        assert_eq!(fk.source_table().unwrap().name, "Table1");
        assert_eq!(fk.destination_table().unwrap().name, "Table2");

        let table1 = snapshot.find_table("dbo.Table1").unwrap();
        assert_eq!(table1.foreign_keys().count(), 1);
        assert!(table1.primary_key().is_none());
    }

    fn dangling_foreign_key() -> Snapshot {
        snapshot().constraint(Constraint::foreign_key(
            3,
            "FK_Ghost_Table2",
            ConstraintTarget::new(404, vec![ConstraintColumn::asc(1)]),
            ConstraintTarget::new(11, vec![ConstraintColumn::asc(1)]),
        ))
    }

    #[test]
    fn test_foreign_key_without_source_skips_destination() {
        let mut snapshot = dangling_foreign_key();
        ReferenceResolver::new().resolve(&mut snapshot);

        let fk = snapshot.constraint_refs().next().unwrap();
        assert!(fk.source_table().is_none());
        assert!(fk.destination_table().is_none());
    }

    #[test]
    fn test_independent_foreign_key_resolution() {
        let mut snapshot = dangling_foreign_key();
        let resolver =
            ReferenceResolver::with_options(ResolverOptions::new().with_independent_foreign_keys());
        resolver.resolve(&mut snapshot);

        let fk = snapshot.constraint_refs().next().unwrap();
        assert!(fk.source_table().is_none());
        assert_eq!(fk.destination_table().unwrap().name, "Table2");

        let table2 = snapshot.find_table("sales.Table2").unwrap();
        assert_eq!(table2.constraints().count(), 0);
    }
}
