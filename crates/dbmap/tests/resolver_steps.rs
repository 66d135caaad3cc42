mod common;

use dbmap::prelude::*;
use dbmap::snapshot::References;

use common::at;

fn snapshot() -> Snapshot {
    Snapshot::new("TestDB", DatabaseType::Mssql2016)
        .schema(Schema::new(1, "dbo"))
        .table(Table::new(10, "Orders", 1, at(2)))
        .column(Column::new(1, "Id", "int", 10).not_null())
        .constraint(Constraint::primary_key(
            5,
            "PK_Orders",
            10,
            vec![ConstraintColumn::asc(1)],
        ))
}

#[test]
fn steps_with_unsized_references_do_not_panic() {
    let snapshot = snapshot();
    let mut references = References::default();

    ReferenceResolver::resolve_schema_tables(&snapshot.schemas, &snapshot.tables, &mut references);
    ReferenceResolver::resolve_table_columns(&snapshot.tables, &snapshot.columns, &mut references);
    ReferenceResolver::resolve_primary_keys(
        &snapshot.tables,
        &snapshot.constraints,
        &mut references,
    );
    ReferenceResolver::new().resolve_foreign_keys(
        &snapshot.tables,
        &snapshot.constraints,
        &mut references,
    );

    assert_eq!(references, References::default());
}

#[test]
fn steps_with_sized_references_match_full_resolution() {
    let snapshot = snapshot();
    let mut references = References::sized_for(&snapshot);

    ReferenceResolver::resolve_schema_tables(&snapshot.schemas, &snapshot.tables, &mut references);
    ReferenceResolver::resolve_table_columns(&snapshot.tables, &snapshot.columns, &mut references);
    ReferenceResolver::resolve_primary_keys(
        &snapshot.tables,
        &snapshot.constraints,
        &mut references,
    );

    let resolved = snapshot.resolved();
    assert_eq!(&references, resolved.references());
}
