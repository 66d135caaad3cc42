//! Integration tests for snapshot files and template directories.

mod common;

use std::fs;

use common::table1;
use dbmap::prelude::*;

const SNAPSHOT: &str = r#"{
    "databaseName": "Inventory",
    "databaseType": "MSSQL_2016",
    "schemas": [{ "id": "1", "name": "dbo" }],
    "tables": [{
        "id": 7,
        "name": "Items",
        "createDate": "2018-03-01T10:00:00Z",
        "modifyDate": "2018-03-02T10:00:00Z",
        "schemaId": 1,
        "hasData": 0
    }],
    "columns": [
        { "id": 1, "name": "Id", "type": "int", "isNullable": false,
          "isIdentity": true, "identitySeedValue": "1", "identityIncrementValue": 1, "tableId": 7 },
        { "id": 2, "name": "Label", "type": "nvarchar", "typeMaxLength": "100",
          "collationName": "Latin1_General_CI_AS", "isNullable": "1", "tableId": 7 }
    ],
    "constraints": [{
        "id": 50,
        "name": "PK_Items",
        "type": "PRIMARY_KEY",
        "sourceTarget": {
            "tableId": 7,
            "constraintColumns": [{ "columnId": 1, "isDescendingKey": false }]
        }
    }]
}"#;

#[test]
fn loose_snapshot_file_is_resolved() {
    let snapshot = Snapshot::from_json(SNAPSHOT).unwrap();

    assert_eq!(snapshot.database_type, Some(DatabaseType::Mssql2016));
    let items = snapshot.find_table("dbo.Items").unwrap();
    assert_eq!(items.columns().count(), 2);
    assert_eq!(items.primary_key().unwrap().name, "PK_Items");
}

#[test]
fn loose_snapshot_file_scripts_new_table() {
    let previous = Snapshot::new("Inventory", DatabaseType::Mssql2016).resolved();
    let current = Snapshot::from_json(SNAPSHOT).unwrap();

    let script = common::generate(&previous, &current);
    assert!(script.starts_with("USE [Inventory];\nGO"));
    assert!(script.contains("[Id] INT IDENTITY(1,1) NOT NULL"));
    assert!(script.contains(", [Label] NVARCHAR(50) COLLATE Latin1_General_CI_AS NULL"));
}

#[test]
fn saved_snapshot_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("table1.json");

    let snapshot = table1(1, true);
    snapshot.save(&path).unwrap();
    let loaded = Snapshot::load(&path).unwrap();

    assert_eq!(loaded, snapshot);
    let diff = MapComparer::new().compare(&snapshot, &loaded).unwrap();
    assert!(diff.is_empty());
}

#[test]
fn template_directory_overrides_statements() {
    let root = tempfile::tempdir().unwrap();
    let family = root.path().join("mssql");
    fs::create_dir_all(family.join("mssql_2016")).unwrap();

    fs::write(family.join("use_stmt.sql"), "USE {DatabaseName}").unwrap();
    fs::write(family.join("create_schema_stmt.sql"), "CREATE SCHEMA {SchemaName}").unwrap();
    fs::write(
        family.join("mssql_2016").join("use_stmt.sql"),
        "USE [{DatabaseName}]; -- 2016",
    )
    .unwrap();

    let templates = TemplateSet::from_dir(root.path(), DatabaseType::Mssql2016).unwrap();
    let generator = ScriptGenerator::new(templates);

    let previous = Snapshot::new("TestDB", DatabaseType::Mssql2016).resolved();
    let current = Snapshot::new("TestDB", DatabaseType::Mssql2016)
        .schema(Schema::new(4, "audit"))
        .resolved();
    let diff = MapComparer::new().compare(&previous, &current).unwrap();

    let script = generator.generate(&diff).unwrap();
    assert_eq!(script, "USE [TestDB]; -- 2016\n\nCREATE SCHEMA audit\n");
}

#[test]
fn missing_template_is_reported() {
    let root = tempfile::tempdir().unwrap();
    let templates = TemplateSet::from_dir(root.path(), DatabaseType::Mssql2016).unwrap();
    let generator = ScriptGenerator::new(templates);

    let snapshot = Snapshot::new("TestDB", DatabaseType::Mssql2016).resolved();
    let diff = MapComparer::new().compare(&snapshot, &snapshot).unwrap();

    let result = generator.generate(&diff);
    assert!(matches!(result, Err(DbMapError::TemplateNotFound(name)) if name == "use_stmt"));
}
