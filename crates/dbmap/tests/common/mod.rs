#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use dbmap::prelude::*;

pub fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2018, 4, day, 9, 30, 0)
        .single()
        .unwrap_or_else(|| panic!("invalid day {day}"))
}

/// `dbo.Table1 (Id int not null, Name varchar(20))`, last modified on `day`.
pub fn table1(day: u32, with_name: bool) -> Snapshot {
    let mut snapshot = Snapshot::new("TestDB", DatabaseType::Mssql2016)
        .schema(Schema::new(1, "dbo"))
        .table(Table::new(100, "Table1", 1, at(day)))
        .column(Column::new(1, "Id", "int", 100).not_null());
    if with_name {
        snapshot = snapshot.column(Column::new(2, "Name", "varchar", 100).max_length(20));
    }
    snapshot
        .constraint(Constraint::primary_key(
            10,
            "PK_Table1",
            100,
            vec![ConstraintColumn::asc(1)],
        ))
        .resolved()
}

pub fn generate(previous: &Snapshot, current: &Snapshot) -> String {
    let diff = MapComparer::new()
        .compare(previous, current)
        .unwrap_or_else(|e| panic!("compare failed: {e}"));
    ScriptGenerator::for_database_type(DatabaseType::Mssql2016)
        .generate(&diff)
        .unwrap_or_else(|e| panic!("generate failed: {e}"))
}
