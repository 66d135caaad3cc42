//! Database structure snapshots, diffs and DDL scripts.
//!
//! `dbmap` captures the structure of a relational database (schemas, tables,
//! columns, primary and foreign keys) into a [`Snapshot`](snapshot::Snapshot),
//! compares two snapshots and generates the DDL script that moves a database
//! from the earlier structure to the later one.
//!
//! # Architecture
//!
//! - **Model** - Flat metadata rows as returned by introspection
//! - **Resolver** - Wires the rows into a navigable graph
//! - **Comparer** - Diffs two resolved snapshots
//! - **Synthesizer** - Renders a diff into a DDL script from statement templates
//! - **Templates** - Dialect-specific statement skeletons
//! - **Introspect** - Builds snapshots from a live database through a provider
//!
//! # Example
//!
//! ```rust,ignore
//! use dbmap::prelude::*;
//!
//! let previous = Snapshot::load("maps/previous.json")?;
//! let current = Snapshot::load("maps/current.json")?;
//!
//! let diff = MapComparer::new().compare(&previous, &current)?;
//! let script = ScriptGenerator::for_database_type(DatabaseType::Mssql2016).generate(&diff)?;
//! println!("{}", script);
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Print the migration script between two snapshots
//! dbmap diff --previous previous.json --current current.json
//!
//! # Script a brand new database
//! dbmap diff --current current.json --output create.sql
//!
//! # List what changed
//! dbmap summary --previous previous.json --current current.json
//! ```

pub mod comparer;
pub mod error;
pub mod introspect;
pub mod model;
pub mod resolver;
pub mod snapshot;
pub mod synthesizer;
pub mod templates;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::comparer::{ColumnProperty, Diff, DiffState, LooseValue, MapComparer, ObjectDiff};
    pub use crate::error::{DbMapError, Result};
    pub use crate::introspect::{DatabaseMapper, IntrospectionProvider};
    pub use crate::model::{
        Column, Constraint, ConstraintColumn, ConstraintTarget, ConstraintType, DatabaseType,
        Schema, Table,
    };
    pub use crate::resolver::{ForeignKeyResolution, ReferenceResolver, ResolverOptions};
    pub use crate::snapshot::{ColumnRef, ConstraintRef, SchemaRef, Snapshot, TableRef};
    pub use crate::synthesizer::{ColumnTypeFamily, ScriptGenerator};
    pub use crate::templates::{TemplateName, TemplateProvider, TemplateSet};
}
