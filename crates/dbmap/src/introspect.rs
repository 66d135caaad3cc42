//! Database introspection.
//!
//! An [`IntrospectionProvider`] fetches the raw metadata rows of a live
//! database; the [`DatabaseMapper`] turns them into a resolved [`Snapshot`].

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::model::{Column, Constraint, ConstraintTarget, DatabaseType, Schema, Table};
use crate::resolver::ReferenceResolver;
use crate::snapshot::Snapshot;

/// Source of metadata rows.
///
/// Each call either returns every row or fails; connectivity problems should
/// be reported as [`DbMapError::Introspection`](crate::error::DbMapError::Introspection).
/// Key rows may be returned one per key column, the mapper merges them.
#[async_trait]
pub trait IntrospectionProvider: Send + Sync {
    /// Fetches the schemas.
    async fn schemas(&self) -> Result<Vec<Schema>>;

    /// Fetches the user tables.
    async fn tables(&self) -> Result<Vec<Table>>;

    /// Fetches the columns of every user table.
    async fn columns(&self) -> Result<Vec<Column>>;

    /// Fetches primary key rows.
    async fn primary_keys(&self) -> Result<Vec<Constraint>>;

    /// Fetches foreign key rows.
    async fn foreign_keys(&self) -> Result<Vec<Constraint>>;

    /// Returns the engine being introspected.
    fn database_type(&self) -> DatabaseType;

    /// Returns the name of the database being introspected.
    fn database_name(&self) -> &str;
}

/// Builds snapshots from an introspection provider.
#[derive(Debug)]
pub struct DatabaseMapper<P> {
    provider: P,
    resolver: ReferenceResolver,
}

impl<P: IntrospectionProvider> DatabaseMapper<P> {
    /// Creates a mapper using the default resolver.
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            resolver: ReferenceResolver::new(),
        }
    }

    /// Replaces the resolver.
    #[must_use]
    pub const fn with_resolver(mut self, resolver: ReferenceResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Captures a resolved snapshot of the database.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by the provider.
    pub async fn map(&self) -> Result<Snapshot> {
        let schemas = self.provider.schemas().await?;
        let tables = self.provider.tables().await?;
        let columns = self.provider.columns().await?;
        let primary_keys = merge_constraint_rows(self.provider.primary_keys().await?);
        let foreign_keys = merge_constraint_rows(self.provider.foreign_keys().await?);

        let mut snapshot = Snapshot::new(
            self.provider.database_name(),
            self.provider.database_type(),
        );
        snapshot.schemas = schemas;
        snapshot.tables = tables;
        snapshot.columns = columns;
        snapshot.constraints = primary_keys;
        snapshot.constraints.extend(foreign_keys);

        self.resolver.resolve(&mut snapshot);

        info!(
            database = self.provider.database_name(),
            schemas = snapshot.schemas.len(),
            tables = snapshot.tables.len(),
            columns = snapshot.columns.len(),
            constraints = snapshot.constraints.len(),
            "Mapped database"
        );

        Ok(snapshot)
    }
}

/// Merges constraint rows sharing an id into one constraint, keeping the
/// first-seen order and appending key columns in row order.
#[must_use]
pub fn merge_constraint_rows(rows: Vec<Constraint>) -> Vec<Constraint> {
    let mut merged: Vec<Constraint> = Vec::with_capacity(rows.len());
    let mut positions: HashMap<i64, usize> = HashMap::new();

    for row in rows {
        let Some(position) = positions.get(&row.id).copied() else {
            positions.insert(row.id, merged.len());
            merged.push(row);
            continue;
        };

        let existing = &mut merged[position];
        existing
            .source_target
            .constraint_columns
            .extend(row.source_target.constraint_columns);

        if let Some(destination) = row.destination_target {
            existing
                .destination_target
                .get_or_insert_with(|| ConstraintTarget::new(destination.table_id, Vec::new()))
                .constraint_columns
                .extend(destination.constraint_columns);
        }
    }

    merged
}
