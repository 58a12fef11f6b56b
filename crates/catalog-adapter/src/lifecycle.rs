//! Schema and table lifecycle.
//!
//! Reads that callers branch on (existence checks, listings) degrade to
//! `false`/empty on catalog outages and log the failure. Mutations propagate.

use crate::catalog::{CatalogFacade, TableDescriptor};
use crate::config::AdapterConfig;
use crate::error::Result;
use crate::executor::ExecutorProvider;
use crate::format::{FormatTag, TableState};
use crate::operation::{Operation, QualifiedName};
use crate::relation::{Column, Relation, RelationType};
use crate::session::Row;
use lakebridge_catalog_client::{PermissionEntry, Principal, Resource, TableWildcard};
use std::sync::Arc;

const DATABASE_PERMISSIONS: [&str; 4] = ["ALTER", "CREATE_TABLE", "DROP", "DESCRIBE"];
const TABLE_PERMISSIONS: [&str; 6] = ["SELECT", "INSERT", "DELETE", "DESCRIBE", "ALTER", "DROP"];

/// One column of one relation, as listed by [`LifecycleManager::get_catalog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRow {
    pub table_database: String,
    pub table_schema: String,
    pub table_name: String,
    pub table_type: RelationType,
    pub column_name: String,
    pub column_index: usize,
    pub column_type: String,
}

/// Schema and table lifecycle over the catalog and the engine.
#[derive(Clone)]
pub struct LifecycleManager {
    config: Arc<AdapterConfig>,
    catalog: CatalogFacade,
    executors: Arc<dyn ExecutorProvider>,
}

impl LifecycleManager {
    pub fn new(
        config: Arc<AdapterConfig>,
        catalog: CatalogFacade,
        executors: Arc<dyn ExecutorProvider>,
    ) -> Self {
        Self {
            config,
            catalog,
            executors,
        }
    }

    pub async fn schema_exists(&self, schema: &str) -> bool {
        match self.catalog.list_schemas().await {
            Ok(schemas) => schemas.iter().any(|s| s == schema),
            Err(e) => {
                tracing::error!(schema = %schema, error = %e, "Schema existence check failed");
                false
            }
        }
    }

    /// Create the relation's schema and grant the configured principal on it.
    ///
    /// No-op if the schema exists.
    pub async fn create_schema(&self, relation: &Relation) -> Result<()> {
        let schema = relation.schema.as_str();
        if self.schema_exists(schema).await {
            tracing::debug!(schema = %schema, "Schema exists, nothing to do");
            return Ok(());
        }

        let location = self.config.schema_location(schema);
        let created = self
            .catalog
            .create_database(schema, &location, &self.config.database_description)
            .await
            .map_err(|e| {
                tracing::error!(schema = %schema, error = %e, "Create schema failed");
                e
            })?;
        if !created {
            tracing::debug!(schema = %schema, "Schema created concurrently");
            return Ok(());
        }
        tracing::info!(schema = %schema, location = %location, "Created schema");

        if self.config.role_arn.is_empty() {
            tracing::debug!(schema = %schema, "No principal configured, skipping grants");
            return Ok(());
        }

        let entries = self.schema_grants(schema);
        let failures = self
            .catalog
            .grant(self.config.catalog_id.clone(), entries)
            .await
            .map_err(|e| {
                tracing::error!(schema = %schema, error = %e, "Schema grants failed");
                e
            })?;
        for failure in &failures {
            let message = failure
                .error
                .as_ref()
                .and_then(|d| d.error_message.as_deref())
                .unwrap_or("unknown");
            tracing::warn!(schema = %schema, error = %message, "Grant entry rejected");
        }
        Ok(())
    }

    /// Grant entries for a new schema: the database itself and a wildcard
    /// over its current and future tables.
    pub fn schema_grants(&self, schema: &str) -> Vec<PermissionEntry> {
        let principal = Principal {
            data_lake_principal_identifier: self.config.role_arn.clone(),
        };
        let database = DATABASE_PERMISSIONS.map(String::from).to_vec();
        let tables = TABLE_PERMISSIONS.map(String::from).to_vec();

        vec![
            PermissionEntry {
                id: uuid::Uuid::new_v4().to_string(),
                principal: principal.clone(),
                resource: Resource::Database {
                    name: schema.to_string(),
                },
                permissions: database.clone(),
                permissions_with_grant_option: database,
            },
            PermissionEntry {
                id: uuid::Uuid::new_v4().to_string(),
                principal,
                resource: Resource::Table {
                    database_name: schema.to_string(),
                    table_wildcard: TableWildcard {},
                    catalog_id: self.config.catalog_id.clone(),
                },
                permissions: tables.clone(),
                permissions_with_grant_option: tables,
            },
        ]
    }

    /// Delete the relation's schema; no-op if it does not exist.
    ///
    /// Cached sessions are released whether or not the delete succeeds.
    pub async fn drop_schema(&self, relation: &Relation) -> Result<()> {
        let schema = relation.schema.as_str();
        if !self.schema_exists(schema).await {
            tracing::debug!(schema = %schema, "No schema to delete");
            return Ok(());
        }

        let result = self.catalog.delete_database(schema).await;
        self.executors.release_all();
        match result {
            Ok(()) => {
                tracing::info!(schema = %schema, "Dropped schema");
                Ok(())
            }
            Err(e) => {
                tracing::error!(schema = %schema, error = %e, "Drop schema failed");
                Err(e)
            }
        }
    }

    /// Table descriptor, or `None` if the table does not exist.
    pub async fn describe_table(&self, relation: &Relation) -> Result<Option<TableDescriptor>> {
        match self
            .catalog
            .get_table(&relation.schema, &relation.identifier)
            .await
        {
            Ok(descriptor) => Ok(Some(descriptor)),
            Err(e) if e.is_not_found() => {
                tracing::debug!(relation = %relation, "Table not found");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Format tag of an existing table; `None` if it does not exist.
    pub async fn get_table_format(&self, relation: &Relation) -> Result<Option<FormatTag>> {
        Ok(self.get_table_state(relation).await?.map(|state| state.tag))
    }

    /// Format tag and recorded provider of an existing table.
    pub async fn get_table_state(&self, relation: &Relation) -> Result<Option<TableState>> {
        Ok(self
            .describe_table(relation)
            .await?
            .as_ref()
            .map(TableState::from_descriptor))
    }

    pub async fn relation_exists(&self, relation: &Relation) -> bool {
        self.resolve_relation(&relation.schema, &relation.identifier)
            .await
            .is_some()
    }

    /// Current catalog view of `schema.identifier`.
    ///
    /// `None` if the table is absent or the catalog cannot be read.
    pub async fn resolve_relation(&self, schema: &str, identifier: &str) -> Option<Relation> {
        let lookup = Relation::table(schema, identifier);
        match self.describe_table(&lookup).await {
            Ok(Some(descriptor)) => Some(to_relation(&descriptor)),
            Ok(None) => None,
            Err(e) => {
                tracing::error!(relation = %lookup, error = %e, "Resolve relation failed");
                None
            }
        }
    }

    /// Relations of a schema; empty if the schema cannot be listed.
    pub async fn list_relations(&self, schema: &str) -> Vec<Relation> {
        match self.catalog.list_tables(schema).await {
            Ok(tables) => tables.iter().map(to_relation).collect(),
            Err(e) if e.is_not_found() => {
                tracing::debug!(schema = %schema, "Schema not found, no relations");
                Vec::new()
            }
            Err(e) => {
                tracing::error!(schema = %schema, error = %e, "List relations failed");
                Vec::new()
            }
        }
    }

    /// Caller-visible columns of a relation.
    ///
    /// Describe section rows are dropped, duplicates removed and bookkeeping
    /// columns of the merge-on-read format stripped.
    pub async fn get_columns_in_relation(&self, relation: &Relation) -> Result<Vec<Column>> {
        let descriptor = self
            .catalog
            .get_table(&relation.schema, &relation.identifier)
            .await?;
        let transactional_catalog =
            FormatTag::from_descriptor(&descriptor) == FormatTag::TransactionalCopyOnWrite;

        let executor = self.executors.acquire().await?;
        let rows = executor
            .run(&Operation::Describe {
                table: QualifiedName::from(relation),
                transactional_catalog,
            })
            .await
            .map_err(|e| {
                tracing::error!(relation = %relation, error = %e, "Describe failed");
                e
            })?;

        Ok(columns_from_describe(&rows))
    }

    /// One row per column of every relation in `schema`.
    pub async fn get_catalog(&self, schema: &str) -> Result<Vec<CatalogRow>> {
        let mut rows = Vec::new();
        for relation in self.list_relations(schema).await {
            let columns = self.get_columns_in_relation(&relation).await?;
            for (index, column) in columns.into_iter().enumerate() {
                rows.push(CatalogRow {
                    table_database: relation.database.clone(),
                    table_schema: relation.schema.clone(),
                    table_name: relation.identifier.clone(),
                    table_type: relation.relation_type,
                    column_name: column.name,
                    column_index: index,
                    column_type: column.declared_type,
                });
            }
        }
        Ok(rows)
    }
}

fn to_relation(descriptor: &TableDescriptor) -> Relation {
    let tag = FormatTag::from_descriptor(descriptor);
    Relation::create(
        descriptor.schema.clone(),
        descriptor.schema.clone(),
        descriptor.name.clone(),
        tag.relation_type(descriptor.relation_type),
    )
}

fn columns_from_describe(rows: &[Row]) -> Vec<Column> {
    let mut columns: Vec<Column> = Vec::new();
    for row in rows {
        let Some(name) = cell(row, 0) else {
            continue;
        };
        if name.is_empty() || name.starts_with('#') {
            continue;
        }
        let column = Column::new(name, cell(row, 1).unwrap_or_default());
        if column.is_format_metadata() || columns.contains(&column) {
            continue;
        }
        columns.push(column);
    }
    columns
}

fn cell(row: &Row, index: usize) -> Option<String> {
    match row.get(index)? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.trim().to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_columns_from_describe() {
        let rows = vec![
            vec![json!("_hoodie_commit_time"), json!("string"), json!(null)],
            vec![json!("id"), json!("BIGINT"), json!(null)],
            vec![json!("v"), json!("string"), json!("value")],
            vec![json!("dt"), json!("string"), json!(null)],
            vec![json!(""), json!(""), json!("")],
            vec![json!("# Partition Information"), json!(""), json!("")],
            vec![json!("# col_name"), json!("data_type"), json!("comment")],
            vec![json!("dt"), json!("string"), json!(null)],
        ];

        let columns = columns_from_describe(&rows);
        assert_eq!(
            columns,
            vec![
                Column::new("id", "bigint"),
                Column::new("v", "string"),
                Column::new("dt", "string"),
            ]
        );
    }
}
