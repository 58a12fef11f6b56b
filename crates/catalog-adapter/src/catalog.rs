//! Catalog client facade.
//!
//! [`CatalogService`] is the consumed catalog boundary. [`CatalogFacade`]
//! sits on top of it, normalizes provider table types and maps client errors
//! into the adapter taxonomy (`NotFound` vs `CatalogUnavailable`).

use crate::error::{AdapterError, Result};
use crate::relation::RelationType;
use async_trait::async_trait;
use lakebridge_catalog_client::{
    Database, DatabaseInput, GlueClient, GrantFailure, PermissionEntry, Table,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Catalog operations the adapter consumes.
#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn list_databases(&self) -> lakebridge_catalog_client::Result<Vec<Database>>;

    async fn list_tables(&self, database: &str) -> lakebridge_catalog_client::Result<Vec<Table>>;

    async fn get_table(&self, database: &str, name: &str)
        -> lakebridge_catalog_client::Result<Table>;

    async fn create_database(&self, input: DatabaseInput) -> lakebridge_catalog_client::Result<()>;

    async fn delete_database(&self, name: &str) -> lakebridge_catalog_client::Result<()>;

    /// Grant permissions in one batch; returns rejected entries.
    async fn grant_permissions(
        &self,
        catalog_id: Option<String>,
        entries: Vec<PermissionEntry>,
    ) -> lakebridge_catalog_client::Result<Vec<GrantFailure>>;
}

#[async_trait]
impl CatalogService for GlueClient {
    async fn list_databases(&self) -> lakebridge_catalog_client::Result<Vec<Database>> {
        self.get_databases().await
    }

    async fn list_tables(&self, database: &str) -> lakebridge_catalog_client::Result<Vec<Table>> {
        self.get_tables(database).await
    }

    async fn get_table(
        &self,
        database: &str,
        name: &str,
    ) -> lakebridge_catalog_client::Result<Table> {
        GlueClient::get_table(self, database, name).await
    }

    async fn create_database(&self, input: DatabaseInput) -> lakebridge_catalog_client::Result<()> {
        GlueClient::create_database(self, input).await
    }

    async fn delete_database(&self, name: &str) -> lakebridge_catalog_client::Result<()> {
        GlueClient::delete_database(self, name).await
    }

    async fn grant_permissions(
        &self,
        catalog_id: Option<String>,
        entries: Vec<PermissionEntry>,
    ) -> lakebridge_catalog_client::Result<Vec<GrantFailure>> {
        self.batch_grant_permissions(catalog_id, entries).await
    }
}

/// Normalized view of a catalog table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDescriptor {
    pub schema: String,
    pub name: String,
    pub relation_type: RelationType,
    pub parameters: HashMap<String, String>,
    pub partition_keys: Vec<String>,
    pub location: Option<String>,
}

impl TableDescriptor {
    fn from_table(schema: &str, table: Table) -> Self {
        let relation_type = table
            .table_type
            .as_deref()
            .map(RelationType::from_catalog)
            .unwrap_or(RelationType::Table);
        Self {
            schema: table.database_name.unwrap_or_else(|| schema.to_string()),
            name: table.name,
            relation_type,
            parameters: table.parameters,
            partition_keys: table.partition_keys.into_iter().map(|c| c.name).collect(),
            location: table.storage_descriptor.and_then(|sd| sd.location),
        }
    }
}

/// Error-mapping, type-normalizing wrapper over a [`CatalogService`].
#[derive(Clone)]
pub struct CatalogFacade {
    service: Arc<dyn CatalogService>,
}

impl CatalogFacade {
    pub fn new(service: Arc<dyn CatalogService>) -> Self {
        Self { service }
    }

    /// Database names in catalog order.
    pub async fn list_schemas(&self) -> Result<Vec<String>> {
        let databases = self
            .service
            .list_databases()
            .await
            .map_err(|e| AdapterError::CatalogUnavailable(format!("list databases: {}", e)))?;
        Ok(databases.into_iter().map(|d| d.name).collect())
    }

    /// Tables of a schema with their normalized types.
    pub async fn list_tables(&self, schema: &str) -> Result<Vec<TableDescriptor>> {
        let tables = self
            .service
            .list_tables(schema)
            .await
            .map_err(|e| AdapterError::from_catalog(e, schema))?;
        Ok(tables
            .into_iter()
            .map(|t| TableDescriptor::from_table(schema, t))
            .collect())
    }

    /// One table, or `NotFound`.
    pub async fn get_table(&self, schema: &str, name: &str) -> Result<TableDescriptor> {
        let table = self
            .service
            .get_table(schema, name)
            .await
            .map_err(|e| AdapterError::from_catalog(e, format!("{}.{}", schema, name)))?;
        Ok(TableDescriptor::from_table(schema, table))
    }

    /// Create a database; `Ok(false)` if it already existed.
    pub async fn create_database(
        &self,
        name: &str,
        location_uri: &str,
        description: &str,
    ) -> Result<bool> {
        let input = DatabaseInput {
            name: name.to_string(),
            description: Some(description.to_string()),
            location_uri: Some(location_uri.to_string()),
        };
        match self.service.create_database(input).await {
            Ok(()) => Ok(true),
            Err(lakebridge_catalog_client::ClientError::AlreadyExists(_)) => Ok(false),
            Err(e) => Err(AdapterError::CatalogUnavailable(format!(
                "create database {}: {}",
                name, e
            ))),
        }
    }

    pub async fn delete_database(&self, name: &str) -> Result<()> {
        self.service
            .delete_database(name)
            .await
            .map_err(|e| AdapterError::from_catalog(e, name))
    }

    /// Apply grants; rejected entries are returned, not raised.
    pub async fn grant(
        &self,
        catalog_id: Option<String>,
        entries: Vec<PermissionEntry>,
    ) -> Result<Vec<GrantFailure>> {
        self.service
            .grant_permissions(catalog_id, entries)
            .await
            .map_err(|e| AdapterError::CatalogUnavailable(format!("grant permissions: {}", e)))
    }
}
