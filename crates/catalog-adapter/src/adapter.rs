//! Caller-facing adapter.
//!
//! Takes and returns plain relation and column values; no engine text crosses
//! this boundary.

use crate::catalog::{CatalogFacade, CatalogService};
use crate::config::AdapterConfig;
use crate::dialect::SparkDialect;
use crate::error::{AdapterError, Result};
use crate::executor::{ExecutorProvider, PooledExecutorProvider};
use crate::format::{FormatTag, TableFormat};
use crate::lifecycle::{CatalogRow, LifecycleManager};
use crate::orchestrator::{resolve_location, WriteIntent, WriteOrchestrator, WriteOutcome};
use crate::pool::{PoolConfig, SessionPool};
use crate::relation::{Column, Relation};
use crate::session::GlueSessionFactory;
use lakebridge_catalog_client::{ClientConfig, GlueClient};
use std::sync::Arc;

/// Catalog-aware execution adapter.
///
/// Safe to share across tasks writing different relations. Writes to the
/// same relation are not coordinated.
#[derive(Clone)]
pub struct GlueAdapter {
    config: Arc<AdapterConfig>,
    lifecycle: LifecycleManager,
    orchestrator: WriteOrchestrator,
}

impl GlueAdapter {
    /// Adapter over the remote catalog and an interactive session.
    pub fn connect(client_config: ClientConfig, config: AdapterConfig) -> Result<Self> {
        config.validate()?;
        let client = Arc::new(
            GlueClient::new(client_config).map_err(|e| AdapterError::Config(e.to_string()))?,
        );

        let factory = GlueSessionFactory::new(client.clone(), config.session_id.clone());
        let pool = SessionPool::new(
            Arc::new(factory),
            PoolConfig {
                max_idle: config.max_idle_sessions,
                max_sessions: config.max_sessions,
                acquire_timeout: config.session_acquire_timeout,
            },
        );
        let dialect = SparkDialect::from_config(&config);
        let executors = PooledExecutorProvider::new(pool, Arc::new(dialect));

        tracing::info!(
            endpoint = %client.config().endpoint,
            session_id = %config.session_id,
            "Adapter connected"
        );
        Self::new(config, client, Arc::new(executors))
    }

    /// Adapter over explicit catalog and execution boundaries.
    pub fn new(
        config: AdapterConfig,
        catalog: Arc<dyn CatalogService>,
        executors: Arc<dyn ExecutorProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let lifecycle = LifecycleManager::new(
            config.clone(),
            CatalogFacade::new(catalog),
            executors.clone(),
        );
        let orchestrator = WriteOrchestrator::new(config.clone(), lifecycle.clone(), executors);
        Ok(Self {
            config,
            lifecycle,
            orchestrator,
        })
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub async fn schema_exists(&self, schema: &str) -> bool {
        self.lifecycle.schema_exists(schema).await
    }

    pub async fn create_schema(&self, relation: &Relation) -> Result<()> {
        self.lifecycle.create_schema(relation).await
    }

    pub async fn drop_schema(&self, relation: &Relation) -> Result<()> {
        self.lifecycle.drop_schema(relation).await
    }

    pub async fn resolve_relation(&self, schema: &str, identifier: &str) -> Option<Relation> {
        self.lifecycle.resolve_relation(schema, identifier).await
    }

    pub async fn relation_exists(&self, relation: &Relation) -> bool {
        self.lifecycle.relation_exists(relation).await
    }

    pub async fn list_relations_in_schema(&self, schema: &str) -> Vec<Relation> {
        self.lifecycle.list_relations(schema).await
    }

    pub async fn get_table_format(&self, relation: &Relation) -> Result<Option<FormatTag>> {
        self.lifecycle.get_table_format(relation).await
    }

    pub async fn get_columns_in_relation(&self, relation: &Relation) -> Result<Vec<Column>> {
        self.lifecycle.get_columns_in_relation(relation).await
    }

    pub async fn get_catalog(&self, schema: &str) -> Result<Vec<CatalogRow>> {
        self.lifecycle.get_catalog(schema).await
    }

    pub async fn write(&self, intent: &WriteIntent) -> Result<WriteOutcome> {
        self.orchestrator.write(intent).await
    }

    pub async fn expire_snapshots(&self, qualified: &str) -> Result<()> {
        self.orchestrator.expire_snapshots(qualified).await
    }

    pub async fn rename_relation(&self, from: &Relation, to: &Relation) -> Result<()> {
        self.orchestrator.rename_relation(from, to).await
    }

    /// Derived location `<root>/<schema>/<identifier>/`.
    pub fn location_for(&self, relation: &Relation) -> String {
        resolve_location(&self.config, relation, TableFormat::Parquet, None)
    }

    /// Derived location of a copy-on-write table; never ends with `/`.
    pub fn transactional_location_for(&self, relation: &Relation) -> String {
        resolve_location(&self.config, relation, TableFormat::Iceberg, None)
    }
}
