//! Catalog-aware SQL execution adapter.
//!
//! Presents a remote table catalog plus a Spark interactive session as a
//! relational warehouse: schemas, relations and columns in, typed write
//! outcomes out.
//!
//! # Layers
//!
//! - [`catalog`]: catalog boundary and the error-mapping facade over it
//! - [`relation`] / [`format`]: the uniform relation model and format tags
//! - [`session`] / [`pool`]: statement execution with scoped session release
//! - [`operation`] / [`dialect`] / [`executor`]: typed operations rendered at
//!   the engine boundary
//! - [`lifecycle`]: schema and table lifecycle
//! - [`orchestrator`] / [`sync`]: write strategy and catalog synchronization
//!
//! # Example
//!
//! ```rust,no_run
//! use lakebridge_catalog_adapter::{
//!     AdapterConfig, GlueAdapter, Relation, TableFormat, WriteIntent, WriteMode,
//! };
//! use lakebridge_catalog_client::ClientConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ClientConfig::builder("https://glue.us-east-1.amazonaws.com")
//!     .region("us-east-1")
//!     .build()?;
//! let config = AdapterConfig::builder("s3://bucket/warehouse")
//!     .session_id("dbt-session")
//!     .role_arn("arn:aws:iam::123456789012:role/dbt")
//!     .build()?;
//! let adapter = GlueAdapter::connect(client, config)?;
//!
//! let target = Relation::table("analytics", "events");
//! adapter.create_schema(&target).await?;
//!
//! let intent = WriteIntent::builder(target, "select * from raw.events")
//!     .format(TableFormat::Iceberg)
//!     .mode(WriteMode::Merge)
//!     .primary_key(["id"])
//!     .build()?;
//! let outcome = adapter.write(&intent).await?;
//! println!("{} {} rows", outcome.action, outcome.rows_staged);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod catalog;
pub mod config;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod format;
pub mod lifecycle;
pub mod operation;
pub mod orchestrator;
pub mod pool;
pub mod relation;
pub mod session;
pub mod sync;

pub use adapter::GlueAdapter;
pub use catalog::{CatalogFacade, CatalogService, TableDescriptor};
pub use config::{AdapterConfig, AdapterConfigBuilder};
pub use error::{AdapterError, Result, WriteAction};
pub use executor::{ExecutorProvider, OperationExecutor, PooledExecutorProvider};
pub use format::{FormatTag, TableFormat, TableState};
pub use lifecycle::{CatalogRow, LifecycleManager};
pub use operation::{Operation, QualifiedName, StageSpec, SyncOperation, WriteSpec};
pub use orchestrator::{
    decide, WriteIntent, WriteIntentBuilder, WriteMode, WriteOrchestrator, WriteOutcome,
};
pub use relation::{convert_type, Column, ColumnKind, Relation, RelationType};
pub use session::{Cursor, ExecutionSession, GlueSession, Row};
pub use sync::{CatalogSync, SyncOutcome};
