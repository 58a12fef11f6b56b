//! Lakebridge Catalog Client
//!
//! An async HTTP client for the Glue Data Catalog, Lake Formation grants and
//! Glue interactive sessions. All three speak the JSON 1.1 action protocol:
//! every call is a `POST` to the service endpoint with the action named in the
//! `X-Amz-Target` header.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lakebridge_catalog_client::{ClientConfig, GlueClient};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = GlueClient::new(
//!         ClientConfig::builder("https://glue.eu-west-1.amazonaws.com")
//!             .region("eu-west-1")
//!             .timeout(Duration::from_secs(30))
//!             .build()?,
//!     )?;
//!
//!     for db in client.get_databases().await? {
//!         println!("{}", db.name);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Retries
//!
//! Read actions (`GetDatabases`, `GetTables`, `GetTable`, `GetStatement`) are
//! retried with exponential backoff on 5xx, 429 and connection failures.
//! Mutations and statement submission are sent exactly once.
//!
//! # Error Handling
//!
//! All operations return `Result<T, ClientError>`. Service exceptions are mapped
//! from the `__type` field of the error body:
//!
//! - `EntityNotFound`: database, table or statement doesn't exist
//! - `AlreadyExists`: create raced with another writer
//! - `AccessDenied`: missing permissions
//! - `Throttled`: request rate exceeded

pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use client::{Action, GlueClient, SharedClient};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{ClientError, Result};
pub use types::{
    ColumnDef, Database, DatabaseInput, ErrorDetail, GrantFailure, PermissionEntry, Principal,
    Resource, Statement, StatementOutput, StatementOutputData, StatementState, StorageDescriptor,
    Table, TableWildcard,
};
