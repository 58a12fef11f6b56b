//! HTTP client with retry logic for the catalog, permission and session APIs.

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::types::{
    ApiError, BatchGrantPermissionsRequest, BatchGrantPermissionsResponse, CreateDatabaseRequest,
    Database, DatabaseInput, DeleteDatabaseRequest, EmptyResponse, GetDatabasesRequest,
    GetDatabasesResponse, GetStatementRequest, GetStatementResponse, GetTableRequest,
    GetTableResponse, GetTablesRequest, GetTablesResponse, GrantFailure, PermissionEntry,
    RunStatementRequest, RunStatementResponse, Statement, Table,
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{
    policies::ExponentialBackoff, RetryTransientMiddleware, Retryable, RetryableStrategy,
};
use std::sync::Arc;

/// Content type of the JSON action protocol.
const JSON_PROTOCOL: &str = "application/x-amz-json-1.1";

/// Header carrying the action name.
pub const TARGET_HEADER: &str = "x-amz-target";

/// Service actions this client can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    GetDatabases,
    GetTables,
    GetTable,
    CreateDatabase,
    DeleteDatabase,
    BatchGrantPermissions,
    RunStatement,
    GetStatement,
}

impl Action {
    /// Value of the target header for this action.
    pub fn target(self) -> &'static str {
        match self {
            Action::GetDatabases => "AWSGlue.GetDatabases",
            Action::GetTables => "AWSGlue.GetTables",
            Action::GetTable => "AWSGlue.GetTable",
            Action::CreateDatabase => "AWSGlue.CreateDatabase",
            Action::DeleteDatabase => "AWSGlue.DeleteDatabase",
            Action::BatchGrantPermissions => "AWSLakeFormation.BatchGrantPermissions",
            Action::RunStatement => "AWSGlue.RunStatement",
            Action::GetStatement => "AWSGlue.GetStatement",
        }
    }

    /// Reads are safe to replay; mutations and statement submission are not.
    pub fn is_idempotent(self) -> bool {
        matches!(
            self,
            Action::GetDatabases | Action::GetTables | Action::GetTable | Action::GetStatement
        )
    }
}

/// Catalog and session client with automatic retries on reads.
pub struct GlueClient {
    /// Retrying client, used for idempotent actions only
    http: ClientWithMiddleware,
    /// Same transport without the retry layer
    http_once: ClientWithMiddleware,
    config: ClientConfig,
}

impl GlueClient {
    /// Create a new client builder with the given endpoint.
    pub fn builder(endpoint: impl Into<String>) -> crate::config::ClientConfigBuilder {
        crate::config::ClientConfigBuilder::new(endpoint)
    }

    /// Create a new client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_PROTOCOL));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("lakebridge-client")),
        );

        if let Some(ref token) = config.session_token {
            let auth_value = format!("Bearer {}", token);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|_| ClientError::Config("Invalid session token format".to_string()))?,
            );
        }

        let reqwest_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.tls_verify)
            .build()?;

        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(config.retry_initial_delay, config.retry_max_delay)
            .build_with_max_retries(config.max_retries);

        let http = ClientBuilder::new(reqwest_client.clone())
            .with(RetryTransientMiddleware::new_with_policy_and_strategy(
                retry_policy,
                CatalogRetryStrategy,
            ))
            .build();
        let http_once = ClientBuilder::new(reqwest_client).build();

        Ok(Self {
            http,
            http_once,
            config,
        })
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // =========================================================================
    // Catalog Operations
    // =========================================================================

    /// List every database in the catalog, following pagination.
    pub async fn get_databases(&self) -> Result<Vec<Database>> {
        let mut databases = Vec::new();
        let mut next_token = None;
        loop {
            let response: GetDatabasesResponse = self
                .call(Action::GetDatabases, &GetDatabasesRequest { next_token })
                .await?;
            databases.extend(response.database_list);
            match response.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }
        Ok(databases)
    }

    /// List every table of a database, following pagination.
    pub async fn get_tables(&self, database: &str) -> Result<Vec<Table>> {
        let mut tables = Vec::new();
        let mut next_token = None;
        loop {
            let request = GetTablesRequest {
                database_name: database.to_string(),
                next_token,
            };
            let response: GetTablesResponse = self.call(Action::GetTables, &request).await?;
            tables.extend(response.table_list);
            match response.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }
        Ok(tables)
    }

    /// Get one table.
    pub async fn get_table(&self, database: &str, name: &str) -> Result<Table> {
        let request = GetTableRequest {
            database_name: database.to_string(),
            name: name.to_string(),
        };
        let response: GetTableResponse = self.call(Action::GetTable, &request).await?;
        Ok(response.table)
    }

    /// Create a database.
    pub async fn create_database(&self, input: DatabaseInput) -> Result<()> {
        let _: EmptyResponse = self
            .call(
                Action::CreateDatabase,
                &CreateDatabaseRequest {
                    database_input: input,
                },
            )
            .await?;
        Ok(())
    }

    /// Delete a database and its tables.
    pub async fn delete_database(&self, name: &str) -> Result<()> {
        let _: EmptyResponse = self
            .call(
                Action::DeleteDatabase,
                &DeleteDatabaseRequest {
                    name: name.to_string(),
                },
            )
            .await?;
        Ok(())
    }

    /// Grant permissions in one batch; returns the entries that were rejected.
    pub async fn batch_grant_permissions(
        &self,
        catalog_id: Option<String>,
        entries: Vec<PermissionEntry>,
    ) -> Result<Vec<GrantFailure>> {
        let request = BatchGrantPermissionsRequest {
            catalog_id,
            entries,
        };
        let response: BatchGrantPermissionsResponse =
            self.call(Action::BatchGrantPermissions, &request).await?;
        Ok(response.failures)
    }

    // =========================================================================
    // Session Operations
    // =========================================================================

    /// Submit code to an interactive session; returns the statement id.
    pub async fn run_statement(&self, session_id: &str, code: &str) -> Result<i64> {
        let request = RunStatementRequest {
            session_id: session_id.to_string(),
            code: code.to_string(),
        };
        let response: RunStatementResponse = self.call(Action::RunStatement, &request).await?;
        Ok(response.id)
    }

    /// Fetch the state and output of a statement.
    pub async fn get_statement(&self, session_id: &str, id: i64) -> Result<Statement> {
        let request = GetStatementRequest {
            session_id: session_id.to_string(),
            id,
        };
        let response: GetStatementResponse = self.call(Action::GetStatement, &request).await?;
        Ok(response.statement)
    }

    // =========================================================================
    // Internal HTTP Methods
    // =========================================================================

    /// Invoke an action and deserialize the response.
    async fn call<B, T>(&self, action: Action, body: &B) -> Result<T>
    where
        B: serde::Serialize,
        T: serde::de::DeserializeOwned,
    {
        let url = match action {
            Action::BatchGrantPermissions => self.config.permissions_endpoint(),
            _ => self.config.endpoint.as_str(),
        };
        let http = if action.is_idempotent() {
            &self.http
        } else {
            &self.http_once
        };
        let start = std::time::Instant::now();

        tracing::debug!(action = %action.target(), "Sending request");

        let json_body = serde_json::to_vec(body)?;
        let response = http
            .post(url)
            .header(TARGET_HEADER, action.target())
            .body(json_body)
            .send()
            .await?;
        let status = response.status();
        let duration = start.elapsed();

        let request_id = response
            .headers()
            .get("x-amzn-requestid")
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        tracing::debug!(
            action = %action.target(),
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            request_id = ?request_id,
            "Received response"
        );

        let body = response.bytes().await?;
        if status.is_success() {
            let body: &[u8] = if body.is_empty() { b"{}" } else { &body };
            serde_json::from_slice(body).map_err(|e| {
                ClientError::InvalidResponse(format!(
                    "Failed to parse {} response: {} (body: {})",
                    action.target(),
                    e,
                    String::from_utf8_lossy(body)
                ))
            })
        } else {
            let api_error: Option<ApiError> = serde_json::from_slice(&body).ok();
            let kind = api_error
                .as_ref()
                .and_then(|e| e.kind.clone())
                .unwrap_or_else(|| status.to_string());
            let message = api_error
                .and_then(|e| e.message)
                .unwrap_or_else(|| String::from_utf8_lossy(&body).to_string());

            // Missing entities are an expected answer to existence checks.
            if status == StatusCode::BAD_REQUEST && kind.ends_with("EntityNotFoundException") {
                tracing::debug!(action = %action.target(), error = %message, "Entity not found");
            } else {
                tracing::warn!(
                    action = %action.target(),
                    status = %status.as_u16(),
                    duration_ms = %duration.as_millis(),
                    request_id = ?request_id,
                    kind = %kind,
                    error = %message,
                    "Request failed"
                );
            }

            Err(ClientError::from_exception(
                status.as_u16(),
                &kind,
                message,
                request_id,
            ))
        }
    }
}

/// Retry strategy for the catalog services.
///
/// Retries on:
/// - Transient network errors
/// - 5xx server errors
/// - 429 rate limiting
///
/// Does NOT retry:
/// - 4xx client errors (except 429)
///
/// Only attached to the client used for idempotent actions.
struct CatalogRetryStrategy;

impl RetryableStrategy for CatalogRetryStrategy {
    fn handle(&self, res: &reqwest_middleware::Result<reqwest::Response>) -> Option<Retryable> {
        match res {
            Ok(response) => {
                let status = response.status();
                if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                    Some(Retryable::Transient)
                } else if status.is_success() {
                    None
                } else {
                    Some(Retryable::Fatal)
                }
            }
            Err(error) => {
                if error.is_timeout() || error.is_connect() {
                    Some(Retryable::Transient)
                } else {
                    Some(Retryable::Fatal)
                }
            }
        }
    }
}

/// Arc-wrapped client for shared ownership.
pub type SharedClient = Arc<GlueClient>;
