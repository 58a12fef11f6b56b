//! Request and response types for the catalog, permission and session APIs.
//!
//! Field names follow the service wire format (PascalCase JSON).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A catalog database.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Database {
    /// Database name
    pub name: String,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Default storage location for tables in this database
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_uri: Option<String>,
    /// Database parameters
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub parameters: HashMap<String, String>,
}

/// Input for `CreateDatabase`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct DatabaseInput {
    /// Database name
    pub name: String,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Default storage location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_uri: Option<String>,
}

/// A table column as stored in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ColumnDef {
    /// Column name
    pub name: String,
    /// Engine type string
    #[serde(default, rename = "Type", skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

/// Physical storage information of a table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct StorageDescriptor {
    /// Data location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Non-partition columns
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnDef>,
}

/// A catalog table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Table {
    /// Table name
    pub name: String,
    /// Owning database
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_name: Option<String>,
    /// Provider table type (`EXTERNAL_TABLE`, `MANAGED_TABLE`, `VIRTUAL_VIEW`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_type: Option<String>,
    /// Table parameters, including format markers
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub parameters: HashMap<String, String>,
    /// Partition columns
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partition_keys: Vec<ColumnDef>,
    /// Storage information
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_descriptor: Option<StorageDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct GetDatabasesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct GetDatabasesResponse {
    #[serde(default)]
    pub database_list: Vec<Database>,
    #[serde(default)]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct GetTablesRequest {
    pub database_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct GetTablesResponse {
    #[serde(default)]
    pub table_list: Vec<Table>,
    #[serde(default)]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct GetTableRequest {
    pub database_name: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct GetTableResponse {
    pub table: Table,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct CreateDatabaseRequest {
    pub database_input: DatabaseInput,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct DeleteDatabaseRequest {
    pub name: String,
}

/// Empty response body (`{}`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct EmptyResponse {}

// ============================================================================
// Permissions
// ============================================================================

/// Principal receiving a grant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Principal {
    /// Role or user ARN
    pub data_lake_principal_identifier: String,
}

/// Resource a grant applies to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub enum Resource {
    /// A whole database
    Database {
        /// Database name
        #[serde(rename = "Name")]
        name: String,
    },
    /// Every current and future table of a database
    Table {
        /// Database name
        #[serde(rename = "DatabaseName")]
        database_name: String,
        /// Always `{}`; marks the wildcard
        #[serde(rename = "TableWildcard")]
        table_wildcard: TableWildcard,
        /// Owning catalog (account id)
        #[serde(rename = "CatalogId", skip_serializing_if = "Option::is_none")]
        catalog_id: Option<String>,
    },
}

/// Marker object for table wildcards.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TableWildcard {}

/// One entry of a batch grant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct PermissionEntry {
    /// Caller-chosen unique entry id
    pub id: String,
    /// Grantee
    pub principal: Principal,
    /// Target resource
    pub resource: Resource,
    /// Permissions granted
    pub permissions: Vec<String>,
    /// Permissions the grantee may pass on
    #[serde(default)]
    pub permissions_with_grant_option: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct BatchGrantPermissionsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<String>,
    pub entries: Vec<PermissionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct BatchGrantPermissionsResponse {
    #[serde(default)]
    pub failures: Vec<GrantFailure>,
}

/// An entry of a batch grant that was not applied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct GrantFailure {
    /// The rejected entry
    #[serde(default)]
    pub request_entry: Option<serde_json::Value>,
    /// Service error detail
    #[serde(default)]
    pub error: Option<ErrorDetail>,
}

/// Error detail attached to a batch failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorDetail {
    /// Error code
    #[serde(default)]
    pub error_code: Option<String>,
    /// Error message
    #[serde(default)]
    pub error_message: Option<String>,
}

// ============================================================================
// Interactive sessions
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RunStatementRequest {
    pub session_id: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RunStatementResponse {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct GetStatementRequest {
    pub session_id: String,
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct GetStatementResponse {
    pub statement: Statement,
}

/// Lifecycle state of a submitted statement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementState {
    /// Queued
    Waiting,
    /// Executing
    Running,
    /// Finished; output is available
    Available,
    /// Cancellation requested
    Cancelling,
    /// Cancelled before completion
    Cancelled,
    /// Failed
    Error,
}

impl StatementState {
    /// True once the statement will not change state again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StatementState::Available | StatementState::Cancelled | StatementState::Error
        )
    }
}

/// A statement submitted to an interactive session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    /// Statement id within the session
    pub id: i64,
    /// Current state
    pub state: StatementState,
    /// Output, once available
    #[serde(default)]
    pub output: Option<StatementOutput>,
}

/// Output of a finished statement.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct StatementOutput {
    /// Printed output
    #[serde(default)]
    pub data: Option<StatementOutputData>,
    /// `ok` or `error`
    #[serde(default)]
    pub status: Option<String>,
    /// Exception class raised by the code
    #[serde(default)]
    pub error_name: Option<String>,
    /// Exception message raised by the code
    #[serde(default)]
    pub error_value: Option<String>,
    /// Stack trace lines
    #[serde(default)]
    pub traceback: Vec<String>,
}

impl StatementOutput {
    /// True if the code itself raised, even though the statement completed.
    pub fn is_error(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("error"))
            || self.error_name.is_some()
    }
}

/// Printed data of a statement.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StatementOutputData {
    /// Plain-text stdout
    #[serde(rename = "TextPlain", default)]
    pub text_plain: Option<String>,
}

/// Error body returned by the services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiError {
    #[serde(rename = "__type", default)]
    pub kind: Option<String>,
    #[serde(rename = "Message", alias = "message", default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_deserialize() {
        let json = r#"{
            "Name": "events",
            "DatabaseName": "analytics",
            "TableType": "EXTERNAL_TABLE",
            "Parameters": {"table_type": "ICEBERG"},
            "PartitionKeys": [{"Name": "dt", "Type": "string"}],
            "StorageDescriptor": {"Location": "s3://bucket/analytics/events"}
        }"#;

        let table: Table = serde_json::from_str(json).unwrap();
        assert_eq!(table.name, "events");
        assert_eq!(table.table_type.as_deref(), Some("EXTERNAL_TABLE"));
        assert_eq!(table.parameters.get("table_type").unwrap(), "ICEBERG");
        assert_eq!(table.partition_keys[0].name, "dt");
        assert_eq!(
            table.storage_descriptor.unwrap().location.as_deref(),
            Some("s3://bucket/analytics/events")
        );
    }

    #[test]
    fn test_table_wildcard_resource_serialize() {
        let resource = Resource::Table {
            database_name: "analytics".to_string(),
            table_wildcard: TableWildcard {},
            catalog_id: Some("123456789012".to_string()),
        };
        let value = serde_json::to_value(&resource).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "Table": {
                    "DatabaseName": "analytics",
                    "TableWildcard": {},
                    "CatalogId": "123456789012"
                }
            })
        );
    }

    #[test]
    fn test_statement_output_error_detection() {
        let json = r#"{
            "Id": 3,
            "State": "AVAILABLE",
            "Output": {
                "Status": "error",
                "ErrorName": "AnalysisException",
                "ErrorValue": "Table not found"
            }
        }"#;
        let statement: Statement = serde_json::from_str(json).unwrap();
        assert!(statement.state.is_terminal());
        assert!(statement.output.unwrap().is_error());
    }

    #[test]
    fn test_api_error_deserialize() {
        let json = r#"{"__type": "EntityNotFoundException", "Message": "Database x not found"}"#;
        let error: ApiError = serde_json::from_str(json).unwrap();
        assert_eq!(error.kind.as_deref(), Some("EntityNotFoundException"));
        assert_eq!(error.message.as_deref(), Some("Database x not found"));
    }
}
