//! Error types for the adapter.

use lakebridge_catalog_client::ClientError;
use std::fmt;

/// The write step an error belongs to.
///
/// The tag returned by [`WriteAction::as_str`] is stable and safe to match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteAction {
    /// Materialize a new table
    Create,
    /// Insert into an existing table
    Append,
    /// Swap the table contents
    Replace,
    /// Keyed merge into an existing table
    Upsert,
    /// Snapshot maintenance
    ExpireSnapshots,
    /// Move a relation to a new name
    Rename,
}

impl WriteAction {
    /// Stable tag for this action.
    pub fn as_str(self) -> &'static str {
        match self {
            WriteAction::Create => "create",
            WriteAction::Append => "append",
            WriteAction::Replace => "replace",
            WriteAction::Upsert => "upsert",
            WriteAction::ExpireSnapshots => "expire_snapshots",
            WriteAction::Rename => "rename",
        }
    }
}

impl fmt::Display for WriteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the adapter.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// Schema or table is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// The catalog could not be reached or answered with a service error
    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// The execution engine rejected or failed a statement
    #[error("Remote execution failed: {message}")]
    RemoteExecution {
        /// Diagnostic text reported by the engine
        message: String,
    },

    /// A write step failed; the action tag says which one
    #[error("{action} failed for {relation}: {message}")]
    WriteFailed {
        /// Step that failed
        action: WriteAction,
        /// Target relation (`schema.identifier`)
        relation: String,
        /// Underlying diagnostic
        message: String,
    },

    /// The request is not legal for the table's current state
    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),

    /// Session could not be opened or the transport failed
    #[error("Session error: {0}")]
    Session(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AdapterError {
    /// Wrap an error raised during `action` on `relation`.
    ///
    /// Precondition violations keep their own variant so they are never
    /// mistaken for engine failures.
    pub fn write_failed(action: WriteAction, relation: impl fmt::Display, source: Self) -> Self {
        match source {
            AdapterError::PreconditionViolation(_) | AdapterError::WriteFailed { .. } => source,
            AdapterError::RemoteExecution { message } => AdapterError::WriteFailed {
                action,
                relation: relation.to_string(),
                message,
            },
            other => AdapterError::WriteFailed {
                action,
                relation: relation.to_string(),
                message: other.to_string(),
            },
        }
    }

    /// Action tag, if this is a write failure.
    pub fn action(&self) -> Option<WriteAction> {
        match self {
            AdapterError::WriteFailed { action, .. } => Some(*action),
            _ => None,
        }
    }

    /// Returns true for absent schemas or tables.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AdapterError::NotFound(_))
    }

    /// Map a catalog client error, keeping not-found distinct from outages.
    pub fn from_catalog(err: ClientError, what: impl fmt::Display) -> Self {
        if err.is_not_found() {
            AdapterError::NotFound(what.to_string())
        } else {
            AdapterError::CatalogUnavailable(format!("{}: {}", what, err))
        }
    }
}

/// Result type for adapter operations.
pub type Result<T> = std::result::Result<T, AdapterError>;
