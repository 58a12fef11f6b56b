//! Closed set of engine operations.
//!
//! Each variant carries only the structured parameters its step needs.
//! Decision logic builds these values; a [`Dialect`](crate::dialect::Dialect)
//! renders them to engine text at the execution boundary.

use crate::error::WriteAction;
use crate::format::TableFormat;
use crate::relation::Relation;
use std::collections::BTreeMap;
use std::fmt;

/// `schema.name` of a physical table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub schema: String,
    pub name: String,
}

impl QualifiedName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Parse `schema.name`; both parts must be non-empty.
    pub fn parse(qualified: &str) -> Option<Self> {
        let (schema, name) = qualified.split_once('.')?;
        if schema.is_empty() || name.is_empty() || name.contains('.') {
            return None;
        }
        Some(Self::new(schema, name))
    }
}

impl From<&Relation> for QualifiedName {
    fn from(relation: &Relation) -> Self {
        Self::new(relation.schema.clone(), relation.identifier.clone())
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Stage a source query as a temporary view in the current session.
///
/// Returns one row holding the staged row count.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSpec {
    pub view: String,
    pub source_query: String,
    /// Column stamped with the current timestamp, if any
    pub audit_column: Option<String>,
}

/// Parameters shared by every data write.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteSpec {
    pub table: QualifiedName,
    pub format: TableFormat,
    /// Resolved storage location
    pub location: String,
    /// Staged view holding the rows to write
    pub source_view: String,
    pub partition_by: Vec<String>,
    pub primary_key: Vec<String>,
    /// Table properties recorded in the catalog
    pub properties: BTreeMap<String, String>,
    /// Format writer options; override adapter defaults key by key
    pub options: BTreeMap<String, String>,
}

/// Catalog visibility steps run after a storage write.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOperation {
    /// Invalidate cached metadata of a table
    RefreshTable {
        table: QualifiedName,
        /// Refresh through the transactional catalog
        transactional_catalog: bool,
    },
    /// Regenerate the symlink manifest of a legacy-format table
    GenerateManifest { location: String },
    /// Register the manifest-backed table if it is missing
    EnsureManifestTable {
        table: QualifiedName,
        location: String,
        partition_by: Vec<String>,
    },
    /// Discover partitions written since the last repair
    RepairTable { table: QualifiedName },
}

/// One engine operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Stage(StageSpec),
    /// Rows are `[name, type, comment]`
    Describe {
        table: QualifiedName,
        transactional_catalog: bool,
    },
    Create(WriteSpec),
    Append(WriteSpec),
    Replace(WriteSpec),
    Upsert(WriteSpec),
    Sync(SyncOperation),
    /// Rows are `[committed_at]`, newest first
    ListSnapshots { table: QualifiedName },
    ExpireSnapshots {
        table: QualifiedName,
        /// Snapshots committed strictly before this timestamp are removed
        older_than: String,
        retain_last: u32,
    },
    /// Copy rows to a plain table at `location`, then drop `from`
    Rename {
        from: QualifiedName,
        to: QualifiedName,
        location: String,
    },
}

impl Operation {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Stage(_) => "stage",
            Operation::Describe { .. } => "describe",
            Operation::Create(_) => "create",
            Operation::Append(_) => "append",
            Operation::Replace(_) => "replace",
            Operation::Upsert(_) => "upsert",
            Operation::Sync(SyncOperation::RefreshTable { .. }) => "refresh_table",
            Operation::Sync(SyncOperation::GenerateManifest { .. }) => "generate_manifest",
            Operation::Sync(SyncOperation::EnsureManifestTable { .. }) => "ensure_manifest_table",
            Operation::Sync(SyncOperation::RepairTable { .. }) => "repair_table",
            Operation::ListSnapshots { .. } => "list_snapshots",
            Operation::ExpireSnapshots { .. } => "expire_snapshots",
            Operation::Rename { .. } => "rename",
        }
    }

    /// Write action this operation performs, if it mutates data.
    pub fn action(&self) -> Option<WriteAction> {
        match self {
            Operation::Create(_) => Some(WriteAction::Create),
            Operation::Append(_) => Some(WriteAction::Append),
            Operation::Replace(_) => Some(WriteAction::Replace),
            Operation::Upsert(_) => Some(WriteAction::Upsert),
            Operation::ExpireSnapshots { .. } => Some(WriteAction::ExpireSnapshots),
            Operation::Rename { .. } => Some(WriteAction::Rename),
            Operation::Stage(_)
            | Operation::Describe { .. }
            | Operation::Sync(_)
            | Operation::ListSnapshots { .. } => None,
        }
    }

    /// Build the data write for `action` from its parameters.
    ///
    /// Returns `None` for actions that are not data writes.
    pub fn write(action: WriteAction, spec: WriteSpec) -> Option<Self> {
        match action {
            WriteAction::Create => Some(Operation::Create(spec)),
            WriteAction::Append => Some(Operation::Append(spec)),
            WriteAction::Replace => Some(Operation::Replace(spec)),
            WriteAction::Upsert => Some(Operation::Upsert(spec)),
            WriteAction::ExpireSnapshots | WriteAction::Rename => None,
        }
    }
}
