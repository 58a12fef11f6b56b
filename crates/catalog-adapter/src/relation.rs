//! Uniform relation and column model.
//!
//! Relations are snapshots of what the catalog reported when they were read.
//! They are rebuilt on every catalog read and never refreshed in place.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Columns written by the merge-on-read format to track commit provenance.
pub const FORMAT_METADATA_COLUMNS: [&str; 5] = [
    "_hoodie_commit_time",
    "_hoodie_commit_seqno",
    "_hoodie_record_key",
    "_hoodie_partition_path",
    "_hoodie_file_name",
];

/// Logical type of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Table,
    View,
    Cte,
    MaterializedView,
    IcebergTable,
    /// Catalog reported a type this adapter does not know
    Unknown,
}

impl RelationType {
    /// Normalize a provider table type.
    ///
    /// Unrecognized values map to [`RelationType::Unknown`] instead of failing.
    pub fn from_catalog(raw: &str) -> Self {
        match raw {
            "EXTERNAL_TABLE" | "MANAGED_TABLE" | "table" => RelationType::Table,
            "VIRTUAL_VIEW" | "view" => RelationType::View,
            "cte" => RelationType::Cte,
            "materializedview" | "materialized_view" => RelationType::MaterializedView,
            "iceberg_table" => RelationType::IcebergTable,
            _ => RelationType::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RelationType::Table => "table",
            RelationType::View => "view",
            RelationType::Cte => "cte",
            RelationType::MaterializedView => "materialized_view",
            RelationType::IcebergTable => "iceberg_table",
            RelationType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalog relation.
///
/// Identity is `(schema, identifier)`; `database` always equals `schema` in
/// this catalog model and does not take part in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub database: String,
    pub schema: String,
    pub identifier: String,
    pub relation_type: RelationType,
}

impl Relation {
    pub fn create(
        database: impl Into<String>,
        schema: impl Into<String>,
        identifier: impl Into<String>,
        relation_type: RelationType,
    ) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            identifier: identifier.into(),
            relation_type,
        }
    }

    /// A table relation whose database is its schema.
    pub fn table(schema: impl Into<String>, identifier: impl Into<String>) -> Self {
        let schema = schema.into();
        Self::create(schema.clone(), schema, identifier, RelationType::Table)
    }

    /// A relation naming only a schema, for schema lifecycle calls.
    pub fn for_schema(schema: impl Into<String>) -> Self {
        Self::table(schema, "")
    }

    /// Rendering used inside statements: `schema.identifier`.
    pub fn qualified_name(&self) -> String {
        self.to_string()
    }
}

impl PartialEq for Relation {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.identifier == other.identifier
    }
}

impl Eq for Relation {}

impl Hash for Relation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.schema.hash(state);
        self.identifier.hash(state);
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.identifier.is_empty() {
            f.write_str(&self.schema)
        } else {
            write!(f, "{}.{}", self.schema, self.identifier)
        }
    }
}

/// A column as exposed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Canonical lowercase engine type
    pub declared_type: String,
}

impl Column {
    pub fn new(name: impl Into<String>, declared_type: impl AsRef<str>) -> Self {
        Self {
            name: name.into(),
            declared_type: canonical_type(declared_type.as_ref()),
        }
    }

    /// True for bookkeeping columns of the merge-on-read format.
    pub fn is_format_metadata(&self) -> bool {
        FORMAT_METADATA_COLUMNS.contains(&self.name.as_str())
    }
}

/// Lowercase, whitespace-free form of an engine type string.
pub fn canonical_type(raw: &str) -> String {
    raw.split_whitespace().collect::<String>().to_ascii_lowercase()
}

/// Kind of a column inferred from tabular seed data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    /// Number; `has_decimals` is true if any value has a fractional part
    Number { has_decimals: bool },
    Boolean,
    Date,
    Time,
    DateTime,
}

/// Engine type name for an inferred column kind.
pub fn convert_type(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Text => "string",
        ColumnKind::Number { has_decimals: true } => "double",
        ColumnKind::Number { has_decimals: false } => "bigint",
        ColumnKind::Boolean => "boolean",
        ColumnKind::Date => "date",
        ColumnKind::Time => "time",
        ColumnKind::DateTime => "timestamp",
    }
}
