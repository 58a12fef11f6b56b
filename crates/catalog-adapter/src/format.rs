//! Table format classification.
//!
//! Raw catalog strings are parsed once into [`FormatTag`] here; everything
//! downstream switches on the tag.

use crate::catalog::TableDescriptor;
use crate::error::{AdapterError, Result};
use crate::relation::{Relation, RelationType};
use std::fmt;
use std::str::FromStr;

/// Parameter holding the transactional format marker.
pub const FORMAT_PROPERTY: &str = "table_type";
/// Marker value of the copy-on-write transactional format.
pub const COPY_ON_WRITE_MARKER: &str = "iceberg";
/// Marker value of the merge-on-read transactional format.
pub const MERGE_ON_READ_MARKER: &str = "hudi";
/// Spark data source provider parameter.
pub const PROVIDER_PROPERTY: &str = "spark.sql.sources.provider";
/// Prefix of parameters written by the merge-on-read format's catalog sync.
const MERGE_ON_READ_PARAMETER_PREFIX: &str = "hoodie.";

/// Physical format of an existing table, as inferred from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatTag {
    Plain,
    PartitionedPlain,
    TransactionalCopyOnWrite,
    TransactionalMergeOnRead,
}

impl FormatTag {
    /// Classify a table descriptor.
    ///
    /// A transactional marker wins over the raw catalog type.
    pub fn from_descriptor(table: &TableDescriptor) -> Self {
        let marker = table
            .parameters
            .get(FORMAT_PROPERTY)
            .map(|v| v.to_ascii_lowercase());
        let provider = table
            .parameters
            .get(PROVIDER_PROPERTY)
            .map(|v| v.to_ascii_lowercase());

        if marker.as_deref() == Some(COPY_ON_WRITE_MARKER) {
            return FormatTag::TransactionalCopyOnWrite;
        }
        if marker.as_deref() == Some(MERGE_ON_READ_MARKER)
            || provider.as_deref() == Some(MERGE_ON_READ_MARKER)
            || table
                .parameters
                .keys()
                .any(|k| k.starts_with(MERGE_ON_READ_PARAMETER_PREFIX))
        {
            return FormatTag::TransactionalMergeOnRead;
        }
        if table.partition_keys.is_empty() {
            FormatTag::Plain
        } else {
            FormatTag::PartitionedPlain
        }
    }

    /// Row-level merge support.
    pub fn supports_merge(self) -> bool {
        matches!(
            self,
            FormatTag::TransactionalCopyOnWrite | FormatTag::TransactionalMergeOnRead
        )
    }

    pub fn is_transactional(self) -> bool {
        self.supports_merge()
    }

    /// Logical type reported for a table of this format.
    pub fn relation_type(self, base: RelationType) -> RelationType {
        match (self, base) {
            (FormatTag::TransactionalCopyOnWrite, RelationType::Table) => {
                RelationType::IcebergTable
            }
            (_, base) => base,
        }
    }
}

/// What the catalog says about an existing write target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableState {
    pub tag: FormatTag,
    /// Declared data source provider, when the catalog records one
    pub provider: Option<TableFormat>,
}

impl TableState {
    pub fn from_descriptor(table: &TableDescriptor) -> Self {
        Self {
            tag: FormatTag::from_descriptor(table),
            provider: table
                .parameters
                .get(PROVIDER_PROPERTY)
                .and_then(|v| TableFormat::from_provider(v)),
        }
    }

    /// Reject a `format` write that would change what `table` is.
    ///
    /// Plain formats share a tag, so the recorded provider decides between
    /// them.
    pub fn check_format(&self, table: &Relation, format: TableFormat) -> Result<()> {
        let current = match self.provider {
            _ if !format.is_compatible_with(self.tag) => self.tag.to_string(),
            Some(provider) if !self.tag.is_transactional() && provider != format => {
                provider.to_string()
            }
            _ => return Ok(()),
        };
        Err(AdapterError::PreconditionViolation(format!(
            "{} is a {} table; a {} write cannot change its format",
            table, current, format
        )))
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormatTag::Plain => "plain",
            FormatTag::PartitionedPlain => "partitioned_plain",
            FormatTag::TransactionalCopyOnWrite => "transactional_copy_on_write",
            FormatTag::TransactionalMergeOnRead => "transactional_merge_on_read",
        };
        f.write_str(name)
    }
}

/// Format a caller declares for a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableFormat {
    /// Plain Spark data source table
    Parquet,
    /// Legacy format whose catalog view is a derived symlink manifest
    Delta,
    /// Copy-on-write transactional format
    Iceberg,
    /// Merge-on-read transactional format
    Hudi,
}

impl TableFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            TableFormat::Parquet => "parquet",
            TableFormat::Delta => "delta",
            TableFormat::Iceberg => "iceberg",
            TableFormat::Hudi => "hudi",
        }
    }

    /// Format named by a catalog provider parameter, if recognised.
    pub fn from_provider(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "parquet" => Some(TableFormat::Parquet),
            "delta" => Some(TableFormat::Delta),
            "iceberg" => Some(TableFormat::Iceberg),
            "hudi" => Some(TableFormat::Hudi),
            _ => None,
        }
    }

    /// Tag a table created with this format will carry.
    pub fn expected_tag(self, partitioned: bool) -> FormatTag {
        match self {
            TableFormat::Iceberg => FormatTag::TransactionalCopyOnWrite,
            TableFormat::Hudi => FormatTag::TransactionalMergeOnRead,
            TableFormat::Parquet | TableFormat::Delta if partitioned => {
                FormatTag::PartitionedPlain
            }
            TableFormat::Parquet | TableFormat::Delta => FormatTag::Plain,
        }
    }

    /// Whether writes of this format may target a table carrying `tag`.
    pub fn is_compatible_with(self, tag: FormatTag) -> bool {
        match self {
            TableFormat::Iceberg => tag == FormatTag::TransactionalCopyOnWrite,
            TableFormat::Hudi => tag == FormatTag::TransactionalMergeOnRead,
            TableFormat::Parquet | TableFormat::Delta => {
                matches!(tag, FormatTag::Plain | FormatTag::PartitionedPlain)
            }
        }
    }

    pub fn supports_merge(self) -> bool {
        matches!(self, TableFormat::Iceberg | TableFormat::Hudi)
    }

    /// Whether the format's locations carry a trailing slash.
    pub(crate) fn uses_trailing_slash(self) -> bool {
        matches!(self, TableFormat::Parquet | TableFormat::Hudi)
    }

    /// Column stamped with the write time during staging, if any.
    pub fn audit_column(self) -> Option<&'static str> {
        match self {
            TableFormat::Iceberg => Some("update_iceberg_ts"),
            TableFormat::Hudi => Some("update_hudi_ts"),
            TableFormat::Parquet | TableFormat::Delta => None,
        }
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableFormat {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "parquet" => Ok(TableFormat::Parquet),
            "delta" => Ok(TableFormat::Delta),
            "iceberg" => Ok(TableFormat::Iceberg),
            "hudi" => Ok(TableFormat::Hudi),
            other => Err(AdapterError::Config(format!("unknown table format '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn descriptor(parameters: &[(&str, &str)], partition_keys: &[&str]) -> TableDescriptor {
        TableDescriptor {
            schema: "analytics".to_string(),
            name: "events".to_string(),
            relation_type: RelationType::Table,
            parameters: parameters
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            partition_keys: partition_keys.iter().map(|k| k.to_string()).collect(),
            location: None,
        }
    }

    #[test]
    fn test_marker_wins_over_catalog_type() {
        let table = descriptor(&[("table_type", "ICEBERG")], &["dt"]);
        assert_eq!(
            FormatTag::from_descriptor(&table),
            FormatTag::TransactionalCopyOnWrite
        );
    }

    #[test]
    fn test_merge_on_read_detection() {
        let by_provider = descriptor(&[("spark.sql.sources.provider", "hudi")], &[]);
        assert_eq!(
            FormatTag::from_descriptor(&by_provider),
            FormatTag::TransactionalMergeOnRead
        );

        let by_parameter = descriptor(&[("hoodie.table.name", "events")], &[]);
        assert_eq!(
            FormatTag::from_descriptor(&by_parameter),
            FormatTag::TransactionalMergeOnRead
        );
    }

    #[test]
    fn test_plain_and_partitioned() {
        assert_eq!(FormatTag::from_descriptor(&descriptor(&[], &[])), FormatTag::Plain);
        let delta = descriptor(&[("spark.sql.sources.provider", "delta")], &["dt"]);
        assert_eq!(FormatTag::from_descriptor(&delta), FormatTag::PartitionedPlain);
    }

    #[test]
    fn test_compatibility() {
        assert!(TableFormat::Iceberg.is_compatible_with(FormatTag::TransactionalCopyOnWrite));
        assert!(!TableFormat::Iceberg.is_compatible_with(FormatTag::Plain));
        assert!(!TableFormat::Hudi.is_compatible_with(FormatTag::TransactionalCopyOnWrite));
        assert!(TableFormat::Delta.is_compatible_with(FormatTag::PartitionedPlain));
        assert!(!TableFormat::Parquet.is_compatible_with(FormatTag::TransactionalMergeOnRead));
    }

    fn events() -> Relation {
        Relation::table("analytics", "events")
    }

    #[test]
    fn test_plain_provider_is_sticky() {
        let parquet = TableState::from_descriptor(&descriptor(
            &[("spark.sql.sources.provider", "PARQUET")],
            &["dt"],
        ));
        assert_eq!(parquet.provider, Some(TableFormat::Parquet));
        assert!(parquet.check_format(&events(), TableFormat::Parquet).is_ok());
        assert!(matches!(
            parquet.check_format(&events(), TableFormat::Delta),
            Err(AdapterError::PreconditionViolation(_))
        ));

        let delta = TableState::from_descriptor(&descriptor(
            &[("spark.sql.sources.provider", "delta")],
            &[],
        ));
        assert!(delta.check_format(&events(), TableFormat::Delta).is_ok());
        assert!(delta.check_format(&events(), TableFormat::Parquet).is_err());
    }

    #[test]
    fn test_unrecorded_provider_accepts_any_plain_format() {
        let table = TableState::from_descriptor(&descriptor(&[], &[]));
        assert_eq!(table.provider, None);
        assert!(table.check_format(&events(), TableFormat::Parquet).is_ok());
        assert!(table.check_format(&events(), TableFormat::Delta).is_ok());
        assert!(table.check_format(&events(), TableFormat::Iceberg).is_err());
    }

    #[test]
    fn test_expected_tag_round_trips_compatibility() {
        for format in [
            TableFormat::Parquet,
            TableFormat::Delta,
            TableFormat::Iceberg,
            TableFormat::Hudi,
        ] {
            for partitioned in [false, true] {
                assert!(format.is_compatible_with(format.expected_tag(partitioned)));
            }
        }
    }

    #[test]
    fn test_relation_type_for_copy_on_write() {
        assert_eq!(
            FormatTag::TransactionalCopyOnWrite.relation_type(RelationType::Table),
            RelationType::IcebergTable
        );
        assert_eq!(
            FormatTag::TransactionalMergeOnRead.relation_type(RelationType::Table),
            RelationType::Table
        );
    }

    #[test]
    fn test_parse_format() {
        assert_eq!("ICEBERG".parse::<TableFormat>().unwrap(), TableFormat::Iceberg);
        assert!("orc".parse::<TableFormat>().is_err());
    }
}
