//! Catalog synchronization after storage writes.
//!
//! Sync is best-effort: data is durable once the write returns, so a failed
//! step is logged and reported in the [`SyncOutcome`], never raised. Every
//! step is idempotent and safe to re-run.

use crate::executor::OperationExecutor;
use crate::format::TableFormat;
use crate::operation::{Operation, QualifiedName, SyncOperation};

/// Table whose catalog view must catch up with storage.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncTarget {
    pub table: QualifiedName,
    pub format: TableFormat,
    pub location: String,
    pub partition_by: Vec<String>,
}

/// Result of one sync run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncOutcome {
    /// Steps that completed, in order
    pub completed: Vec<&'static str>,
    /// Diagnostic of the step that failed, if any
    pub error: Option<String>,
}

impl SyncOutcome {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Plans and runs catalog sync steps.
#[derive(Debug, Clone, Default)]
pub struct CatalogSync {
    manifest_table_prefix: Option<String>,
}

impl CatalogSync {
    pub fn new(manifest_table_prefix: Option<String>) -> Self {
        Self {
            manifest_table_prefix,
        }
    }

    /// Name of the manifest-backed table derived from `table`.
    pub fn manifest_table(&self, table: &QualifiedName) -> Option<QualifiedName> {
        self.manifest_table_prefix.as_ref().map(|prefix| {
            QualifiedName::new(table.schema.clone(), format!("{}_{}", prefix, table.name))
        })
    }

    /// Steps that make the catalog view of `target` match storage.
    pub fn plan(&self, target: &SyncTarget) -> Vec<SyncOperation> {
        match target.format {
            TableFormat::Iceberg => vec![SyncOperation::RefreshTable {
                table: target.table.clone(),
                transactional_catalog: true,
            }],
            TableFormat::Delta => match self.manifest_table(&target.table) {
                Some(manifest) => vec![
                    SyncOperation::GenerateManifest {
                        location: target.location.clone(),
                    },
                    SyncOperation::EnsureManifestTable {
                        table: manifest.clone(),
                        location: target.location.clone(),
                        partition_by: target.partition_by.clone(),
                    },
                    SyncOperation::RepairTable { table: manifest },
                ],
                None => vec![SyncOperation::RefreshTable {
                    table: target.table.clone(),
                    transactional_catalog: false,
                }],
            },
            TableFormat::Hudi | TableFormat::Parquet => vec![SyncOperation::RefreshTable {
                table: target.table.clone(),
                transactional_catalog: false,
            }],
        }
    }

    /// Run the planned steps, stopping at the first failure.
    pub async fn run(&self, executor: &dyn OperationExecutor, target: &SyncTarget) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();
        for step in self.plan(target) {
            let op = Operation::Sync(step);
            match executor.run(&op).await {
                Ok(_) => outcome.completed.push(op.kind()),
                Err(e) => {
                    tracing::warn!(
                        table = %target.table,
                        step = op.kind(),
                        error = %e,
                        "Catalog sync failed; data is written but may not be visible yet"
                    );
                    outcome.error = Some(e.to_string());
                    break;
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AdapterError, Result};
    use crate::session::Row;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    fn target(format: TableFormat) -> SyncTarget {
        SyncTarget {
            table: QualifiedName::new("analytics", "events"),
            format,
            location: "s3://bucket/analytics/events".to_string(),
            partition_by: vec!["dt".to_string()],
        }
    }

    #[test]
    fn test_transactional_formats_refresh() {
        let sync = CatalogSync::new(Some("athena".to_string()));
        assert_eq!(
            sync.plan(&target(TableFormat::Iceberg)),
            vec![SyncOperation::RefreshTable {
                table: QualifiedName::new("analytics", "events"),
                transactional_catalog: true,
            }]
        );
        assert_eq!(sync.plan(&target(TableFormat::Hudi)).len(), 1);
    }

    #[test]
    fn test_legacy_format_regenerates_manifest_under_prefix() {
        let sync = CatalogSync::new(Some("athena".to_string()));
        let plan = sync.plan(&target(TableFormat::Delta));
        let manifest = QualifiedName::new("analytics", "athena_events");
        assert_eq!(
            plan,
            vec![
                SyncOperation::GenerateManifest {
                    location: "s3://bucket/analytics/events".to_string(),
                },
                SyncOperation::EnsureManifestTable {
                    table: manifest.clone(),
                    location: "s3://bucket/analytics/events".to_string(),
                    partition_by: vec!["dt".to_string()],
                },
                SyncOperation::RepairTable { table: manifest },
            ]
        );
    }

    #[test]
    fn test_legacy_format_without_prefix_only_refreshes() {
        let sync = CatalogSync::default();
        let plan = sync.plan(&target(TableFormat::Delta));
        assert!(matches!(plan.as_slice(), [SyncOperation::RefreshTable { .. }]));
    }

    struct FailingAt {
        kind: &'static str,
        seen: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl OperationExecutor for FailingAt {
        async fn run(&self, op: &Operation) -> Result<Vec<Row>> {
            self.seen.lock().push(op.kind());
            if op.kind() == self.kind {
                return Err(AdapterError::RemoteExecution {
                    message: "AnalysisException: no such table".to_string(),
                });
            }
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_failure_is_reported_not_raised() {
        let executor = FailingAt {
            kind: "ensure_manifest_table",
            seen: Mutex::new(Vec::new()),
        };
        let sync = CatalogSync::new(Some("athena".to_string()));

        let outcome = sync.run(&executor, &target(TableFormat::Delta)).await;

        assert!(!outcome.is_complete());
        assert_eq!(outcome.completed, vec!["generate_manifest"]);
        assert_eq!(
            *executor.seen.lock(),
            vec!["generate_manifest", "ensure_manifest_table"]
        );
    }
}
