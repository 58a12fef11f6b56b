//! Write-strategy orchestration.
//!
//! [`decide`] maps the target's current table state and the requested mode to
//! one [`WriteAction`]. [`WriteOrchestrator::write`] then runs the sequence
//! `stage -> write -> sync` on a single session.
//!
//! | table   | mode             | action  |
//! |---------|------------------|---------|
//! | absent  | any              | create  |
//! | present | append           | append  |
//! | present | insert_overwrite | replace |
//! | present | merge            | upsert  |
//!
//! Empty input skips the write on a present table but still runs sync. An
//! absent table is created even from empty input so it stays queryable.

use crate::config::AdapterConfig;
use crate::error::{AdapterError, Result, WriteAction};
use crate::executor::{ExecutorProvider, OperationExecutor};
use crate::format::{FormatTag, TableFormat, TableState};
use crate::lifecycle::LifecycleManager;
use crate::operation::{Operation, QualifiedName, StageSpec, WriteSpec};
use crate::relation::{Relation, RelationType};
use crate::sync::{CatalogSync, SyncOutcome, SyncTarget};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

/// Snapshots kept by expiration regardless of age.
const RETAINED_SNAPSHOTS: u32 = 1;

/// Requested write mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WriteMode {
    #[default]
    Append,
    InsertOverwrite,
    Merge,
}

impl WriteMode {
    pub fn as_str(self) -> &'static str {
        match self {
            WriteMode::Append => "append",
            WriteMode::InsertOverwrite => "insert_overwrite",
            WriteMode::Merge => "merge",
        }
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WriteMode {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "append" => Ok(WriteMode::Append),
            "insert_overwrite" => Ok(WriteMode::InsertOverwrite),
            "merge" => Ok(WriteMode::Merge),
            other => Err(AdapterError::Config(format!("unknown write mode '{}'", other))),
        }
    }
}

/// One requested materialization; lives for a single write call.
#[derive(Debug, Clone)]
pub struct WriteIntent {
    pub target: Relation,
    pub source_query: String,
    pub format: TableFormat,
    pub mode: WriteMode,
    pub primary_key: Vec<String>,
    pub partition_by: Vec<String>,
    /// Replaces the derived location when set
    pub location: Option<String>,
    pub properties: BTreeMap<String, String>,
    /// Format writer options
    pub options: BTreeMap<String, String>,
}

impl WriteIntent {
    pub fn builder(target: Relation, source_query: impl Into<String>) -> WriteIntentBuilder {
        WriteIntentBuilder {
            intent: WriteIntent {
                target,
                source_query: source_query.into(),
                format: TableFormat::Parquet,
                mode: WriteMode::Append,
                primary_key: Vec::new(),
                partition_by: Vec::new(),
                location: None,
                properties: BTreeMap::new(),
                options: BTreeMap::new(),
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.target.schema.is_empty() || self.target.identifier.is_empty() {
            return Err(AdapterError::Config(format!(
                "write target must name a schema and a table, got '{}'",
                self.target
            )));
        }
        if self.source_query.trim().is_empty() {
            return Err(AdapterError::Config(format!(
                "empty source query for {}",
                self.target
            )));
        }
        if self.mode == WriteMode::Merge && self.primary_key.is_empty() {
            return Err(AdapterError::PreconditionViolation(format!(
                "merge into {} requires a primary key",
                self.target
            )));
        }
        if self.format == TableFormat::Hudi && self.primary_key.is_empty() {
            return Err(AdapterError::PreconditionViolation(format!(
                "{} table {} requires a primary key",
                self.format, self.target
            )));
        }
        Ok(())
    }
}

/// Builder for [`WriteIntent`].
#[derive(Debug)]
pub struct WriteIntentBuilder {
    intent: WriteIntent,
}

impl WriteIntentBuilder {
    pub fn format(mut self, format: TableFormat) -> Self {
        self.intent.format = format;
        self
    }

    pub fn mode(mut self, mode: WriteMode) -> Self {
        self.intent.mode = mode;
        self
    }

    pub fn primary_key<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.intent.primary_key = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn partition_by<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.intent.partition_by = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.intent.location = Some(location.into());
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.intent.properties.insert(key.into(), value.into());
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.intent.options.insert(key.into(), value.into());
        self
    }

    /// Build the intent, validating it.
    pub fn build(self) -> Result<WriteIntent> {
        self.intent.validate()?;
        Ok(self.intent)
    }
}

/// Pick the write action for `intent` given the target's current state.
///
/// `current` is `None` when the table does not exist.
pub fn decide(intent: &WriteIntent, current: Option<TableState>) -> Result<WriteAction> {
    let Some(state) = current else {
        return Ok(WriteAction::Create);
    };

    state.check_format(&intent.target, intent.format)?;

    match intent.mode {
        WriteMode::Append => Ok(WriteAction::Append),
        WriteMode::InsertOverwrite => Ok(WriteAction::Replace),
        WriteMode::Merge if state.tag.supports_merge() => Ok(WriteAction::Upsert),
        WriteMode::Merge => Err(AdapterError::PreconditionViolation(format!(
            "{} is a {} table, which does not support merge",
            intent.target, state.tag
        ))),
    }
}

/// Storage location of a table written with `format`.
///
/// A custom location replaces the derived one as given.
pub fn resolve_location(
    config: &AdapterConfig,
    relation: &Relation,
    format: TableFormat,
    custom: Option<&str>,
) -> String {
    if let Some(custom) = custom {
        return custom.to_string();
    }
    let location = config.table_location(&relation.schema, &relation.identifier);
    if format.uses_trailing_slash() {
        location
    } else {
        location.trim_end_matches('/').to_string()
    }
}

/// Temporary view name for one write of `target`.
///
/// Unique per write: concurrent writes share the remote session's temp views.
fn staging_view(target: &Relation) -> String {
    format!(
        "tmp_{}_{}_{}",
        target.schema,
        target.identifier,
        uuid::Uuid::new_v4().simple()
    )
}

/// What a completed write did.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    /// Target as it exists after the write
    pub relation: Relation,
    pub action: WriteAction,
    pub rows_staged: u64,
    /// False when empty input skipped the data write
    pub written: bool,
    pub sync: SyncOutcome,
}

/// Runs write intents and table maintenance.
#[derive(Clone)]
pub struct WriteOrchestrator {
    config: Arc<AdapterConfig>,
    lifecycle: LifecycleManager,
    executors: Arc<dyn ExecutorProvider>,
    sync: CatalogSync,
}

impl WriteOrchestrator {
    pub fn new(
        config: Arc<AdapterConfig>,
        lifecycle: LifecycleManager,
        executors: Arc<dyn ExecutorProvider>,
    ) -> Self {
        let sync = CatalogSync::new(config.manifest_table_prefix.clone());
        Self {
            config,
            lifecycle,
            executors,
            sync,
        }
    }

    /// Materialize `intent.source_query` into `intent.target`.
    pub async fn write(&self, intent: &WriteIntent) -> Result<WriteOutcome> {
        let start = Instant::now();
        intent.validate()?;
        let target = &intent.target;

        let current = self.lifecycle.get_table_state(target).await.map_err(|e| {
            tracing::error!(relation = %target, error = %e, "Could not read target table state");
            e
        })?;
        let action = decide(intent, current).map_err(|e| {
            tracing::error!(
                relation = %target,
                mode = %intent.mode,
                format = %intent.format,
                error = %e,
                "Write rejected"
            );
            e
        })?;
        let fail = |e: AdapterError| {
            let err = AdapterError::write_failed(action, target, e);
            tracing::error!(relation = %target, action = %action, error = %err, "Write failed");
            err
        };

        let spec = WriteSpec {
            table: QualifiedName::from(target),
            format: intent.format,
            location: resolve_location(
                &self.config,
                target,
                intent.format,
                intent.location.as_deref(),
            ),
            source_view: staging_view(target),
            partition_by: intent.partition_by.clone(),
            primary_key: intent.primary_key.clone(),
            properties: intent.properties.clone(),
            options: intent.options.clone(),
        };

        let executor = self.executors.acquire().await.map_err(fail)?;
        let rows_staged = self
            .stage(executor.as_ref(), intent, &spec.source_view)
            .await
            .map_err(fail)?;

        let written = rows_staged > 0 || action == WriteAction::Create;
        if written {
            let op = Operation::write(action, spec.clone()).ok_or_else(|| {
                fail(AdapterError::PreconditionViolation(format!(
                    "{} is not a data write",
                    action
                )))
            })?;
            executor.run(&op).await.map_err(fail)?;
        } else {
            tracing::info!(relation = %target, action = %action, "Empty input, skipping write");
        }

        let sync = self
            .sync
            .run(
                executor.as_ref(),
                &SyncTarget {
                    table: spec.table.clone(),
                    format: spec.format,
                    location: spec.location.clone(),
                    partition_by: spec.partition_by.clone(),
                },
            )
            .await;

        let tag = match current {
            Some(state) => state.tag,
            None => intent.format.expected_tag(!intent.partition_by.is_empty()),
        };
        let relation = Relation::create(
            target.schema.clone(),
            target.schema.clone(),
            target.identifier.clone(),
            tag.relation_type(RelationType::Table),
        );

        tracing::info!(
            relation = %target,
            action = %action,
            rows = rows_staged,
            written,
            duration_ms = %start.elapsed().as_millis(),
            "Write completed"
        );

        Ok(WriteOutcome {
            relation,
            action,
            rows_staged,
            written,
            sync,
        })
    }

    async fn stage(
        &self,
        executor: &dyn OperationExecutor,
        intent: &WriteIntent,
        view: &str,
    ) -> Result<u64> {
        let rows = executor
            .run(&Operation::Stage(StageSpec {
                view: view.to_string(),
                source_query: intent.source_query.clone(),
                audit_column: intent.format.audit_column().map(String::from),
            }))
            .await?;
        rows.first()
            .and_then(|row| row.first())
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| AdapterError::RemoteExecution {
                message: format!("staging {} returned no row count", view),
            })
    }

    /// Expire every snapshot older than the latest commit of `qualified`.
    ///
    /// Must not run concurrently with a write to the same table; this is not
    /// checked here.
    pub async fn expire_snapshots(&self, qualified: &str) -> Result<()> {
        let table = QualifiedName::parse(qualified).ok_or_else(|| {
            AdapterError::PreconditionViolation(format!(
                "expected schema.table, got '{}'",
                qualified
            ))
        })?;
        let relation = Relation::table(table.schema.clone(), table.name.clone());

        match self.lifecycle.get_table_format(&relation).await? {
            Some(FormatTag::TransactionalCopyOnWrite) => {}
            Some(tag) => {
                return Err(AdapterError::PreconditionViolation(format!(
                    "{} is a {} table; only copy-on-write tables keep snapshots",
                    relation, tag
                )))
            }
            None => return Err(AdapterError::NotFound(relation.to_string())),
        }

        let fail = |e: AdapterError| {
            let err = AdapterError::write_failed(WriteAction::ExpireSnapshots, &relation, e);
            tracing::error!(relation = %relation, error = %err, "Snapshot expiration failed");
            err
        };

        let executor = self.executors.acquire().await.map_err(fail)?;
        let snapshots = executor
            .run(&Operation::ListSnapshots {
                table: table.clone(),
            })
            .await
            .map_err(fail)?;

        let Some(latest) = snapshots
            .first()
            .and_then(|row| row.first())
            .and_then(|v| v.as_str())
            .map(str::to_string)
        else {
            tracing::debug!(relation = %relation, "No snapshots to expire");
            return Ok(());
        };

        executor
            .run(&Operation::ExpireSnapshots {
                table,
                older_than: latest.clone(),
                retain_last: RETAINED_SNAPSHOTS,
            })
            .await
            .map_err(fail)?;

        tracing::info!(relation = %relation, older_than = %latest, "Expired snapshots");
        Ok(())
    }

    /// Move `from` to `to` as a plain table at the derived location of `to`.
    pub async fn rename_relation(&self, from: &Relation, to: &Relation) -> Result<()> {
        let fail = |e: AdapterError| {
            let err = AdapterError::write_failed(WriteAction::Rename, from, e);
            tracing::error!(relation = %from, target = %to, error = %err, "Rename failed");
            err
        };

        let executor = self.executors.acquire().await.map_err(fail)?;
        executor
            .run(&Operation::Rename {
                from: QualifiedName::from(from),
                to: QualifiedName::from(to),
                location: resolve_location(&self.config, to, TableFormat::Parquet, None),
            })
            .await
            .map_err(fail)?;

        tracing::info!(relation = %from, target = %to, "Renamed relation");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(format: TableFormat, mode: WriteMode) -> WriteIntent {
        WriteIntent::builder(Relation::table("analytics", "events"), "select 1 as id")
            .format(format)
            .mode(mode)
            .primary_key(["id"])
            .build()
            .unwrap()
    }

    fn existing(tag: FormatTag, provider: Option<TableFormat>) -> Option<TableState> {
        Some(TableState { tag, provider })
    }

    #[test]
    fn test_absent_table_always_creates() {
        for mode in [WriteMode::Append, WriteMode::InsertOverwrite, WriteMode::Merge] {
            for format in [TableFormat::Iceberg, TableFormat::Hudi, TableFormat::Parquet] {
                assert_eq!(decide(&intent(format, mode), None).unwrap(), WriteAction::Create);
            }
        }
    }

    #[test]
    fn test_present_table_actions() {
        let tag = existing(FormatTag::TransactionalCopyOnWrite, None);
        assert_eq!(
            decide(&intent(TableFormat::Iceberg, WriteMode::Append), tag).unwrap(),
            WriteAction::Append
        );
        assert_eq!(
            decide(&intent(TableFormat::Iceberg, WriteMode::InsertOverwrite), tag).unwrap(),
            WriteAction::Replace
        );
        assert_eq!(
            decide(&intent(TableFormat::Iceberg, WriteMode::Merge), tag).unwrap(),
            WriteAction::Upsert
        );
    }

    #[test]
    fn test_merge_on_plain_table_is_precondition_violation() {
        let err = decide(
            &intent(TableFormat::Parquet, WriteMode::Merge),
            existing(FormatTag::Plain, Some(TableFormat::Parquet)),
        )
        .unwrap_err();
        assert!(matches!(err, AdapterError::PreconditionViolation(_)));
    }

    #[test]
    fn test_format_is_sticky() {
        let err = decide(
            &intent(TableFormat::Hudi, WriteMode::Append),
            existing(FormatTag::TransactionalCopyOnWrite, None),
        )
        .unwrap_err();
        assert!(matches!(err, AdapterError::PreconditionViolation(_)));
    }

    #[test]
    fn test_plain_provider_cannot_switch() {
        let parquet = existing(FormatTag::PartitionedPlain, Some(TableFormat::Parquet));
        let err = decide(&intent(TableFormat::Delta, WriteMode::InsertOverwrite), parquet)
            .unwrap_err();
        assert!(matches!(err, AdapterError::PreconditionViolation(_)));
        assert!(err.to_string().contains("analytics.events is a parquet table"));

        let delta = existing(FormatTag::Plain, Some(TableFormat::Delta));
        assert!(decide(&intent(TableFormat::Parquet, WriteMode::Append), delta).is_err());
        assert_eq!(
            decide(&intent(TableFormat::Delta, WriteMode::Append), delta).unwrap(),
            WriteAction::Append
        );
    }

    #[test]
    fn test_merge_requires_primary_key() {
        let result = WriteIntent::builder(Relation::table("analytics", "events"), "select 1")
            .format(TableFormat::Iceberg)
            .mode(WriteMode::Merge)
            .build();
        assert!(matches!(result, Err(AdapterError::PreconditionViolation(_))));
    }

    #[test]
    fn test_target_must_name_a_table() {
        let result = WriteIntent::builder(Relation::for_schema("analytics"), "select 1").build();
        assert!(matches!(result, Err(AdapterError::Config(_))));
    }

    #[test]
    fn test_parse_write_mode() {
        assert_eq!("insert_overwrite".parse::<WriteMode>().unwrap(), WriteMode::InsertOverwrite);
        assert!("upsert".parse::<WriteMode>().is_err());
    }

    #[test]
    fn test_staging_view_is_unique_per_write() {
        let analytics = staging_view(&Relation::table("analytics", "events"));
        let staging = staging_view(&Relation::table("staging", "events"));

        assert!(analytics.starts_with("tmp_analytics_events_"));
        assert!(staging.starts_with("tmp_staging_events_"));
        assert_ne!(analytics, staging_view(&Relation::table("analytics", "events")));
    }

    #[test]
    fn test_resolve_location() {
        let config = AdapterConfig::builder("s3://bucket/warehouse/")
            .session_id("s")
            .build()
            .unwrap();
        let relation = Relation::table("analytics", "events");

        assert_eq!(
            resolve_location(&config, &relation, TableFormat::Iceberg, None),
            "s3://bucket/warehouse/analytics/events"
        );
        assert_eq!(
            resolve_location(&config, &relation, TableFormat::Hudi, None),
            "s3://bucket/warehouse/analytics/events/"
        );
        assert_eq!(
            resolve_location(&config, &relation, TableFormat::Iceberg, Some("s3://other/x/")),
            "s3://other/x/"
        );
    }
}
