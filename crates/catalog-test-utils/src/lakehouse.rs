//! In-memory lakehouse.
//!
//! Implements the catalog boundary ([`CatalogService`]) and the execution
//! boundary ([`ExecutorProvider`]) over one shared state, interpreting
//! adapter operations directly instead of parsing rendered text. Every
//! operation is recorded for assertions, and failures can be injected per
//! operation kind.

use async_trait::async_trait;
use lakebridge_catalog_adapter::relation::FORMAT_METADATA_COLUMNS;
use lakebridge_catalog_adapter::{
    AdapterConfig, AdapterError, CatalogService, ExecutorProvider, GlueAdapter, Operation,
    OperationExecutor, QualifiedName, Result, Row, SyncOperation, TableFormat, WriteSpec,
};
use lakebridge_catalog_client::{
    ClientError, ColumnDef, Database, DatabaseInput, GrantFailure, PermissionEntry,
    StorageDescriptor, Table,
};
use parking_lot::{Mutex, MutexGuard};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Storage root of [`FakeLakehouse::config`].
pub const TEST_LOCATION: &str = "s3://test-bucket/warehouse";

/// 2024-01-01T00:00:00Z; snapshot timestamps tick one minute per commit.
const EPOCH_SECS: i64 = 1_704_067_200;

/// A physical table with its catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct FakeTable {
    /// `(name, type)` in storage order
    pub columns: Vec<(String, String)>,
    pub rows: Vec<Row>,
    pub table_type: String,
    pub parameters: BTreeMap<String, String>,
    pub partition_by: Vec<String>,
    pub location: String,
    /// Commit timestamps, oldest first
    pub snapshots: Vec<String>,
}

impl FakeTable {
    /// A table as `format` would have created it, without snapshots.
    pub fn new(format: TableFormat, columns: &[(&str, &str)], rows: Vec<Row>) -> Self {
        let view = StagedView {
            columns: columns
                .iter()
                .map(|(n, t)| (n.to_string(), t.to_string()))
                .collect(),
            rows,
        };
        let (columns, rows) = materialize(format, &view, "19700101000000");
        Self {
            columns,
            rows,
            table_type: "EXTERNAL_TABLE".to_string(),
            parameters: format_parameters(format),
            partition_by: Vec::new(),
            location: String::new(),
            snapshots: Vec::new(),
        }
    }

    pub fn partitioned_by(mut self, keys: &[&str]) -> Self {
        self.partition_by = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_type(mut self, table_type: &str) -> Self {
        self.table_type = table_type.to_string();
        self
    }

    pub fn with_snapshots(mut self, snapshots: &[&str]) -> Self {
        self.snapshots = snapshots.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|(n, _)| n == name)
    }

    /// Rows restricted to `columns`, sorted for comparison.
    pub fn project(&self, columns: &[&str]) -> Vec<Row> {
        let indexes: Vec<Option<usize>> = columns.iter().map(|c| self.column_index(c)).collect();
        let mut rows: Vec<Row> = self
            .rows
            .iter()
            .map(|row| {
                indexes
                    .iter()
                    .map(|i| i.and_then(|i| row.get(i).cloned()).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        rows.sort_by_key(|r| Value::Array(r.clone()).to_string());
        rows
    }

    fn to_catalog(&self, schema: &str, name: &str) -> Table {
        let column_def = |(n, t): &(String, String)| ColumnDef {
            name: n.clone(),
            data_type: Some(t.clone()),
        };
        Table {
            name: name.to_string(),
            database_name: Some(schema.to_string()),
            table_type: Some(self.table_type.clone()),
            parameters: self.parameters.clone().into_iter().collect::<HashMap<_, _>>(),
            partition_keys: self
                .columns
                .iter()
                .filter(|(n, _)| self.partition_by.contains(n))
                .map(column_def)
                .collect(),
            storage_descriptor: Some(StorageDescriptor {
                location: Some(self.location.clone()),
                columns: self
                    .columns
                    .iter()
                    .filter(|(n, _)| !self.partition_by.contains(n))
                    .map(column_def)
                    .collect(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
struct StagedView {
    columns: Vec<(String, String)>,
    rows: Vec<Row>,
}

#[derive(Debug, Default)]
struct FakeDatabase {
    location: Option<String>,
    description: Option<String>,
    tables: BTreeMap<String, FakeTable>,
}

#[derive(Debug, Default)]
struct State {
    databases: BTreeMap<String, FakeDatabase>,
    sources: HashMap<String, StagedView>,
    /// Temporary views; every executor sees every view, as on one remote
    /// interactive session
    views: HashMap<String, StagedView>,
    operations: Vec<Operation>,
    grants: Vec<PermissionEntry>,
    faults: Vec<(String, String)>,
    catalog_unavailable: bool,
    clock: i64,
}

impl State {
    fn take_fault(&mut self, kind: &str) -> Option<String> {
        let index = self.faults.iter().position(|(k, _)| k == kind)?;
        Some(self.faults.remove(index).1)
    }

    fn now(&self) -> String {
        chrono::DateTime::from_timestamp(EPOCH_SECS + self.clock * 60, 0)
            .expect("timestamp in range")
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }

    fn tick(&mut self) -> String {
        self.clock += 1;
        self.now()
    }

    fn view(&self, name: &str) -> Result<StagedView> {
        self.views
            .get(name)
            .cloned()
            .ok_or_else(|| engine_error(format!("Table or view not found: {}", name)))
    }

    fn table(&self, name: &QualifiedName) -> Result<&FakeTable> {
        self.databases
            .get(&name.schema)
            .and_then(|db| db.tables.get(&name.name))
            .ok_or_else(|| engine_error(format!("Table or view not found: {}", name)))
    }

    fn table_mut(&mut self, name: &QualifiedName) -> Result<&mut FakeTable> {
        self.databases
            .get_mut(&name.schema)
            .and_then(|db| db.tables.get_mut(&name.name))
            .ok_or_else(|| engine_error(format!("Table or view not found: {}", name)))
    }

    fn table_at(&self, location: &str) -> Option<&FakeTable> {
        let location = location.trim_end_matches('/');
        self.databases
            .values()
            .flat_map(|db| db.tables.values())
            .find(|t| t.location.trim_end_matches('/') == location)
    }

    fn insert_table(&mut self, name: &QualifiedName, table: FakeTable) -> Result<()> {
        let db = self
            .databases
            .get_mut(&name.schema)
            .ok_or_else(|| engine_error(format!("Database '{}' not found", name.schema)))?;
        if db.tables.contains_key(&name.name) {
            return Err(engine_error(format!("Table {} already exists", name)));
        }
        db.tables.insert(name.name.clone(), table);
        Ok(())
    }

    fn create(&mut self, spec: &WriteSpec, view: &StagedView) -> Result<()> {
        let committed = self.tick();
        let (columns, rows) = materialize(spec.format, view, &committed);
        let mut parameters = format_parameters(spec.format);
        parameters.extend(spec.properties.clone());
        let table = FakeTable {
            columns,
            rows,
            table_type: "EXTERNAL_TABLE".to_string(),
            parameters,
            partition_by: spec.partition_by.clone(),
            location: spec.location.clone(),
            snapshots: vec![committed],
        };
        self.insert_table(&spec.table, table)
    }

    fn append(&mut self, spec: &WriteSpec, view: &StagedView) -> Result<()> {
        let committed = self.tick();
        let table = self.table_mut(&spec.table)?;
        let rows = align(table, view, &committed);
        table.rows.extend(rows);
        table.snapshots.push(committed);
        Ok(())
    }

    fn replace(&mut self, spec: &WriteSpec, view: &StagedView) -> Result<()> {
        let committed = self.tick();
        let table = self.table_mut(&spec.table)?;
        table.rows = align(table, view, &committed);
        table.snapshots.push(committed);
        Ok(())
    }

    fn upsert(&mut self, spec: &WriteSpec, view: &StagedView) -> Result<()> {
        let committed = self.tick();
        let table = self.table_mut(&spec.table)?;
        let keys = spec
            .primary_key
            .iter()
            .map(|k| {
                table
                    .column_index(k)
                    .ok_or_else(|| engine_error(format!("cannot resolve merge key {}", k)))
            })
            .collect::<Result<Vec<_>>>()?;

        for row in align(table, view, &committed) {
            let key: Vec<&Value> = keys.iter().map(|&i| &row[i]).collect();
            let matched = table
                .rows
                .iter()
                .position(|existing| keys.iter().map(|&i| &existing[i]).eq(key.iter().copied()));
            match matched {
                Some(index) => table.rows[index] = row,
                None => table.rows.push(row),
            }
        }
        table.snapshots.push(committed);
        Ok(())
    }
}

/// In-memory catalog and execution engine.
///
/// Cloning shares state.
#[derive(Debug, Clone, Default)]
pub struct FakeLakehouse {
    state: Arc<Mutex<State>>,
    open_sessions: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

impl FakeLakehouse {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock()
    }

    /// Adapter configuration rooted at [`TEST_LOCATION`].
    pub fn config() -> AdapterConfig {
        AdapterConfig::builder(TEST_LOCATION)
            .session_id("test-session")
            .role_arn("arn:aws:iam::123456789012:role/transform")
            .catalog_id("123456789012")
            .build()
            .expect("valid test config")
    }

    /// Adapter wired to this lakehouse with [`FakeLakehouse::config`].
    pub fn adapter(&self) -> GlueAdapter {
        self.adapter_with(Self::config())
    }

    pub fn adapter_with(&self, config: AdapterConfig) -> GlueAdapter {
        GlueAdapter::new(config, Arc::new(self.clone()), Arc::new(self.clone()))
            .expect("valid adapter config")
    }

    /// Make `query` yield `rows` when staged.
    pub fn register_source(&self, query: &str, columns: &[(&str, &str)], rows: Vec<Row>) {
        let view = StagedView {
            columns: columns
                .iter()
                .map(|(n, t)| (n.to_string(), t.to_string()))
                .collect(),
            rows,
        };
        self.lock().sources.insert(query.to_string(), view);
    }

    pub fn add_database(&self, name: &str) {
        self.lock()
            .databases
            .entry(name.to_string())
            .or_default();
    }

    /// Seed a table, creating its database if needed.
    pub fn add_table(&self, schema: &str, name: &str, table: FakeTable) {
        self.lock()
            .databases
            .entry(schema.to_string())
            .or_default()
            .tables
            .insert(name.to_string(), table);
    }

    pub fn has_database(&self, name: &str) -> bool {
        self.lock().databases.contains_key(name)
    }

    pub fn database_count(&self) -> usize {
        self.lock().databases.len()
    }

    pub fn database_location(&self, name: &str) -> Option<String> {
        self.lock()
            .databases
            .get(name)
            .and_then(|db| db.location.clone())
    }

    pub fn table(&self, schema: &str, name: &str) -> Option<FakeTable> {
        self.lock()
            .databases
            .get(schema)
            .and_then(|db| db.tables.get(name).cloned())
    }

    /// Sorted rows of `schema.name` restricted to `columns`.
    pub fn rows(&self, schema: &str, name: &str, columns: &[&str]) -> Vec<Row> {
        self.table(schema, name)
            .map(|t| t.project(columns))
            .unwrap_or_default()
    }

    pub fn grants(&self) -> Vec<PermissionEntry> {
        self.lock().grants.clone()
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.lock().operations.clone()
    }

    /// Kinds of every executed operation, in order.
    pub fn operation_kinds(&self) -> Vec<&'static str> {
        self.lock().operations.iter().map(Operation::kind).collect()
    }

    /// Fail the next call of `kind` with `message`.
    ///
    /// `kind` is an [`Operation::kind`], a catalog call (`get_databases`,
    /// `get_tables`, `get_table`, `create_database`, `delete_database`,
    /// `grant_permissions`) or `acquire`.
    pub fn fail_next(&self, kind: &str, message: &str) {
        self.lock()
            .faults
            .push((kind.to_string(), message.to_string()));
    }

    /// Make every catalog call fail with a service error.
    pub fn set_catalog_unavailable(&self, unavailable: bool) {
        self.lock().catalog_unavailable = unavailable;
    }

    /// Executors acquired and not yet dropped.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    /// Times `release_all` was called.
    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    fn catalog_call(&self, call: &str) -> lakebridge_catalog_client::Result<MutexGuard<'_, State>> {
        let mut state = self.lock();
        if state.catalog_unavailable {
            return Err(service_error(call, "catalog unavailable"));
        }
        if let Some(message) = state.take_fault(call) {
            return Err(service_error(call, &message));
        }
        Ok(state)
    }

    fn apply(&self, op: &Operation) -> Result<Vec<Row>> {
        let mut state = self.lock();
        state.operations.push(op.clone());
        if let Some(message) = state.take_fault(op.kind()) {
            tracing::debug!(operation = op.kind(), "Injected failure");
            return Err(engine_error(message));
        }

        match op {
            Operation::Stage(stage) => {
                let mut view = state
                    .sources
                    .get(&stage.source_query)
                    .cloned()
                    .ok_or_else(|| {
                        engine_error(format!(
                            "AnalysisException: cannot resolve '{}'",
                            stage.source_query
                        ))
                    })?;
                if let Some(ref audit) = stage.audit_column {
                    let now = Value::String(state.now());
                    view.columns.push((audit.clone(), "timestamp".to_string()));
                    for row in &mut view.rows {
                        row.push(now.clone());
                    }
                }
                let count = view.rows.len() as u64;
                state.views.insert(stage.view.clone(), view);
                Ok(vec![vec![Value::from(count)]])
            }
            Operation::Describe { table, .. } => {
                let table = state.table(table)?;
                let text = |s: &str| Value::String(s.to_string());
                let mut rows: Vec<Row> = table
                    .columns
                    .iter()
                    .map(|(n, t)| vec![text(n), text(t), Value::Null])
                    .collect();
                if !table.partition_by.is_empty() {
                    rows.push(vec![text(""), text(""), text("")]);
                    rows.push(vec![text("# Partition Information"), text(""), text("")]);
                    rows.push(vec![text("# col_name"), text("data_type"), text("comment")]);
                    for (n, t) in table
                        .columns
                        .iter()
                        .filter(|(n, _)| table.partition_by.contains(n))
                    {
                        rows.push(vec![text(n), text(t), Value::Null]);
                    }
                }
                Ok(rows)
            }
            Operation::Create(spec) => {
                let view = state.view(&spec.source_view)?;
                state.create(spec, &view)?;
                Ok(Vec::new())
            }
            Operation::Append(spec) => {
                let view = state.view(&spec.source_view)?;
                state.append(spec, &view)?;
                Ok(Vec::new())
            }
            Operation::Replace(spec) => {
                let view = state.view(&spec.source_view)?;
                state.replace(spec, &view)?;
                Ok(Vec::new())
            }
            Operation::Upsert(spec) => {
                if !spec.format.supports_merge() {
                    return Err(engine_error(format!(
                        "MERGE is not supported for {} tables",
                        spec.format
                    )));
                }
                let view = state.view(&spec.source_view)?;
                state.upsert(spec, &view)?;
                Ok(Vec::new())
            }
            Operation::Sync(sync) => {
                apply_sync(&mut state, sync)?;
                Ok(Vec::new())
            }
            Operation::ListSnapshots { table } => {
                let table = state.table(table)?;
                let mut snapshots = table.snapshots.clone();
                snapshots.sort();
                Ok(snapshots
                    .into_iter()
                    .rev()
                    .map(|s| vec![Value::String(s)])
                    .collect())
            }
            Operation::ExpireSnapshots {
                table,
                older_than,
                retain_last,
            } => {
                let table = state.table_mut(table)?;
                table.snapshots.sort();
                let keep_from = table.snapshots.len().saturating_sub(*retain_last as usize);
                table.snapshots = table
                    .snapshots
                    .iter()
                    .enumerate()
                    .filter(|(i, s)| *i >= keep_from || s.as_str() >= older_than.as_str())
                    .map(|(_, s)| s.clone())
                    .collect();
                Ok(Vec::new())
            }
            Operation::Rename { from, to, location } => {
                let source = state.table(from)?.clone();
                let mut renamed = source;
                renamed.parameters = format_parameters(TableFormat::Parquet);
                renamed.location = location.clone();
                state.insert_table(to, renamed)?;
                if let Some(db) = state.databases.get_mut(&from.schema) {
                    db.tables.remove(&from.name);
                }
                Ok(Vec::new())
            }
        }
    }
}

fn apply_sync(state: &mut State, sync: &SyncOperation) -> Result<()> {
    match sync {
        SyncOperation::RefreshTable { table, .. } | SyncOperation::RepairTable { table } => {
            state.table(table).map(|_| ())
        }
        SyncOperation::GenerateManifest { location } => state
            .table_at(location)
            .map(|_| ())
            .ok_or_else(|| engine_error(format!("{} is not a Delta table", location))),
        SyncOperation::EnsureManifestTable {
            table,
            location,
            partition_by,
        } => {
            if state.table(table).is_ok() {
                return Ok(());
            }
            let source = state
                .table_at(location)
                .cloned()
                .ok_or_else(|| engine_error(format!("{} is not a Delta table", location)))?;
            let manifest = FakeTable {
                parameters: BTreeMap::new(),
                partition_by: partition_by.clone(),
                location: format!("{}/_symlink_format_manifest/", location.trim_end_matches('/')),
                snapshots: Vec::new(),
                ..source
            };
            state.insert_table(table, manifest)
        }
    }
}

/// Storage layout of `view` written with `format`.
fn materialize(
    format: TableFormat,
    view: &StagedView,
    committed: &str,
) -> (Vec<(String, String)>, Vec<Row>) {
    if format != TableFormat::Hudi {
        return (view.columns.clone(), view.rows.clone());
    }
    let mut columns: Vec<(String, String)> = FORMAT_METADATA_COLUMNS
        .iter()
        .map(|c| (c.to_string(), "string".to_string()))
        .collect();
    columns.extend(view.columns.iter().cloned());
    let rows = view
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut out = hudi_metadata(committed, i);
            out.extend(row.iter().cloned());
            out
        })
        .collect();
    (columns, rows)
}

fn hudi_metadata(committed: &str, seq: usize) -> Row {
    vec![
        Value::String(committed.to_string()),
        Value::String(format!("{}_{}", committed, seq)),
        Value::String(seq.to_string()),
        Value::String(String::new()),
        Value::String("part-0000.parquet".to_string()),
    ]
}

/// Rows of `view` laid out in `table`'s column order.
///
/// Columns missing from the view are null, except bookkeeping columns,
/// which are generated.
fn align(table: &FakeTable, view: &StagedView, committed: &str) -> Vec<Row> {
    view.rows
        .iter()
        .enumerate()
        .map(|(seq, row)| {
            let metadata = hudi_metadata(committed, seq);
            table
                .columns
                .iter()
                .map(|(name, _)| {
                    if let Some(i) = view.columns.iter().position(|(n, _)| n == name) {
                        return row.get(i).cloned().unwrap_or(Value::Null);
                    }
                    FORMAT_METADATA_COLUMNS
                        .iter()
                        .position(|c| c == name)
                        .map(|i| metadata[i].clone())
                        .unwrap_or(Value::Null)
                })
                .collect()
        })
        .collect()
}

fn format_parameters(format: TableFormat) -> BTreeMap<String, String> {
    let mut parameters = BTreeMap::new();
    match format {
        TableFormat::Iceberg => {
            parameters.insert("table_type".to_string(), "ICEBERG".to_string());
        }
        other => {
            parameters.insert(
                "spark.sql.sources.provider".to_string(),
                other.as_str().to_string(),
            );
        }
    }
    parameters
}

fn engine_error(message: impl Into<String>) -> AdapterError {
    AdapterError::RemoteExecution {
        message: message.into(),
    }
}

fn service_error(call: &str, message: &str) -> ClientError {
    ClientError::ServerError {
        status: 503,
        kind: "ServiceUnavailableException".to_string(),
        message: format!("{}: {}", call, message),
        request_id: None,
    }
}

#[async_trait]
impl CatalogService for FakeLakehouse {
    async fn list_databases(&self) -> lakebridge_catalog_client::Result<Vec<Database>> {
        let state = self.catalog_call("get_databases")?;
        Ok(state
            .databases
            .iter()
            .map(|(name, db)| Database {
                name: name.clone(),
                description: db.description.clone(),
                location_uri: db.location.clone(),
                ..Default::default()
            })
            .collect())
    }

    async fn list_tables(&self, database: &str) -> lakebridge_catalog_client::Result<Vec<Table>> {
        let state = self.catalog_call("get_tables")?;
        let db = state.databases.get(database).ok_or_else(|| {
            ClientError::EntityNotFound(format!("Database {} not found", database))
        })?;
        Ok(db
            .tables
            .iter()
            .map(|(name, table)| table.to_catalog(database, name))
            .collect())
    }

    async fn get_table(
        &self,
        database: &str,
        name: &str,
    ) -> lakebridge_catalog_client::Result<Table> {
        let state = self.catalog_call("get_table")?;
        state
            .databases
            .get(database)
            .and_then(|db| db.tables.get(name))
            .map(|table| table.to_catalog(database, name))
            .ok_or_else(|| {
                ClientError::EntityNotFound(format!("Table {} not found in {}", name, database))
            })
    }

    async fn create_database(&self, input: DatabaseInput) -> lakebridge_catalog_client::Result<()> {
        let mut state = self.catalog_call("create_database")?;
        if state.databases.contains_key(&input.name) {
            return Err(ClientError::AlreadyExists(format!(
                "Database {} already exists",
                input.name
            )));
        }
        state.databases.insert(
            input.name,
            FakeDatabase {
                location: input.location_uri,
                description: input.description,
                tables: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_database(&self, name: &str) -> lakebridge_catalog_client::Result<()> {
        let mut state = self.catalog_call("delete_database")?;
        state
            .databases
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ClientError::EntityNotFound(format!("Database {} not found", name)))
    }

    async fn grant_permissions(
        &self,
        _catalog_id: Option<String>,
        entries: Vec<PermissionEntry>,
    ) -> lakebridge_catalog_client::Result<Vec<GrantFailure>> {
        let mut state = self.catalog_call("grant_permissions")?;
        state.grants.extend(entries);
        Ok(Vec::new())
    }
}

/// Executor handle; counted while open.
struct FakeExecutor {
    lake: FakeLakehouse,
}

impl Drop for FakeExecutor {
    fn drop(&mut self) {
        self.lake.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl OperationExecutor for FakeExecutor {
    async fn run(&self, op: &Operation) -> Result<Vec<Row>> {
        self.lake.apply(op)
    }
}

#[async_trait]
impl ExecutorProvider for FakeLakehouse {
    async fn acquire(&self) -> Result<Box<dyn OperationExecutor>> {
        if let Some(message) = self.lock().take_fault("acquire") {
            return Err(AdapterError::Session(message));
        }
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeExecutor { lake: self.clone() }))
    }

    fn release_all(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.lock().views.clear();
    }
}
