//! Rendering of [`Operation`] values to engine text.
//!
//! [`SparkDialect`] produces PySpark scripts for an interactive session. Every
//! script finishes by printing one JSON result envelope (see
//! [`ResultEnvelope`](crate::session::ResultEnvelope)), so statements with and
//! without rows read back the same way.

use crate::config::AdapterConfig;
use crate::format::TableFormat;
use crate::operation::{Operation, QualifiedName, StageSpec, SyncOperation, WriteSpec};
use std::collections::BTreeMap;

/// Spark catalog name under which copy-on-write tables are addressed.
pub const TRANSACTIONAL_CATALOG: &str = "glue_catalog";

const PRELUDE: &str = r#"import json
from pyspark.sql import SparkSession
from pyspark.sql.functions import current_timestamp

def _emit(columns, rows):
    print(json.dumps({"columns": columns, "rows": rows}, default=str))
"#;

const NO_ROWS: &str = "_emit([], [])";

const SYMLINK_MANIFEST_DIR: &str = "_symlink_format_manifest";

/// Renders operations to engine text.
pub trait Dialect: Send + Sync {
    fn render(&self, op: &Operation) -> String;
}

/// PySpark rendering for interactive sessions.
#[derive(Debug, Clone)]
pub struct SparkDialect {
    warehouse: String,
    commit_lock_table: String,
}

impl SparkDialect {
    pub fn new(warehouse: impl Into<String>, commit_lock_table: impl Into<String>) -> Self {
        Self {
            warehouse: warehouse.into().trim_end_matches('/').to_string(),
            commit_lock_table: commit_lock_table.into(),
        }
    }

    pub fn from_config(config: &AdapterConfig) -> Self {
        Self::new(config.root(), config.commit_lock_table.clone())
    }

    fn transactional_session(&self, schema: &str) -> String {
        let warehouse = format!("{}/{}", self.warehouse, schema);
        let prefix = format!("spark.sql.catalog.{}", TRANSACTIONAL_CATALOG);
        let settings = [
            ("spark.sql.warehouse.dir".to_string(), warehouse.clone()),
            (prefix.clone(), "org.apache.iceberg.spark.SparkCatalog".to_string()),
            (format!("{}.warehouse", prefix), warehouse),
            (
                format!("{}.catalog-impl", prefix),
                "org.apache.iceberg.aws.glue.GlueCatalog".to_string(),
            ),
            (
                format!("{}.io-impl", prefix),
                "org.apache.iceberg.aws.s3.S3FileIO".to_string(),
            ),
            (
                format!("{}.lock-impl", prefix),
                "org.apache.iceberg.aws.glue.DynamoLockManager".to_string(),
            ),
            (format!("{}.lock.table", prefix), self.commit_lock_table.clone()),
            (
                "spark.sql.extensions".to_string(),
                "org.apache.iceberg.spark.extensions.IcebergSparkSessionExtensions".to_string(),
            ),
        ];

        let mut out = String::from("spark = SparkSession.builder");
        for (key, value) in settings {
            out.push_str(&format!(
                " \\\n    .config({}, {})",
                py_literal(&key),
                py_literal(&value)
            ));
        }
        out.push_str(" \\\n    .getOrCreate()");
        out
    }

    fn body(&self, op: &Operation) -> Vec<String> {
        match op {
            Operation::Stage(stage) => render_stage(stage),
            Operation::Describe {
                table,
                transactional_catalog,
            } => vec![
                format!(
                    "_rows = spark.sql({}).collect()",
                    py_block(&format!(
                        "DESCRIBE TABLE {}",
                        table_ref(table, *transactional_catalog)
                    ))
                ),
                "_emit([\"col_name\", \"data_type\", \"comment\"], \
                 [[r[0], r[1], r[2]] for r in _rows])"
                    .to_string(),
            ],
            Operation::Create(spec) => render_create(spec),
            Operation::Append(spec) => render_append(spec),
            Operation::Replace(spec) => render_replace(spec),
            Operation::Upsert(spec) => render_upsert(spec),
            Operation::Sync(sync) => render_sync(sync),
            Operation::ListSnapshots { table } => vec![
                format!(
                    "_rows = spark.sql({}).collect()",
                    py_block(&format!(
                        "SELECT CAST(committed_at AS STRING) AS committed_at \
                         FROM {}.snapshots ORDER BY committed_at DESC",
                        table_ref(table, true)
                    ))
                ),
                "_emit([\"committed_at\"], [[r[0]] for r in _rows])".to_string(),
            ],
            Operation::ExpireSnapshots {
                table,
                older_than,
                retain_last,
            } => vec![
                sql(&format!(
                    "CALL {}.system.expire_snapshots(\
                     table => {}, older_than => TIMESTAMP {}, retain_last => {})",
                    TRANSACTIONAL_CATALOG,
                    sql_literal(&table.to_string()),
                    sql_literal(older_than),
                    retain_last
                )),
                NO_ROWS.to_string(),
            ],
            Operation::Rename { from, to, location } => vec![
                format!(
                    "_df = spark.sql({})",
                    py_block(&format!("SELECT * FROM {}", from))
                ),
                format!(
                    "_df.write.mode(\"append\").format(\"parquet\").option(\"path\", {}) \
                     .saveAsTable({}, mode=\"append\")",
                    py_literal(location),
                    py_literal(&to.to_string())
                ),
                sql(&format!("DROP TABLE {}", from)),
                format!(
                    "spark.sql({}).collect()",
                    py_block(&format!("SELECT * FROM {} LIMIT 1", to))
                ),
                NO_ROWS.to_string(),
            ],
        }
    }
}

impl Dialect for SparkDialect {
    fn render(&self, op: &Operation) -> String {
        let mut script = String::from(PRELUDE);
        if let Some(schema) = transactional_schema(op) {
            script.push_str(&self.transactional_session(schema));
            script.push('\n');
        }
        for line in self.body(op) {
            script.push_str(&line);
            script.push('\n');
        }
        script
    }
}

/// Schema whose transactional catalog the operation addresses, if any.
fn transactional_schema(op: &Operation) -> Option<&str> {
    match op {
        Operation::Create(spec)
        | Operation::Append(spec)
        | Operation::Replace(spec)
        | Operation::Upsert(spec)
            if spec.format == TableFormat::Iceberg =>
        {
            Some(spec.table.schema.as_str())
        }
        Operation::Describe {
            table,
            transactional_catalog: true,
        }
        | Operation::Sync(SyncOperation::RefreshTable {
            table,
            transactional_catalog: true,
        })
        | Operation::ListSnapshots { table }
        | Operation::ExpireSnapshots { table, .. } => Some(table.schema.as_str()),
        _ => None,
    }
}

fn render_stage(stage: &StageSpec) -> Vec<String> {
    let mut lines = vec![format!("_df = spark.sql({})", py_block(&stage.source_query))];
    if let Some(ref column) = stage.audit_column {
        lines.push(format!(
            "_df = _df.withColumn({}, current_timestamp())",
            py_literal(column)
        ));
    }
    lines.push(format!(
        "_df.createOrReplaceTempView({})",
        py_literal(&stage.view)
    ));
    lines.push("_emit([\"count\"], [[_df.count()]])".to_string());
    lines
}

fn render_create(spec: &WriteSpec) -> Vec<String> {
    match spec.format {
        TableFormat::Iceberg => vec![
            sql(&format!(
                "CREATE TABLE {} USING iceberg{} LOCATION {}{} AS SELECT * FROM {}{}",
                table_ref(&spec.table, true),
                partitioned_by(&spec.partition_by),
                sql_literal(&spec.location),
                tbl_properties(&spec.properties),
                spec.source_view,
                order_by(&spec.partition_by)
            )),
            NO_ROWS.to_string(),
        ],
        TableFormat::Parquet => vec![
            sql(&format!(
                "CREATE TABLE {} USING PARQUET{} LOCATION {}{} AS SELECT * FROM {}{}",
                spec.table,
                partitioned_by(&spec.partition_by),
                sql_literal(&spec.location),
                tbl_properties(&spec.properties),
                spec.source_view,
                order_by(&spec.partition_by)
            )),
            NO_ROWS.to_string(),
        ],
        TableFormat::Delta => {
            let mut lines = delta_save(spec, "overwrite");
            lines.push(sql(&format!(
                "CREATE TABLE {} USING delta LOCATION {}{}",
                spec.table,
                sql_literal(&spec.location),
                tbl_properties(&spec.properties)
            )));
            lines.push(NO_ROWS.to_string());
            lines
        }
        TableFormat::Hudi => hudi_save(spec, "bulk_insert", "overwrite"),
    }
}

fn render_append(spec: &WriteSpec) -> Vec<String> {
    match spec.format {
        TableFormat::Iceberg => vec![
            sql(&format!(
                "INSERT INTO {} SELECT * FROM {}{}",
                table_ref(&spec.table, true),
                spec.source_view,
                order_by(&spec.partition_by)
            )),
            NO_ROWS.to_string(),
        ],
        TableFormat::Parquet => plain_insert(spec, "INSERT INTO"),
        TableFormat::Delta => {
            let mut lines = delta_save(spec, "append");
            lines.push(NO_ROWS.to_string());
            lines
        }
        TableFormat::Hudi => hudi_save(spec, "insert", "append"),
    }
}

fn render_replace(spec: &WriteSpec) -> Vec<String> {
    match spec.format {
        TableFormat::Iceberg => vec![
            sql(&format!(
                "CREATE OR REPLACE TABLE {} USING iceberg{}{} AS SELECT * FROM {}{}",
                table_ref(&spec.table, true),
                partitioned_by(&spec.partition_by),
                tbl_properties(&spec.properties),
                spec.source_view,
                order_by(&spec.partition_by)
            )),
            NO_ROWS.to_string(),
        ],
        TableFormat::Parquet => plain_insert(spec, "INSERT OVERWRITE TABLE"),
        TableFormat::Delta => {
            let mut lines = delta_save(spec, "overwrite");
            lines.push(NO_ROWS.to_string());
            lines
        }
        TableFormat::Hudi => hudi_save(spec, "insert_overwrite_table", "append"),
    }
}

/// Positional insert into a plain data source table.
///
/// Such tables store partition columns last, so a partitioned insert first
/// moves them to the end of the staged view.
fn plain_insert(spec: &WriteSpec, insert: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let view = if spec.partition_by.is_empty() {
        spec.source_view.clone()
    } else {
        let aligned = format!("{}_aligned", spec.source_view);
        lines.push(format!("_parts = {}", py_literal_list(&spec.partition_by)));
        lines.push("_keys = [p.lower() for p in _parts]".to_string());
        lines.push(format!("_df = spark.table({})", py_literal(&spec.source_view)));
        lines.push(
            "_df = _df.select([c for c in _df.columns if c.lower() not in _keys] + _parts)"
                .to_string(),
        );
        lines.push(format!("_df.createOrReplaceTempView({})", py_literal(&aligned)));
        aligned
    };
    lines.push(sql(&format!(
        "{} {} SELECT * FROM {}{}",
        insert,
        spec.table,
        view,
        order_by(&spec.partition_by)
    )));
    lines.push(NO_ROWS.to_string());
    lines
}

fn render_upsert(spec: &WriteSpec) -> Vec<String> {
    match spec.format {
        TableFormat::Iceberg => {
            let on = spec
                .primary_key
                .iter()
                .map(|k| format!("t.{k} = s.{k}"))
                .collect::<Vec<_>>()
                .join(" AND ");
            vec![
                sql(&format!(
                    "MERGE INTO {} t USING (SELECT * FROM {}) s ON {} \
                     WHEN MATCHED THEN UPDATE SET * WHEN NOT MATCHED THEN INSERT *",
                    table_ref(&spec.table, true),
                    spec.source_view,
                    on
                )),
                NO_ROWS.to_string(),
            ]
        }
        TableFormat::Hudi => hudi_save(spec, "upsert", "append"),
        TableFormat::Parquet | TableFormat::Delta => vec![format!(
            "raise ValueError({})",
            py_literal(&format!("merge is not supported for {} tables", spec.format))
        )],
    }
}

fn render_sync(sync: &SyncOperation) -> Vec<String> {
    match sync {
        SyncOperation::RefreshTable {
            table,
            transactional_catalog,
        } => vec![
            sql(&format!(
                "REFRESH TABLE {}",
                table_ref(table, *transactional_catalog)
            )),
            NO_ROWS.to_string(),
        ],
        SyncOperation::GenerateManifest { location } => vec![
            "from delta.tables import DeltaTable".to_string(),
            format!(
                "DeltaTable.forPath(spark, {}).generate(\"symlink_format_manifest\")",
                py_literal(location)
            ),
            NO_ROWS.to_string(),
        ],
        SyncOperation::EnsureManifestTable {
            table,
            location,
            partition_by,
        } => {
            let manifest = format!(
                "{}/{}/",
                location.trim_end_matches('/'),
                SYMLINK_MANIFEST_DIR
            );
            vec![
                "from delta.tables import DeltaTable".to_string(),
                format!(
                    "_fields = DeltaTable.forPath(spark, {}).toDF().schema.fields",
                    py_literal(location)
                ),
                format!("_parts = {}", py_literal_list(partition_by)),
                "_cols = \", \".join(\"`%s` %s\" % (f.name, f.dataType.simpleString()) \
                 for f in _fields if f.name not in _parts)"
                    .to_string(),
                "_pcols = \", \".join(\"`%s` %s\" % (f.name, f.dataType.simpleString()) \
                 for f in _fields if f.name in _parts)"
                    .to_string(),
                format!(
                    "_ddl = {} + _cols + \")\"",
                    py_literal(&format!("CREATE EXTERNAL TABLE IF NOT EXISTS {} (", table))
                ),
                "if _parts:\n    _ddl += \" PARTITIONED BY (\" + _pcols + \")\"".to_string(),
                format!(
                    "_ddl += {}",
                    py_literal(&format!(
                        " ROW FORMAT SERDE \
                         'org.apache.hadoop.hive.ql.io.parquet.serde.ParquetHiveSerDe' \
                         STORED AS INPUTFORMAT \
                         'org.apache.hadoop.hive.ql.io.SymlinkTextInputFormat' \
                         OUTPUTFORMAT 'org.apache.hadoop.hive.ql.io.HiveIgnoreKeyTextOutputFormat' \
                         LOCATION {}",
                        sql_literal(&manifest)
                    ))
                ),
                "spark.sql(_ddl)".to_string(),
                NO_ROWS.to_string(),
            ]
        }
        SyncOperation::RepairTable { table } => vec![
            sql(&format!("MSCK REPAIR TABLE {}", table)),
            NO_ROWS.to_string(),
        ],
    }
}

fn delta_save(spec: &WriteSpec, mode: &str) -> Vec<String> {
    let partition = if spec.partition_by.is_empty() {
        String::new()
    } else {
        format!(
            ".partitionBy({})",
            spec.partition_by
                .iter()
                .map(|p| py_literal(p))
                .collect::<Vec<_>>()
                .join(", ")
        )
    };
    vec![format!(
        "spark.table({}).write.format(\"delta\").mode({}){}.save({})",
        py_literal(&spec.source_view),
        py_literal(mode),
        partition,
        py_literal(&spec.location)
    )]
}

fn hudi_save(spec: &WriteSpec, operation: &str, mode: &str) -> Vec<String> {
    let options = hudi_write_options(spec, operation);
    vec![
        format!("_options = {}", py_literal_map(&options)),
        format!(
            "spark.table({}).write.format(\"org.apache.hudi\").options(**_options) \
             .mode({}).save({})",
            py_literal(&spec.source_view),
            py_literal(mode),
            py_literal(&spec.location)
        ),
        NO_ROWS.to_string(),
    ]
}

/// Writer options for the merge-on-read format.
///
/// Caller options in `spec.options` override the defaults key by key.
pub fn hudi_write_options(spec: &WriteSpec, operation: &str) -> BTreeMap<String, String> {
    let mut options = BTreeMap::new();
    let mut set = |key: &str, value: &str| {
        options.insert(key.to_string(), value.to_string());
    };

    set("hoodie.table.name", &spec.table.name);
    set("hoodie.datasource.write.recordkey.field", &spec.primary_key.join(","));
    if let Some(audit) = TableFormat::Hudi.audit_column() {
        set("hoodie.datasource.write.precombine.field", audit);
    }
    set("hoodie.datasource.write.operation", operation);
    set("hoodie.consistency.check.enabled", "true");
    set("hoodie.datasource.hive_sync.enable", "true");
    set("hoodie.datasource.hive_sync.use_jdbc", "false");
    set("hoodie.datasource.hive_sync.database", &spec.table.schema);
    set("hoodie.datasource.hive_sync.table", &spec.table.name);
    set("hoodie.index.type", "GLOBAL_BLOOM");
    set("hoodie.bloom.index.update.partition.path", "true");

    if spec.partition_by.is_empty() {
        set(
            "hoodie.datasource.hive_sync.partition_extractor_class",
            "org.apache.hudi.hive.NonPartitionedExtractor",
        );
        set(
            "hoodie.datasource.write.keygenerator.class",
            "org.apache.hudi.keygen.NonpartitionedKeyGenerator",
        );
    } else {
        let partitions = spec.partition_by.join(",");
        set("hoodie.datasource.write.partitionpath.field", &partitions);
        set("hoodie.datasource.hive_sync.partition_fields", &partitions);
        set(
            "hoodie.datasource.hive_sync.partition_extractor_class",
            "org.apache.hudi.hive.MultiPartKeysValueExtractor",
        );
    }

    match operation {
        "bulk_insert" => set("hoodie.bulkinsert.shuffle.parallelism", "20"),
        "upsert" => {
            set("hoodie.upsert.shuffle.parallelism", "20");
            set("hoodie.cleaner.policy", "KEEP_LATEST_COMMITS");
            set("hoodie.cleaner.commits.retained", "10");
        }
        _ => {}
    }

    for (key, value) in &spec.options {
        options.insert(key.clone(), value.clone());
    }
    options
}

fn table_ref(table: &QualifiedName, transactional_catalog: bool) -> String {
    if transactional_catalog {
        format!("{}.{}", TRANSACTIONAL_CATALOG, table)
    } else {
        table.to_string()
    }
}

fn partitioned_by(partition_by: &[String]) -> String {
    if partition_by.is_empty() {
        String::new()
    } else {
        format!(" PARTITIONED BY ({})", partition_by.join(", "))
    }
}

fn order_by(partition_by: &[String]) -> String {
    if partition_by.is_empty() {
        String::new()
    } else {
        format!(" ORDER BY {}", partition_by.join(", "))
    }
}

fn tbl_properties(properties: &BTreeMap<String, String>) -> String {
    if properties.is_empty() {
        return String::new();
    }
    let pairs = properties
        .iter()
        .map(|(k, v)| format!("{}={}", sql_literal(k), sql_literal(v)))
        .collect::<Vec<_>>()
        .join(", ");
    format!(" TBLPROPERTIES ({})", pairs)
}

/// `spark.sql(...)` call for one SQL statement.
fn sql(statement: &str) -> String {
    format!("spark.sql({})", py_block(statement))
}

/// Single-quoted SQL string literal.
fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Triple-quoted Python string holding `text` verbatim.
fn py_block(text: &str) -> String {
    format!(
        "\"\"\"{}\"\"\"",
        text.replace('\\', "\\\\").replace('"', "\\\"")
    )
}

/// Python string literal; JSON string syntax is valid Python.
fn py_literal(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn py_literal_list(values: &[String]) -> String {
    serde_json::Value::from(values.to_vec()).to_string()
}

fn py_literal_map(values: &BTreeMap<String, String>) -> String {
    let map = values
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect::<serde_json::Map<_, _>>();
    serde_json::Value::Object(map).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dialect() -> SparkDialect {
        SparkDialect::new("s3://bucket/warehouse/", "myGlueLockTable")
    }

    fn spec(format: TableFormat) -> WriteSpec {
        WriteSpec {
            table: QualifiedName::new("analytics", "events"),
            format,
            location: "s3://bucket/warehouse/analytics/events".to_string(),
            source_view: "tmp_events".to_string(),
            partition_by: vec!["dt".to_string()],
            primary_key: vec!["id".to_string()],
            properties: BTreeMap::from([("format-version".to_string(), "2".to_string())]),
            options: BTreeMap::new(),
        }
    }

    #[test]
    fn test_every_script_emits_an_envelope() {
        let ops = [
            Operation::Create(spec(TableFormat::Parquet)),
            Operation::Append(spec(TableFormat::Delta)),
            Operation::Replace(spec(TableFormat::Hudi)),
            Operation::Sync(SyncOperation::RepairTable {
                table: QualifiedName::new("analytics", "events"),
            }),
        ];
        for op in &ops {
            let script = dialect().render(op);
            assert!(script.starts_with(PRELUDE));
            assert!(script.contains("_emit("), "{} has no envelope", op.kind());
        }
    }

    #[test]
    fn test_iceberg_create_uses_location_and_order() {
        let script = dialect().render(&Operation::Create(spec(TableFormat::Iceberg)));
        assert!(script.contains(
            "CREATE TABLE glue_catalog.analytics.events USING iceberg PARTITIONED BY (dt) \
             LOCATION 's3://bucket/warehouse/analytics/events' \
             TBLPROPERTIES ('format-version'='2') AS SELECT * FROM tmp_events ORDER BY dt"
        ));
        assert!(
            script.contains("\"spark.sql.catalog.glue_catalog.lock.table\", \"myGlueLockTable\"")
        );
        assert!(script.contains("\"s3://bucket/warehouse/analytics\""));
    }

    #[test]
    fn test_iceberg_merge_on_every_key() {
        let mut spec = spec(TableFormat::Iceberg);
        spec.primary_key = vec!["id".to_string(), "dt".to_string()];
        let script = dialect().render(&Operation::Upsert(spec));
        assert!(script.contains(
            "MERGE INTO glue_catalog.analytics.events t USING (SELECT * FROM tmp_events) s \
             ON t.id = s.id AND t.dt = s.dt \
             WHEN MATCHED THEN UPDATE SET * WHEN NOT MATCHED THEN INSERT *"
        ));
    }

    #[test]
    fn test_iceberg_replace_is_single_statement() {
        let script = dialect().render(&Operation::Replace(spec(TableFormat::Iceberg)));
        assert_eq!(script.matches("spark.sql(").count(), 1);
        assert!(script.contains("CREATE OR REPLACE TABLE glue_catalog.analytics.events"));
    }

    #[test]
    fn test_plain_tables_skip_transactional_session() {
        let mut spec = spec(TableFormat::Parquet);
        spec.partition_by.clear();
        let script = dialect().render(&Operation::Append(spec));
        assert!(!script.contains("SparkSession.builder"));
        assert!(script.contains("INSERT INTO analytics.events SELECT * FROM tmp_events\"\"\""));
    }

    #[test]
    fn test_partitioned_plain_insert_moves_partition_columns_last() {
        for (op, insert) in [
            (Operation::Append(spec(TableFormat::Parquet)), "INSERT INTO"),
            (Operation::Replace(spec(TableFormat::Parquet)), "INSERT OVERWRITE TABLE"),
        ] {
            let script = dialect().render(&op);
            let reorder = script
                .find("_df.createOrReplaceTempView(\"tmp_events_aligned\")")
                .expect("partition columns are realigned");
            let insert_at = script
                .find(&format!(
                    "{} analytics.events SELECT * FROM tmp_events_aligned ORDER BY dt",
                    insert
                ))
                .expect("insert reads the aligned view");
            assert!(reorder < insert_at);
            assert!(script.contains("_parts = [\"dt\"]"));
            assert!(script.contains("_df = spark.table(\"tmp_events\")"));
        }
    }

    #[test]
    fn test_delta_create_writes_then_registers() {
        let script = dialect().render(&Operation::Create(spec(TableFormat::Delta)));
        let write = script.find(".save(").unwrap();
        let register = script.find("USING delta LOCATION").unwrap();
        assert!(write < register);
        assert!(script.contains(".partitionBy(\"dt\")"));
    }

    #[test]
    fn test_hudi_options_defaults_and_overrides() {
        let mut spec = spec(TableFormat::Hudi);
        spec.options
            .insert("hoodie.index.type".to_string(), "BLOOM".to_string());

        let options = hudi_write_options(&spec, "upsert");
        assert_eq!(options["hoodie.datasource.write.operation"], "upsert");
        assert_eq!(options["hoodie.datasource.write.recordkey.field"], "id");
        assert_eq!(options["hoodie.datasource.write.precombine.field"], "update_hudi_ts");
        assert_eq!(options["hoodie.datasource.write.partitionpath.field"], "dt");
        assert_eq!(options["hoodie.cleaner.policy"], "KEEP_LATEST_COMMITS");
        assert_eq!(options["hoodie.index.type"], "BLOOM");

        let created = hudi_write_options(&spec, "bulk_insert");
        assert!(!created.contains_key("hoodie.cleaner.policy"));
    }

    #[test]
    fn test_hudi_unpartitioned_uses_non_partitioned_keygen() {
        let mut spec = spec(TableFormat::Hudi);
        spec.partition_by.clear();
        let options = hudi_write_options(&spec, "insert");
        assert_eq!(
            options["hoodie.datasource.write.keygenerator.class"],
            "org.apache.hudi.keygen.NonpartitionedKeyGenerator"
        );
        assert!(!options.contains_key("hoodie.datasource.write.partitionpath.field"));
    }

    #[test]
    fn test_expire_snapshots_retains_latest() {
        let script = dialect().render(&Operation::ExpireSnapshots {
            table: QualifiedName::new("analytics", "events"),
            older_than: "2024-01-02 00:00:00".to_string(),
            retain_last: 1,
        });
        assert!(script.contains(
            "CALL glue_catalog.system.expire_snapshots(table => 'analytics.events', \
             older_than => TIMESTAMP '2024-01-02 00:00:00', retain_last => 1)"
        ));
    }

    #[test]
    fn test_stage_adds_audit_column() {
        let script = dialect().render(&Operation::Stage(StageSpec {
            view: "tmp_events".to_string(),
            source_query: "select \"a\" as v".to_string(),
            audit_column: Some("update_iceberg_ts".to_string()),
        }));
        assert!(script.contains("spark.sql(\"\"\"select \\\"a\\\" as v\"\"\")"));
        assert!(script.contains("withColumn(\"update_iceberg_ts\", current_timestamp())"));
        assert!(script.contains("createOrReplaceTempView(\"tmp_events\")"));
    }

    #[test]
    fn test_manifest_table_points_at_symlink_dir() {
        let script = dialect().render(&Operation::Sync(SyncOperation::EnsureManifestTable {
            table: QualifiedName::new("analytics", "athena_events"),
            location: "s3://bucket/warehouse/analytics/events".to_string(),
            partition_by: vec![],
        }));
        assert!(script.contains("CREATE EXTERNAL TABLE IF NOT EXISTS analytics.athena_events ("));
        assert!(
            script.contains("s3://bucket/warehouse/analytics/events/_symlink_format_manifest/")
        );
    }

    #[test]
    fn test_sql_literal_escapes_quotes() {
        assert_eq!(sql_literal("it's"), "'it\\'s'");
    }
}
