//! Schema and relation lifecycle against the in-memory lakehouse.
//!
//! These tests verify:
//! - Schema creation is idempotent and grants the configured principal once
//! - Catalog reads degrade to false/empty on outages
//! - Schema drop always releases cached sessions
//! - Relations and columns come back in the uniform model

use lakebridge_catalog_adapter::{
    AdapterConfig, AdapterError, Column, FormatTag, Relation, RelationType, TableFormat,
};
use lakebridge_catalog_client::Resource;
use lakebridge_test_utils::{init_tracing, FakeLakehouse, FakeTable, TEST_LOCATION};
use serde_json::json;

// ============================================================================
// Schemas
// ============================================================================

#[tokio::test]
async fn test_create_schema_is_idempotent() {
    init_tracing();
    let lake = FakeLakehouse::new();
    let adapter = lake.adapter();
    let schema = Relation::for_schema("analytics");

    adapter.create_schema(&schema).await.unwrap();
    adapter.create_schema(&schema).await.unwrap();

    assert!(adapter.schema_exists("analytics").await);
    assert_eq!(lake.database_count(), 1);
    assert_eq!(
        lake.database_location("analytics").as_deref(),
        Some("s3://test-bucket/warehouse/analytics/")
    );
    assert_eq!(lake.grants().len(), 2);
}

#[tokio::test]
async fn test_create_schema_grants_database_and_table_wildcard() {
    let lake = FakeLakehouse::new();
    let adapter = lake.adapter();

    adapter
        .create_schema(&Relation::table("analytics", "events"))
        .await
        .unwrap();

    let grants = lake.grants();
    assert_eq!(grants.len(), 2);
    assert_ne!(grants[0].id, grants[1].id);
    for grant in &grants {
        assert_eq!(
            grant.principal.data_lake_principal_identifier,
            "arn:aws:iam::123456789012:role/transform"
        );
        assert_eq!(grant.permissions, grant.permissions_with_grant_option);
    }

    assert!(matches!(
        &grants[0].resource,
        Resource::Database { name } if name == "analytics"
    ));
    assert!(grants[0].permissions.contains(&"CREATE_TABLE".to_string()));

    match &grants[1].resource {
        Resource::Table {
            database_name,
            catalog_id,
            ..
        } => {
            assert_eq!(database_name, "analytics");
            assert_eq!(catalog_id.as_deref(), Some("123456789012"));
        }
        other => panic!("expected table wildcard grant, got {:?}", other),
    }
    assert!(grants[1].permissions.contains(&"SELECT".to_string()));
}

#[tokio::test]
async fn test_create_schema_without_principal_skips_grants() {
    let lake = FakeLakehouse::new();
    let config = AdapterConfig::builder(TEST_LOCATION)
        .session_id("test-session")
        .build()
        .unwrap();
    let adapter = lake.adapter_with(config);

    adapter
        .create_schema(&Relation::for_schema("analytics"))
        .await
        .unwrap();

    assert!(lake.has_database("analytics"));
    assert!(lake.grants().is_empty());
}

#[tokio::test]
async fn test_create_schema_surfaces_grant_failure() {
    let lake = FakeLakehouse::new();
    let adapter = lake.adapter();
    lake.fail_next("grant_permissions", "AccessDeniedException");

    let err = adapter
        .create_schema(&Relation::for_schema("analytics"))
        .await
        .unwrap_err();

    assert!(matches!(err, AdapterError::CatalogUnavailable(_)));
    assert!(lake.has_database("analytics"));
}

#[tokio::test]
async fn test_schema_exists_degrades_on_outage() {
    let lake = FakeLakehouse::new();
    lake.add_database("analytics");
    let adapter = lake.adapter();
    assert!(adapter.schema_exists("analytics").await);

    lake.set_catalog_unavailable(true);
    assert!(!adapter.schema_exists("analytics").await);
    assert!(adapter.list_relations_in_schema("analytics").await.is_empty());
    assert!(adapter.resolve_relation("analytics", "events").await.is_none());
}

#[tokio::test]
async fn test_drop_schema_releases_sessions() {
    let lake = FakeLakehouse::new();
    lake.add_database("analytics");
    let adapter = lake.adapter();

    adapter
        .drop_schema(&Relation::for_schema("analytics"))
        .await
        .unwrap();

    assert!(!lake.has_database("analytics"));
    assert_eq!(lake.release_count(), 1);
}

#[tokio::test]
async fn test_drop_schema_releases_sessions_on_failure() {
    let lake = FakeLakehouse::new();
    lake.add_database("analytics");
    lake.fail_next("delete_database", "InternalServiceException");
    let adapter = lake.adapter();

    let result = adapter.drop_schema(&Relation::for_schema("analytics")).await;

    assert!(result.is_err());
    assert!(lake.has_database("analytics"));
    assert_eq!(lake.release_count(), 1);
}

#[tokio::test]
async fn test_drop_absent_schema_is_noop() {
    let lake = FakeLakehouse::new();
    let adapter = lake.adapter();

    adapter
        .drop_schema(&Relation::for_schema("missing"))
        .await
        .unwrap();

    assert_eq!(lake.release_count(), 0);
}

// ============================================================================
// Relations
// ============================================================================

#[tokio::test]
async fn test_resolve_relation_types() {
    let lake = FakeLakehouse::new();
    lake.add_table(
        "analytics",
        "events",
        FakeTable::new(TableFormat::Iceberg, &[("id", "bigint")], Vec::new()),
    );
    lake.add_table(
        "analytics",
        "daily",
        FakeTable::new(TableFormat::Parquet, &[("id", "bigint")], Vec::new())
            .with_type("VIRTUAL_VIEW"),
    );
    lake.add_table(
        "analytics",
        "odd",
        FakeTable::new(TableFormat::Parquet, &[("id", "bigint")], Vec::new())
            .with_type("GOVERNED"),
    );
    let adapter = lake.adapter();

    let events = adapter.resolve_relation("analytics", "events").await.unwrap();
    assert_eq!(events.relation_type, RelationType::IcebergTable);
    assert_eq!(events.database, "analytics");

    let daily = adapter.resolve_relation("analytics", "daily").await.unwrap();
    assert_eq!(daily.relation_type, RelationType::View);

    let odd = adapter.resolve_relation("analytics", "odd").await.unwrap();
    assert_eq!(odd.relation_type, RelationType::Unknown);

    assert!(adapter.resolve_relation("analytics", "missing").await.is_none());
    assert!(!adapter
        .relation_exists(&Relation::table("analytics", "missing"))
        .await);
}

#[tokio::test]
async fn test_list_relations_in_schema() {
    let lake = FakeLakehouse::new();
    lake.add_table(
        "analytics",
        "events",
        FakeTable::new(TableFormat::Iceberg, &[("id", "bigint")], Vec::new()),
    );
    lake.add_table(
        "analytics",
        "users",
        FakeTable::new(TableFormat::Parquet, &[("id", "bigint")], Vec::new()),
    );
    let adapter = lake.adapter();

    let relations = adapter.list_relations_in_schema("analytics").await;
    assert_eq!(
        relations,
        vec![
            Relation::table("analytics", "events"),
            Relation::table("analytics", "users"),
        ]
    );
    assert_eq!(relations[0].relation_type, RelationType::IcebergTable);
    assert_eq!(relations[1].relation_type, RelationType::Table);

    assert!(adapter.list_relations_in_schema("missing").await.is_empty());
}

#[tokio::test]
async fn test_get_table_format() {
    let lake = FakeLakehouse::new();
    lake.add_table(
        "analytics",
        "events",
        FakeTable::new(TableFormat::Hudi, &[("id", "bigint")], Vec::new()),
    );
    lake.add_table(
        "analytics",
        "daily",
        FakeTable::new(TableFormat::Parquet, &[("id", "bigint"), ("dt", "string")], Vec::new())
            .partitioned_by(&["dt"]),
    );
    let adapter = lake.adapter();

    assert_eq!(
        adapter
            .get_table_format(&Relation::table("analytics", "events"))
            .await
            .unwrap(),
        Some(FormatTag::TransactionalMergeOnRead)
    );
    assert_eq!(
        adapter
            .get_table_format(&Relation::table("analytics", "daily"))
            .await
            .unwrap(),
        Some(FormatTag::PartitionedPlain)
    );
    assert_eq!(
        adapter
            .get_table_format(&Relation::table("analytics", "missing"))
            .await
            .unwrap(),
        None
    );

    lake.set_catalog_unavailable(true);
    let err = adapter
        .get_table_format(&Relation::table("analytics", "events"))
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::CatalogUnavailable(_)));
}

// ============================================================================
// Columns
// ============================================================================

#[tokio::test]
async fn test_columns_strip_bookkeeping_and_partition_section() {
    let lake = FakeLakehouse::new();
    lake.add_table(
        "analytics",
        "events",
        FakeTable::new(
            TableFormat::Hudi,
            &[("id", "bigint"), ("payload", "string"), ("dt", "string")],
            vec![vec![json!(1), json!("a"), json!("2024-01-01")]],
        )
        .partitioned_by(&["dt"]),
    );
    let adapter = lake.adapter();

    let columns = adapter
        .get_columns_in_relation(&Relation::table("analytics", "events"))
        .await
        .unwrap();

    assert_eq!(
        columns,
        vec![
            Column::new("id", "bigint"),
            Column::new("payload", "string"),
            Column::new("dt", "string"),
        ]
    );
    assert_eq!(lake.open_sessions(), 0);
}

#[tokio::test]
async fn test_columns_of_copy_on_write_table_use_transactional_catalog() {
    let lake = FakeLakehouse::new();
    lake.add_table(
        "analytics",
        "events",
        FakeTable::new(TableFormat::Iceberg, &[("id", "bigint")], Vec::new()),
    );
    let adapter = lake.adapter();

    adapter
        .get_columns_in_relation(&Relation::table("analytics", "events"))
        .await
        .unwrap();

    assert!(matches!(
        lake.operations().as_slice(),
        [lakebridge_catalog_adapter::Operation::Describe {
            transactional_catalog: true,
            ..
        }]
    ));
}

#[tokio::test]
async fn test_columns_of_missing_table_is_not_found() {
    let lake = FakeLakehouse::new();
    lake.add_database("analytics");
    let adapter = lake.adapter();

    let err = adapter
        .get_columns_in_relation(&Relation::table("analytics", "missing"))
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert!(lake.operations().is_empty());
}

#[tokio::test]
async fn test_get_catalog_lists_every_column() {
    let lake = FakeLakehouse::new();
    lake.add_table(
        "analytics",
        "events",
        FakeTable::new(TableFormat::Iceberg, &[("id", "bigint"), ("v", "string")], Vec::new()),
    );
    lake.add_table(
        "analytics",
        "users",
        FakeTable::new(TableFormat::Parquet, &[("user_id", "int")], Vec::new()),
    );
    let adapter = lake.adapter();

    let rows = adapter.get_catalog("analytics").await.unwrap();

    let summary: Vec<(String, String, usize, RelationType)> = rows
        .iter()
        .map(|r| {
            (
                r.table_name.clone(),
                r.column_name.clone(),
                r.column_index,
                r.table_type,
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            ("events".to_string(), "id".to_string(), 0, RelationType::IcebergTable),
            ("events".to_string(), "v".to_string(), 1, RelationType::IcebergTable),
            ("users".to_string(), "user_id".to_string(), 0, RelationType::Table),
        ]
    );
    assert!(rows.iter().all(|r| r.table_database == "analytics"));
    assert_eq!(rows[2].column_type, "int");
}
