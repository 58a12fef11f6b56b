//! Shared test utilities for lakebridge integration tests.
//!
//! - [`FakeLakehouse`]: in-memory catalog and engine that interprets adapter
//!   operations, with an operation log and fault injection
//! - [`init_tracing`]: test log output controlled by `RUST_LOG`
//!
//! # Example
//!
//! ```rust,ignore
//! use lakebridge_test_utils::FakeLakehouse;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let lake = FakeLakehouse::new();
//!     lake.register_source("select * from raw", &[("id", "bigint")], vec![vec![1.into()]]);
//!     let adapter = lake.adapter();
//!     // ... run test ...
//! }
//! ```

// Test utilities panic on broken fixtures instead of propagating.
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

pub mod lakehouse;

pub use lakehouse::{FakeLakehouse, FakeTable, TEST_LOCATION};

/// Initialize test logging; safe to call from every test.
pub fn init_tracing() {
    use tracing_subscriber::filter::Directive;
    use tracing_subscriber::{fmt, EnvFilter};

    let directive: Directive = "lakebridge_catalog_adapter=debug"
        .parse()
        .expect("valid directive");
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .with_test_writer()
        .try_init();
}
