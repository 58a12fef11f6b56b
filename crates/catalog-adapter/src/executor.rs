//! Operation execution over pooled sessions.
//!
//! An [`OperationExecutor`] is bound to one session for its lifetime, so a
//! staged view and the write that reads it run in the same session.

use crate::dialect::Dialect;
use crate::error::Result;
use crate::operation::Operation;
use crate::pool::{PooledSession, SessionPool};
use crate::session::Row;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// Runs operations and returns their rows.
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    async fn run(&self, op: &Operation) -> Result<Vec<Row>>;
}

/// Hands out executors with scoped session ownership.
#[async_trait]
pub trait ExecutorProvider: Send + Sync {
    /// Acquire an executor; its session is released when it is dropped.
    async fn acquire(&self) -> Result<Box<dyn OperationExecutor>>;

    /// Close every cached session.
    fn release_all(&self);
}

/// Executor that renders operations and runs them on a pooled session.
pub struct SessionExecutor {
    session: PooledSession,
    dialect: Arc<dyn Dialect>,
}

impl SessionExecutor {
    pub fn new(session: PooledSession, dialect: Arc<dyn Dialect>) -> Self {
        Self { session, dialect }
    }
}

#[async_trait]
impl OperationExecutor for SessionExecutor {
    async fn run(&self, op: &Operation) -> Result<Vec<Row>> {
        let start = Instant::now();
        let statement = self.dialect.render(op);
        tracing::trace!(operation = op.kind(), statement = %statement, "Rendered operation");

        let cursor = self.session.execute(&statement).await?;
        let rows = cursor.fetch_all();

        tracing::debug!(
            operation = op.kind(),
            rows = rows.len(),
            duration_ms = %start.elapsed().as_millis(),
            "Operation completed"
        );
        Ok(rows)
    }
}

/// [`ExecutorProvider`] backed by a [`SessionPool`].
#[derive(Clone)]
pub struct PooledExecutorProvider {
    pool: SessionPool,
    dialect: Arc<dyn Dialect>,
}

impl PooledExecutorProvider {
    pub fn new(pool: SessionPool, dialect: Arc<dyn Dialect>) -> Self {
        Self { pool, dialect }
    }

    pub fn pool(&self) -> &SessionPool {
        &self.pool
    }
}

#[async_trait]
impl ExecutorProvider for PooledExecutorProvider {
    async fn acquire(&self) -> Result<Box<dyn OperationExecutor>> {
        let session = self.pool.acquire().await?;
        Ok(Box::new(SessionExecutor::new(session, self.dialect.clone())))
    }

    fn release_all(&self) {
        self.pool.cleanup_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{QualifiedName, SyncOperation};
    use crate::pool::{PoolConfig, SessionFactory};
    use crate::session::{Cursor, ExecutionSession};
    use serde_json::json;
    use parking_lot::Mutex;

    /// Records statements and answers every one with a single row.
    #[derive(Clone, Default)]
    struct RecordingSession {
        statements: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ExecutionSession for RecordingSession {
        async fn execute(&self, statement: &str) -> Result<Cursor> {
            self.statements.lock().push(statement.to_string());
            Ok(Cursor::new(vec!["n".to_string()], vec![vec![json!(1)]]))
        }
    }

    #[async_trait]
    impl SessionFactory for RecordingSession {
        async fn open(&self) -> Result<Box<dyn ExecutionSession>> {
            Ok(Box::new(self.clone()))
        }
    }

    struct EchoDialect;

    impl Dialect for EchoDialect {
        fn render(&self, op: &Operation) -> String {
            op.kind().to_string()
        }
    }

    #[tokio::test]
    async fn test_executor_renders_and_returns_rows() {
        let session = RecordingSession::default();
        let pool = SessionPool::new(
            Arc::new(session.clone()),
            PoolConfig {
                max_idle: 2,
                ..Default::default()
            },
        );
        let provider = PooledExecutorProvider::new(pool.clone(), Arc::new(EchoDialect));

        {
            let executor = provider.acquire().await.unwrap();
            let rows = executor
                .run(&Operation::Sync(SyncOperation::RepairTable {
                    table: QualifiedName::new("analytics", "events"),
                }))
                .await
                .unwrap();
            assert_eq!(rows, vec![vec![json!(1)]]);
        }

        assert_eq!(*session.statements.lock(), vec!["repair_table"]);
        assert_eq!(pool.idle_count(), 1);

        provider.release_all();
        assert_eq!(pool.idle_count(), 0);
    }
}
