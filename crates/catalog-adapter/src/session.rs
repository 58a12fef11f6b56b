//! Execution session: one statement channel to the remote engine.
//!
//! Statements are opaque text. Results come back through a forward-only
//! [`Cursor`] that can be drained once.

use crate::error::{AdapterError, Result};
use crate::pool::SessionFactory;
use async_trait::async_trait;
use lakebridge_catalog_client::{SharedClient, StatementOutput, StatementState};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// One result row, column values in order.
pub type Row = Vec<serde_json::Value>;

/// Submits statements and returns their results.
///
/// Calls wait for remote completion; there is no cancellation at this layer.
#[async_trait]
pub trait ExecutionSession: Send + Sync {
    async fn execute(&self, statement: &str) -> Result<Cursor>;
}

/// Forward-only result set.
#[derive(Debug)]
pub struct Cursor {
    columns: Vec<String>,
    rows: std::vec::IntoIter<Row>,
}

impl Cursor {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows: rows.into_iter(),
        }
    }

    /// A cursor with no columns and no rows.
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Drain every remaining row, consuming the cursor.
    pub fn fetch_all(self) -> Vec<Row> {
        self.rows.collect()
    }
}

impl Iterator for Cursor {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.rows.next()
    }
}

/// JSON document printed by rendered statements that return rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResultEnvelope {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl ResultEnvelope {
    /// Parse the last line of statement output that holds an envelope.
    ///
    /// Statements may print diagnostics before the envelope; those lines are
    /// skipped. Output without an envelope yields an empty cursor.
    pub fn parse(text: &str) -> Cursor {
        text.lines()
            .rev()
            .map(str::trim)
            .filter(|line| line.starts_with('{'))
            .find_map(|line| serde_json::from_str::<ResultEnvelope>(line).ok())
            .map(|env| Cursor::new(env.columns, env.rows))
            .unwrap_or_else(Cursor::empty)
    }
}

/// Session backed by an interactive session of the remote engine.
///
/// Submits with `RunStatement` and polls `GetStatement` until the statement
/// reaches a terminal state or `statement_timeout` elapses.
pub struct GlueSession {
    client: SharedClient,
    session_id: String,
    poll_interval: Duration,
    statement_timeout: Duration,
}

impl GlueSession {
    pub fn new(client: SharedClient, session_id: impl Into<String>) -> Self {
        let poll_interval = client.config().statement_poll_interval;
        let statement_timeout = client.config().statement_timeout;
        Self {
            client,
            session_id: session_id.into(),
            poll_interval,
            statement_timeout,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn output_error(output: &StatementOutput) -> String {
        let name = output.error_name.as_deref().unwrap_or("Error");
        let value = output.error_value.as_deref().unwrap_or("statement failed");
        format!("{}: {}", name, value)
    }
}

#[async_trait]
impl ExecutionSession for GlueSession {
    async fn execute(&self, statement: &str) -> Result<Cursor> {
        let start = Instant::now();
        let id = self
            .client
            .run_statement(&self.session_id, statement)
            .await
            .map_err(|e| AdapterError::Session(format!("submit statement: {}", e)))?;

        tracing::debug!(session_id = %self.session_id, statement_id = id, "Statement submitted");

        loop {
            let current = self
                .client
                .get_statement(&self.session_id, id)
                .await
                .map_err(|e| AdapterError::Session(format!("poll statement {}: {}", id, e)))?;

            match current.state {
                StatementState::Available => {
                    let output = current.output.unwrap_or_default();
                    if output.is_error() {
                        let message = Self::output_error(&output);
                        tracing::error!(
                            session_id = %self.session_id,
                            statement_id = id,
                            error = %message,
                            "Statement raised"
                        );
                        return Err(AdapterError::RemoteExecution { message });
                    }
                    tracing::debug!(
                        session_id = %self.session_id,
                        statement_id = id,
                        duration_ms = %start.elapsed().as_millis(),
                        "Statement completed"
                    );
                    let text = output.data.and_then(|d| d.text_plain).unwrap_or_default();
                    return Ok(ResultEnvelope::parse(&text));
                }
                StatementState::Error | StatementState::Cancelled => {
                    let message = current
                        .output
                        .as_ref()
                        .map(Self::output_error)
                        .unwrap_or_else(|| format!("statement {:?}", current.state));
                    tracing::error!(
                        session_id = %self.session_id,
                        statement_id = id,
                        error = %message,
                        "Statement failed"
                    );
                    return Err(AdapterError::RemoteExecution { message });
                }
                StatementState::Waiting | StatementState::Running | StatementState::Cancelling => {
                    if start.elapsed() >= self.statement_timeout {
                        tracing::warn!(
                            session_id = %self.session_id,
                            statement_id = id,
                            state = ?current.state,
                            timeout_ms = self.statement_timeout.as_millis() as u64,
                            "Statement timed out; it may still be running on the session"
                        );
                        return Err(AdapterError::RemoteExecution {
                            message: format!(
                                "statement {} did not finish within {:?}",
                                id, self.statement_timeout
                            ),
                        });
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}

/// Opens [`GlueSession`] handles bound to one interactive session.
pub struct GlueSessionFactory {
    client: SharedClient,
    session_id: String,
}

impl GlueSessionFactory {
    pub fn new(client: SharedClient, session_id: impl Into<String>) -> Self {
        Self {
            client,
            session_id: session_id.into(),
        }
    }
}

#[async_trait]
impl SessionFactory for GlueSessionFactory {
    async fn open(&self) -> Result<Box<dyn ExecutionSession>> {
        Ok(Box::new(GlueSession::new(
            self.client.clone(),
            self.session_id.clone(),
        )))
    }
}
