//! Scoped session acquisition.
//!
//! [`SessionPool::acquire`] waits for one of `max_sessions` permits, then
//! hands out a [`PooledSession`] guard. Dropping the guard returns the
//! session to the pool and releases the permit on every exit path, including
//! early returns and errors raised mid-statement. [`SessionPool::cleanup_all`]
//! discards idle sessions and makes outstanding guards close their session
//! instead of returning it.

use crate::error::{AdapterError, Result};
use crate::session::ExecutionSession;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Opens new sessions for the pool.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn ExecutionSession>>;
}

/// Pool sizing.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Idle sessions kept for reuse
    pub max_idle: usize,
    /// Sessions checked out at once
    pub max_sessions: usize,
    /// Maximum wait for a free session
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: 4,
            max_sessions: 8,
            acquire_timeout: Duration::from_secs(300),
        }
    }
}

struct PoolInner {
    idle: Mutex<Vec<Box<dyn ExecutionSession>>>,
    permits: Arc<Semaphore>,
    /// Bumped by `cleanup_all`; guards from older generations close on drop
    generation: AtomicU64,
    config: PoolConfig,
}

/// Pool of reusable execution sessions.
#[derive(Clone)]
pub struct SessionPool {
    factory: Arc<dyn SessionFactory>,
    inner: Arc<PoolInner>,
}

impl std::fmt::Debug for SessionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPool")
            .field("idle", &self.idle_count())
            .field("available_permits", &self.available_permits())
            .field("max_sessions", &self.inner.config.max_sessions)
            .finish()
    }
}

impl SessionPool {
    pub fn new(factory: Arc<dyn SessionFactory>, config: PoolConfig) -> Self {
        Self {
            factory,
            inner: Arc::new(PoolInner {
                idle: Mutex::new(Vec::new()),
                permits: Arc::new(Semaphore::new(config.max_sessions)),
                generation: AtomicU64::new(0),
                config,
            }),
        }
    }

    /// Wait for a permit, then take an idle session or open a new one.
    ///
    /// Fails with a session error if no permit frees up within the acquire
    /// timeout.
    pub async fn acquire(&self) -> Result<PooledSession> {
        let permit = match tokio::time::timeout(
            self.inner.config.acquire_timeout,
            self.inner.permits.clone().acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(AdapterError::Session("session pool closed".into())),
            Err(_) => {
                tracing::warn!(
                    max_sessions = self.inner.config.max_sessions,
                    timeout_ms = self.inner.config.acquire_timeout.as_millis() as u64,
                    "Timed out waiting for a free session"
                );
                return Err(AdapterError::Session(format!(
                    "timeout waiting for a free session ({} in use, timeout: {}s)",
                    self.inner.config.max_sessions,
                    self.inner.config.acquire_timeout.as_secs()
                )));
            }
        };

        let generation = self.inner.generation.load(Ordering::Acquire);
        let reused = self.inner.idle.lock().pop();
        let session = match reused {
            Some(session) => session,
            None => {
                tracing::debug!("Opening new execution session");
                self.factory.open().await?
            }
        };
        Ok(PooledSession {
            session: Some(session),
            pool: self.inner.clone(),
            generation,
            _permit: permit,
            acquired_at: Instant::now(),
        })
    }

    /// Drop every idle session and retire the ones currently checked out.
    pub fn cleanup_all(&self) {
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        let closed = std::mem::take(&mut *self.inner.idle.lock());
        tracing::debug!(closed = closed.len(), "Released all pooled sessions");
    }

    pub fn idle_count(&self) -> usize {
        self.inner.idle.lock().len()
    }

    /// Sessions that can still be checked out without waiting.
    pub fn available_permits(&self) -> usize {
        self.inner.permits.available_permits()
    }
}

/// A checked-out session; returned to its pool when dropped.
pub struct PooledSession {
    session: Option<Box<dyn ExecutionSession>>,
    pool: Arc<PoolInner>,
    generation: u64,
    _permit: OwnedSemaphorePermit,
    acquired_at: Instant,
}

impl std::fmt::Debug for PooledSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledSession")
            .field("generation", &self.generation)
            .field("hold_time_ms", &self.acquired_at.elapsed().as_millis())
            .finish()
    }
}

impl PooledSession {
    /// Time since the session was checked out.
    pub fn hold_time(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

impl Deref for PooledSession {
    type Target = dyn ExecutionSession;

    fn deref(&self) -> &Self::Target {
        // Only `drop` takes the session out.
        match self.session {
            Some(ref session) => session.as_ref(),
            None => unreachable!("pooled session used after release"),
        }
    }
}

impl Drop for PooledSession {
    fn drop(&mut self) {
        tracing::debug!(
            hold_time_ms = self.acquired_at.elapsed().as_millis() as u64,
            "Releasing session permit"
        );
        let Some(session) = self.session.take() else {
            return;
        };
        if self.generation != self.pool.generation.load(Ordering::Acquire) {
            tracing::debug!("Closing session retired by cleanup");
            return;
        }
        let mut idle = self.pool.idle.lock();
        if idle.len() < self.pool.config.max_idle {
            idle.push(session);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Cursor;
    use std::sync::atomic::AtomicUsize;

    struct NoopSession;

    #[async_trait]
    impl ExecutionSession for NoopSession {
        async fn execute(&self, statement: &str) -> Result<Cursor> {
            if statement == "fail" {
                return Err(AdapterError::RemoteExecution {
                    message: "boom".to_string(),
                });
            }
            Ok(Cursor::empty())
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        opened: AtomicUsize,
    }

    #[async_trait]
    impl SessionFactory for CountingFactory {
        async fn open(&self) -> Result<Box<dyn ExecutionSession>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(NoopSession))
        }
    }

    fn sized(max_idle: usize, max_sessions: usize) -> PoolConfig {
        PoolConfig {
            max_idle,
            max_sessions,
            acquire_timeout: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn test_session_returned_on_drop_and_reused() {
        let factory = Arc::new(CountingFactory::default());
        let pool = SessionPool::new(factory.clone(), sized(2, 4));

        {
            let session = pool.acquire().await.unwrap();
            session.execute("select 1").await.unwrap();
        }
        assert_eq!(pool.idle_count(), 1);

        let _again = pool.acquire().await.unwrap();
        assert_eq!(factory.opened.load(Ordering::SeqCst), 1);
        assert_eq!(pool.idle_count(), 0);
    }

    #[tokio::test]
    async fn test_session_returned_after_error() {
        let pool = SessionPool::new(Arc::new(CountingFactory::default()), sized(2, 4));

        let result = async {
            let session = pool.acquire().await?;
            session.execute("fail").await?;
            Ok::<_, AdapterError>(())
        }
        .await;

        assert!(result.is_err());
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.available_permits(), 4);
    }

    #[tokio::test]
    async fn test_cleanup_retires_outstanding_sessions() {
        let factory = Arc::new(CountingFactory::default());
        let pool = SessionPool::new(factory.clone(), sized(4, 4));

        let idle = pool.acquire().await.unwrap();
        let outstanding = pool.acquire().await.unwrap();
        drop(idle);
        assert_eq!(pool.idle_count(), 1);

        pool.cleanup_all();
        assert_eq!(pool.idle_count(), 0);

        drop(outstanding);
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.available_permits(), 4);

        let _fresh = pool.acquire().await.unwrap();
        assert_eq!(factory.opened.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_idle_list_is_bounded() {
        let pool = SessionPool::new(Arc::new(CountingFactory::default()), sized(1, 4));

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        drop(a);
        drop(b);

        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test]
    async fn test_checkout_is_bounded() {
        let factory = Arc::new(CountingFactory::default());
        let pool = SessionPool::new(factory.clone(), sized(2, 2));

        let first = pool.acquire().await.unwrap();
        let _second = pool.acquire().await.unwrap();
        assert_eq!(pool.available_permits(), 0);

        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, AdapterError::Session(_)));
        assert_eq!(factory.opened.load(Ordering::SeqCst), 2);

        drop(first);
        assert_eq!(pool.available_permits(), 1);
        let _third = pool.acquire().await.unwrap();
        assert_eq!(factory.opened.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_waiting_acquire_resumes_when_session_is_returned() {
        let pool = SessionPool::new(
            Arc::new(CountingFactory::default()),
            PoolConfig {
                max_idle: 1,
                max_sessions: 1,
                acquire_timeout: Duration::from_secs(5),
            },
        );

        let held = pool.acquire().await.unwrap();
        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.map(|s| s.hold_time()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        assert!(waiter.await.unwrap().is_ok());
    }
}
