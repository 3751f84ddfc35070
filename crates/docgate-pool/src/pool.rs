//! Semaphore-bounded connection pool.

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::connector::Connector;
use crate::error::{PoolError, PoolResult};

// =============================================================================
// Pool
// =============================================================================

struct IdleConnection<T> {
    conn: T,
    created_at: Instant,
}

struct PoolInner<C: Connector> {
    connector: C,
    config: PoolConfig,
    semaphore: Arc<Semaphore>,
    idle: Mutex<VecDeque<IdleConnection<C::Connection>>>,
    in_use: AtomicUsize,
    closed: AtomicBool,
}

impl<C: Connector> PoolInner<C> {
    fn idle(&self) -> MutexGuard<'_, VecDeque<IdleConnection<C::Connection>>> {
        self.idle.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_expired(&self, created_at: Instant) -> bool {
        self.config
            .max_lifetime
            .is_some_and(|lifetime| created_at.elapsed() >= lifetime)
    }

    fn record_in_use(&self) {
        metrics::gauge!("docgate_pool_in_use").set(self.in_use.load(Ordering::SeqCst) as f64);
    }
}

/// Status snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub max_connections: usize,
    pub in_use: usize,
    pub idle: usize,
    pub closed: bool,
}

/// Bounded pool of connections produced by a [`Connector`].
///
/// Never hands out more than `max_connections` leases at once. Cloning is cheap
/// and shares the same pool.
pub struct Pool<C: Connector> {
    inner: Arc<PoolInner<C>>,
}

impl<C: Connector> Clone for Pool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> fmt::Debug for Pool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool").field("status", &self.status()).finish()
    }
}

impl<C: Connector> Pool<C> {
    /// Validate the config and open `min_connections` connections up front.
    pub async fn open(connector: C, config: PoolConfig) -> PoolResult<Self> {
        config.validate()?;

        let mut warm = VecDeque::with_capacity(config.min_connections);
        for _ in 0..config.min_connections {
            let conn = connector
                .connect()
                .await
                .map_err(|e| PoolError::Connect(Box::new(e)))?;
            warm.push_back(IdleConnection {
                conn,
                created_at: Instant::now(),
            });
        }

        info!(
            min = config.min_connections,
            max = config.max_connections,
            "Opened connection pool"
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                semaphore: Arc::new(Semaphore::new(config.max_connections)),
                connector,
                config,
                idle: Mutex::new(warm),
                in_use: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
            }),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn connector(&self) -> &C {
        &self.inner.connector
    }

    /// Lease a connection, waiting up to the configured acquire timeout.
    pub async fn acquire(&self) -> PoolResult<PooledConnection<C>> {
        self.acquire_timeout(self.inner.config.acquire_timeout).await
    }

    /// Lease a connection, waiting up to `timeout` for a free slot.
    pub async fn acquire_timeout(&self, timeout: Duration) -> PoolResult<PooledConnection<C>> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(PoolError::Closed);
        }

        let permit = match tokio::time::timeout(
            timeout,
            Arc::clone(&self.inner.semaphore).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(PoolError::Closed),
            Err(_) => {
                metrics::counter!("docgate_pool_acquire_timeouts_total").increment(1);
                warn!(?timeout, "Connection pool exhausted");
                return Err(PoolError::Exhausted { timeout });
            }
        };

        // Reuse an idle connection if a valid one is left
        loop {
            let candidate = self.inner.idle().pop_front();
            let Some(mut idle) = candidate else { break };

            if self.inner.is_expired(idle.created_at) {
                debug!("Closing connection past max lifetime");
                self.inner.connector.close(idle.conn);
                continue;
            }
            if !self.inner.connector.is_valid(&mut idle.conn).await {
                debug!("Discarding invalid idle connection");
                self.inner.connector.close(idle.conn);
                continue;
            }
            return Ok(self.lease(idle.conn, idle.created_at, permit));
        }

        // Permit is dropped on error, freeing the slot
        let conn = self
            .inner
            .connector
            .connect()
            .await
            .map_err(|e| PoolError::Connect(Box::new(e)))?;
        debug!("Opened new pooled connection");
        Ok(self.lease(conn, Instant::now(), permit))
    }

    fn lease(
        &self,
        conn: C::Connection,
        created_at: Instant,
        permit: OwnedSemaphorePermit,
    ) -> PooledConnection<C> {
        self.inner.in_use.fetch_add(1, Ordering::SeqCst);
        self.inner.record_in_use();
        PooledConnection {
            conn: Some(conn),
            created_at,
            discard: false,
            pool: Arc::clone(&self.inner),
            _permit: permit,
        }
    }

    /// Return a connection to the pool. Same as dropping it.
    pub fn release(&self, conn: PooledConnection<C>) {
        drop(conn);
    }

    /// Close the pool.
    ///
    /// Pending and future `acquire()` calls fail with [`PoolError::Closed`]. Idle
    /// connections are closed now; leased ones are closed when released.
    pub fn close_all(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.semaphore.close();

        let drained: Vec<_> = self.inner.idle().drain(..).collect();
        let count = drained.len();
        for idle in drained {
            self.inner.connector.close(idle.conn);
        }
        info!(closed_idle = count, "Closed connection pool");
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            max_connections: self.inner.config.max_connections,
            in_use: self.inner.in_use.load(Ordering::SeqCst),
            idle: self.inner.idle().len(),
            closed: self.inner.closed.load(Ordering::SeqCst),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Lease guard
// =============================================================================

/// A leased connection. Returned to the pool on drop.
pub struct PooledConnection<C: Connector> {
    conn: Option<C::Connection>,
    created_at: Instant,
    discard: bool,
    pool: Arc<PoolInner<C>>,
    // Dropped after `Drop::drop` has put the connection back
    _permit: OwnedSemaphorePermit,
}

impl<C: Connector> PooledConnection<C> {
    /// Release the slot but close the connection instead of reusing it.
    pub fn discard(mut self) {
        self.discard = true;
    }

    /// Mark the connection as broken so it is closed on release.
    pub fn mark_broken(&mut self) {
        self.discard = true;
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl<C: Connector> Deref for PooledConnection<C> {
    type Target = C::Connection;

    fn deref(&self) -> &Self::Target {
        // Only taken in Drop
        self.conn.as_ref().unwrap_or_else(|| unreachable!("connection taken before drop"))
    }
}

impl<C: Connector> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().unwrap_or_else(|| unreachable!("connection taken before drop"))
    }
}

impl<C: Connector> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        self.pool.in_use.fetch_sub(1, Ordering::SeqCst);
        self.pool.record_in_use();

        let Some(conn) = self.conn.take() else { return };

        if self.discard || self.pool.is_expired(self.created_at) {
            self.pool.connector.close(conn);
            return;
        }

        // `close_all` flips `closed` before draining under this lock, so the
        // check must happen while holding it.
        let mut idle = self.pool.idle();
        if self.pool.closed.load(Ordering::SeqCst) {
            drop(idle);
            self.pool.connector.close(conn);
            return;
        }
        idle.push_back(IdleConnection {
            conn,
            created_at: self.created_at,
        });
    }
}

impl<C: Connector> fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("age", &self.age())
            .field("discard", &self.discard)
            .finish()
    }
}
