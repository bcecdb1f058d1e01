//! Connection pool: a fixed set of validated connections shared by callers.
//!
//! `Pool<F>` opens `initial_size` connections up front through `F::create`
//! and never grows past that set. A connection found broken on release is
//! destroyed and replaced one-for-one; if the replacement cannot be created
//! the pool keeps serving with one connection fewer.

pub mod config;

use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::connection::{Config, Connection, Factory};
use crate::error::{Error, Result};
use crate::guard::Guard;
use crate::idle::IdleQueue;

pub use config::PoolConfig;

// ---------------------------------------------------------------------------
// Pooled<C>
// ---------------------------------------------------------------------------

/// A connection checked out of a [`Pool`].
///
/// Hand it back with [`Pool::release`]. The handle is not `Clone`, so a
/// checkout can be released at most once.
pub struct Pooled<C> {
    id: Uuid,
    connection: Arc<C>,
}

impl<C> Pooled<C> {
    /// Identifier the pool tracks this connection under.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl<C> Deref for Pooled<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.connection
    }
}

impl<C: std::fmt::Debug> std::fmt::Debug for Pooled<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pooled")
            .field("id", &self.id)
            .field("connection", &self.connection)
            .finish()
    }
}

/// Point-in-time view of the pool's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Connections created and not yet destroyed, idle or borrowed.
    pub tracked: usize,
    /// Connections available for borrowing.
    pub idle: usize,
    /// Capacity of the idle container.
    pub max_size: usize,
    /// Whether shutdown has begun.
    pub is_shutdown: bool,
}

impl PoolStatus {
    /// Connections currently held by callers.
    #[must_use]
    pub fn borrowed(&self) -> usize {
        self.tracked.saturating_sub(self.idle)
    }
}

// ---------------------------------------------------------------------------
// Pool<F>
// ---------------------------------------------------------------------------

/// Inner shared state for the pool.
struct PoolInner<F: Factory> {
    factory: F,
    config: F::Config,
    pool_config: PoolConfig,
    idle: IdleQueue<Pooled<F::Connection>>,
    /// Every connection created and not yet destroyed, keyed by `Pooled::id`.
    tracked: DashMap<Uuid, Arc<F::Connection>>,
    shutdown: AtomicBool,
}

/// Bounded pool of reusable connections.
///
/// Cloning is cheap and every clone refers to the same pool.
pub struct Pool<F: Factory> {
    inner: Arc<PoolInner<F>>,
}

impl<F: Factory> Clone for Pool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: Factory> std::fmt::Debug for Pool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("resource_id", &self.resource_id())
            .field("status", &self.status())
            .finish()
    }
}

impl<F: Factory> Pool<F> {
    /// Create a pool and eagerly open `pool_config.initial_size` connections.
    ///
    /// # Errors
    /// - [`Error::Configuration`] if `pool_config` (or `config`) is invalid;
    ///   nothing is created.
    /// - [`Error::Creation`] if the factory fails. Connections opened before
    ///   the failure are closed before the error is returned.
    pub async fn create(factory: F, config: F::Config, pool_config: PoolConfig) -> Result<Self> {
        pool_config.validate()?;
        config.validate()?;

        let max_size = pool_config.max_size;
        let pool = Self {
            inner: Arc::new(PoolInner {
                factory,
                config,
                pool_config,
                idle: IdleQueue::with_capacity(max_size),
                tracked: DashMap::with_capacity(max_size),
                shutdown: AtomicBool::new(false),
            }),
        };

        for _ in 0..pool.inner.pool_config.initial_size {
            match pool.inner.factory.create(&pool.inner.config).await {
                Ok(connection) => {
                    let pooled = pool.track(connection);
                    if let Err(pooled) = pool.inner.idle.offer(pooled) {
                        pool.destroy(pooled).await;
                    }
                }
                Err(err) => {
                    tracing::error!(
                        resource_id = pool.resource_id(),
                        opened = pool.inner.tracked.len(),
                        error = %err,
                        "Failed to open initial connection, closing the ones already opened"
                    );
                    pool.abandon().await;
                    return Err(Error::creation(pool.resource_id(), err));
                }
            }
        }

        tracing::info!(
            resource_id = pool.resource_id(),
            initial_size = pool.inner.pool_config.initial_size,
            max_size,
            "Connection pool created"
        );
        Ok(pool)
    }

    /// Identifier of the factory backing this pool.
    pub fn resource_id(&self) -> &str {
        self.inner.factory.id()
    }

    /// The configuration the pool was created with.
    pub fn config(&self) -> &PoolConfig {
        &self.inner.pool_config
    }

    /// Whether shutdown has begun.
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::SeqCst)
    }

    /// Snapshot of tracked and idle counts.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            tracked: self.inner.tracked.len(),
            idle: self.inner.idle.len(),
            max_size: self.inner.idle.capacity(),
            is_shutdown: self.is_shutdown(),
        }
    }

    /// Borrow a connection, waiting until one is idle.
    ///
    /// Waits without bound. Dropping the returned future cancels the wait
    /// without taking a connection.
    ///
    /// # Errors
    /// [`Error::PoolShutdown`] if the pool is, or becomes, shut down.
    pub async fn borrow(&self) -> Result<Pooled<F::Connection>> {
        if self.is_shutdown() {
            return Err(Error::pool_shutdown(self.resource_id()));
        }

        match self.inner.idle.take().await {
            Some(pooled) => {
                tracing::debug!(
                    resource_id = self.resource_id(),
                    connection_id = %pooled.id,
                    "Borrowed connection"
                );
                Ok(pooled)
            }
            None => Err(Error::pool_shutdown(self.resource_id())),
        }
    }

    /// Borrow a connection, giving up when `token` is cancelled.
    ///
    /// # Errors
    /// [`Error::Cancelled`] if `token` fires first; pool state is untouched.
    /// [`Error::PoolShutdown`] as for [`borrow`](Self::borrow).
    pub async fn borrow_with_cancellation(
        &self,
        token: &CancellationToken,
    ) -> Result<Pooled<F::Connection>> {
        tokio::select! {
            biased;
            () = token.cancelled() => {
                tracing::debug!(resource_id = self.resource_id(), "Borrow cancelled");
                Err(Error::Cancelled {
                    resource_id: self.resource_id().to_string(),
                })
            }
            result = self.borrow() => result,
        }
    }

    /// Borrow a connection wrapped in a [`Guard`] that releases it on drop.
    pub async fn acquire(&self) -> Result<Guard<F>> {
        let pooled = self.borrow().await?;
        Ok(Guard::new(self.clone(), pooled))
    }

    /// Return a borrowed connection.
    ///
    /// The connection is validated first. A valid one goes back to idle; a
    /// broken one is destroyed and replaced through the factory. Failures
    /// are logged, never returned: the result only says whether a
    /// connection was admitted to idle.
    ///
    /// Returns `false` without touching any state if the pool is shut down
    /// or does not track `pooled`.
    pub async fn release(&self, pooled: Pooled<F::Connection>) -> bool {
        if self.is_shutdown() {
            tracing::debug!(
                resource_id = self.resource_id(),
                connection_id = %pooled.id,
                "Ignoring release after shutdown"
            );
            return false;
        }
        if !self.inner.tracked.contains_key(&pooled.id) {
            tracing::warn!(
                resource_id = self.resource_id(),
                connection_id = %pooled.id,
                "Ignoring release of a connection this pool does not track"
            );
            return false;
        }

        match self.validate(&pooled).await {
            Ok(()) => self.admit(pooled).await,
            Err(err) => {
                tracing::warn!(
                    resource_id = self.resource_id(),
                    connection_id = %pooled.id,
                    error = %err,
                    "Released a broken connection, discarding and replacing"
                );
                self.replace(pooled).await
            }
        }
    }

    /// Shut the pool down and close every tracked connection, borrowed ones
    /// included.
    ///
    /// All closes are attempted even if some fail. Waiting borrowers wake
    /// up with [`Error::PoolShutdown`]. Calling it again closes nothing and
    /// succeeds.
    ///
    /// # Errors
    /// [`Error::Shutdown`] carrying every close failure.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!(resource_id = self.resource_id(), "Shutting down connection pool");
        self.inner.shutdown.store(true, Ordering::SeqCst);
        drop(self.inner.idle.close());

        let failures = self.close_tracked().await;
        if failures.is_empty() {
            tracing::info!(resource_id = self.resource_id(), "Connection pool shut down");
            return Ok(());
        }

        tracing::warn!(
            resource_id = self.resource_id(),
            failed = failures.len(),
            "Connection pool shut down with close failures"
        );
        Err(Error::Shutdown {
            resource_id: self.resource_id().to_string(),
            failures,
        })
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn track(&self, connection: F::Connection) -> Pooled<F::Connection> {
        let pooled = Pooled {
            id: Uuid::new_v4(),
            connection: Arc::new(connection),
        };
        self.inner
            .tracked
            .insert(pooled.id, Arc::clone(&pooled.connection));
        pooled
    }

    async fn validate(&self, connection: &F::Connection) -> Result<()> {
        if connection.is_closed() {
            return Err(Error::validation(self.resource_id(), "connection is closed"));
        }

        let timeout = self.inner.pool_config.validation_timeout;
        match tokio::time::timeout(timeout, connection.is_valid(timeout)).await {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => Err(Error::validation(
                self.resource_id(),
                "liveness probe reported the connection as invalid",
            )),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(Error::Timeout {
                resource_id: self.resource_id().to_string(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                operation: "validate".to_string(),
            }),
        }
    }

    /// Put a tracked connection into idle, destroying it if idle refuses.
    async fn admit(&self, pooled: Pooled<F::Connection>) -> bool {
        let id = pooled.id;
        match self.inner.idle.offer(pooled) {
            Ok(()) => {
                tracing::debug!(
                    resource_id = self.resource_id(),
                    connection_id = %id,
                    "Returned connection to idle"
                );
                true
            }
            Err(pooled) => {
                tracing::warn!(
                    resource_id = self.resource_id(),
                    connection_id = %id,
                    "Idle container refused connection, destroying it"
                );
                self.destroy(pooled).await;
                false
            }
        }
    }

    async fn replace(&self, broken: Pooled<F::Connection>) -> bool {
        self.destroy(broken).await;
        if self.is_shutdown() {
            return false;
        }

        match self.inner.factory.create(&self.inner.config).await {
            Ok(connection) => {
                let pooled = self.track(connection);
                // Shutdown may have drained `tracked` before the insert above.
                if self.is_shutdown() {
                    self.destroy(pooled).await;
                    return false;
                }
                tracing::info!(
                    resource_id = self.resource_id(),
                    connection_id = %pooled.id,
                    "Created replacement connection"
                );
                self.admit(pooled).await
            }
            Err(err) => {
                tracing::error!(
                    resource_id = self.resource_id(),
                    tracked = self.inner.tracked.len(),
                    error = %err,
                    "Failed to replace broken connection, pool shrinks by one"
                );
                false
            }
        }
    }

    /// Untrack a connection and close it, ignoring close errors.
    ///
    /// No-op if someone else (shutdown) already untracked it.
    async fn destroy(&self, pooled: Pooled<F::Connection>) {
        let Pooled { id, connection } = pooled;
        drop(connection);

        if let Some((_, connection)) = self.inner.tracked.remove(&id) {
            if let Err(err) = connection.close().await {
                tracing::debug!(
                    resource_id = self.resource_id(),
                    connection_id = %id,
                    error = %err,
                    "Ignoring close failure of discarded connection"
                );
            }
        }
    }

    /// Untrack and close every connection, collecting close failures.
    async fn close_tracked(&self) -> Vec<Error> {
        let ids: Vec<Uuid> = self.inner.tracked.iter().map(|entry| *entry.key()).collect();
        let mut failures = Vec::new();

        for id in ids {
            let Some((_, connection)) = self.inner.tracked.remove(&id) else {
                continue;
            };
            if let Err(err) = connection.close().await {
                tracing::warn!(
                    resource_id = self.resource_id(),
                    connection_id = %id,
                    error = %err,
                    "Failed to close connection"
                );
                failures.push(err);
            }
        }
        failures
    }

    /// Tear down a pool whose construction failed.
    async fn abandon(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        drop(self.inner.idle.close());
        for err in self.close_tracked().await {
            tracing::debug!(
                resource_id = self.resource_id(),
                error = %err,
                "Ignoring close failure while abandoning construction"
            );
        }
    }
}
