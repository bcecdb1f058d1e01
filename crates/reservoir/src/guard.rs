//! RAII guard for borrowed connections

use crate::connection::Factory;
use crate::pool::{Pool, Pooled};

/// RAII guard that wraps a borrowed connection.
///
/// When the guard is dropped, the connection is released back to its pool
/// on the current tokio runtime. Use [`release`](Self::release) to release
/// in place and observe the outcome, or [`into_inner`](Self::into_inner)
/// to take the connection out without releasing it.
pub struct Guard<F: Factory> {
    pool: Pool<F>,
    connection: Option<Pooled<F::Connection>>,
}

impl<F: Factory> Guard<F> {
    pub(crate) fn new(pool: Pool<F>, connection: Pooled<F::Connection>) -> Self {
        Self {
            pool,
            connection: Some(connection),
        }
    }

    /// Release the connection now, returning what [`Pool::release`] returns.
    pub async fn release(mut self) -> bool {
        match self.connection.take() {
            Some(connection) => self.pool.release(connection).await,
            None => false,
        }
    }

    /// Take the connection out of the guard, preventing the release on drop.
    #[must_use]
    pub fn into_inner(mut self) -> Pooled<F::Connection> {
        self.connection
            .take()
            .expect("guard used after into_inner")
    }
}

impl<F: Factory> std::ops::Deref for Guard<F> {
    type Target = F::Connection;

    fn deref(&self) -> &F::Connection {
        self.connection
            .as_ref()
            .expect("guard used after into_inner")
    }
}

impl<F: Factory> Drop for Guard<F> {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let pool = self.pool.clone();
                drop(handle.spawn(async move {
                    pool.release(connection).await;
                }));
            }
            Err(_) => {
                tracing::warn!(
                    resource_id = self.pool.resource_id(),
                    connection_id = %connection.id(),
                    "Guard dropped outside a tokio runtime, connection stays checked out until shutdown"
                );
            }
        }
    }
}

impl<F: Factory> std::fmt::Debug for Guard<F>
where
    F::Connection: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guard")
            .field("connection", &self.connection)
            .finish()
    }
}
