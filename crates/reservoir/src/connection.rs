//! Capability contracts between the pool and the backing connections.
//!
//! A [`Factory`] creates connections from its [`Config`]; every connection
//! it produces implements [`Connection`], which is all the pool needs to
//! validate a returned connection and to tear it down.

use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Configuration trait for connection factories.
///
/// Holds whatever the factory needs to open a session (address,
/// credentials). The pool never looks inside it.
pub trait Config: Send + Sync + 'static {
    /// Validate the configuration, returning an error if invalid.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// A live session with the backing store.
///
/// Methods take `&self`: the pool keeps a shared handle to every connection
/// it created, including borrowed ones, so that shutdown can close them.
/// Implementations use interior mutability for their open/closed state.
pub trait Connection: Send + Sync + 'static {
    /// Whether the connection has already been closed.
    fn is_closed(&self) -> bool;

    /// Probe the connection, giving up after `timeout`.
    ///
    /// `Ok(false)` and `Err(_)` both mark the connection as broken.
    fn is_valid(&self, timeout: Duration) -> impl Future<Output = Result<bool>> + Send;

    /// Close the connection.
    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Creates connections on demand.
pub trait Factory: Send + Sync + 'static {
    /// The configuration type for this factory.
    type Config: Config;

    /// The connection type produced by this factory.
    type Connection: Connection;

    /// Unique string identifier for this factory (e.g. "postgres").
    fn id(&self) -> &str;

    /// Open one new connection.
    fn create(
        &self,
        config: &Self::Config,
    ) -> impl Future<Output = Result<Self::Connection>> + Send;
}
