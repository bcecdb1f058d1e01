//! # Reservoir
//!
//! Bounded pool of reusable, expensive-to-create connections shared by
//! concurrent callers.
//!
//! A [`Factory`] opens connections; the [`Pool`] opens a fixed number of
//! them up front, hands them out with [`Pool::borrow`], validates them on
//! [`Pool::release`] (replacing broken ones) and closes all of them on
//! [`Pool::shutdown`].

pub mod connection;
pub mod error;
pub mod guard;
pub mod pool;

mod idle;

pub use connection::{Config, Connection, Factory};
pub use error::{Error, Result};
pub use guard::Guard;
pub use pool::{Pool, PoolConfig, PoolStatus, Pooled};
pub use tokio_util::sync::CancellationToken;
