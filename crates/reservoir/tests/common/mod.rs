//! Scripted connection and factory shared by the integration tests.
//!
//! Every connection's state lives in an `Arc<MockState>` that the factory
//! also records, so a test can break, inspect or sabotage a connection
//! while the pool owns it.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use reservoir::{Config, Connection, Error, Factory, Pool, PoolConfig, Result};

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MockState {
    pub index: u32,
    closed: AtomicBool,
    broken: AtomicBool,
    probe_error: AtomicBool,
    probe_delay_ms: AtomicU64,
    fail_close: AtomicBool,
    close_calls: AtomicU32,
}

impl MockState {
    /// Make the liveness probe report the connection as invalid.
    pub fn break_connection(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    /// Make the liveness probe itself fail.
    pub fn fail_probe(&self) {
        self.probe_error.store(true, Ordering::SeqCst);
    }

    /// Make the liveness probe take `delay` before answering.
    pub fn slow_probe(&self, delay: Duration) {
        self.probe_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Make `close` return an error (the connection still ends up closed).
    pub fn fail_close(&self) {
        self.fail_close.store(true, Ordering::SeqCst);
    }

    /// Close the connection behind the pool's back.
    pub fn close_externally(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> u32 {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct MockConnection {
    pub state: Arc<MockState>,
}

impl MockConnection {
    /// Stand-in for running a query on the session.
    pub fn query(&self, sql: &str) -> Result<String> {
        if self.state.is_closed() {
            return Err(Error::backend("connection is closed"));
        }
        Ok(format!("conn-{} ran `{sql}`", self.state.index))
    }
}

impl Connection for MockConnection {
    fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    async fn is_valid(&self, _timeout: Duration) -> Result<bool> {
        let delay = self.state.probe_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.state.probe_error.load(Ordering::SeqCst) {
            return Err(Error::backend(format!(
                "probe failed on conn-{}",
                self.state.index
            )));
        }
        Ok(!self.state.broken.load(Ordering::SeqCst))
    }

    async fn close(&self) -> Result<()> {
        self.state.close_calls.fetch_add(1, Ordering::SeqCst);
        self.state.closed.store(true, Ordering::SeqCst);
        if self.state.fail_close.load(Ordering::SeqCst) {
            return Err(Error::backend(format!(
                "close failed on conn-{}",
                self.state.index
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub url: String,
}

impl Config for MockConfig {
    fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(Error::configuration("url cannot be empty"));
        }
        Ok(())
    }
}

pub fn config() -> MockConfig {
    MockConfig {
        url: "mem://testdb".to_string(),
    }
}

#[derive(Debug, Default)]
pub struct FactoryState {
    calls: AtomicU32,
    /// Bitmask: if bit N is set, create call N fails (0-indexed).
    fail_mask: AtomicU64,
    fail_all: AtomicBool,
    create_delay_ms: AtomicU64,
    connections: Mutex<Vec<Arc<MockState>>>,
}

impl FactoryState {
    /// Number of create calls, successful or not.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of connections successfully created.
    pub fn created(&self) -> usize {
        self.connections.lock().len()
    }

    /// State of the `n`th successfully created connection.
    pub fn connection(&self, n: usize) -> Arc<MockState> {
        Arc::clone(&self.connections.lock()[n])
    }

    pub fn closed_count(&self) -> usize {
        self.connections
            .lock()
            .iter()
            .filter(|state| state.is_closed())
            .count()
    }

    /// Make every following create call fail.
    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Make every following create call take `delay` before it succeeds.
    pub fn slow_create(&self, delay: Duration) {
        self.create_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockFactory {
    pub state: Arc<FactoryState>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mask: u64) -> Self {
        let factory = Self::new();
        factory.state.fail_mask.store(mask, Ordering::SeqCst);
        factory
    }
}

impl Factory for MockFactory {
    type Config = MockConfig;
    type Connection = MockConnection;

    fn id(&self) -> &str {
        "mock-db"
    }

    async fn create(&self, _config: &MockConfig) -> Result<MockConnection> {
        let n = self.state.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.state.create_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let mask = self.state.fail_mask.load(Ordering::SeqCst);
        let masked = n < 64 && mask & (1 << n) != 0;
        if masked || self.state.fail_all.load(Ordering::SeqCst) {
            return Err(Error::backend(format!("connection refused on call {n}")));
        }

        let state = Arc::new(MockState {
            index: n,
            ..MockState::default()
        });
        self.state.connections.lock().push(Arc::clone(&state));
        Ok(MockConnection { state })
    }
}

/// Pool over a fresh mock factory, plus a handle on the factory's state.
pub async fn pool(initial_size: usize, max_size: usize) -> (Pool<MockFactory>, Arc<FactoryState>) {
    let factory = MockFactory::new();
    let state = Arc::clone(&factory.state);
    let pool = Pool::create(factory, config(), PoolConfig::new(initial_size, max_size))
        .await
        .expect("pool should be created");
    (pool, state)
}
