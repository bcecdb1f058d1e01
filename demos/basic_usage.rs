//! Basic pool usage
//!
//! Creates a pool of in-memory database sessions (initial 2, max 5),
//! borrows one, runs a query, releases it and shuts the pool down.
//!
//! Run with `RUST_LOG=debug cargo run -p reservoir-demos --bin basic_usage`
//! to see the pool's own log output.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use anyhow::Context as _;
use reservoir::{Config, Connection, Error, Factory, Pool, PoolConfig, Result};
use tracing_subscriber::EnvFilter;

/// Connection parameters for the in-memory database.
#[derive(Clone)]
struct DatabaseConfig {
    url: String,
    user: String,
    password: String,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .finish()
    }
}

impl Config for DatabaseConfig {
    fn validate(&self) -> Result<()> {
        if !self.url.starts_with("mem:") {
            return Err(Error::configuration(format!(
                "unsupported url '{}', expected mem:<name>",
                self.url
            )));
        }
        if self.user.is_empty() {
            return Err(Error::configuration("user cannot be empty"));
        }
        Ok(())
    }
}

/// A session with the in-memory database.
#[derive(Debug)]
struct Session {
    number: u32,
    closed: AtomicBool,
}

impl Session {
    /// Evaluate `SELECT a+b+...` over integer literals.
    fn query(&self, sql: &str) -> Result<i64> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::backend("session is closed"));
        }
        let expr = sql
            .trim()
            .strip_prefix("SELECT ")
            .ok_or_else(|| Error::backend(format!("unsupported statement: {sql}")))?;
        expr.split('+')
            .map(|term| {
                term.trim()
                    .parse::<i64>()
                    .map_err(|err| Error::backend_with_source(format!("bad literal '{term}'"), err))
            })
            .sum()
    }
}

impl Connection for Session {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn is_valid(&self, _timeout: Duration) -> Result<bool> {
        Ok(self.query("SELECT 1").is_ok())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Opens sessions against the in-memory database.
#[derive(Default)]
struct MemoryDatabase {
    opened: AtomicU32,
}

impl Factory for MemoryDatabase {
    type Config = DatabaseConfig;
    type Connection = Session;

    fn id(&self) -> &str {
        "memory-db"
    }

    async fn create(&self, config: &DatabaseConfig) -> Result<Session> {
        // Simulate the handshake
        tokio::time::sleep(Duration::from_millis(20)).await;
        if config.password != "sa" && !config.password.is_empty() {
            return Err(Error::backend(format!(
                "authentication failed for user '{}'",
                config.user
            )));
        }
        let number = self.opened.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(url = %config.url, number, "Opened session");
        Ok(Session {
            number,
            closed: AtomicBool::new(false),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = DatabaseConfig {
        url: "mem:testdb".to_string(),
        user: "sa".to_string(),
        password: String::new(),
    };

    let pool = Pool::create(MemoryDatabase::default(), config, PoolConfig::new(2, 5))
        .await
        .context("failed to create connection pool")?;
    println!("Pool created: {:?}", pool.status());

    let outcome = run_query(&pool, "SELECT 1+1").await;

    if let Err(err) = pool.shutdown().await {
        for failure in err.failures() {
            eprintln!("  close failed: {failure}");
        }
        outcome?;
        return Err(err).context("connection pool shut down with errors");
    }
    println!("Pool shut down: {:?}", pool.status());

    outcome
}

/// Borrow a session, run one query and hand the session back, whether or
/// not the query succeeded.
async fn run_query(pool: &Pool<MemoryDatabase>, sql: &str) -> anyhow::Result<()> {
    let session = pool.acquire().await?;
    println!("Connection {} acquired. Executing a query...", session.number);

    let result = session.query(sql);
    let admitted = session.release().await;

    let value = result.context("query failed")?;
    println!("Query result: {value}");
    println!("Connection released back to the pool (admitted: {admitted})");
    Ok(())
}
