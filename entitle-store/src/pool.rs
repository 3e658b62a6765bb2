//! Connection pool and store handle.

use crate::error::{StoreError, StoreResult};
use crate::schema;
use rusqlite::Connection;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};
use std::time::Duration;
use tracing::{debug, info};

/// Default number of pooled connections.
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Default time a writer waits for the database lock.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Store tuning.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Number of SQLite connections kept open.
    pub pool_size: usize,
    /// How long a connection waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

/// Process-wide handle to the license database.
///
/// Holds a small fixed set of connections handed out round-robin. SQLite
/// serializes writers itself; each connection waits up to the busy timeout
/// for the write lock instead of failing immediately.
pub struct Store {
    conns: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

impl Store {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>, config: &StoreConfig) -> StoreResult<Self> {
        let path = path.as_ref();
        let size = config.pool_size.max(1);
        let mut conns = Vec::with_capacity(size);

        for i in 0..size {
            let conn = Connection::open(path).map_err(|e| {
                StoreError::Open(format!("failed to open {}: {e}", path.display()))
            })?;
            configure(&conn, config.busy_timeout)?;
            if i == 0 {
                schema::init(&conn)?;
            }
            conns.push(Mutex::new(conn));
        }

        info!(path = %path.display(), pool_size = size, "license store opened");
        Ok(Self {
            conns,
            next: AtomicUsize::new(0),
        })
    }

    /// Opens an in-memory store (for testing). Always a single connection,
    /// since in-memory databases are private to their connection.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Open(format!("failed to open in-memory store: {e}")))?;
        configure(&conn, DEFAULT_BUSY_TIMEOUT)?;
        schema::init(&conn)?;
        Ok(Self {
            conns: vec![Mutex::new(conn)],
            next: AtomicUsize::new(0),
        })
    }

    /// Number of pooled connections.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.conns.len()
    }

    /// Checks out a connection, preferring an idle one.
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        let n = self.conns.len();
        let start = self.next.fetch_add(1, Ordering::Relaxed) % n;
        for offset in 0..n {
            match self.conns[(start + offset) % n].try_lock() {
                Ok(guard) => return guard,
                Err(TryLockError::Poisoned(p)) => return p.into_inner(),
                Err(TryLockError::WouldBlock) => continue,
            }
        }
        debug!("all store connections busy, waiting");
        self.conns[start]
            .lock()
            .unwrap_or_else(|p| p.into_inner())
    }
}

fn configure(conn: &Connection, busy_timeout: Duration) -> StoreResult<()> {
    conn.busy_timeout(busy_timeout)?;
    let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
    conn.execute_batch("PRAGMA synchronous=NORMAL; PRAGMA temp_store=MEMORY;")?;
    Ok(())
}
