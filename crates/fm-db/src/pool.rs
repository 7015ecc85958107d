//! SQLite connection pool.
//!
//! Alarm writes and event log appends each take the single SQLite write
//! lock, so connections wait on the lock (`busy_timeout`) and callers wait
//! on the pool for about as long. The event log churns pages on every
//! append once it is at its cap; a smaller WAL auto-checkpoint keeps the
//! write-ahead file short.

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

/// Connection tunables read from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// How long a connection waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled connections.
    pub pool_max_size: u32,

    /// WAL pages written before SQLite checkpoints automatically.
    pub wal_autocheckpoint_pages: u32,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
            wal_autocheckpoint_pages: 256,
        }
    }
}

impl DbRuntimeSettings {
    /// How long a caller waits for a free pooled connection. Never shorter
    /// than one second.
    pub fn checkout_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms.max(1_000))
    }
}

/// Pool of SQLite connections shared by the store and the backend.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Errors raised while building the pool.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to create database connection pool: {0}")]
    PoolInit(#[from] r2d2::Error),
}

/// Opens a pool on `db_path`. Every connection runs in WAL mode with the
/// configured busy timeout and checkpoint interval.
///
/// `:memory:` gives each pooled connection its own private database, so
/// callers that need several connections to share state should use a file.
///
/// # Errors
///
/// Returns `PoolError::PoolInit` if no connection can be established.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let manager = SqliteConnectionManager::file(db_path)
        .with_flags(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )
        .with_init(move |conn| prepare_connection(conn, &settings));

    let pool = Pool::builder()
        .max_size(settings.pool_max_size)
        .connection_timeout(settings.checkout_timeout())
        .build(manager)?;

    tracing::debug!(
        path = db_path,
        pool_max_size = settings.pool_max_size,
        wal_autocheckpoint_pages = settings.wal_autocheckpoint_pages,
        "database pool ready"
    );
    Ok(pool)
}

fn prepare_connection(conn: &mut Connection, settings: &DbRuntimeSettings) -> rusqlite::Result<()> {
    let journal_mode: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
    // In-memory databases cannot use WAL and report "memory".
    if journal_mode != "wal" && journal_mode != "memory" {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(format!("journal mode stayed at {journal_mode}")),
        ));
    }
    conn.busy_timeout(Duration::from_millis(settings.busy_timeout_ms))?;
    conn.execute_batch(&format!(
        "PRAGMA synchronous = NORMAL;
         PRAGMA wal_autocheckpoint = {};",
        settings.wal_autocheckpoint_pages
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_pool_uses_wal_and_busy_timeout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fm.db");
        let settings = DbRuntimeSettings {
            busy_timeout_ms: 1_250,
            pool_max_size: 2,
            wal_autocheckpoint_pages: 64,
        };

        let pool = create_pool(path.to_str().expect("utf-8 path"), settings)
            .expect("pool creation should succeed");
        let conn = pool.get().expect("should get a connection");

        let mode: String = conn
            .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
            .expect("should query journal_mode");
        assert_eq!(mode, "wal");

        let busy_timeout: i64 = conn
            .query_row("PRAGMA busy_timeout;", [], |row| row.get(0))
            .expect("should query busy_timeout");
        assert_eq!(busy_timeout, 1_250);

        let checkpoint: i64 = conn
            .query_row("PRAGMA wal_autocheckpoint;", [], |row| row.get(0))
            .expect("should query wal_autocheckpoint");
        assert_eq!(checkpoint, 64);
        assert_eq!(pool.max_size(), 2);
        assert_eq!(pool.connection_timeout(), Duration::from_millis(1_250));
    }

    #[test]
    fn in_memory_pool_opens() {
        let pool = create_pool(":memory:", DbRuntimeSettings::default())
            .expect("pool creation should succeed");
        let conn = pool.get().expect("should get a connection");
        let mode: String = conn
            .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
            .expect("should query journal_mode");
        assert_eq!(mode, "memory");
    }

    #[test]
    fn checkout_timeout_has_a_floor() {
        let settings = DbRuntimeSettings {
            busy_timeout_ms: 10,
            ..DbRuntimeSettings::default()
        };
        assert_eq!(settings.checkout_timeout(), Duration::from_secs(1));
    }
}
