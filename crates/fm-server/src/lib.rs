//! Fault management daemon library logic.
//!
//! Wires the SQLite store to the fault facade: [`open_store`] prepares the
//! database, [`FaultService`] holds the engine and both API adapters over a
//! [`StoreBackend`], and [`retention`] keeps the event log within its cap.

pub mod backend;
pub mod config;
pub mod retention;

use std::sync::Arc;

use fm_api::{FaultApi, FaultEngine, LegacyFaultApi};
use fm_db::{DbPool, MigrationError, PoolError};
use fm_store::{AlarmSummary, StoreError};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub use backend::{BackendError, StoreBackend};
use config::{Config, ConfigError, LoggingConfig};

/// Errors that stop the daemon from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("failed to get database connection: {0}")]
    Connection(#[from] r2d2::Error),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("startup task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Installs the global tracing subscriber.
pub fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Opens the pool, applies migrations and trims the event log to the
/// configured cap.
///
/// # Errors
///
/// Returns `StartupError` if any of those steps fails.
pub fn open_store(config: &Config) -> Result<DbPool, StartupError> {
    let pool = fm_db::create_pool(&config.database.path, config.database.runtime_settings())?;

    let conn = pool.get()?;
    let applied = fm_db::run_migrations(&conn)?;
    if applied > 0 {
        tracing::info!(count = applied, "applied database migrations");
    }

    let trimmed = fm_store::trim_event_log(&conn, config.event_log.max_size)?;
    if trimmed > 0 {
        tracing::info!(count = trimmed, "trimmed event log at startup");
    }
    drop(conn);

    Ok(pool)
}

/// The fault engine over the store, with both API flavours sharing it.
#[derive(Clone)]
pub struct FaultService {
    pool: DbPool,
    pub strict: FaultApi<StoreBackend>,
    pub legacy: LegacyFaultApi<StoreBackend>,
}

impl FaultService {
    pub fn new(pool: DbPool, max_event_log: u64) -> Self {
        let backend = StoreBackend::new(pool.clone(), max_event_log);
        let engine = Arc::new(FaultEngine::new(backend));
        Self {
            pool,
            strict: FaultApi::new(Arc::clone(&engine)),
            legacy: LegacyFaultApi::new(engine),
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Severity counts over the active alarms.
    pub fn summary(&self, include_suppress: bool) -> Result<AlarmSummary, BackendError> {
        let conn = self.pool.get()?;
        Ok(fm_store::alarm_summary(&conn, include_suppress)?)
    }
}
