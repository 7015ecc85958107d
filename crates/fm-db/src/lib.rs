//! Database layer for the fault management store.
//!
//! Provides the SQLite connection pool (via `r2d2`) and the embedded
//! migrations that create the three tables the store works on:
//!
//! - `alarm`: currently active alarms, unique per
//!   (`alarm_id`, `entity_instance_id`).
//! - `event_log`: bounded, append-only history of transitions and logs.
//! - `event_suppression`: per alarm id suppression status and policy
//!   thresholds.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
