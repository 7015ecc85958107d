//! Background task that keeps the event log within its configured cap.
//!
//! Appends already evict as they go; the sweep covers a cap lowered between
//! restarts and rows written by other processes sharing the database.

use fm_db::DbPool;
use std::time::Duration;
use tokio::time::sleep;

use crate::backend::BackendError;

/// Trims the event log down to `max_size` entries once. Returns the number
/// of entries removed.
///
/// # Errors
///
/// Returns `BackendError` if no connection is available or the trim fails.
pub fn sweep_event_log(pool: &DbPool, max_size: u64) -> Result<usize, BackendError> {
    let conn = pool.get()?;
    Ok(fm_store::trim_event_log(&conn, max_size)?)
}

/// Starts a background task that periodically trims the event log.
///
/// This task runs indefinitely. An interval of zero disables it.
pub async fn start_retention_task(pool: DbPool, max_size: u64, interval_seconds: u64) {
    if interval_seconds == 0 {
        tracing::warn!("event log retention sweep disabled (interval=0)");
        return;
    }

    let interval = Duration::from_secs(interval_seconds);
    tracing::info!(interval_seconds, max_size, "starting event log retention task");

    loop {
        sleep(interval).await;

        let pool_clone = pool.clone();
        let result =
            tokio::task::spawn_blocking(move || sweep_event_log(&pool_clone, max_size)).await;

        match result {
            Ok(Ok(count)) => {
                if count > 0 {
                    tracing::info!(count, "trimmed event log");
                } else {
                    tracing::debug!("event log within cap");
                }
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "failed to trim event log");
            }
            Err(e) => {
                tracing::error!(error = %e, "retention task panicked or was cancelled");
            }
        }
    }
}
