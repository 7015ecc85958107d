//! Event suppression entries.
//!
//! One entry per alarm id holds its suppression status and the severity
//! thresholds used to derive the management and degrade flags of its
//! alarms. Deletion is logical: entries flagged `set_for_deletion` are
//! invisible to every read here and to the alarm/event log joins.

use fm_types::{SeverityLevel, SuppressionStatus};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::error::StoreError;
use crate::row::{collect, parsed};

const SELECT_SUPPRESSION: &str = "SELECT uuid, alarm_id, description, suppression_status,
        mgmt_affecting, degrade_affecting, created_at, updated_at
    FROM event_suppression";

/// A live event suppression entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventSuppression {
    pub uuid: String,
    pub alarm_id: String,
    pub description: Option<String>,
    pub suppression_status: SuppressionStatus,
    pub mgmt_affecting: SeverityLevel,
    pub degrade_affecting: SeverityLevel,
    pub created_at: String,
    pub updated_at: Option<String>,
}

fn event_suppression(row: &Row<'_>) -> rusqlite::Result<EventSuppression> {
    Ok(EventSuppression {
        uuid: row.get(0)?,
        alarm_id: row.get(1)?,
        description: row.get(2)?,
        suppression_status: parsed(row, 3)?,
        mgmt_affecting: parsed(row, 4)?,
        degrade_affecting: parsed(row, 5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// Attributes of a new suppression entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEventSuppression {
    pub alarm_id: String,
    pub description: Option<String>,
    pub suppression_status: SuppressionStatus,
    pub mgmt_affecting: SeverityLevel,
    pub degrade_affecting: SeverityLevel,
}

impl NewEventSuppression {
    /// An unsuppressed entry with `none` thresholds.
    pub fn new(alarm_id: impl Into<String>) -> Self {
        Self {
            alarm_id: alarm_id.into(),
            description: None,
            suppression_status: SuppressionStatus::Unsuppressed,
            mgmt_affecting: SeverityLevel::None,
            degrade_affecting: SeverityLevel::None,
        }
    }
}

/// Creates the suppression entry for an alarm id.
///
/// An entry previously marked for deletion is replaced.
///
/// # Errors
///
/// Returns `StoreError::AlreadyExists` if a live entry exists for the
/// alarm id.
pub fn create_event_suppression(
    conn: &Connection,
    entry: &NewEventSuppression,
) -> Result<EventSuppression, StoreError> {
    let uuid = uuid::Uuid::new_v4().to_string();
    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "DELETE FROM event_suppression WHERE alarm_id = ?1 AND set_for_deletion = 1",
        [&entry.alarm_id],
    )?;
    tx.execute(
        "INSERT INTO event_suppression
            (uuid, alarm_id, description, suppression_status, mgmt_affecting, degrade_affecting)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            uuid,
            entry.alarm_id,
            entry.description,
            entry.suppression_status.as_str(),
            entry.mgmt_affecting.as_str(),
            entry.degrade_affecting.as_str(),
        ],
    )
    .map_err(|e| StoreError::on_insert(e, "event suppression", &entry.alarm_id))?;

    let created = get_event_suppression(&tx, &uuid)?;
    tx.commit()?;
    Ok(created)
}

/// Loads a live entry by uuid.
///
/// # Errors
///
/// Returns `StoreError::NotFound` if no live entry has this uuid.
pub fn get_event_suppression(conn: &Connection, uuid: &str) -> Result<EventSuppression, StoreError> {
    let sql = format!("{SELECT_SUPPRESSION} WHERE uuid = ?1 AND set_for_deletion = 0");
    conn.query_row(&sql, [uuid], event_suppression)
        .optional()?
        .ok_or_else(|| StoreError::not_found("event suppression", uuid))
}

/// Loads the live entry for an alarm id, if any.
pub fn suppression_for_alarm_id(
    conn: &Connection,
    alarm_id: &str,
) -> Result<Option<EventSuppression>, StoreError> {
    let sql = format!("{SELECT_SUPPRESSION} WHERE alarm_id = ?1 AND set_for_deletion = 0");
    Ok(conn.query_row(&sql, [alarm_id], event_suppression).optional()?)
}

/// Filter criteria for [`list_event_suppressions`].
#[derive(Debug, Clone, Default)]
pub struct SuppressionFilter {
    /// Exact alarm id.
    pub alarm_id: Option<String>,
    pub suppression_status: Option<SuppressionStatus>,
    pub limit: Option<i64>,
}

/// Lists live entries ordered by alarm id.
pub fn list_event_suppressions(
    conn: &Connection,
    filter: &SuppressionFilter,
) -> Result<Vec<EventSuppression>, StoreError> {
    let mut clauses = vec!["set_for_deletion = 0".to_string()];
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(ref alarm_id) = filter.alarm_id {
        param_values.push(Box::new(alarm_id.clone()));
        clauses.push(format!("alarm_id = ?{}", param_values.len()));
    }
    if let Some(status) = filter.suppression_status {
        param_values.push(Box::new(status.as_str()));
        clauses.push(format!("suppression_status = ?{}", param_values.len()));
    }

    param_values.push(Box::new(filter.limit.unwrap_or(-1)));
    let sql = format!(
        "{SELECT_SUPPRESSION} WHERE {} ORDER BY alarm_id ASC LIMIT ?{}",
        clauses.join(" AND "),
        param_values.len()
    );

    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| &**p).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_refs.as_slice(), event_suppression)?;
    Ok(collect(rows)?)
}

/// Sets the suppression status of a live entry and returns it.
///
/// # Errors
///
/// Returns `StoreError::NotFound` if no live entry has this uuid.
pub fn update_suppression_status(
    conn: &Connection,
    uuid: &str,
    status: SuppressionStatus,
) -> Result<EventSuppression, StoreError> {
    let changed = conn.execute(
        "UPDATE event_suppression
         SET suppression_status = ?2, updated_at = datetime('now')
         WHERE uuid = ?1 AND set_for_deletion = 0",
        params![uuid, status.as_str()],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("event suppression", uuid));
    }
    tracing::info!(uuid, status = status.as_str(), "suppression status updated");
    get_event_suppression(conn, uuid)
}

/// Replaces the severity thresholds of a live entry and returns it.
///
/// # Errors
///
/// Returns `StoreError::NotFound` if no live entry has this uuid.
pub fn update_thresholds(
    conn: &Connection,
    uuid: &str,
    mgmt_affecting: SeverityLevel,
    degrade_affecting: SeverityLevel,
) -> Result<EventSuppression, StoreError> {
    let changed = conn.execute(
        "UPDATE event_suppression
         SET mgmt_affecting = ?2, degrade_affecting = ?3, updated_at = datetime('now')
         WHERE uuid = ?1 AND set_for_deletion = 0",
        params![uuid, mgmt_affecting.as_str(), degrade_affecting.as_str()],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("event suppression", uuid));
    }
    get_event_suppression(conn, uuid)
}

/// Logically deletes a live entry.
///
/// # Errors
///
/// Returns `StoreError::NotFound` if no live entry has this uuid.
pub fn mark_for_deletion(conn: &Connection, uuid: &str) -> Result<(), StoreError> {
    let changed = conn.execute(
        "UPDATE event_suppression
         SET set_for_deletion = 1, updated_at = datetime('now')
         WHERE uuid = ?1 AND set_for_deletion = 0",
        [uuid],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("event suppression", uuid));
    }
    Ok(())
}
