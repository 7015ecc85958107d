//! Bounded event log.
//!
//! The log is append-only from the caller's point of view. Writes go
//! through [`append_event_log`], which evicts the oldest rows (by
//! `created_at`, then `id`) so that the table never holds more than the
//! configured number of entries. Count, evict and insert run in a single
//! `BEGIN IMMEDIATE` transaction, so concurrent writers on other
//! connections cannot push the table over its cap.

use chrono::{DateTime, Utc};
use fm_types::codec::format_timestamp;
use fm_types::{AlarmState, AlarmType, EventLogType, Fault, Severity, SuppressionStatus};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::Serialize;

use crate::error::StoreError;
use crate::row::{collect, contains_pattern, parsed, stored_timestamp, timestamp};

const SELECT_EVENT_LOG: &str = "SELECT e.uuid, e.event_log_id, e.state, e.entity_type_id,
        e.entity_instance_id, e.timestamp, e.severity, e.reason_text, e.event_log_type,
        e.probable_cause, e.proposed_repair_action, e.service_affecting, e.suppression,
        e.alarm_uuid, e.created_at,
        COALESCE(s.suppression_status, 'unsuppressed')
    FROM event_log e
    LEFT JOIN event_suppression s
        ON s.alarm_id = e.event_log_id AND s.set_for_deletion = 0";

/// A stored event log entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventLogEntry {
    pub uuid: String,
    pub event_log_id: String,
    pub state: AlarmState,
    pub entity_type_id: String,
    pub entity_instance_id: String,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub reason_text: Option<String>,
    pub event_log_type: AlarmType,
    pub probable_cause: String,
    pub proposed_repair_action: Option<String>,
    pub service_affecting: bool,
    pub suppression: bool,
    /// Uuid of the active alarm this entry records, if any.
    pub alarm_uuid: Option<String>,
    pub created_at: String,
    pub suppression_status: SuppressionStatus,
}

fn event_log_entry(row: &Row<'_>) -> rusqlite::Result<EventLogEntry> {
    Ok(EventLogEntry {
        uuid: row.get(0)?,
        event_log_id: row.get(1)?,
        state: parsed(row, 2)?,
        entity_type_id: row.get(3)?,
        entity_instance_id: row.get(4)?,
        timestamp: timestamp(row, 5)?,
        severity: parsed(row, 6)?,
        reason_text: row.get(7)?,
        event_log_type: parsed(row, 8)?,
        probable_cause: row.get(9)?,
        proposed_repair_action: row.get(10)?,
        service_affecting: row.get(11)?,
        suppression: row.get(12)?,
        alarm_uuid: row.get(13)?,
        created_at: row.get(14)?,
        suppression_status: parsed(row, 15)?,
    })
}

/// An entry to be appended to the log.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEventLog {
    pub uuid: Option<String>,
    pub event_log_id: String,
    pub state: AlarmState,
    pub entity_type_id: String,
    pub entity_instance_id: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub severity: Severity,
    pub reason_text: Option<String>,
    pub event_log_type: AlarmType,
    pub probable_cause: String,
    pub proposed_repair_action: Option<String>,
    pub service_affecting: bool,
    pub suppression: bool,
    pub alarm_uuid: Option<String>,
}

impl NewEventLog {
    /// History entry for `fault`. Customer `msg` records are logged as `log`.
    pub fn from_fault(fault: &Fault) -> Self {
        let state = match fault.alarm_state {
            AlarmState::Msg => AlarmState::Log,
            other => other,
        };
        Self {
            uuid: None,
            event_log_id: fault.alarm_id.clone(),
            state,
            entity_type_id: fault.entity_type_id.clone(),
            entity_instance_id: fault.entity_instance_id.clone(),
            timestamp: fault.timestamp,
            severity: fault.severity,
            reason_text: fault.reason_text.clone(),
            event_log_type: fault.alarm_type,
            probable_cause: fault.probable_cause.clone(),
            proposed_repair_action: fault.proposed_repair_action.clone(),
            service_affecting: fault.service_affecting,
            suppression: fault.suppression,
            alarm_uuid: None,
        }
    }

    /// The same entry recorded as a `clear` transition of `alarm_uuid`.
    pub fn cleared(mut self, alarm_uuid: impl Into<String>) -> Self {
        self.state = AlarmState::Clear;
        self.timestamp = None;
        self.alarm_uuid = Some(alarm_uuid.into());
        self
    }

    pub fn for_alarm(mut self, alarm_uuid: impl Into<String>) -> Self {
        self.alarm_uuid = Some(alarm_uuid.into());
        self
    }
}

/// Appends `entry`, first evicting the oldest rows so the table holds at
/// most `max_size` entries afterwards. Returns the stored entry.
///
/// A cap of zero is treated as one. A failed eviction is logged and the
/// insert still proceeds.
///
/// # Errors
///
/// Returns `StoreError::AlreadyExists` on a duplicate uuid and
/// `StoreError::Database` if the transaction cannot start, the insert fails
/// or the commit fails.
pub fn append_event_log(
    conn: &Connection,
    entry: &NewEventLog,
    max_size: u64,
) -> Result<EventLogEntry, StoreError> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let stored = append_event_log_in(&tx, entry, max_size)?;
    tx.commit()?;
    Ok(stored)
}

/// Like [`append_event_log`], but inside a transaction the caller already
/// holds. The caller's transaction must be a write (`IMMEDIATE`)
/// transaction for the cap to hold against other connections. Nothing is
/// kept if the caller rolls back.
///
/// # Errors
///
/// Returns `StoreError::AlreadyExists` on a duplicate uuid and
/// `StoreError::Database` if the insert fails.
pub fn append_event_log_in(
    tx: &Transaction<'_>,
    entry: &NewEventLog,
    max_size: u64,
) -> Result<EventLogEntry, StoreError> {
    let cap = max_size.max(1);
    let uuid = entry
        .uuid
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let count = event_log_count(tx)?;
    if count >= cap {
        let excess = count - cap + 1;
        match evict_oldest(tx, excess) {
            Ok(evicted) => {
                tracing::debug!(evicted, count, cap, "event log evicted oldest entries");
            }
            Err(e) => {
                tracing::warn!(error = %e, count, cap, "event log eviction failed");
            }
        }
    }

    tx.execute(
        "INSERT INTO event_log (uuid, event_log_id, state, entity_type_id, entity_instance_id,
            timestamp, severity, reason_text, event_log_type, probable_cause,
            proposed_repair_action, service_affecting, suppression, alarm_uuid)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            uuid,
            entry.event_log_id,
            entry.state.as_str(),
            entry.entity_type_id,
            entry.entity_instance_id,
            stored_timestamp(entry.timestamp),
            entry.severity.as_str(),
            entry.reason_text,
            entry.event_log_type.as_str(),
            entry.probable_cause,
            entry.proposed_repair_action,
            entry.service_affecting,
            entry.suppression,
            entry.alarm_uuid,
        ],
    )
    .map_err(|e| StoreError::on_insert(e, "event log", &uuid))?;

    get_event_log(tx, &uuid)
}

fn evict_oldest(conn: &Connection, n: u64) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM event_log WHERE id IN (
            SELECT id FROM event_log ORDER BY created_at ASC, id ASC LIMIT ?1
         )",
        [n as i64],
    )
}

/// Number of entries currently in the log.
pub fn event_log_count(conn: &Connection) -> Result<u64, StoreError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM event_log", [], |row| row.get(0))?;
    Ok(count.max(0) as u64)
}

/// The entry that would be evicted next.
pub fn oldest_event_log(conn: &Connection) -> Result<Option<EventLogEntry>, StoreError> {
    let sql = format!("{SELECT_EVENT_LOG} ORDER BY e.created_at ASC, e.id ASC LIMIT 1");
    Ok(conn.query_row(&sql, [], event_log_entry).optional()?)
}

/// Loads one entry by uuid.
///
/// # Errors
///
/// Returns `StoreError::NotFound` if no entry has this uuid.
pub fn get_event_log(conn: &Connection, uuid: &str) -> Result<EventLogEntry, StoreError> {
    let sql = format!("{SELECT_EVENT_LOG} WHERE e.uuid = ?1");
    conn.query_row(&sql, [uuid], event_log_entry)
        .optional()?
        .ok_or_else(|| StoreError::not_found("event log", uuid))
}

/// Removes one entry by uuid.
///
/// # Errors
///
/// Returns `StoreError::NotFound` if no entry has this uuid.
pub fn delete_event_log(conn: &Connection, uuid: &str) -> Result<(), StoreError> {
    let removed = conn.execute("DELETE FROM event_log WHERE uuid = ?1", [uuid])?;
    if removed == 0 {
        return Err(StoreError::not_found("event log", uuid));
    }
    Ok(())
}

/// Deletes the oldest entries until at most `max_size` remain. Returns how
/// many were removed.
pub fn trim_event_log(conn: &Connection, max_size: u64) -> Result<usize, StoreError> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let count = event_log_count(&tx)?;
    let removed = if count > max_size {
        evict_oldest(&tx, count - max_size)?
    } else {
        0
    };
    tx.commit()?;
    if removed > 0 {
        tracing::info!(removed, max_size, "event log trimmed");
    }
    Ok(removed)
}

/// Filter criteria for [`list_event_logs`].
#[derive(Debug, Clone, Default)]
pub struct EventLogFilter {
    /// Substring match on the event log id.
    pub event_log_id: Option<String>,
    /// Substring match on the entity type.
    pub entity_type_id: Option<String>,
    /// Substring match on the entity instance.
    pub entity_instance_id: Option<String>,
    pub severity: Option<Severity>,
    pub event_type: EventLogType,
    /// Entries with a timestamp at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Entries with a timestamp at or before this instant.
    pub until: Option<DateTime<Utc>>,
    /// Maximum number of entries to return (default: unlimited).
    pub limit: Option<i64>,
    /// Include entries for suppressed alarm ids. Logs are always included.
    pub include_suppress: bool,
}

/// Lists event log entries, newest first.
///
/// # Errors
///
/// Returns `StoreError::Database` on SQL failure.
pub fn list_event_logs(
    conn: &Connection,
    filter: &EventLogFilter,
) -> Result<Vec<EventLogEntry>, StoreError> {
    let mut clauses: Vec<String> = Vec::new();
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    let text_filters = [
        ("e.event_log_id", &filter.event_log_id),
        ("e.entity_type_id", &filter.entity_type_id),
        ("e.entity_instance_id", &filter.entity_instance_id),
    ];
    for (column, value) in text_filters {
        if let Some(value) = value {
            param_values.push(Box::new(contains_pattern(value)));
            clauses.push(format!("{column} LIKE ?{} ESCAPE '\\'", param_values.len()));
        }
    }

    if let Some(severity) = filter.severity {
        param_values.push(Box::new(severity.as_str()));
        clauses.push(format!("e.severity = ?{}", param_values.len()));
    }

    match filter.event_type {
        EventLogType::All => {}
        EventLogType::Alarm => clauses.push("e.state IN ('set', 'clear')".to_string()),
        EventLogType::Log => clauses.push("e.state = 'log'".to_string()),
    }

    // Stored timestamps share one fixed-width format, so text order is
    // chronological order.
    if let Some(since) = filter.since {
        param_values.push(Box::new(format_timestamp(since)));
        clauses.push(format!("e.timestamp >= ?{}", param_values.len()));
    }
    if let Some(until) = filter.until {
        param_values.push(Box::new(format_timestamp(until)));
        clauses.push(format!("e.timestamp <= ?{}", param_values.len()));
    }

    if !filter.include_suppress {
        clauses.push(
            "(COALESCE(s.suppression_status, 'unsuppressed') = 'unsuppressed' OR e.state = 'log')"
                .to_string(),
        );
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    param_values.push(Box::new(filter.limit.unwrap_or(-1)));
    let sql = format!(
        "{SELECT_EVENT_LOG} {where_clause}
         ORDER BY e.timestamp DESC, e.id DESC
         LIMIT ?{}",
        param_values.len()
    );

    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| &**p).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_refs.as_slice(), event_log_entry)?;
    Ok(collect(rows)?)
}
