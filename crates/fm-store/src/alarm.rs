//! Active alarm table.
//!
//! Every read joins `event_suppression` on `alarm_id` so callers receive an
//! [`AlarmView`] carrying the suppression status and the derived
//! management/degrade flags. Alarm ids with no live suppression row read as
//! unsuppressed with `none` thresholds.

use fm_types::policy::affects;
use fm_types::{Fault, Severity, SeverityLevel, SuppressionStatus};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::error::StoreError;
use crate::row::{collect, contains_pattern, parsed, stored_timestamp, timestamp};

const SELECT_ALARM: &str = "SELECT a.uuid, a.alarm_id, a.alarm_state, a.entity_type_id,
        a.entity_instance_id, a.timestamp, a.severity, a.reason_text, a.alarm_type,
        a.probable_cause, a.proposed_repair_action, a.service_affecting, a.suppression,
        a.inhibit_alarms, a.masked,
        COALESCE(s.suppression_status, 'unsuppressed'),
        COALESCE(s.mgmt_affecting, 'none'),
        COALESCE(s.degrade_affecting, 'none')
    FROM alarm a
    LEFT JOIN event_suppression s
        ON s.alarm_id = a.alarm_id AND s.set_for_deletion = 0";

const ORDER_BY_SEVERITY: &str = "ORDER BY CASE a.severity
        WHEN 'critical' THEN 0
        WHEN 'major' THEN 1
        WHEN 'minor' THEN 2
        ELSE 3 END,
    a.entity_instance_id, a.id";

/// An active alarm enriched with its suppression state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlarmView {
    /// The stored record; `uuid` and `timestamp` are always `Some`.
    pub alarm: Fault,
    /// Hidden from summaries by an inhibiting ancestor alarm.
    pub masked: bool,
    pub suppression_status: SuppressionStatus,
    pub mgmt_affecting: bool,
    pub degrade_affecting: bool,
}

impl AlarmView {
    pub fn uuid(&self) -> &str {
        self.alarm.uuid.as_deref().unwrap_or_default()
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppression_status != SuppressionStatus::Unsuppressed
    }
}

fn alarm_view(row: &Row<'_>) -> rusqlite::Result<AlarmView> {
    let severity: Severity = parsed(row, 6)?;
    let mgmt: SeverityLevel = parsed(row, 16)?;
    let degrade: SeverityLevel = parsed(row, 17)?;
    let alarm = Fault {
        uuid: Some(row.get(0)?),
        alarm_id: row.get(1)?,
        alarm_state: parsed(row, 2)?,
        entity_type_id: row.get(3)?,
        entity_instance_id: row.get(4)?,
        timestamp: Some(timestamp(row, 5)?),
        severity,
        reason_text: row.get(7)?,
        alarm_type: parsed(row, 8)?,
        probable_cause: row.get(9)?,
        proposed_repair_action: row.get(10)?,
        service_affecting: row.get(11)?,
        suppression: row.get(12)?,
        inhibit_alarms: row.get(13)?,
        keep_existing_alarm: false,
    };
    Ok(AlarmView {
        alarm,
        masked: row.get(14)?,
        suppression_status: parsed(row, 15)?,
        mgmt_affecting: affects(severity, mgmt),
        degrade_affecting: affects(severity, degrade),
    })
}

/// Inserts a new active alarm.
///
/// A uuid is generated when the record has none, and the timestamp defaults
/// to now.
///
/// # Errors
///
/// Returns `StoreError::AlreadyExists` if the uuid or the
/// (`alarm_id`, `entity_instance_id`) pair is already present.
pub fn create_alarm(conn: &Connection, fault: &Fault) -> Result<AlarmView, StoreError> {
    let uuid = fault
        .uuid
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    conn.execute(
        "INSERT INTO alarm (uuid, alarm_id, alarm_state, entity_type_id, entity_instance_id,
            timestamp, severity, reason_text, alarm_type, probable_cause,
            proposed_repair_action, service_affecting, suppression, inhibit_alarms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            uuid,
            fault.alarm_id,
            fault.alarm_state.as_str(),
            fault.entity_type_id,
            fault.entity_instance_id,
            stored_timestamp(fault.timestamp),
            fault.severity.as_str(),
            fault.reason_text,
            fault.alarm_type.as_str(),
            fault.probable_cause,
            fault.proposed_repair_action,
            fault.service_affecting,
            fault.suppression,
            fault.inhibit_alarms,
        ],
    )
    .map_err(|e| {
        StoreError::on_insert(
            e,
            "alarm",
            &format!("{}/{}", fault.alarm_id, fault.entity_instance_id),
        )
    })?;

    tracing::debug!(
        uuid = %uuid,
        alarm_id = %fault.alarm_id,
        entity_instance_id = %fault.entity_instance_id,
        "alarm row inserted"
    );
    get_alarm(conn, &uuid)
}

/// Loads one alarm by uuid.
///
/// # Errors
///
/// Returns `StoreError::NotFound` if no alarm has this uuid.
pub fn get_alarm(conn: &Connection, uuid: &str) -> Result<AlarmView, StoreError> {
    let sql = format!("{SELECT_ALARM} WHERE a.uuid = ?1");
    conn.query_row(&sql, [uuid], alarm_view)
        .optional()?
        .ok_or_else(|| StoreError::not_found("alarm", uuid))
}

/// Loads the alarm with this exact natural key, if any.
pub fn get_alarm_by_ids(
    conn: &Connection,
    alarm_id: &str,
    entity_instance_id: &str,
) -> Result<Option<AlarmView>, StoreError> {
    let sql = format!("{SELECT_ALARM} WHERE a.alarm_id = ?1 AND a.entity_instance_id = ?2");
    Ok(conn
        .query_row(&sql, params![alarm_id, entity_instance_id], alarm_view)
        .optional()?)
}

/// Every alarm whose entity instance starts with `prefix`.
pub fn alarms_by_entity_prefix(
    conn: &Connection,
    prefix: &str,
) -> Result<Vec<AlarmView>, StoreError> {
    let sql = format!(
        "{SELECT_ALARM}
         WHERE substr(a.entity_instance_id, 1, length(?1)) = ?1
         {ORDER_BY_SEVERITY}"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([prefix], alarm_view)?;
    Ok(collect(rows)?)
}

/// Every alarm raised under `alarm_id`, across all entities.
pub fn alarms_by_alarm_id(conn: &Connection, alarm_id: &str) -> Result<Vec<AlarmView>, StoreError> {
    let sql = format!("{SELECT_ALARM} WHERE a.alarm_id = ?1 {ORDER_BY_SEVERITY}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([alarm_id], alarm_view)?;
    Ok(collect(rows)?)
}

/// Alarms with this `alarm_id` whose entity instance starts with
/// `entity_prefix`. A parent entity therefore matches its children.
///
/// A blank `entity_prefix` matches the entity instance exactly instead of
/// matching every entity.
pub fn alarms_by_alarm_id_under(
    conn: &Connection,
    alarm_id: &str,
    entity_prefix: &str,
) -> Result<Vec<AlarmView>, StoreError> {
    let entity_clause = if entity_prefix.trim().is_empty() {
        "a.entity_instance_id = ?2"
    } else {
        "substr(a.entity_instance_id, 1, length(?2)) = ?2"
    };
    let sql = format!(
        "{SELECT_ALARM}
         WHERE a.alarm_id = ?1
           AND {entity_clause}
         {ORDER_BY_SEVERITY}"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![alarm_id, entity_prefix], alarm_view)?;
    Ok(collect(rows)?)
}

/// Filter criteria for [`list_alarms`]. Text criteria match as substrings.
#[derive(Debug, Clone, Default)]
pub struct AlarmFilter {
    pub uuid: Option<String>,
    pub alarm_id: Option<String>,
    pub entity_type_id: Option<String>,
    pub entity_instance_id: Option<String>,
    pub severity: Option<String>,
    pub alarm_type: Option<String>,
    /// Maximum number of alarms to return (default: unlimited).
    pub limit: Option<i64>,
    /// Include alarms whose id is suppressed.
    pub include_suppress: bool,
}

/// Lists active alarms, most severe first.
///
/// # Errors
///
/// Returns `StoreError::Database` on SQL failure.
pub fn list_alarms(conn: &Connection, filter: &AlarmFilter) -> Result<Vec<AlarmView>, StoreError> {
    let mut clauses: Vec<String> = Vec::new();
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    let text_filters = [
        ("a.uuid", &filter.uuid),
        ("a.alarm_id", &filter.alarm_id),
        ("a.entity_type_id", &filter.entity_type_id),
        ("a.entity_instance_id", &filter.entity_instance_id),
        ("a.severity", &filter.severity),
        ("a.alarm_type", &filter.alarm_type),
    ];
    for (column, value) in text_filters {
        if let Some(value) = value {
            param_values.push(Box::new(contains_pattern(value)));
            clauses.push(format!("{column} LIKE ?{} ESCAPE '\\'", param_values.len()));
        }
    }

    if !filter.include_suppress {
        clauses.push("COALESCE(s.suppression_status, 'unsuppressed') = 'unsuppressed'".to_string());
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    param_values.push(Box::new(filter.limit.unwrap_or(-1)));
    let sql = format!(
        "{SELECT_ALARM} {where_clause} {ORDER_BY_SEVERITY} LIMIT ?{}",
        param_values.len()
    );

    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| &**p).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_refs.as_slice(), alarm_view)?;
    Ok(collect(rows)?)
}

/// Overwrites the stored alarm `uuid` with the attributes of `fault`,
/// keeping its uuid. The timestamp defaults to now.
///
/// # Errors
///
/// Returns `StoreError::NotFound` if no alarm has this uuid, or
/// `StoreError::AlreadyExists` if the new natural key collides with
/// another alarm.
pub fn update_alarm(conn: &Connection, uuid: &str, fault: &Fault) -> Result<AlarmView, StoreError> {
    let changed = conn
        .execute(
            "UPDATE alarm SET
                alarm_id = ?2, alarm_state = ?3, entity_type_id = ?4,
                entity_instance_id = ?5, timestamp = ?6, severity = ?7,
                reason_text = ?8, alarm_type = ?9, probable_cause = ?10,
                proposed_repair_action = ?11, service_affecting = ?12,
                suppression = ?13, inhibit_alarms = ?14,
                updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
             WHERE uuid = ?1",
            params![
                uuid,
                fault.alarm_id,
                fault.alarm_state.as_str(),
                fault.entity_type_id,
                fault.entity_instance_id,
                stored_timestamp(fault.timestamp),
                fault.severity.as_str(),
                fault.reason_text,
                fault.alarm_type.as_str(),
                fault.probable_cause,
                fault.proposed_repair_action,
                fault.service_affecting,
                fault.suppression,
                fault.inhibit_alarms,
            ],
        )
        .map_err(|e| StoreError::on_insert(e, "alarm", uuid))?;

    if changed == 0 {
        return Err(StoreError::not_found("alarm", uuid));
    }
    get_alarm(conn, uuid)
}

/// Removes the alarm `uuid`.
///
/// # Errors
///
/// Returns `StoreError::NotFound` if no alarm has this uuid.
pub fn delete_alarm(conn: &Connection, uuid: &str) -> Result<(), StoreError> {
    let removed = conn.execute("DELETE FROM alarm WHERE uuid = ?1", [uuid])?;
    if removed == 0 {
        return Err(StoreError::not_found("alarm", uuid));
    }
    Ok(())
}

/// Removes the alarm with this exact natural key and returns it.
pub fn delete_alarm_by_ids(
    conn: &Connection,
    alarm_id: &str,
    entity_instance_id: &str,
) -> Result<Option<AlarmView>, StoreError> {
    let Some(view) = get_alarm_by_ids(conn, alarm_id, entity_instance_id)? else {
        return Ok(None);
    };
    delete_alarm(conn, view.uuid())?;
    Ok(Some(view))
}

/// Masks (or unmasks) every suppressible alarm under `entity_prefix`,
/// leaving `except_uuid` untouched. Returns the number of rows changed.
pub fn set_masked_under(
    conn: &Connection,
    entity_prefix: &str,
    except_uuid: &str,
    masked: bool,
) -> Result<usize, StoreError> {
    let changed = conn.execute(
        "UPDATE alarm SET masked = ?1
         WHERE substr(entity_instance_id, 1, length(?2)) = ?2
           AND suppression = 1
           AND uuid != ?3
           AND masked != ?1",
        params![masked, entity_prefix, except_uuid],
    )?;
    if changed > 0 {
        tracing::debug!(entity_prefix, masked, changed, "alarm mask updated");
    }
    Ok(changed)
}

/// Whether an inhibiting alarm other than `except_uuid` is raised against
/// `entity_instance_id` or one of its ancestors.
pub fn is_inhibited(
    conn: &Connection,
    entity_instance_id: &str,
    except_uuid: &str,
) -> Result<bool, StoreError> {
    let inhibited: bool = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM alarm
            WHERE inhibit_alarms = 1
              AND uuid != ?2
              AND substr(?1, 1, length(entity_instance_id)) = entity_instance_id
         )",
        params![entity_instance_id, except_uuid],
        |row| row.get(0),
    )?;
    Ok(inhibited)
}

/// Sets the mask flag of one alarm.
///
/// # Errors
///
/// Returns `StoreError::NotFound` if no alarm has this uuid.
pub fn set_alarm_masked(conn: &Connection, uuid: &str, masked: bool) -> Result<(), StoreError> {
    let changed = conn.execute(
        "UPDATE alarm SET masked = ?2 WHERE uuid = ?1",
        params![uuid, masked],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("alarm", uuid));
    }
    Ok(())
}
