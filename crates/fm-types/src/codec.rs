//! Line codec for records exchanged with the active-alarm backend.
//!
//! A record is rendered as fixed-position fields, each preceded and the last
//! one followed by [`FIELD_SEPARATOR`]:
//!
//! ```text
//! ###uuid###alarm_id###state###entity_type###entity_instance###timestamp###
//!    severity###reason###alarm_type###cause###repair###service_affecting###
//!    suppression###inhibit_alarms###keep_existing###
//! ```
//!
//! Absent optional values are written as a single space so the field count
//! never changes. There is no escaping: a separator inside `reason_text` or
//! `proposed_repair_action` shifts every later field. The encoder reports
//! such values but does not rewrite them.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::fault::{Fault, FaultDraft};

/// Token that delimits fields on the wire.
pub const FIELD_SEPARATOR: &str = "###";

/// Placeholder for an absent value.
pub const EMPTY_FIELD: &str = " ";

/// Number of fields in a full alarm line.
pub const ALARM_FIELDS: usize = 15;

/// Fewest fields a line may carry and still decode. The trailing
/// `keep_existing_alarm` control field is optional on replies.
pub const MIN_ALARM_FIELDS: usize = 14;

/// Timestamp layout used on the wire, always UTC with microseconds.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

const UUID_IX: usize = 0;
const ALARM_ID_IX: usize = 1;
const STATE_IX: usize = 2;
const ENTITY_TYPE_IX: usize = 3;
const ENTITY_INSTANCE_IX: usize = 4;
const TIMESTAMP_IX: usize = 5;
const SEVERITY_IX: usize = 6;
const REASON_IX: usize = 7;
const ALARM_TYPE_IX: usize = 8;
const CAUSE_IX: usize = 9;
const REPAIR_IX: usize = 10;
const SERVICE_AFFECTING_IX: usize = 11;
const SUPPRESSION_IX: usize = 12;
const INHIBIT_IX: usize = 13;
const KEEP_EXISTING_IX: usize = 14;

/// Encodes a fault into a backend line.
pub fn encode_fault(fault: &Fault) -> String {
    warn_on_separator("reason_text", fault.reason_text.as_deref());
    warn_on_separator(
        "proposed_repair_action",
        fault.proposed_repair_action.as_deref(),
    );

    let timestamp = fault.timestamp.map(format_timestamp);
    let fields: [&str; ALARM_FIELDS] = [
        or_empty(fault.uuid.as_deref()),
        &fault.alarm_id,
        fault.alarm_state.as_str(),
        &fault.entity_type_id,
        &fault.entity_instance_id,
        or_empty(timestamp.as_deref()),
        fault.severity.as_str(),
        or_empty(fault.reason_text.as_deref()),
        fault.alarm_type.as_str(),
        &fault.probable_cause,
        or_empty(fault.proposed_repair_action.as_deref()),
        bool_field(fault.service_affecting),
        bool_field(fault.suppression),
        bool_field(fault.inhibit_alarms),
        bool_field(fault.keep_existing_alarm),
    ];
    join_fields(&fields)
}

/// Decodes a backend line into a fault.
///
/// Returns `None` when the line has fewer than [`MIN_ALARM_FIELDS`] fields
/// or when the decoded attributes do not validate; callers treat both as
/// "no record".
pub fn decode_fault(line: &str) -> Option<Fault> {
    let fields = split_fields(line);
    if fields.len() < MIN_ALARM_FIELDS {
        tracing::debug!(
            fields = fields.len(),
            "backend line too short to hold an alarm"
        );
        return None;
    }

    let timestamp = match optional(fields[TIMESTAMP_IX]) {
        Some(raw) => match parse_timestamp(&raw) {
            Some(ts) => Some(ts),
            None => {
                tracing::warn!(timestamp = %raw, "unparseable timestamp in backend line");
                return None;
            }
        },
        None => None,
    };

    let draft = FaultDraft {
        alarm_id: optional(fields[ALARM_ID_IX]),
        alarm_state: optional(fields[STATE_IX]),
        entity_type_id: optional(fields[ENTITY_TYPE_IX]),
        entity_instance_id: optional(fields[ENTITY_INSTANCE_IX]),
        severity: optional(fields[SEVERITY_IX]),
        reason_text: optional(fields[REASON_IX]),
        alarm_type: optional(fields[ALARM_TYPE_IX]),
        probable_cause: optional(fields[CAUSE_IX]),
        proposed_repair_action: optional(fields[REPAIR_IX]),
        service_affecting: Some(parse_bool(fields[SERVICE_AFFECTING_IX])),
        suppression: Some(parse_bool(fields[SUPPRESSION_IX])),
        uuid: optional(fields[UUID_IX]),
        timestamp,
        inhibit_alarms: Some(parse_bool(fields[INHIBIT_IX])),
        keep_existing_alarm: fields.get(KEEP_EXISTING_IX).map(|v| parse_bool(v)),
    };

    match draft.validate() {
        Ok(fault) => Some(fault),
        Err(e) => {
            tracing::warn!(error = %e, "backend line does not hold a valid alarm");
            None
        }
    }
}

/// Encodes an (`alarm_id`, `entity_instance_id`) key for clear and get
/// requests.
pub fn encode_key(alarm_id: &str, entity_instance_id: &str) -> String {
    join_fields(&[or_blank(alarm_id), or_blank(entity_instance_id)])
}

/// Splits a key line back into (`alarm_id`, `entity_instance_id`).
///
/// A blank entity instance decodes to an empty string; a blank alarm id or
/// a line with fewer than two fields yields `None`.
pub fn decode_key(line: &str) -> Option<(String, String)> {
    let fields = split_fields(line);
    if fields.len() < 2 {
        return None;
    }
    let alarm_id = optional(fields[0])?;
    let entity_instance_id = optional(fields[1]).unwrap_or_default();
    Some((alarm_id, entity_instance_id))
}

/// Renders a timestamp in [`TIMESTAMP_FORMAT`].
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a timestamp written by [`format_timestamp`]. Fractional seconds
/// are optional.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn join_fields(fields: &[&str]) -> String {
    let mut line = String::with_capacity(
        fields.iter().map(|f| f.len() + FIELD_SEPARATOR.len()).sum::<usize>()
            + FIELD_SEPARATOR.len(),
    );
    line.push_str(FIELD_SEPARATOR);
    for field in fields {
        line.push_str(field);
        line.push_str(FIELD_SEPARATOR);
    }
    line
}

fn split_fields(line: &str) -> Vec<&str> {
    let inner = line.strip_prefix(FIELD_SEPARATOR).unwrap_or(line);
    let inner = inner.strip_suffix(FIELD_SEPARATOR).unwrap_or(inner);
    if inner.is_empty() {
        return Vec::new();
    }
    inner.split(FIELD_SEPARATOR).collect()
}

fn or_empty(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => EMPTY_FIELD,
    }
}

fn or_blank(value: &str) -> &str {
    if value.is_empty() {
        EMPTY_FIELD
    } else {
        value
    }
}

fn optional(field: &str) -> Option<String> {
    if field == EMPTY_FIELD || field.is_empty() {
        None
    } else {
        Some(field.to_string())
    }
}

fn bool_field(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn parse_bool(field: &str) -> bool {
    matches!(field.trim(), "True" | "true" | "1")
}

fn warn_on_separator(field: &'static str, value: Option<&str>) {
    if value.is_some_and(|v| v.contains(FIELD_SEPARATOR)) {
        tracing::warn!(
            field,
            "text contains the field separator and will not decode cleanly"
        );
    }
}
