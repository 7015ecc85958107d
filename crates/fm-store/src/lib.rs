//! Persistent fault store.
//!
//! Operates on the tables created by `fm-db` through plain
//! `&rusqlite::Connection` handles, so callers choose whether a call runs on
//! a pooled connection or inside their own transaction.
//!
//! | Module | Table | Notes |
//! |--------|-------|-------|
//! | alarm | `alarm` | active alarms, enriched with suppression on read |
//! | event log | `event_log` | bounded; [`append_event_log`] evicts oldest first |
//! | suppression | `event_suppression` | per alarm id status and thresholds |
//!
//! [`summarize`] and [`alarm_summary`] count active alarms by severity.

mod alarm;
mod error;
mod event_log;
mod row;
mod summary;
mod suppression;

pub use alarm::{
    alarms_by_alarm_id, alarms_by_alarm_id_under, alarms_by_entity_prefix, create_alarm,
    delete_alarm, delete_alarm_by_ids, get_alarm, get_alarm_by_ids, is_inhibited, list_alarms,
    set_alarm_masked, set_masked_under, update_alarm, AlarmFilter, AlarmView,
};
pub use error::StoreError;
pub use event_log::{
    append_event_log, append_event_log_in, delete_event_log, event_log_count, get_event_log,
    list_event_logs, oldest_event_log, trim_event_log, EventLogEntry, EventLogFilter, NewEventLog,
};
pub use summary::{alarm_summary, summarize, AlarmSummary, SystemStatus};
pub use suppression::{
    create_event_suppression, get_event_suppression, list_event_suppressions,
    mark_for_deletion, suppression_for_alarm_id, update_suppression_status, update_thresholds,
    EventSuppression, NewEventSuppression, SuppressionFilter,
};
