//! Severity summary over the active alarms.

use fm_types::Severity;
use rusqlite::Connection;
use serde::Serialize;

use crate::alarm::{list_alarms, AlarmFilter, AlarmView};
use crate::error::StoreError;

/// Overall health derived from the active alarm counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SystemStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "degraded")]
    Degraded,
    #[serde(rename = "critical")]
    Critical,
}

impl SystemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Degraded => "degraded",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts of active alarms by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlarmSummary {
    pub critical: u32,
    pub major: u32,
    pub minor: u32,
    pub warning: u32,
    pub status: SystemStatus,
}

/// Counts `alarms` by severity. Masked alarms are skipped, and suppressed
/// ones too unless `include_suppress` is set.
///
/// Any critical alarm makes the status `critical`; otherwise any major or
/// minor alarm makes it `degraded`.
pub fn summarize(alarms: &[AlarmView], include_suppress: bool) -> AlarmSummary {
    let (mut critical, mut major, mut minor, mut warning) = (0, 0, 0, 0);
    for view in alarms {
        if view.masked || (!include_suppress && view.is_suppressed()) {
            continue;
        }
        match view.alarm.severity {
            Severity::Critical => critical += 1,
            Severity::Major => major += 1,
            Severity::Minor => minor += 1,
            Severity::Warning => warning += 1,
        }
    }

    let status = if critical > 0 {
        SystemStatus::Critical
    } else if major > 0 || minor > 0 {
        SystemStatus::Degraded
    } else {
        SystemStatus::Ok
    };

    AlarmSummary {
        critical,
        major,
        minor,
        warning,
        status,
    }
}

/// Summarises every active alarm in the store.
pub fn alarm_summary(conn: &Connection, include_suppress: bool) -> Result<AlarmSummary, StoreError> {
    let filter = AlarmFilter {
        include_suppress: true,
        ..AlarmFilter::default()
    };
    let alarms = list_alarms(conn, &filter)?;
    Ok(summarize(&alarms, include_suppress))
}
