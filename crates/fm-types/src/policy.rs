//! Severity thresholds used for management and degrade policy decisions.
//!
//! An event suppression entry carries two thresholds, `mgmt_affecting` and
//! `degrade_affecting`. An alarm whose severity is at or above a threshold
//! blocks the corresponding action; an alarm strictly below it is allowed.

use serde::{Deserialize, Serialize};

use crate::kinds::{ParseKindError, Severity};

/// A severity or the `none` sentinel.
///
/// `None` is less severe than every stored severity and is never stored on
/// an alarm. As a threshold it means "no alarm blocks this action".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    #[default]
    None,
    Warning,
    Minor,
    Major,
    Critical,
}

impl SeverityLevel {
    /// Every level, in no particular policy order.
    pub const ALL: [SeverityLevel; 5] = [
        SeverityLevel::None,
        SeverityLevel::Warning,
        SeverityLevel::Minor,
        SeverityLevel::Major,
        SeverityLevel::Critical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Warning => "warning",
            Self::Minor => "minor",
            Self::Major => "major",
            Self::Critical => "critical",
        }
    }
}

impl From<Severity> for SeverityLevel {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Warning => Self::Warning,
            Severity::Minor => Self::Minor,
            Severity::Major => Self::Major,
            Severity::Critical => Self::Critical,
        }
    }
}

impl std::fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SeverityLevel {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "warning" => Ok(Self::Warning),
            "minor" => Ok(Self::Minor),
            "major" => Ok(Self::Major),
            "critical" => Ok(Self::Critical),
            _ => Err(ParseKindError {
                kind: "severity level",
                value: s.to_string(),
            }),
        }
    }
}

/// Policy rank of a level.
///
/// `none` ranks 5 and `critical` 4, then descending to `warning` at 1. The
/// sentinel ranks highest so that nothing reaches a `none` threshold.
pub fn severity_rank(level: SeverityLevel) -> u8 {
    match level {
        SeverityLevel::None => 5,
        SeverityLevel::Critical => 4,
        SeverityLevel::Major => 3,
        SeverityLevel::Minor => 2,
        SeverityLevel::Warning => 1,
    }
}

/// Returns `true` if an alarm of `alarm` severity does not trip `threshold`.
pub fn alarm_allowed(alarm: SeverityLevel, threshold: SeverityLevel) -> bool {
    severity_rank(alarm) < severity_rank(threshold)
}

/// Derived policy flag: `true` when `severity` blocks the action guarded by
/// `threshold`.
pub fn affects(severity: Severity, threshold: SeverityLevel) -> bool {
    !alarm_allowed(severity.into(), threshold)
}
