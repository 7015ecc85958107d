//! Enumerated attribute values shared by alarms, event logs and
//! suppression entries.
//!
//! Every enum renders to the exact lower-case token used on the wire and in
//! the database, and parses back from it via [`std::str::FromStr`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a string is not a member of a fixed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseKindError {
    /// Which vocabulary rejected the value (e.g. `"alarm state"`).
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl ParseKindError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Transition carried by a fault record.
///
/// `Set` and `Clear` drive the active-alarm table; `Log` and `Msg` are
/// informational and only ever reach the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmState {
    Set,
    Clear,
    Log,
    Msg,
}

impl AlarmState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Clear => "clear",
            Self::Log => "log",
            Self::Msg => "msg",
        }
    }

    /// Returns `true` for states that only produce event log entries.
    pub fn is_log_only(self) -> bool {
        matches!(self, Self::Log | Self::Msg)
    }
}

impl std::fmt::Display for AlarmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlarmState {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "set" => Ok(Self::Set),
            "clear" => Ok(Self::Clear),
            "log" => Ok(Self::Log),
            "msg" => Ok(Self::Msg),
            _ => Err(ParseKindError::new("alarm state", s)),
        }
    }
}

/// Severity of a stored alarm or event.
///
/// Ordered `Warning < Minor < Major < Critical` so that `max()` over a set of
/// alarms yields the most severe one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Minor,
    Major,
    Critical,
}

impl Severity {
    /// All storable severities, most severe first.
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::Major,
        Severity::Minor,
        Severity::Warning,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Warning => "warning",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Self::Critical),
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "warning" => Ok(Self::Warning),
            _ => Err(ParseKindError::new("severity", s)),
        }
    }
}

/// Broad category of an alarm, following the ITU-T X.733 event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlarmType {
    Other,
    Communication,
    Qos,
    ProcessingError,
    Equipment,
    Environmental,
    IntegrityViolation,
    OperationalViolation,
    PhysicalViolation,
    SecurityServiceOrMechanismViolation,
    TimeDomainViolation,
}

impl AlarmType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Other => "other",
            Self::Communication => "communication",
            Self::Qos => "qos",
            Self::ProcessingError => "processing-error",
            Self::Equipment => "equipment",
            Self::Environmental => "environmental",
            Self::IntegrityViolation => "integrity-violation",
            Self::OperationalViolation => "operational-violation",
            Self::PhysicalViolation => "physical-violation",
            Self::SecurityServiceOrMechanismViolation => {
                "security-service-or-mechanism-violation"
            }
            Self::TimeDomainViolation => "time-domain-violation",
        }
    }
}

impl std::fmt::Display for AlarmType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlarmType {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "other" => Ok(Self::Other),
            "communication" => Ok(Self::Communication),
            "qos" => Ok(Self::Qos),
            "processing-error" => Ok(Self::ProcessingError),
            "equipment" => Ok(Self::Equipment),
            "environmental" => Ok(Self::Environmental),
            "integrity-violation" => Ok(Self::IntegrityViolation),
            "operational-violation" => Ok(Self::OperationalViolation),
            "physical-violation" => Ok(Self::PhysicalViolation),
            "security-service-or-mechanism-violation" => {
                Ok(Self::SecurityServiceOrMechanismViolation)
            }
            "time-domain-violation" => Ok(Self::TimeDomainViolation),
            _ => Err(ParseKindError::new("alarm type", s)),
        }
    }
}

/// Probable causes accepted on a fault record (ITU-T X.733 / X.736).
pub const PROBABLE_CAUSES: &[&str] = &[
    "adaptor-error",
    "application-subsystem-failure",
    "bandwidth-reduced",
    "call-establishment-error",
    "communication-protocol-error",
    "communication-subsystem-failure",
    "configuration-or-customization-error",
    "congestion",
    "corrupt-data",
    "cpu-cycles-limit-exceeded",
    "dataset-or-modem-error",
    "degraded-signal",
    "dte-dce-interface-error",
    "enclosure-door-open",
    "equipment-malfunction",
    "excessive-vibration",
    "file-error",
    "fire-detected",
    "flood-detected",
    "framing-error",
    "heating-ventilation-cooling-system-problem",
    "humidity-unacceptable",
    "io-device-error",
    "input-device-error",
    "lan-error",
    "leak-detected",
    "local-node-transmission-error",
    "loss-of-frame",
    "loss-of-signal",
    "material-supply-exhausted",
    "multiplexer-problem",
    "out-of-memory",
    "output-device-error",
    "performance-degraded",
    "power-problem",
    "pressure-unacceptable",
    "processor-problem",
    "pump-failure",
    "queue-size-exceeded",
    "receive-failure",
    "receiver-failure",
    "remote-node-transmission-error",
    "resource-at-or-nearing-capacity",
    "response-time-excessive",
    "retransmission-rate-excessive",
    "software-error",
    "software-program-abnormally-terminated",
    "software-program-error",
    "storage-capacity-problem",
    "temperature-unacceptable",
    "threshold-crossed",
    "timing-problem",
    "toxic-leak-detected",
    "transmit-failure",
    "transmitter-failure",
    "underlying-resource-unavailable",
    "version-mismatch",
    "duplicate-information",
    "information-missing",
    "information-modification-detected",
    "information-out-of-sequence",
    "unexpected-information",
    "denial-of-service",
    "out-of-service",
    "procedural-error",
    "unspecified-reason",
    "cable-tamper",
    "intrusion-detection",
    "authentication-failure",
    "breach-of-confidentiality",
    "non-repudiation-failure",
    "unauthorized-access-attempt",
    "delayed-information",
    "key-expired",
    "out-of-hours-activity",
    "unknown",
];

/// Returns `true` if `cause` is in [`PROBABLE_CAUSES`].
pub fn is_probable_cause(cause: &str) -> bool {
    PROBABLE_CAUSES.contains(&cause)
}

/// Suppression status configured for an alarm id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuppressionStatus {
    Suppressed,
    Unsuppressed,
}

impl SuppressionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Suppressed => "suppressed",
            Self::Unsuppressed => "unsuppressed",
        }
    }
}

impl std::fmt::Display for SuppressionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SuppressionStatus {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "suppressed" => Ok(Self::Suppressed),
            "unsuppressed" => Ok(Self::Unsuppressed),
            _ => Err(ParseKindError::new("suppression status", s)),
        }
    }
}

/// Which kinds of event log entries a listing should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventLogType {
    /// Alarm transitions and informational logs.
    #[default]
    All,
    /// Only `set` and `clear` transitions.
    Alarm,
    /// Only informational `log` entries.
    Log,
}

impl EventLogType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::Alarm => "ALARM",
            Self::Log => "LOG",
        }
    }
}

impl std::str::FromStr for EventLogType {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALL" => Ok(Self::All),
            "ALARM" => Ok(Self::Alarm),
            "LOG" => Ok(Self::Log),
            _ => Err(ParseKindError::new("event log type", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alarm_state_round_trips_through_str() {
        for state in [AlarmState::Set, AlarmState::Clear, AlarmState::Log, AlarmState::Msg] {
            assert_eq!(state.as_str().parse::<AlarmState>(), Ok(state));
        }
        assert!("SET".parse::<AlarmState>().is_err());
    }

    #[test]
    fn severity_ordering_puts_critical_last() {
        let most = Severity::ALL.iter().copied().max();
        assert_eq!(most, Some(Severity::Critical));
        assert!(Severity::Warning < Severity::Minor);
    }

    #[test]
    fn alarm_type_serde_matches_wire_tokens() {
        let json = serde_json::to_string(&AlarmType::SecurityServiceOrMechanismViolation)
            .expect("serialize alarm type");
        assert_eq!(json, "\"security-service-or-mechanism-violation\"");
        assert_eq!(
            "processing-error".parse::<AlarmType>(),
            Ok(AlarmType::ProcessingError)
        );
        assert_eq!(AlarmType::Qos.to_string(), "qos");
    }

    #[test]
    fn parse_error_names_the_vocabulary() {
        let err = "fatal".parse::<Severity>().expect_err("fatal is not a severity");
        assert_eq!(err.to_string(), "unknown severity: fatal");
    }

    #[test]
    fn probable_cause_membership() {
        assert!(is_probable_cause("equipment-malfunction"));
        assert!(is_probable_cause("unknown"));
        assert!(!is_probable_cause("gremlins"));
    }

    #[test]
    fn event_log_type_defaults_to_all() {
        assert_eq!(EventLogType::default(), EventLogType::All);
        assert_eq!("ALARM".parse::<EventLogType>(), Ok(EventLogType::Alarm));
    }
}
