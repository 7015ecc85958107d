//! The fault record and its validation rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kinds::{is_probable_cause, AlarmState, AlarmType, Severity};

/// Errors produced when a fault record fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required attribute is unset or blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// An enumerated attribute holds a value outside its vocabulary.
    #[error("invalid {field}: {value}")]
    InvalidEnum {
        /// The attribute name.
        field: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// A fault (alarm or event) as raised by a platform component.
///
/// The pair (`alarm_id`, `entity_instance_id`) is the natural key of an
/// active alarm. `uuid` and `timestamp` are assigned by the backend and are
/// normally `None` on records built by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fault {
    pub alarm_id: String,
    pub alarm_state: AlarmState,
    pub entity_type_id: String,
    pub entity_instance_id: String,
    pub severity: Severity,
    pub reason_text: Option<String>,
    pub alarm_type: AlarmType,
    pub probable_cause: String,
    pub proposed_repair_action: Option<String>,
    #[serde(default)]
    pub service_affecting: bool,
    #[serde(default)]
    pub suppression: bool,
    pub uuid: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub inhibit_alarms: bool,
    #[serde(default)]
    pub keep_existing_alarm: bool,
}

impl Fault {
    /// Builds a fault from its required attributes. Flags default to `false`
    /// and optional text to `None`.
    pub fn new(
        alarm_id: impl Into<String>,
        alarm_state: AlarmState,
        entity_type_id: impl Into<String>,
        entity_instance_id: impl Into<String>,
        severity: Severity,
        alarm_type: AlarmType,
        probable_cause: impl Into<String>,
    ) -> Self {
        Self {
            alarm_id: alarm_id.into(),
            alarm_state,
            entity_type_id: entity_type_id.into(),
            entity_instance_id: entity_instance_id.into(),
            severity,
            reason_text: None,
            alarm_type,
            probable_cause: probable_cause.into(),
            proposed_repair_action: None,
            service_affecting: false,
            suppression: false,
            uuid: None,
            timestamp: None,
            inhibit_alarms: false,
            keep_existing_alarm: false,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason_text = Some(reason.into());
        self
    }

    pub fn with_repair_action(mut self, action: impl Into<String>) -> Self {
        self.proposed_repair_action = Some(action.into());
        self
    }

    pub fn with_service_affecting(mut self, value: bool) -> Self {
        self.service_affecting = value;
        self
    }

    pub fn with_suppression(mut self, value: bool) -> Self {
        self.suppression = value;
        self
    }

    pub fn with_inhibit_alarms(mut self, value: bool) -> Self {
        self.inhibit_alarms = value;
        self
    }

    pub fn with_keep_existing(mut self, value: bool) -> Self {
        self.keep_existing_alarm = value;
        self
    }

    /// Returns the (`alarm_id`, `entity_instance_id`) natural key.
    pub fn natural_key(&self) -> (&str, &str) {
        (&self.alarm_id, &self.entity_instance_id)
    }

    /// Checks the attributes the type system cannot enforce.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingField`] for a blank required string
    /// and [`ValidationError::InvalidEnum`] for an unknown probable cause.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("alarm_id", &self.alarm_id)?;
        require_text("probable_cause", &self.probable_cause)?;
        require_text("entity_type_id", &self.entity_type_id)?;
        require_text("entity_instance_id", &self.entity_instance_id)?;
        if !is_probable_cause(&self.probable_cause) {
            return Err(ValidationError::InvalidEnum {
                field: "probable_cause",
                value: self.probable_cause.clone(),
            });
        }
        Ok(())
    }
}

fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

/// An unvalidated fault, every attribute optional and untyped.
///
/// This is the shape of records read from untrusted input and of the fields
/// split out of a wire line. [`FaultDraft::validate`] turns it into a
/// [`Fault`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaultDraft {
    pub alarm_id: Option<String>,
    pub alarm_state: Option<String>,
    pub entity_type_id: Option<String>,
    pub entity_instance_id: Option<String>,
    pub severity: Option<String>,
    pub reason_text: Option<String>,
    pub alarm_type: Option<String>,
    pub probable_cause: Option<String>,
    pub proposed_repair_action: Option<String>,
    pub service_affecting: Option<bool>,
    pub suppression: Option<bool>,
    pub uuid: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub inhibit_alarms: Option<bool>,
    pub keep_existing_alarm: Option<bool>,
}

impl FaultDraft {
    /// Validates every attribute and produces a typed [`Fault`].
    ///
    /// Required attributes are checked first, in the order `alarm_id`,
    /// `alarm_state`, `severity`, `alarm_type`, `probable_cause`,
    /// `entity_type_id`, `entity_instance_id`; enumerations are checked
    /// afterwards in the same order.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingField`] or
    /// [`ValidationError::InvalidEnum`].
    pub fn validate(self) -> Result<Fault, ValidationError> {
        let alarm_id = required("alarm_id", self.alarm_id)?;
        let alarm_state = required("alarm_state", self.alarm_state)?;
        let severity = required("severity", self.severity)?;
        let alarm_type = required("alarm_type", self.alarm_type)?;
        let probable_cause = required("probable_cause", self.probable_cause)?;
        let entity_type_id = required("entity_type_id", self.entity_type_id)?;
        let entity_instance_id = required("entity_instance_id", self.entity_instance_id)?;

        let alarm_state = alarm_state
            .parse::<AlarmState>()
            .map_err(|e| invalid("alarm_state", e.value))?;
        let severity = severity
            .parse::<Severity>()
            .map_err(|e| invalid("severity", e.value))?;
        let alarm_type = alarm_type
            .parse::<AlarmType>()
            .map_err(|e| invalid("alarm_type", e.value))?;
        if !is_probable_cause(&probable_cause) {
            return Err(invalid("probable_cause", probable_cause));
        }

        Ok(Fault {
            alarm_id,
            alarm_state,
            entity_type_id,
            entity_instance_id,
            severity,
            reason_text: self.reason_text,
            alarm_type,
            probable_cause,
            proposed_repair_action: self.proposed_repair_action,
            service_affecting: self.service_affecting.unwrap_or(false),
            suppression: self.suppression.unwrap_or(false),
            uuid: self.uuid,
            timestamp: self.timestamp,
            inhibit_alarms: self.inhibit_alarms.unwrap_or(false),
            keep_existing_alarm: self.keep_existing_alarm.unwrap_or(false),
        })
    }
}

impl From<&Fault> for FaultDraft {
    fn from(fault: &Fault) -> Self {
        Self {
            alarm_id: Some(fault.alarm_id.clone()),
            alarm_state: Some(fault.alarm_state.as_str().to_string()),
            entity_type_id: Some(fault.entity_type_id.clone()),
            entity_instance_id: Some(fault.entity_instance_id.clone()),
            severity: Some(fault.severity.as_str().to_string()),
            reason_text: fault.reason_text.clone(),
            alarm_type: Some(fault.alarm_type.as_str().to_string()),
            probable_cause: Some(fault.probable_cause.clone()),
            proposed_repair_action: fault.proposed_repair_action.clone(),
            service_affecting: Some(fault.service_affecting),
            suppression: Some(fault.suppression),
            uuid: fault.uuid.clone(),
            timestamp: fault.timestamp,
            inhibit_alarms: Some(fault.inhibit_alarms),
            keep_existing_alarm: Some(fault.keep_existing_alarm),
        }
    }
}

fn required(field: &'static str, value: Option<String>) -> Result<String, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ValidationError::MissingField(field)),
    }
}

fn invalid(field: &'static str, value: String) -> ValidationError {
    ValidationError::InvalidEnum { field, value }
}
