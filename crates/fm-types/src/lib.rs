//! Shared record types for the fault management workspace.
//!
//! This crate holds everything the other crates need to agree on without
//! touching storage or the backend:
//!
//! - [`Fault`] and [`FaultDraft`], the alarm/event record and its
//!   validation rules.
//! - The fixed vocabularies ([`AlarmState`], [`Severity`], [`AlarmType`],
//!   [`PROBABLE_CAUSES`], [`SuppressionStatus`]).
//! - The severity threshold primitive in [`policy`].
//! - The backend line codec in [`codec`].

pub mod codec;
mod fault;
mod kinds;
pub mod policy;

pub use fault::{Fault, FaultDraft, ValidationError};
pub use kinds::{
    is_probable_cause, AlarmState, AlarmType, EventLogType, ParseKindError, Severity,
    SuppressionStatus, PROBABLE_CAUSES,
};
pub use policy::SeverityLevel;

/// Default cap on the number of event log entries kept.
pub const DEFAULT_EVENT_LOG_MAX_SIZE: u64 = 4000;
