//! Core fault engine.
//!
//! [`FaultEngine`] owns the backend behind one mutex. Every backend call in
//! the process goes through it, so backend operations never interleave.
//! Validation and line encoding/decoding happen outside the lock.

use std::sync::Mutex;

use fm_types::codec::{decode_fault, encode_fault, encode_key};
use fm_types::{Fault, ValidationError};

use crate::backend::{AlarmBackend, Reply};

pub struct FaultEngine<B> {
    backend: Mutex<B>,
}

impl<B: AlarmBackend> FaultEngine<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Mutex::new(backend),
        }
    }

    /// Runs `f` with exclusive access to the backend. A poisoned lock is
    /// recovered.
    fn with_backend<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        let mut backend = self.backend.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut backend)
    }

    /// Validates and stores one record. Returns the uuid of the active
    /// record, or `None` if the backend failed.
    ///
    /// # Errors
    ///
    /// Returns the validation error without touching the backend.
    pub fn set_fault(&self, fault: &Fault) -> Result<Option<String>, ValidationError> {
        fault.validate()?;
        let line = encode_fault(fault);
        let uuid = self.with_backend(|b| b.set(&line));
        match uuid {
            Some(ref uuid) => tracing::info!(
                uuid = %uuid,
                alarm_id = %fault.alarm_id,
                entity_instance_id = %fault.entity_instance_id,
                state = fault.alarm_state.as_str(),
                severity = fault.severity.as_str(),
                "fault set"
            ),
            None => tracing::error!(
                alarm_id = %fault.alarm_id,
                entity_instance_id = %fault.entity_instance_id,
                "backend failed to set fault"
            ),
        }
        Ok(uuid)
    }

    /// Validates and stores a batch. The whole batch is validated and
    /// encoded first; one invalid record rejects it before the backend is
    /// reached.
    ///
    /// # Errors
    ///
    /// Returns the first validation error in the batch.
    pub fn set_faults(&self, faults: &[Fault]) -> Result<bool, ValidationError> {
        let lines = faults
            .iter()
            .map(|fault| fault.validate().map(|()| encode_fault(fault)))
            .collect::<Result<Vec<_>, _>>()?;
        let ok = self.with_backend(|b| b.set_list(&lines));
        if ok {
            tracing::info!(count = lines.len(), "fault batch set");
        } else {
            tracing::error!(count = lines.len(), "backend failed to set fault batch");
        }
        Ok(ok)
    }

    pub fn clear_fault(&self, alarm_id: &str, entity_instance_id: &str) -> Reply<()> {
        let key = encode_key(alarm_id, entity_instance_id);
        let reply = self.with_backend(|b| b.clear(&key));
        match &reply {
            Reply::Done(()) => tracing::info!(alarm_id, entity_instance_id, "fault cleared"),
            Reply::NotFound => {
                tracing::debug!(alarm_id, entity_instance_id, "no fault to clear")
            }
            Reply::Failed => {
                tracing::error!(alarm_id, entity_instance_id, "backend failed to clear fault")
            }
        }
        reply
    }

    pub fn clear_faults(&self, keys: &[(&str, &str)]) -> bool {
        let lines: Vec<String> = keys
            .iter()
            .map(|(alarm_id, eid)| encode_key(alarm_id, eid))
            .collect();
        let ok = self.with_backend(|b| b.clear_list(&lines));
        if ok {
            tracing::info!(count = lines.len(), "fault batch cleared");
        } else {
            tracing::error!(count = lines.len(), "backend failed to clear fault batch");
        }
        ok
    }

    /// Clears every alarm of `entity_instance_id` and its descendants.
    pub fn clear_all(&self, entity_instance_id: &str) -> Reply<()> {
        let reply = self.with_backend(|b| b.clear_all(entity_instance_id));
        match &reply {
            Reply::Done(()) => tracing::info!(entity_instance_id, "entity faults cleared"),
            Reply::NotFound => tracing::debug!(entity_instance_id, "entity has no faults"),
            Reply::Failed => {
                tracing::error!(entity_instance_id, "backend failed to clear entity faults")
            }
        }
        reply
    }

    pub fn get_fault(&self, alarm_id: &str, entity_instance_id: &str) -> Reply<Fault> {
        let key = encode_key(alarm_id, entity_instance_id);
        match self.with_backend(|b| b.get(&key)) {
            Reply::Done(line) => match decode_fault(&line) {
                Some(fault) => Reply::Done(fault),
                None => {
                    tracing::warn!(alarm_id, entity_instance_id, "backend returned malformed fault");
                    Reply::Failed
                }
            },
            Reply::NotFound => Reply::NotFound,
            Reply::Failed => {
                tracing::error!(alarm_id, entity_instance_id, "backend failed to get fault");
                Reply::Failed
            }
        }
    }

    /// Active alarms of `entity_instance_id` and its descendants.
    pub fn get_faults(&self, entity_instance_id: &str) -> Reply<Vec<Fault>> {
        let reply = self.with_backend(|b| b.get_by_entity(entity_instance_id));
        decode_list("get_faults", reply)
    }

    pub fn get_faults_by_id(&self, alarm_id: &str) -> Reply<Vec<Fault>> {
        let reply = self.with_backend(|b| b.get_by_alarm_id(alarm_id));
        decode_list("get_faults_by_id", reply)
    }

    /// Active alarms of `alarm_id` raised against `entity_instance_id` or
    /// its descendants.
    pub fn get_faults_by_id_n_eid(
        &self,
        alarm_id: &str,
        entity_instance_id: &str,
    ) -> Reply<Vec<Fault>> {
        let key = encode_key(alarm_id, entity_instance_id);
        let reply = self.with_backend(|b| b.get_by_alarm_and_entity(&key));
        decode_list("get_faults_by_id_n_eid", reply)
    }
}

/// Decodes a list reply. Malformed lines are skipped; an empty result reads
/// as not found.
fn decode_list(operation: &'static str, reply: Reply<Vec<String>>) -> Reply<Vec<Fault>> {
    match reply {
        Reply::Done(lines) => {
            let total = lines.len();
            let faults: Vec<Fault> = lines.iter().filter_map(|l| decode_fault(l)).collect();
            if faults.len() < total {
                tracing::warn!(
                    operation,
                    skipped = total - faults.len(),
                    "backend returned malformed faults"
                );
            }
            if faults.is_empty() {
                Reply::NotFound
            } else {
                Reply::Done(faults)
            }
        }
        Reply::NotFound => Reply::NotFound,
        Reply::Failed => {
            tracing::error!(operation, "backend query failed");
            Reply::Failed
        }
    }
}
