//! Strict fault API: backend failures surface as errors.

use std::sync::Arc;

use fm_types::{Fault, ValidationError};
use thiserror::Error;

use crate::backend::{AlarmBackend, Reply};
use crate::engine::FaultEngine;

/// Errors raised by [`FaultApi`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FaultError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The backend reported a failure for the named operation.
    #[error("Failed to execute {operation}.")]
    OperationFailed { operation: &'static str },
}

fn failed(operation: &'static str) -> FaultError {
    FaultError::OperationFailed { operation }
}

/// Fault API that reports backend failures as [`FaultError::OperationFailed`].
/// "Nothing matched" is a normal outcome: `false` or `None`.
pub struct FaultApi<B> {
    engine: Arc<FaultEngine<B>>,
}

impl<B> Clone for FaultApi<B> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<B: AlarmBackend> FaultApi<B> {
    pub fn new(engine: Arc<FaultEngine<B>>) -> Self {
        Self { engine }
    }

    /// Raises or updates a fault and returns its uuid.
    pub fn set_fault(&self, fault: &Fault) -> Result<String, FaultError> {
        self.engine
            .set_fault(fault)?
            .ok_or_else(|| failed("set_fault"))
    }

    pub fn set_faults(&self, faults: &[Fault]) -> Result<bool, FaultError> {
        if self.engine.set_faults(faults)? {
            Ok(true)
        } else {
            Err(failed("set_faults"))
        }
    }

    /// Returns `true` if an alarm was cleared and `false` if none matched.
    pub fn clear_fault(&self, alarm_id: &str, entity_instance_id: &str) -> Result<bool, FaultError> {
        found("clear_fault", self.engine.clear_fault(alarm_id, entity_instance_id))
    }

    pub fn clear_faults(&self, keys: &[(&str, &str)]) -> Result<bool, FaultError> {
        if self.engine.clear_faults(keys) {
            Ok(true)
        } else {
            Err(failed("clear_faults_list"))
        }
    }

    pub fn clear_all(&self, entity_instance_id: &str) -> Result<bool, FaultError> {
        found("clear_all", self.engine.clear_all(entity_instance_id))
    }

    pub fn get_fault(
        &self,
        alarm_id: &str,
        entity_instance_id: &str,
    ) -> Result<Option<Fault>, FaultError> {
        optional("get_fault", self.engine.get_fault(alarm_id, entity_instance_id))
    }

    pub fn get_faults(&self, entity_instance_id: &str) -> Result<Option<Vec<Fault>>, FaultError> {
        optional("get_faults", self.engine.get_faults(entity_instance_id))
    }

    pub fn get_faults_by_id(&self, alarm_id: &str) -> Result<Option<Vec<Fault>>, FaultError> {
        optional("get_faults_by_id", self.engine.get_faults_by_id(alarm_id))
    }

    pub fn get_faults_by_id_n_eid(
        &self,
        alarm_id: &str,
        entity_instance_id: &str,
    ) -> Result<Option<Vec<Fault>>, FaultError> {
        optional(
            "get_faults_by_id_n_eid",
            self.engine.get_faults_by_id_n_eid(alarm_id, entity_instance_id),
        )
    }
}

fn found(operation: &'static str, reply: Reply<()>) -> Result<bool, FaultError> {
    match reply {
        Reply::Done(()) => Ok(true),
        Reply::NotFound => Ok(false),
        Reply::Failed => Err(failed(operation)),
    }
}

fn optional<T>(operation: &'static str, reply: Reply<T>) -> Result<Option<T>, FaultError> {
    match reply {
        Reply::Done(v) => Ok(Some(v)),
        Reply::NotFound => Ok(None),
        Reply::Failed => Err(failed(operation)),
    }
}
