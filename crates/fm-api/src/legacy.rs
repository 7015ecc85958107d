//! Legacy fault API: backend failures collapse to `false` / `None`.

use std::sync::Arc;

use fm_types::{Fault, ValidationError};

use crate::backend::{AlarmBackend, Reply};
use crate::engine::FaultEngine;

/// Fault API for callers that treat any backend problem as "no result".
///
/// Validation errors are still reported, since they are the caller's
/// fault and never reach the backend.
pub struct LegacyFaultApi<B> {
    engine: Arc<FaultEngine<B>>,
}

impl<B> Clone for LegacyFaultApi<B> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<B: AlarmBackend> LegacyFaultApi<B> {
    pub fn new(engine: Arc<FaultEngine<B>>) -> Self {
        Self { engine }
    }

    pub fn set_fault(&self, fault: &Fault) -> Result<Option<String>, ValidationError> {
        let uuid = self.engine.set_fault(fault)?;
        if uuid.is_none() {
            tracing::warn!(operation = "set_fault", "backend failure reported as no result");
        }
        Ok(uuid)
    }

    pub fn set_faults(&self, faults: &[Fault]) -> Result<bool, ValidationError> {
        let ok = self.engine.set_faults(faults)?;
        if !ok {
            tracing::warn!(operation = "set_faults", "backend failure reported as no result");
        }
        Ok(ok)
    }

    pub fn clear_fault(&self, alarm_id: &str, entity_instance_id: &str) -> bool {
        done("clear_fault", self.engine.clear_fault(alarm_id, entity_instance_id))
    }

    pub fn clear_faults(&self, keys: &[(&str, &str)]) -> bool {
        self.engine.clear_faults(keys)
    }

    pub fn clear_all(&self, entity_instance_id: &str) -> bool {
        done("clear_all", self.engine.clear_all(entity_instance_id))
    }

    pub fn get_fault(&self, alarm_id: &str, entity_instance_id: &str) -> Option<Fault> {
        value("get_fault", self.engine.get_fault(alarm_id, entity_instance_id))
    }

    pub fn get_faults(&self, entity_instance_id: &str) -> Option<Vec<Fault>> {
        value("get_faults", self.engine.get_faults(entity_instance_id))
    }

    pub fn get_faults_by_id(&self, alarm_id: &str) -> Option<Vec<Fault>> {
        value("get_faults_by_id", self.engine.get_faults_by_id(alarm_id))
    }

    pub fn get_faults_by_id_n_eid(
        &self,
        alarm_id: &str,
        entity_instance_id: &str,
    ) -> Option<Vec<Fault>> {
        value(
            "get_faults_by_id_n_eid",
            self.engine.get_faults_by_id_n_eid(alarm_id, entity_instance_id),
        )
    }
}

fn done(operation: &'static str, reply: Reply<()>) -> bool {
    value(operation, reply).is_some()
}

fn value<T>(operation: &'static str, reply: Reply<T>) -> Option<T> {
    if reply.is_failed() {
        tracing::warn!(operation, "backend failure reported as no result");
    }
    reply.ok()
}
