//! Store-backed active-alarm backend.
//!
//! [`StoreBackend`] answers the line protocol from the SQLite store:
//!
//! - `SET` of a `set` record creates the alarm, or replaces the one with the
//!   same (`alarm_id`, `entity_instance_id`) in place, keeping its uuid.
//!   With `keep_existing_alarm` the stored alarm is left untouched. Either
//!   way a history entry is appended to the event log.
//! - `SET` of a `log` or `msg` record only appends to the event log.
//! - `SET` of a `clear` record removes the alarm with that exact key.
//! - `CLEAR` matches the entity instance as a prefix, so clearing a parent
//!   entity clears the same alarm on its children. `CLEAR_ALL` removes
//!   every alarm at or below an entity. Each removed alarm appends a
//!   `clear` history entry.
//! - `GET` matches exactly; the list queries match entities by prefix.
//!
//! An alarm raised with `inhibit_alarms` masks the suppressible alarms
//! below its entity until it is cleared.
//!
//! Every write request runs in one `BEGIN IMMEDIATE` transaction: the alarm
//! change, the masking updates and the history entries commit together or
//! not at all. `SET_LIST` and `CLEAR_LIST` apply the whole batch as one
//! transaction.

use fm_api::{AlarmBackend, Reply};
use fm_db::DbPool;
use fm_store::{AlarmView, NewEventLog, StoreError};
use fm_types::codec::{decode_fault, decode_key, encode_fault};
use fm_types::{AlarmState, Fault};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use thiserror::Error;

/// Errors raised while serving one backend request.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to get database connection: {0}")]
    Pool(#[from] r2d2::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("malformed request line")]
    Malformed,
}

/// Backend over the SQLite store.
pub struct StoreBackend {
    pool: DbPool,
    max_event_log: u64,
}

impl StoreBackend {
    pub fn new(pool: DbPool, max_event_log: u64) -> Self {
        Self {
            pool,
            max_event_log,
        }
    }

    fn run<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&Connection) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        let result = self
            .pool
            .get()
            .map_err(BackendError::from)
            .and_then(|conn| f(&conn));
        if let Err(ref e) = result {
            tracing::error!(operation, error = %e, "backend request failed");
        }
        result
    }

    /// Runs `f` in a write transaction, committing only if it succeeds.
    fn write<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        self.run(operation, |conn| {
            let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
                .map_err(StoreError::from)?;
            let value = f(&tx)?;
            tx.commit().map_err(StoreError::from)?;
            Ok(value)
        })
    }

    fn record(&self, tx: &Transaction<'_>, entry: &NewEventLog) -> Result<String, BackendError> {
        Ok(fm_store::append_event_log_in(tx, entry, self.max_event_log)?.uuid)
    }

    fn set_one(&self, tx: &Transaction<'_>, line: &str) -> Result<String, BackendError> {
        let fault = decode_fault(line).ok_or(BackendError::Malformed)?;
        match fault.alarm_state {
            AlarmState::Log | AlarmState::Msg => self.record(tx, &NewEventLog::from_fault(&fault)),
            AlarmState::Clear => {
                let (alarm_id, eid) = fault.natural_key();
                match fm_store::get_alarm_by_ids(tx, alarm_id, eid)? {
                    Some(view) => {
                        let uuid = view.uuid().to_string();
                        self.remove(tx, view)?;
                        Ok(uuid)
                    }
                    None => self.record(tx, &NewEventLog::from_fault(&fault)),
                }
            }
            AlarmState::Set => self.raise(tx, &fault),
        }
    }

    fn raise(&self, tx: &Transaction<'_>, fault: &Fault) -> Result<String, BackendError> {
        let (alarm_id, eid) = fault.natural_key();
        let view = match fm_store::get_alarm_by_ids(tx, alarm_id, eid)? {
            Some(existing) if fault.keep_existing_alarm => {
                tracing::debug!(uuid = existing.uuid(), "keeping existing alarm");
                existing
            }
            Some(existing) => {
                let mut replacement = fault.clone();
                replacement.timestamp = None;
                fm_store::update_alarm(tx, existing.uuid(), &replacement)?
            }
            None => {
                let mut fresh = fault.clone();
                fresh.uuid = None;
                fresh.timestamp = None;
                fm_store::create_alarm(tx, &fresh)?
            }
        };
        let uuid = view.uuid().to_string();

        if view.alarm.suppression
            && fm_store::is_inhibited(tx, &view.alarm.entity_instance_id, &uuid)?
        {
            fm_store::set_alarm_masked(tx, &uuid, true)?;
        }
        if view.alarm.inhibit_alarms {
            fm_store::set_masked_under(tx, &view.alarm.entity_instance_id, &uuid, true)?;
        }

        self.record(tx, &NewEventLog::from_fault(&view.alarm).for_alarm(&uuid))?;
        Ok(uuid)
    }

    fn remove(&self, tx: &Transaction<'_>, view: AlarmView) -> Result<(), BackendError> {
        let uuid = view.uuid().to_string();
        fm_store::delete_alarm(tx, &uuid)?;
        if view.alarm.inhibit_alarms {
            fm_store::set_masked_under(tx, &view.alarm.entity_instance_id, &uuid, false)?;
        }
        self.record(tx, &NewEventLog::from_fault(&view.alarm).cleared(&uuid))?;
        tracing::debug!(
            uuid = %uuid,
            alarm_id = %view.alarm.alarm_id,
            entity_instance_id = %view.alarm.entity_instance_id,
            "alarm removed"
        );
        Ok(())
    }

    fn remove_all(
        &self,
        tx: &Transaction<'_>,
        views: Vec<AlarmView>,
    ) -> Result<Reply<()>, BackendError> {
        if views.is_empty() {
            return Ok(Reply::NotFound);
        }
        for view in views {
            self.remove(tx, view)?;
        }
        Ok(Reply::Done(()))
    }

    fn clear_one(&self, tx: &Transaction<'_>, key: &str) -> Result<Reply<()>, BackendError> {
        let (alarm_id, eid) = decode_key(key).ok_or(BackendError::Malformed)?;
        let views = fm_store::alarms_by_alarm_id_under(tx, &alarm_id, &eid)?;
        self.remove_all(tx, views)
    }
}

fn lines(views: Vec<AlarmView>) -> Reply<Vec<String>> {
    if views.is_empty() {
        return Reply::NotFound;
    }
    Reply::Done(views.iter().map(|v| encode_fault(&v.alarm)).collect())
}

fn reply<T>(result: Result<Reply<T>, BackendError>) -> Reply<T> {
    result.unwrap_or(Reply::Failed)
}

impl AlarmBackend for StoreBackend {
    fn set(&mut self, line: &str) -> Option<String> {
        self.write("SET", |tx| self.set_one(tx, line)).ok()
    }

    fn set_list(&mut self, lines: &[String]) -> bool {
        self.write("SET_LIST", |tx| {
            for line in lines {
                self.set_one(tx, line)?;
            }
            Ok(())
        })
        .is_ok()
    }

    fn clear(&mut self, key: &str) -> Reply<()> {
        reply(self.write("CLEAR", |tx| self.clear_one(tx, key)))
    }

    fn clear_list(&mut self, keys: &[String]) -> bool {
        self.write("CLEAR_LIST", |tx| {
            for key in keys {
                self.clear_one(tx, key)?;
            }
            Ok(())
        })
        .is_ok()
    }

    fn clear_all(&mut self, entity_instance_id: &str) -> Reply<()> {
        reply(self.write("CLEAR_ALL", |tx| {
            let views = fm_store::alarms_by_entity_prefix(tx, entity_instance_id)?;
            self.remove_all(tx, views)
        }))
    }

    fn get(&mut self, key: &str) -> Reply<String> {
        reply(self.run("GET", |conn| {
            let (alarm_id, eid) = decode_key(key).ok_or(BackendError::Malformed)?;
            Ok(match fm_store::get_alarm_by_ids(conn, &alarm_id, &eid)? {
                Some(view) => Reply::Done(encode_fault(&view.alarm)),
                None => Reply::NotFound,
            })
        }))
    }

    fn get_by_entity(&mut self, entity_instance_id: &str) -> Reply<Vec<String>> {
        reply(self.run("GET_BY_ENTITY", |conn| {
            Ok(lines(fm_store::alarms_by_entity_prefix(conn, entity_instance_id)?))
        }))
    }

    fn get_by_alarm_id(&mut self, alarm_id: &str) -> Reply<Vec<String>> {
        reply(self.run("GET_BY_ALARM_ID", |conn| {
            Ok(lines(fm_store::alarms_by_alarm_id(conn, alarm_id)?))
        }))
    }

    fn get_by_alarm_and_entity(&mut self, key: &str) -> Reply<Vec<String>> {
        reply(self.run("GET_BY_ALARM_AND_ENTITY", |conn| {
            let (alarm_id, eid) = decode_key(key).ok_or(BackendError::Malformed)?;
            Ok(lines(fm_store::alarms_by_alarm_id_under(conn, &alarm_id, &eid)?))
        }))
    }
}
