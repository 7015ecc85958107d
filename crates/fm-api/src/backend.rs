//! The active-alarm backend boundary.
//!
//! Backends speak the line protocol from [`fm_types::codec`]: records and
//! keys cross this boundary already encoded, and replies come back encoded.
//! Each method corresponds to one backend operation (`SET`, `SET_LIST`,
//! `CLEAR`, `CLEAR_LIST`, `CLEAR_ALL`, `GET`, `GET_BY_ENTITY`,
//! `GET_BY_ALARM_ID`, `GET_BY_ALARM_AND_ENTITY`).

/// Three-valued backend reply: a value, "nothing matched", or a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply<T> {
    Done(T),
    NotFound,
    Failed,
}

impl<T> Reply<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reply<U> {
        match self {
            Self::Done(v) => Reply::Done(f(v)),
            Self::NotFound => Reply::NotFound,
            Self::Failed => Reply::Failed,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// The value, with not-found and failure both collapsed to `None`.
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Done(v) => Some(v),
            Self::NotFound | Self::Failed => None,
        }
    }
}

/// An active-alarm backend.
///
/// Methods take `&mut self`; the engine guarantees exclusive access, so an
/// implementation needs no locking of its own.
pub trait AlarmBackend: Send {
    /// Stores one encoded record. Returns the uuid of the active record, or
    /// `None` on failure.
    fn set(&mut self, line: &str) -> Option<String>;

    /// Stores several encoded records; `false` if any of them failed.
    fn set_list(&mut self, lines: &[String]) -> bool;

    /// Clears the alarm named by an encoded key.
    fn clear(&mut self, key: &str) -> Reply<()>;

    /// Clears every alarm named by the encoded keys; `false` on failure.
    fn clear_list(&mut self, keys: &[String]) -> bool;

    /// Clears every alarm raised against `entity_instance_id` or its
    /// descendants.
    fn clear_all(&mut self, entity_instance_id: &str) -> Reply<()>;

    /// Fetches the alarm named by an encoded key.
    fn get(&mut self, key: &str) -> Reply<String>;

    fn get_by_entity(&mut self, entity_instance_id: &str) -> Reply<Vec<String>>;

    fn get_by_alarm_id(&mut self, alarm_id: &str) -> Reply<Vec<String>>;

    fn get_by_alarm_and_entity(&mut self, key: &str) -> Reply<Vec<String>>;
}
