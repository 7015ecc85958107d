//! Fault facade.
//!
//! Callers raise, clear and query faults through one of two adapters over a
//! shared [`FaultEngine`]:
//!
//! - [`FaultApi`] returns [`FaultError::OperationFailed`] when the backend
//!   fails.
//! - [`LegacyFaultApi`] reports backend failures as `false` / `None`.
//!
//! Both validate records before the backend sees them. The engine holds the
//! [`AlarmBackend`] behind a single mutex; share it as an `Arc` so that
//! every adapter in the process serialises on the same lock.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fm_api::{FaultApi, FaultEngine, LegacyFaultApi};
//!
//! let engine = Arc::new(FaultEngine::new(backend));
//! let strict = FaultApi::new(Arc::clone(&engine));
//! let legacy = LegacyFaultApi::new(engine);
//!
//! let uuid = strict.set_fault(&fault)?;
//! assert!(legacy.clear_fault(&fault.alarm_id, &fault.entity_instance_id));
//! ```

mod backend;
mod engine;
mod legacy;
mod strict;

pub use backend::{AlarmBackend, Reply};
pub use engine::FaultEngine;
pub use legacy::LegacyFaultApi;
pub use strict::{FaultApi, FaultError};
