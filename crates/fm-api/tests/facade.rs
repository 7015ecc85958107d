//! Facade behaviour against an in-memory backend with injectable failures.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use fm_api::{AlarmBackend, FaultApi, FaultEngine, FaultError, LegacyFaultApi, Reply};
use fm_types::codec::{decode_fault, decode_key, encode_fault};
use fm_types::{AlarmState, AlarmType, Fault, Severity, ValidationError};

/// Shared switches the tests flip while the engine owns the backend.
#[derive(Clone, Default)]
struct Probe {
    fail: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl Probe {
    fn enter(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        !self.fail.load(Ordering::SeqCst)
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct MemoryBackend {
    alarms: BTreeMap<(String, String), Fault>,
    next_uuid: usize,
    probe: Probe,
    slow: bool,
}

impl MemoryBackend {
    fn with_probe(probe: Probe) -> Self {
        Self {
            probe,
            ..Self::default()
        }
    }

    fn store(&mut self, line: &str) -> Option<String> {
        let mut fault = decode_fault(line)?;
        let key = (fault.alarm_id.clone(), fault.entity_instance_id.clone());
        if let Some(existing) = self.alarms.get(&key) {
            if fault.keep_existing_alarm {
                return existing.uuid.clone();
            }
            fault.uuid = existing.uuid.clone();
        } else {
            self.next_uuid += 1;
            fault.uuid = Some(format!("uuid-{}", self.next_uuid));
        }
        fault.timestamp = Some(Utc::now());
        fault.keep_existing_alarm = false;
        let uuid = fault.uuid.clone();
        self.alarms.insert(key, fault);
        uuid
    }

    fn lines<'a>(faults: impl Iterator<Item = &'a Fault>) -> Reply<Vec<String>> {
        let lines: Vec<String> = faults.map(encode_fault).collect();
        if lines.is_empty() {
            Reply::NotFound
        } else {
            Reply::Done(lines)
        }
    }

    fn guarded<T>(&mut self, failed: T, f: impl FnOnce(&mut Self) -> T) -> T {
        let ok = self.probe.enter();
        if self.slow {
            thread::sleep(Duration::from_millis(2));
        }
        let out = if ok { f(self) } else { failed };
        self.probe.leave();
        out
    }
}

impl AlarmBackend for MemoryBackend {
    fn set(&mut self, line: &str) -> Option<String> {
        self.guarded(None, |b| b.store(line))
    }

    fn set_list(&mut self, lines: &[String]) -> bool {
        self.guarded(false, |b| lines.iter().all(|l| b.store(l).is_some()))
    }

    fn clear(&mut self, key: &str) -> Reply<()> {
        self.guarded(Reply::Failed, |b| match decode_key(key) {
            Some(k) if b.alarms.remove(&k).is_some() => Reply::Done(()),
            Some(_) => Reply::NotFound,
            None => Reply::Failed,
        })
    }

    fn clear_list(&mut self, keys: &[String]) -> bool {
        self.guarded(false, |b| {
            for key in keys {
                let Some(k) = decode_key(key) else {
                    return false;
                };
                b.alarms.remove(&k);
            }
            true
        })
    }

    fn clear_all(&mut self, entity_instance_id: &str) -> Reply<()> {
        self.guarded(Reply::Failed, |b| {
            let before = b.alarms.len();
            b.alarms
                .retain(|(_, eid), _| !eid.starts_with(entity_instance_id));
            if b.alarms.len() < before {
                Reply::Done(())
            } else {
                Reply::NotFound
            }
        })
    }

    fn get(&mut self, key: &str) -> Reply<String> {
        self.guarded(Reply::Failed, |b| {
            match decode_key(key).and_then(|k| b.alarms.get(&k)) {
                Some(fault) => Reply::Done(encode_fault(fault)),
                None => Reply::NotFound,
            }
        })
    }

    fn get_by_entity(&mut self, entity_instance_id: &str) -> Reply<Vec<String>> {
        self.guarded(Reply::Failed, |b| {
            Self::lines(
                b.alarms
                    .values()
                    .filter(|f| f.entity_instance_id.starts_with(entity_instance_id)),
            )
        })
    }

    fn get_by_alarm_id(&mut self, alarm_id: &str) -> Reply<Vec<String>> {
        self.guarded(Reply::Failed, |b| {
            Self::lines(b.alarms.values().filter(|f| f.alarm_id == alarm_id))
        })
    }

    fn get_by_alarm_and_entity(&mut self, key: &str) -> Reply<Vec<String>> {
        self.guarded(Reply::Failed, |b| {
            let Some((alarm_id, eid)) = decode_key(key) else {
                return Reply::Failed;
            };
            Self::lines(
                b.alarms
                    .values()
                    .filter(|f| f.alarm_id == alarm_id && f.entity_instance_id.starts_with(&eid)),
            )
        })
    }
}

fn fault(alarm_id: &str, eid: &str) -> Fault {
    Fault::new(
        alarm_id,
        AlarmState::Set,
        "host",
        eid,
        Severity::Major,
        AlarmType::ProcessingError,
        "software-error",
    )
    .with_reason("process died")
}

fn setup() -> (FaultApi<MemoryBackend>, LegacyFaultApi<MemoryBackend>, Probe) {
    let probe = Probe::default();
    let engine = Arc::new(FaultEngine::new(MemoryBackend::with_probe(probe.clone())));
    (
        FaultApi::new(Arc::clone(&engine)),
        LegacyFaultApi::new(engine),
        probe,
    )
}

// ── strict ───────────────────────────────────────────────────────────

#[test]
fn strict_set_returns_uuid_and_get_reads_it_back() {
    let (api, _, _) = setup();
    let raised = fault("400.001", "host=controller-0");
    let uuid = api.set_fault(&raised).expect("set should succeed");

    let stored = api
        .get_fault("400.001", "host=controller-0")
        .expect("get should succeed")
        .expect("fault should exist");
    assert_eq!(stored.uuid.as_deref(), Some(uuid.as_str()));
    assert_eq!(stored.reason_text.as_deref(), Some("process died"));
    assert_eq!(stored.severity, Severity::Major);
}

#[test]
fn strict_set_on_same_key_keeps_one_record() {
    let (api, _, _) = setup();
    let first = api.set_fault(&fault("400.001", "host=a")).expect("set");
    let replaced = api
        .set_fault(&fault("400.001", "host=a").with_reason("restarted"))
        .expect("set");
    assert_eq!(first, replaced);

    let all = api.get_faults("host=a").expect("get").expect("some");
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].reason_text.as_deref(), Some("restarted"));

    let kept = api
        .set_fault(&fault("400.001", "host=a").with_reason("ignored").with_keep_existing(true))
        .expect("set");
    assert_eq!(kept, first);
    let stored = api.get_fault("400.001", "host=a").expect("get").expect("some");
    assert_eq!(stored.reason_text.as_deref(), Some("restarted"));
}

#[test]
fn strict_clear_distinguishes_not_found_from_failure() {
    let (api, _, probe) = setup();
    api.set_fault(&fault("400.001", "host=a")).expect("set");

    assert_eq!(api.clear_fault("400.001", "host=a"), Ok(true));
    assert_eq!(api.clear_fault("400.001", "host=a"), Ok(false));

    probe.fail.store(true, Ordering::SeqCst);
    assert_eq!(
        api.clear_fault("400.001", "host=a"),
        Err(FaultError::OperationFailed {
            operation: "clear_fault"
        })
    );
}

#[test]
fn strict_failures_name_the_operation() {
    let (api, _, probe) = setup();
    probe.fail.store(true, Ordering::SeqCst);

    let err = api.set_fault(&fault("400.001", "host=a")).expect_err("backend down");
    assert_eq!(err.to_string(), "Failed to execute set_fault.");
    assert_eq!(
        api.get_faults("host=a"),
        Err(FaultError::OperationFailed {
            operation: "get_faults"
        })
    );
    assert!(matches!(
        api.set_faults(&[fault("400.001", "host=a")]),
        Err(FaultError::OperationFailed { operation: "set_faults" })
    ));
    assert!(matches!(
        api.clear_all("host=a"),
        Err(FaultError::OperationFailed { operation: "clear_all" })
    ));
    let err = api
        .clear_faults(&[("400.001", "host=a")])
        .expect_err("backend down");
    assert_eq!(err.to_string(), "Failed to execute clear_faults_list.");
}

#[test]
fn strict_queries_return_none_when_nothing_matches() {
    let (api, _, _) = setup();
    assert_eq!(api.get_fault("400.001", "host=a"), Ok(None));
    assert_eq!(api.get_faults("host=a"), Ok(None));
    assert_eq!(api.get_faults_by_id("400.001"), Ok(None));
    assert_eq!(api.get_faults_by_id_n_eid("400.001", "host=a"), Ok(None));
    assert_eq!(api.clear_all("host=a"), Ok(false));
}

#[test]
fn queries_by_id_and_entity_prefix() {
    let (api, _, _) = setup();
    api.set_faults(&[
        fault("400.001", "host=a"),
        fault("400.001", "host=a.port=eth0"),
        fault("400.001", "host=b"),
        fault("400.002", "host=a"),
    ])
    .expect("batch set");

    assert_eq!(api.get_faults_by_id("400.001").expect("get").map(|v| v.len()), Some(3));
    assert_eq!(api.get_faults("host=a").expect("get").map(|v| v.len()), Some(3));
    assert_eq!(
        api.get_faults_by_id_n_eid("400.001", "host=a")
            .expect("get")
            .map(|v| v.len()),
        Some(2)
    );

    assert_eq!(api.clear_faults(&[("400.001", "host=b"), ("400.002", "host=a")]), Ok(true));
    assert_eq!(api.clear_all("host=a"), Ok(true));
    assert_eq!(api.get_faults_by_id("400.001"), Ok(None));
}

#[test]
fn validation_runs_before_the_backend() {
    let (api, legacy, probe) = setup();
    let mut bad = fault("400.001", "host=a");
    bad.entity_type_id = "  ".to_string();

    assert_eq!(
        api.set_fault(&bad),
        Err(FaultError::Validation(ValidationError::MissingField(
            "entity_type_id"
        )))
    );

    let mut unknown_cause = fault("400.001", "host=a");
    unknown_cause.probable_cause = "gremlins".to_string();
    assert!(matches!(
        legacy.set_faults(&[fault("400.002", "host=a"), unknown_cause]),
        Err(ValidationError::InvalidEnum {
            field: "probable_cause",
            ..
        })
    ));

    assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
}

// ── legacy ───────────────────────────────────────────────────────────

#[test]
fn legacy_collapses_failures_to_neutral_values() {
    let (_, legacy, probe) = setup();
    let uuid = legacy
        .set_fault(&fault("400.001", "host=a"))
        .expect("valid")
        .expect("backend up");
    assert!(uuid.starts_with("uuid-"));

    probe.fail.store(true, Ordering::SeqCst);
    assert_eq!(legacy.set_fault(&fault("400.002", "host=a")), Ok(None));
    assert_eq!(legacy.set_faults(&[fault("400.002", "host=a")]), Ok(false));
    assert!(!legacy.clear_fault("400.001", "host=a"));
    assert!(!legacy.clear_faults(&[("400.001", "host=a")]));
    assert!(!legacy.clear_all("host=a"));
    assert_eq!(legacy.get_fault("400.001", "host=a"), None);
    assert_eq!(legacy.get_faults("host=a"), None);
    assert_eq!(legacy.get_faults_by_id("400.001"), None);
    assert_eq!(legacy.get_faults_by_id_n_eid("400.001", "host=a"), None);

    probe.fail.store(false, Ordering::SeqCst);
    assert!(legacy.get_fault("400.001", "host=a").is_some());
    assert!(legacy.clear_fault("400.001", "host=a"));
    assert!(!legacy.clear_fault("400.001", "host=a"));
}

// ── concurrency ──────────────────────────────────────────────────────

#[test]
fn concurrent_sets_are_serialised_and_all_land() {
    let probe = Probe::default();
    let backend = MemoryBackend {
        slow: true,
        ..MemoryBackend::with_probe(probe.clone())
    };
    let engine = Arc::new(FaultEngine::new(backend));
    let strict = FaultApi::new(Arc::clone(&engine));
    let legacy = LegacyFaultApi::new(Arc::clone(&engine));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let strict = strict.clone();
            let legacy = legacy.clone();
            thread::spawn(move || {
                let f = fault("400.001", &format!("host=worker-{i}"));
                if i % 2 == 0 {
                    strict.set_fault(&f).expect("set")
                } else {
                    legacy.set_fault(&f).expect("valid").expect("set")
                }
            })
        })
        .collect();
    let mut uuids: Vec<String> = handles
        .into_iter()
        .map(|h| h.join().expect("thread"))
        .collect();
    uuids.sort();
    uuids.dedup();

    assert_eq!(uuids.len(), 16);
    assert_eq!(probe.max_in_flight.load(Ordering::SeqCst), 1);
    for i in 0..16 {
        let stored = strict
            .get_fault("400.001", &format!("host=worker-{i}"))
            .expect("get")
            .expect("every set landed");
        assert_eq!(stored.entity_instance_id, format!("host=worker-{i}"));
    }
}
