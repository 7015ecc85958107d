//! The fault facade over the SQLite-backed backend.

use std::thread;

use fm_api::FaultError;
use fm_server::config::Config;
use fm_server::{open_store, FaultService};
use fm_store::{event_log_count, get_alarm, list_event_logs, EventLogFilter, SystemStatus};
use fm_types::{AlarmState, AlarmType, Fault, Severity};
use tempfile::TempDir;

fn service(max_event_log: u64) -> (FaultService, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = Config::default();
    config.database.path = dir
        .path()
        .join("fm.db")
        .to_str()
        .expect("utf-8 path")
        .to_string();
    config.event_log.max_size = max_event_log;
    let pool = open_store(&config).expect("store should open");
    (FaultService::new(pool, max_event_log), dir)
}

fn fault(alarm_id: &str, eid: &str, severity: Severity) -> Fault {
    Fault::new(
        alarm_id,
        AlarmState::Set,
        "host",
        eid,
        severity,
        AlarmType::Equipment,
        "equipment-malfunction",
    )
    .with_reason("fan failure")
    .with_repair_action("replace fan")
}

fn install_trigger(svc: &FaultService, sql: &str) {
    let conn = svc.pool().get().expect("conn");
    conn.execute_batch(sql).expect("create trigger");
}

fn alarm_count(svc: &FaultService) -> i64 {
    let conn = svc.pool().get().expect("conn");
    conn.query_row("SELECT COUNT(*) FROM alarm", [], |row| row.get(0))
        .expect("count alarms")
}

fn history(svc: &FaultService) -> Vec<fm_store::EventLogEntry> {
    let conn = svc.pool().get().expect("conn");
    let filter = EventLogFilter {
        include_suppress: true,
        ..EventLogFilter::default()
    };
    list_event_logs(&conn, &filter).expect("list")
}

#[test]
fn set_get_clear_round_trip() {
    let (svc, _dir) = service(100);
    let raised = fault("100.101", "host=controller-0", Severity::Major);

    let uuid = svc.strict.set_fault(&raised).expect("set");
    let stored = svc
        .strict
        .get_fault("100.101", "host=controller-0")
        .expect("get")
        .expect("present");
    assert_eq!(stored.uuid.as_deref(), Some(uuid.as_str()));
    assert_eq!(stored.reason_text, raised.reason_text);
    assert_eq!(stored.proposed_repair_action, raised.proposed_repair_action);
    assert!(stored.timestamp.is_some());

    assert_eq!(svc.strict.clear_fault("100.101", "host=controller-0"), Ok(true));
    assert_eq!(svc.strict.clear_fault("100.101", "host=controller-0"), Ok(false));
    assert_eq!(svc.strict.get_fault("100.101", "host=controller-0"), Ok(None));

    let states: Vec<AlarmState> = history(&svc).iter().map(|e| e.state).collect();
    assert_eq!(states, vec![AlarmState::Clear, AlarmState::Set]);
}

#[test]
fn repeated_set_replaces_in_place_and_keeps_history() {
    let (svc, _dir) = service(100);
    let first = svc
        .strict
        .set_fault(&fault("100.101", "host=a", Severity::Minor))
        .expect("set");
    let second = svc
        .strict
        .set_fault(&fault("100.101", "host=a", Severity::Critical))
        .expect("set");
    assert_eq!(first, second);

    let kept = svc
        .strict
        .set_fault(&fault("100.101", "host=a", Severity::Warning).with_keep_existing(true))
        .expect("set");
    assert_eq!(kept, first);

    let all = svc.strict.get_faults_by_id("100.101").expect("get").expect("some");
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].severity, Severity::Critical);

    let log = history(&svc);
    assert_eq!(log.len(), 3);
    assert!(log.iter().all(|e| e.state == AlarmState::Set));
    assert!(log.iter().all(|e| e.alarm_uuid.as_deref() == Some(first.as_str())));
}

#[test]
fn logs_and_messages_only_reach_the_event_log() {
    let (svc, _dir) = service(100);
    let mut log = fault("900.001", "host=a", Severity::Warning);
    log.alarm_state = AlarmState::Log;
    let mut msg = fault("900.002", "host=a", Severity::Warning);
    msg.alarm_state = AlarmState::Msg;

    svc.strict.set_fault(&log).expect("log");
    svc.legacy.set_fault(&msg).expect("valid").expect("msg");

    assert_eq!(svc.strict.get_faults("host=a"), Ok(None));
    let states: Vec<AlarmState> = history(&svc).iter().map(|e| e.state).collect();
    assert_eq!(states, vec![AlarmState::Log, AlarmState::Log]);
}

#[test]
fn clear_state_removes_the_exact_alarm() {
    let (svc, _dir) = service(100);
    svc.strict
        .set_fault(&fault("100.101", "host=a", Severity::Major))
        .expect("set");
    let mut clear = fault("100.101", "host=a", Severity::Major);
    clear.alarm_state = AlarmState::Clear;
    svc.strict.set_fault(&clear).expect("clear via set");

    assert_eq!(svc.strict.get_fault("100.101", "host=a"), Ok(None));
}

#[test]
fn clearing_a_parent_clears_children_with_the_same_id() {
    let (svc, _dir) = service(100);
    svc.strict
        .set_faults(&[
            fault("100.101", "host=a", Severity::Major),
            fault("100.101", "host=a.port=eth0", Severity::Minor),
            fault("100.102", "host=a.port=eth0", Severity::Minor),
            fault("100.101", "host=ab", Severity::Minor),
        ])
        .expect("batch");

    assert_eq!(
        svc.strict
            .get_faults_by_id_n_eid("100.101", "host=a.")
            .expect("get")
            .map(|v| v.len()),
        Some(1)
    );

    assert_eq!(svc.strict.clear_fault("100.101", "host=a."), Ok(true));
    let remaining = svc.strict.get_faults("host=a").expect("get").expect("some");
    let keys: Vec<(&str, &str)> = remaining.iter().map(|f| f.natural_key()).collect();
    assert_eq!(keys.len(), 3);
    assert!(!keys.contains(&("100.101", "host=a.port=eth0")));

    assert_eq!(svc.strict.clear_all("host=a"), Ok(true));
    assert_eq!(svc.strict.get_faults("host=a"), Ok(None));
    assert_eq!(svc.strict.clear_all("host=a"), Ok(false));

    let clears = history(&svc)
        .iter()
        .filter(|e| e.state == AlarmState::Clear)
        .count();
    assert_eq!(clears, 4);
}

#[test]
fn inhibiting_alarm_masks_descendants_until_cleared() {
    let (svc, _dir) = service(100);
    let child_uuid = svc
        .strict
        .set_fault(
            &fault("200.010", "host=compute-0.port=eth0", Severity::Critical)
                .with_suppression(true),
        )
        .expect("set child");
    svc.strict
        .set_fault(
            &fault("200.001", "host=compute-0", Severity::Warning).with_inhibit_alarms(true),
        )
        .expect("set parent");

    let conn = svc.pool().get().expect("conn");
    assert!(get_alarm(&conn, &child_uuid).expect("child").masked);
    let summary = svc.summary(false).expect("summary");
    assert_eq!(summary.critical, 0);
    assert_eq!(summary.status, SystemStatus::Ok);

    // A suppressible alarm raised later under the inhibitor starts masked.
    let late = svc
        .strict
        .set_fault(
            &fault("200.011", "host=compute-0.port=eth1", Severity::Major).with_suppression(true),
        )
        .expect("set late child");
    assert!(get_alarm(&conn, &late).expect("late").masked);

    assert_eq!(svc.strict.clear_fault("200.001", "host=compute-0"), Ok(true));
    assert!(!get_alarm(&conn, &child_uuid).expect("child").masked);
    assert_eq!(svc.summary(false).expect("summary").status, SystemStatus::Critical);
}

#[test]
fn event_log_never_exceeds_its_cap() {
    let (svc, _dir) = service(5);
    for i in 0..12 {
        svc.strict
            .set_fault(&fault(&format!("100.{i:03}"), "host=a", Severity::Minor))
            .expect("set");
    }
    let conn = svc.pool().get().expect("conn");
    assert_eq!(event_log_count(&conn).expect("count"), 5);

    let survivors: Vec<String> = history(&svc).into_iter().map(|e| e.event_log_id).collect();
    assert_eq!(
        survivors,
        vec!["100.011", "100.010", "100.009", "100.008", "100.007"]
    );
}

#[test]
fn concurrent_sets_on_distinct_keys_all_land() {
    let (svc, _dir) = service(1_000);
    let handles: Vec<_> = (0..16)
        .map(|i| {
            let svc = svc.clone();
            thread::spawn(move || {
                let f = fault("300.001", &format!("host=worker-{i}"), Severity::Major)
                    .with_reason(format!("worker {i}"));
                svc.strict.set_fault(&f).expect("set")
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

    for i in 0..16 {
        let stored = svc
            .strict
            .get_fault("300.001", &format!("host=worker-{i}"))
            .expect("get")
            .expect("present");
        assert_eq!(stored.reason_text, Some(format!("worker {i}")));
    }
    let conn = svc.pool().get().expect("conn");
    assert_eq!(event_log_count(&conn).expect("count"), 16);
}

#[test]
fn blank_entity_instance_matches_nothing() {
    let (svc, _dir) = service(100);
    svc.strict
        .set_faults(&[
            fault("100.101", "host=controller-0", Severity::Major),
            fault("100.101", "host=compute-7", Severity::Minor),
        ])
        .expect("batch");

    assert_eq!(svc.strict.clear_fault("100.101", ""), Ok(false));
    assert_eq!(svc.strict.get_faults_by_id_n_eid("100.101", ""), Ok(None));
    assert!(!svc.legacy.clear_fault("100.101", ""));
    assert_eq!(alarm_count(&svc), 2);
}

#[test]
fn failed_history_append_rolls_back_the_raise() {
    let (svc, _dir) = service(100);
    install_trigger(
        &svc,
        "CREATE TRIGGER reject_history BEFORE INSERT ON event_log
         BEGIN SELECT RAISE(ABORT, 'history unavailable'); END;",
    );

    assert_eq!(
        svc.strict.set_fault(&fault("100.101", "host=a", Severity::Major)),
        Err(FaultError::OperationFailed {
            operation: "set_fault"
        })
    );
    assert_eq!(alarm_count(&svc), 0);
    assert!(history(&svc).is_empty());
}

#[test]
fn failed_history_append_keeps_the_alarm_active() {
    let (svc, _dir) = service(100);
    svc.strict
        .set_fault(&fault("100.101", "host=a", Severity::Major).with_inhibit_alarms(true))
        .expect("set parent");
    let child = svc
        .strict
        .set_fault(&fault("100.102", "host=a.port=eth0", Severity::Minor).with_suppression(true))
        .expect("set child");
    install_trigger(
        &svc,
        "CREATE TRIGGER reject_clear BEFORE INSERT ON event_log WHEN NEW.state = 'clear'
         BEGIN SELECT RAISE(ABORT, 'history unavailable'); END;",
    );

    assert_eq!(
        svc.strict.clear_fault("100.101", "host=a"),
        Err(FaultError::OperationFailed {
            operation: "clear_fault"
        })
    );
    assert!(svc.strict.get_fault("100.101", "host=a").expect("get").is_some());
    let conn = svc.pool().get().expect("conn");
    assert!(get_alarm(&conn, &child).expect("child").masked);
    assert!(history(&svc).iter().all(|e| e.state == AlarmState::Set));
}

#[test]
fn failed_batch_set_leaves_no_alarm_behind() {
    let (svc, _dir) = service(100);
    install_trigger(
        &svc,
        "CREATE TRIGGER reject_second BEFORE INSERT ON alarm WHEN NEW.alarm_id = '600.002'
         BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
    );

    assert_eq!(
        svc.strict.set_faults(&[
            fault("600.001", "host=a", Severity::Major),
            fault("600.002", "host=a", Severity::Major),
        ]),
        Err(FaultError::OperationFailed {
            operation: "set_faults"
        })
    );
    assert_eq!(alarm_count(&svc), 0);
    let conn = svc.pool().get().expect("conn");
    assert_eq!(event_log_count(&conn).expect("count"), 0);
}

#[test]
fn failed_batch_clear_keeps_every_alarm() {
    let (svc, _dir) = service(100);
    svc.strict
        .set_faults(&[
            fault("600.001", "host=a", Severity::Major),
            fault("600.002", "host=a", Severity::Major),
        ])
        .expect("batch");
    install_trigger(
        &svc,
        "CREATE TRIGGER keep_second BEFORE DELETE ON alarm WHEN OLD.alarm_id = '600.002'
         BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
    );

    let err = svc
        .strict
        .clear_faults(&[("600.001", "host=a"), ("600.002", "host=a")])
        .expect_err("second clear fails");
    assert_eq!(err.to_string(), "Failed to execute clear_faults_list.");
    assert_eq!(alarm_count(&svc), 2);
    assert!(!history(&svc).iter().any(|e| e.state == AlarmState::Clear));
}
