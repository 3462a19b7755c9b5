//! Control action coordinator against a mock backend.
//!
//! Verifies the reset-before-command ordering, the stop-without-pid local
//! no-op, and the refresh-on-success flow.

mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use common::{log_snapshot, test_sink, EventLog, MockBackend, RecordingFactory};
use dash_engine::control::{ControlCommand, ControlCoordinator};
use dash_engine::http::ApiClient;
use dash_engine::player::PlayerFactory;
use dash_engine::pool::SessionPool;
use dash_proto::record::StreamRecord;
use dash_proto::registry::Registry;
use serde_json::json;
use tokio::sync::mpsc;

struct Fixture {
    log: EventLog,
    backend: MockBackend,
    coordinator: ControlCoordinator,
    pool: SessionPool,
    registry: Registry,
}

async fn fixture(records: serde_json::Value, fail_commands: bool) -> Fixture {
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let backend = MockBackend::start(Arc::clone(&log), records.clone(), fail_commands).await;
    let coordinator = ControlCoordinator::new(ApiClient::new(&backend.base_url()));

    let factory = Arc::new(RecordingFactory::new(Arc::clone(&log)));
    let (player_tx, _player_rx) = mpsc::channel(16);
    let mut pool = SessionPool::new(
        factory as Arc<dyn PlayerFactory>,
        player_tx,
        "http://streams.test".into(),
        5,
    );

    let mut registry = Registry::new();
    registry.replace(serde_json::from_value(records).unwrap());

    let mut sinks = HashMap::new();
    for record in registry.records() {
        sinks.insert(record.id, test_sink());
    }
    pool.update_sinks(sinks);
    pool.reconcile(&registry);

    Fixture {
        log,
        backend,
        coordinator,
        pool,
        registry,
    }
}

fn record(fixture: &Fixture, id: u64) -> StreamRecord {
    fixture.registry.get(id).unwrap().clone()
}

fn index_of(log: &[String], entry: &str) -> usize {
    log.iter()
        .position(|l| l == entry)
        .unwrap_or_else(|| panic!("missing log entry '{}' in {:?}", entry, log))
}

#[tokio::test]
async fn start_resets_preview_before_dispatching_request() {
    let mut fx = fixture(json!([{"id": 1, "name": "Cam A", "pid": null}]), false).await;
    let rec = record(&fx, 1);

    let refreshed = fx
        .coordinator
        .run(ControlCommand::Start(1), &rec, &mut fx.pool)
        .await;
    assert!(refreshed.is_some());

    let log = log_snapshot(&fx.log);
    let destroy = index_of(&log, "destroy preview/1");
    let request = index_of(&log, "http start_stream/1");
    assert!(
        destroy < request,
        "preview must be destroyed strictly before the request: {:?}",
        log
    );
}

#[tokio::test]
async fn stop_without_pid_issues_no_backend_call() {
    let mut fx = fixture(json!([{"id": 1, "name": "Cam A", "pid": null}]), false).await;
    let rec = record(&fx, 1);

    let refreshed = fx
        .coordinator
        .run(ControlCommand::Stop(1), &rec, &mut fx.pool)
        .await;

    assert!(refreshed.is_none());
    let log = log_snapshot(&fx.log);
    // No stop request at all — in particular not one with a made-up pid 0.
    assert!(!log.iter().any(|l| l.starts_with("http stop_stream")));
    // Full local no-op: the preview session was not touched either.
    assert!(!log.iter().any(|l| l == "destroy preview/1"));
}

#[tokio::test]
async fn stop_uses_the_process_id_not_the_record_id() {
    let mut fx = fixture(json!([{"id": 1, "name": "Cam A", "pid": 77}]), false).await;
    let rec = record(&fx, 1);

    fx.coordinator
        .run(ControlCommand::Stop(1), &rec, &mut fx.pool)
        .await;

    let log = log_snapshot(&fx.log);
    let destroy = index_of(&log, "destroy preview/1");
    let request = index_of(&log, "http stop_stream/77");
    assert!(destroy < request);
}

#[tokio::test]
async fn restart_and_remove_follow_the_same_shape() {
    let mut fx = fixture(json!([{"id": 3, "name": "Cam C", "pid": 9}]), false).await;
    let rec = record(&fx, 3);

    fx.coordinator
        .run(ControlCommand::Restart(3), &rec, &mut fx.pool)
        .await;
    fx.coordinator
        .run(ControlCommand::Remove(3), &rec, &mut fx.pool)
        .await;

    let log = log_snapshot(&fx.log);
    assert!(log.contains(&"http restart/3".to_string()));
    assert!(log.contains(&"http delete/3".to_string()));
}

#[tokio::test]
async fn failed_command_is_logged_once_and_not_retried() {
    let mut fx = fixture(json!([{"id": 1, "name": "Cam A", "pid": null}]), true).await;
    let rec = record(&fx, 1);

    let refreshed = fx
        .coordinator
        .run(ControlCommand::Start(1), &rec, &mut fx.pool)
        .await;

    assert!(refreshed.is_none());
    let log = log_snapshot(&fx.log);
    let attempts = log.iter().filter(|l| *l == "http start_stream/1").count();
    assert_eq!(attempts, 1);
    // No refresh after a rejected command.
    assert!(!log.contains(&"http get_records".to_string()));
}

#[tokio::test]
async fn successful_command_refreshes_the_record_list() {
    let mut fx = fixture(json!([{"id": 1, "name": "Cam A", "pid": null}]), false).await;
    let rec = record(&fx, 1);

    // The backend reports the new pid on the post-command fetch.
    fx.backend
        .set_records(json!([{"id": 1, "name": "Cam A", "pid": 55}]));

    let refreshed = fx
        .coordinator
        .run(ControlCommand::Start(1), &rec, &mut fx.pool)
        .await
        .expect("refresh after success");

    assert_eq!(refreshed.len(), 1);
    assert_eq!(refreshed[0].pid, Some(55));
}
