//! Shared doubles and a mock backend for the integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use dash_engine::player::{
    MediaSink, PlaybackEngine, PlayerEventSender, PlayerFactory, PlayerOptions, SessionTarget,
    SharedSink,
};
use serde_json::Value;

/// Ordered log of everything that happened: engine lifecycle on one side,
/// backend requests on the other.  The relative order is the point.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn log_entry(log: &EventLog, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

pub fn log_snapshot(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Spin until `predicate` holds or the timeout elapses.
pub async fn wait_for(mut predicate: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate()
}

// ── recording playback doubles ────────────────────────────────────────────────

/// Factory whose engines record creates/destroys into the shared log and
/// expose their (target, generation, events) so tests can inject faults.
pub struct RecordingFactory {
    pub log: EventLog,
    pub engines: Arc<Mutex<Vec<(SessionTarget, u64, PlayerEventSender)>>>,
}

impl RecordingFactory {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            engines: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Latest engine created for `target`, if any.
    pub fn last_engine(&self, target: SessionTarget) -> Option<(u64, PlayerEventSender)> {
        self.engines
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(t, _, _)| *t == target)
            .map(|(_, generation, tx)| (*generation, tx.clone()))
    }

    pub fn created_count(&self, target: SessionTarget) -> usize {
        self.engines
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _, _)| *t == target)
            .count()
    }
}

impl PlayerFactory for RecordingFactory {
    fn is_supported(&self) -> bool {
        true
    }

    fn create(
        &self,
        opts: &PlayerOptions,
        events: PlayerEventSender,
    ) -> anyhow::Result<Box<dyn PlaybackEngine>> {
        log_entry(&self.log, format!("create {}", opts.target));
        self.engines
            .lock()
            .unwrap()
            .push((opts.target, opts.generation, events));
        Ok(Box::new(RecordingEngine {
            log: Arc::clone(&self.log),
            target: opts.target,
            destroyed: false,
        }))
    }
}

struct RecordingEngine {
    log: EventLog,
    target: SessionTarget,
    destroyed: bool,
}

impl PlaybackEngine for RecordingEngine {
    fn load_source(&mut self, url: &str) -> anyhow::Result<()> {
        log_entry(&self.log, format!("load {} {}", self.target, url));
        Ok(())
    }

    fn attach_media(&mut self, _sink: &SharedSink) -> anyhow::Result<()> {
        Ok(())
    }

    fn destroy(&mut self) {
        if !self.destroyed {
            self.destroyed = true;
            log_entry(&self.log, format!("destroy {}", self.target));
        }
    }
}

#[derive(Default)]
pub struct TestSink;

impl MediaSink for TestSink {
    fn play(&self) {}
    fn pause(&self) {}
    fn can_play_native(&self, _mime: &str) -> bool {
        false
    }
    fn set_source(&self, _url: &str) {}
    fn reset_position(&self) {}
    fn window_handle(&self) -> Option<i64> {
        None
    }
    fn request_pip(&self) -> anyhow::Result<()> {
        Ok(())
    }
    fn exit_pip(&self) -> anyhow::Result<()> {
        Ok(())
    }
    fn pip_active(&self) -> bool {
        false
    }
}

pub fn test_sink() -> SharedSink {
    Arc::new(TestSink)
}

// ── mock backend ──────────────────────────────────────────────────────────────

#[derive(Clone)]
struct BackendState {
    log: EventLog,
    records: Arc<Mutex<Value>>,
    fail_commands: bool,
}

/// Mock of the encoder backend REST surface.  Control endpoints append to
/// the shared log; `GET /records` serves the current canned record list.
pub struct MockBackend {
    pub addr: SocketAddr,
    records: Arc<Mutex<Value>>,
}

impl MockBackend {
    pub async fn start(log: EventLog, records: Value, fail_commands: bool) -> Self {
        let records = Arc::new(Mutex::new(records));
        let state = BackendState {
            log,
            records: Arc::clone(&records),
            fail_commands,
        };

        let app = Router::new()
            .route("/records", get(get_records))
            .route("/start_stream/:id", post(start_stream))
            .route("/stop_stream/:pid", post(stop_stream))
            .route("/restart/:id", post(restart))
            .route("/records/:id", delete(delete_record))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, records }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Swap what `GET /records` returns next.
    pub fn set_records(&self, records: Value) {
        *self.records.lock().unwrap() = records;
    }
}

async fn get_records(State(state): State<BackendState>) -> Json<Value> {
    log_entry(&state.log, "http get_records");
    Json(state.records.lock().unwrap().clone())
}

async fn start_stream(
    State(state): State<BackendState>,
    axum::extract::Path(id): axum::extract::Path<u64>,
) -> StatusCode {
    log_entry(&state.log, format!("http start_stream/{}", id));
    command_status(&state)
}

async fn stop_stream(
    State(state): State<BackendState>,
    axum::extract::Path(pid): axum::extract::Path<u64>,
) -> StatusCode {
    log_entry(&state.log, format!("http stop_stream/{}", pid));
    command_status(&state)
}

async fn restart(
    State(state): State<BackendState>,
    axum::extract::Path(id): axum::extract::Path<u64>,
) -> StatusCode {
    log_entry(&state.log, format!("http restart/{}", id));
    command_status(&state)
}

async fn delete_record(
    State(state): State<BackendState>,
    axum::extract::Path(id): axum::extract::Path<u64>,
) -> StatusCode {
    log_entry(&state.log, format!("http delete/{}", id));
    command_status(&state)
}

fn command_status(state: &BackendState) -> StatusCode {
    if state.fail_commands {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}
