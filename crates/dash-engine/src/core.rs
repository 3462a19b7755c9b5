//! DashCore — single-owner event loop for all mutable dashboard state.
//!
//! DashCore exclusively owns the registry, the preview session pool and the
//! focused session; no other task touches them.  Every input — channel
//! batches, view sink updates, pointer events, focus lifecycle, control
//! commands, engine faults — arrives as a message and is handled to
//! completion before the next one, so registry and pool mutations are
//! atomic with respect to each other.  Suspension happens only at backend
//! request awaits.
//!
//! After each registry mutation DashCore broadcasts `RegistryUpdated` on a
//! `tokio::sync::broadcast` channel for view layers.

use std::collections::HashMap;

use dash_proto::config::Config;
use dash_proto::record::{RecordId, StreamPatch, StreamRecord};
use dash_proto::registry::Registry;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::clipboard;
use crate::control::{ControlCommand, ControlCoordinator};
use crate::focus::FocusedView;
use crate::http::ApiClient;
use crate::player::{PlayerEvent, PlayerEventSender, PlayerFactory, SharedSink};
use crate::pool::SessionPool;

// ── EngineEvent ───────────────────────────────────────────────────────────────

/// All inputs into the DashCore loop.
pub enum EngineEvent {
    /// A delta batch from the live update channel.
    DeltaBatch(Vec<StreamPatch>),
    /// Manual full re-fetch of the record list.
    Refresh,
    /// The view re-rendered; this is the complete visible sink set.
    SinksChanged(HashMap<RecordId, SharedSink>),
    /// Hover intent over a preview tile.
    PointerEnter(RecordId),
    PointerLeave(RecordId),
    /// Operator selected a record for enlarged viewing.
    Focus(RecordId),
    /// The enlarged sink finished rendering.
    FocusSinkReady(SharedSink),
    /// The enlarged view was closed/hidden.
    FocusClosed,
    /// Double-activation gesture on the enlarged sink.
    FocusDoubleActivate,
    /// Start/stop/restart/remove an encoder.
    Command(ControlCommand),
    /// Copy a record's playback URL.
    CopyUrl(RecordId),
    Shutdown,
}

/// Broadcasts from the core loop to view layers.
#[derive(Debug, Clone)]
pub enum EngineBroadcast {
    /// The registry changed; the payload is the full current record list.
    RegistryUpdated(Vec<StreamRecord>),
    /// The focused record changed (None = focused view closed).
    FocusChanged(Option<RecordId>),
}

// ── DashCore ──────────────────────────────────────────────────────────────────

pub struct DashCore {
    registry: Registry,
    pool: SessionPool,
    focused: FocusedView,
    control: ControlCoordinator,
    stream_base: String,
    broadcast_tx: broadcast::Sender<EngineBroadcast>,
}

impl DashCore {
    pub fn new(
        config: &Config,
        factory: Arc<dyn PlayerFactory>,
        player_events: PlayerEventSender,
        broadcast_tx: broadcast::Sender<EngineBroadcast>,
    ) -> Self {
        let api = ApiClient::new(&config.backend.base_url);
        let pool = SessionPool::new(
            Arc::clone(&factory),
            player_events.clone(),
            config.streams.base_url.clone(),
            config.playback.preview_buffer_secs,
        );
        let focused = FocusedView::new(
            factory,
            player_events,
            config.streams.base_url.clone(),
            config.playback.focused_buffer_secs,
        );
        Self {
            registry: Registry::new(),
            pool,
            focused,
            control: ControlCoordinator::new(api),
            stream_base: config.streams.base_url.clone(),
            broadcast_tx,
        }
    }

    /// Run the core event loop.  Returns when `Shutdown` is received or the
    /// event channel closes.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<EngineEvent>,
        mut faults: mpsc::Receiver<PlayerEvent>,
    ) -> anyhow::Result<()> {
        info!("core: starting event loop");

        // Initial load — state is rebuilt from scratch from the backend.
        if let Some(records) = self.control.refresh().await {
            self.apply_replace(records);
        }

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    None => {
                        info!("core: event channel closed, shutting down");
                        break;
                    }
                    Some(EngineEvent::Shutdown) => {
                        info!("core: shutdown requested");
                        break;
                    }
                    Some(event) => self.handle_event(event).await,
                },
                Some(fault) = faults.recv() => {
                    self.pool.handle_fault(&fault);
                    self.focused.handle_fault(&fault);
                }
            }
        }

        self.pool.destroy_all();
        self.focused.close();
        Ok(())
    }

    async fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::DeltaBatch(batch) => {
                self.registry.merge(batch);
                self.after_registry_change();
            }

            EngineEvent::Refresh => {
                if let Some(records) = self.control.refresh().await {
                    self.apply_replace(records);
                }
            }

            EngineEvent::SinksChanged(sinks) => {
                debug!("core: view reports {} visible sinks", sinks.len());
                self.pool.update_sinks(sinks);
                self.pool.reconcile(&self.registry);
            }

            EngineEvent::PointerEnter(id) => self.pool.pointer_enter(id),
            EngineEvent::PointerLeave(id) => self.pool.pointer_leave(id),

            EngineEvent::Focus(id) => match self.registry.get(id) {
                Some(record) => {
                    self.focused.focus(record.clone());
                    let _ = self
                        .broadcast_tx
                        .send(EngineBroadcast::FocusChanged(Some(id)));
                }
                None => warn!("core: focus request for unknown record {}", id),
            },
            EngineEvent::FocusSinkReady(sink) => self.focused.sink_ready(sink),
            EngineEvent::FocusClosed => {
                self.focused.close();
                let _ = self.broadcast_tx.send(EngineBroadcast::FocusChanged(None));
            }
            EngineEvent::FocusDoubleActivate => self.focused.toggle_pip(),

            EngineEvent::Command(command) => {
                let Some(record) = self.registry.get(command.record_id()).cloned() else {
                    warn!("core: {:?} for unknown record", command);
                    return;
                };
                if let Some(records) = self.control.run(command, &record, &mut self.pool).await {
                    self.apply_replace(records);
                }
            }

            EngineEvent::CopyUrl(id) => {
                if let Some(record) = self.registry.get(id) {
                    clipboard::copy_url(&record.playback_url(&self.stream_base));
                }
            }

            EngineEvent::Shutdown => unreachable!("handled in run"),
        }
    }

    fn apply_replace(&mut self, records: Vec<StreamRecord>) {
        self.registry.replace(records);
        self.after_registry_change();
    }

    /// Registry changed: notify views, drop a focused session whose record
    /// vanished, and realign the pool with what is now visible.
    fn after_registry_change(&mut self) {
        let _ = self.broadcast_tx.send(EngineBroadcast::RegistryUpdated(
            self.registry.records().to_vec(),
        ));
        self.focused.retain_if_present(&self.registry);
        self.pool.reconcile(&self.registry);
    }
}
