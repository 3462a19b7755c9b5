//! Focused session — the single enlarged playback instance.
//!
//! Independent of the preview pool but built on the same playback-engine
//! contract.  At most one focused session exists system-wide; every open
//! destroys the prior one before attaching.  Closing is one-shot: repeated
//! close signals after the first are no-ops, so handlers never accumulate
//! across opens.

use std::sync::Arc;

use dash_proto::record::{StreamRecord, HLS_MIME};
use tracing::{debug, info, warn};

use crate::player::{
    PlaybackEngine, PlayerEvent, PlayerEventSender, PlayerFactory, PlayerOptions, SessionTarget,
    SharedSink,
};

struct FocusSession {
    generation: u64,
    engine: Option<Box<dyn PlaybackEngine>>,
    sink: SharedSink,
}

pub struct FocusedView {
    factory: Arc<dyn PlayerFactory>,
    events: PlayerEventSender,
    stream_base: String,
    forward_buffer_secs: u32,
    target: Option<StreamRecord>,
    session: Option<FocusSession>,
    next_generation: u64,
}

impl FocusedView {
    pub fn new(
        factory: Arc<dyn PlayerFactory>,
        events: PlayerEventSender,
        stream_base: String,
        forward_buffer_secs: u32,
    ) -> Self {
        Self {
            factory,
            events,
            stream_base,
            forward_buffer_secs,
            target: None,
            session: None,
            next_generation: 0,
        }
    }

    /// Record the selection.  Playback starts when the view reports the
    /// enlarged sink ready via [`FocusedView::sink_ready`].
    pub fn focus(&mut self, record: StreamRecord) {
        info!("focus: selected {} ({})", record.id, record.name);
        self.target = Some(record);
    }

    pub fn focused_id(&self) -> Option<u64> {
        self.target.as_ref().map(|r| r.id)
    }

    /// The enlarged sink has rendered.  Destroy any prior focused session,
    /// then run the creation algorithm against it with the larger buffer.
    pub fn sink_ready(&mut self, sink: SharedSink) {
        let Some(record) = self.target.clone() else {
            debug!("focus: sink ready with no selection, ignoring");
            return;
        };
        self.destroy_session();

        let url = record.playback_url(&self.stream_base);
        self.next_generation += 1;
        let generation = self.next_generation;

        let engine = if self.factory.is_supported() {
            let opts = PlayerOptions {
                target: SessionTarget::Focused,
                generation,
                low_latency: true,
                forward_buffer_secs: self.forward_buffer_secs,
                // Latency matters less here; keep the engine default.
                back_buffer_secs: None,
                start_paused: false,
            };
            let mut engine = match self.factory.create(&opts, self.events.clone()) {
                Ok(engine) => engine,
                Err(e) => {
                    warn!("focus: failed to create engine for {}: {}", record.id, e);
                    return;
                }
            };
            if let Err(e) = engine
                .load_source(&url)
                .and_then(|_| engine.attach_media(&sink))
            {
                warn!("focus: failed to start session for {}: {}", record.id, e);
                engine.destroy();
                return;
            }
            Some(engine)
        } else if sink.can_play_native(HLS_MIME) {
            sink.set_source(&url);
            None
        } else {
            warn!("focus: no playback path for {}", url);
            return;
        };

        info!("focus: session for {} playing {}", record.id, url);
        self.session = Some(FocusSession {
            generation,
            engine,
            sink,
        });
    }

    /// One-shot close: pause the sink, rewind it, destroy the session.
    /// Safe to call repeatedly; only the first call after an open acts.
    pub fn close(&mut self) {
        self.target = None;
        if let Some(session) = &self.session {
            session.sink.pause();
            session.sink.reset_position();
        }
        self.destroy_session();
    }

    /// Double-activation gesture: exit picture-in-picture if it is active
    /// anywhere, otherwise request it for the focused sink.  Capability
    /// failures degrade to a logged no-op.
    pub fn toggle_pip(&self) {
        let Some(session) = &self.session else {
            return;
        };
        let result = if session.sink.pip_active() {
            session.sink.exit_pip()
        } else {
            session.sink.request_pip()
        };
        if let Err(e) = result {
            warn!("focus: picture-in-picture unavailable: {}", e);
        }
    }

    /// Close the focused view when a registry change removed its record.
    pub fn retain_if_present(&mut self, registry: &dash_proto::registry::Registry) {
        if let Some(id) = self.focused_id() {
            if !registry.contains(id) {
                info!("focus: record {} gone, closing", id);
                self.close();
            }
        }
    }

    /// Focused playback has no self-healing loop; fatal faults are logged
    /// and the enlarged view keeps its last frame until reopened.
    pub fn handle_fault(&self, event: &PlayerEvent) {
        if event.target != SessionTarget::Focused {
            return;
        }
        let stale = self
            .session
            .as_ref()
            .map(|s| s.generation != event.generation)
            .unwrap_or(true);
        if stale {
            debug!("focus: stale fault ignored: {}", event.detail);
        } else if event.fatal {
            warn!("focus: fatal playback fault: {}", event.detail);
        } else {
            debug!("focus: non-fatal fault: {}", event.detail);
        }
    }

    pub fn destroy_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Some(engine) = session.engine.as_mut() {
                engine.destroy();
            }
        }
    }
}
