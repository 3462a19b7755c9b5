//! Preview session pool.
//!
//! Keyed collection of playback sessions, at most one per record id.  The
//! pool owns the engines; sinks are opaque handles supplied by the view
//! layer.  Invariants:
//!
//! - creating a session for an id already present destroys the prior one
//!   first, so no two engines are ever attached to the same sink;
//! - a session never outlives its sink leaving the visible set;
//! - a fatal engine fault destroys the session and immediately rebuilds it
//!   for the same id/sink pair.  Retries are unbounded — a persistently
//!   broken stream loops creation attempts until the record goes away.

use std::collections::HashMap;
use std::sync::Arc;

use dash_proto::record::{RecordId, HLS_MIME};
use dash_proto::registry::Registry;
use tracing::{debug, info, warn};

use crate::player::{
    PlaybackEngine, PlayerEvent, PlayerEventSender, PlayerFactory, PlayerOptions, SessionTarget,
    SharedSink,
};

enum SessionBackend {
    /// Owned adaptive-playback engine instance.
    Adaptive(Box<dyn PlaybackEngine>),
    /// Degraded path: the sink plays the URL natively, nothing to own.
    Native,
}

struct Session {
    url: String,
    generation: u64,
    backend: SessionBackend,
    sink: SharedSink,
}

pub struct SessionPool {
    factory: Arc<dyn PlayerFactory>,
    events: PlayerEventSender,
    stream_base: String,
    forward_buffer_secs: u32,
    sessions: HashMap<RecordId, Session>,
    sinks: HashMap<RecordId, SharedSink>,
    next_generation: u64,
}

impl SessionPool {
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
            sessions: HashMap::new(),
            sinks: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Replace the visible sink set.  Takes effect on the next `reconcile`.
    pub fn update_sinks(&mut self, sinks: HashMap<RecordId, SharedSink>) {
        self.sinks = sinks;
    }

    /// Align live sessions with the visible records.
    ///
    /// Every id with both a sink and a registry record gets a session for
    /// the record's current playback URL; a renamed record (new URL) or a
    /// re-rendered sink is recreated.  Sessions whose id lost its sink or
    /// its record are destroyed.
    pub fn reconcile(&mut self, registry: &Registry) {
        let stale: Vec<RecordId> = self
            .sessions
            .keys()
            .filter(|id| !self.sinks.contains_key(id) || !registry.contains(**id))
            .copied()
            .collect();
        for id in stale {
            debug!("pool: {} left the visible set, destroying", id);
            self.destroy_session(id);
        }

        let visible: Vec<(RecordId, SharedSink)> = self
            .sinks
            .iter()
            .map(|(id, sink)| (*id, Arc::clone(sink)))
            .collect();
        for (id, sink) in visible {
            let Some(record) = registry.get(id) else {
                continue;
            };
            let url = record.playback_url(&self.stream_base);
            let current = self.sessions.get(&id);
            let up_to_date = current
                .map(|s| s.url == url && Arc::ptr_eq(&s.sink, &sink))
                .unwrap_or(false);
            if !up_to_date {
                self.create_session(id, url, sink);
            }
        }
    }

    /// Explicit destroy without recreation — issued before a control
    /// command so a stale engine never races the backend state change.
    pub fn reset(&mut self, id: RecordId) {
        if self.destroy_session(id) {
            debug!("pool: reset session for {}", id);
        }
    }

    pub fn destroy_all(&mut self) {
        let ids: Vec<RecordId> = self.sessions.keys().copied().collect();
        for id in ids {
            self.destroy_session(id);
        }
    }

    /// Hover intent: play/pause the sink directly, not the engine, so
    /// buffering is undisturbed.
    pub fn pointer_enter(&self, id: RecordId) {
        if let Some(sink) = self.sinks.get(&id) {
            sink.play();
        }
    }

    pub fn pointer_leave(&self, id: RecordId) {
        if let Some(sink) = self.sinks.get(&id) {
            sink.pause();
        }
    }

    /// React to an engine fault.  Non-fatal faults are ignored; fatal faults
    /// rebuild the session for the same id/sink with the URL it was playing.
    /// Events from destroyed engines (generation mismatch) are dropped.
    pub fn handle_fault(&mut self, event: &PlayerEvent) {
        let SessionTarget::Preview(id) = event.target else {
            return;
        };
        if !event.fatal {
            debug!("pool: non-fatal fault on {}: {}", event.target, event.detail);
            return;
        }
        let Some(session) = self.sessions.get(&id) else {
            debug!("pool: fatal fault for unknown session {}", id);
            return;
        };
        if session.generation != event.generation {
            debug!(
                "pool: stale fatal fault for {} (gen {} != {})",
                id, event.generation, session.generation
            );
            return;
        }
        warn!(
            "pool: fatal fault on {}, recreating: {}",
            event.target, event.detail
        );
        let url = session.url.clone();
        let sink = Arc::clone(&session.sink);
        self.create_session(id, url, sink);
    }

    // ── session creation ──────────────────────────────────────────────────

    fn create_session(&mut self, id: RecordId, url: String, sink: SharedSink) {
        // Destroy-before-attach: the prior engine must be gone before a new
        // one touches the sink.
        self.destroy_session(id);

        self.next_generation += 1;
        let generation = self.next_generation;

        let backend = if self.factory.is_supported() {
            let opts = PlayerOptions {
                target: SessionTarget::Preview(id),
                generation,
                low_latency: true,
                forward_buffer_secs: self.forward_buffer_secs,
                back_buffer_secs: Some(0),
                start_paused: true,
            };
            let mut engine = match self.factory.create(&opts, self.events.clone()) {
                Ok(engine) => engine,
                Err(e) => {
                    warn!("pool: failed to create engine for {}: {}", id, e);
                    return;
                }
            };
            if let Err(e) = engine
                .load_source(&url)
                .and_then(|_| engine.attach_media(&sink))
            {
                warn!("pool: failed to start session for {}: {}", id, e);
                engine.destroy();
                return;
            }
            SessionBackend::Adaptive(engine)
        } else if sink.can_play_native(HLS_MIME) {
            sink.set_source(&url);
            SessionBackend::Native
        } else {
            warn!("pool: no playback path for {} ({})", id, url);
            return;
        };

        // Previews sit paused until hover intent.
        sink.pause();

        info!("pool: session for {} playing {}", id, url);
        self.sessions.insert(
            id,
            Session {
                url,
                generation,
                backend,
                sink,
            },
        );
    }

    fn destroy_session(&mut self, id: RecordId) -> bool {
        match self.sessions.remove(&id) {
            Some(session) => {
                if let SessionBackend::Adaptive(mut engine) = session.backend {
                    engine.destroy();
                }
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    fn session_generation(&self, id: RecordId) -> Option<u64> {
        self.sessions.get(&id).map(|s| s.generation)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.sessions.len()
    }
}
