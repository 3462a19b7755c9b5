//! Playback-engine and media-sink contracts.
//!
//! The adaptive-playback engine is a polymorphic capability, not a concrete
//! type: anything that can load a source, attach to a sink, be destroyed and
//! report faults conforms.  Production uses the mpv-backed implementation in
//! [`crate::mpvplayer`]; tests substitute doubles.
//!
//! Engines report faults asynchronously on a tokio mpsc channel.  Every
//! event carries the session target and the generation it was created under
//! so the pool can drop events from engines it has already destroyed.

use std::fmt;
use std::sync::Arc;

use dash_proto::record::RecordId;
use tokio::sync::mpsc;

/// Which session an engine belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionTarget {
    Preview(RecordId),
    Focused,
}

impl fmt::Display for SessionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionTarget::Preview(id) => write!(f, "preview/{}", id),
            SessionTarget::Focused => write!(f, "focused"),
        }
    }
}

/// Tuning handed to the factory when a session is created.
#[derive(Debug, Clone)]
pub struct PlayerOptions {
    pub target: SessionTarget,
    /// Monotonic per-pool counter; stale fault events are matched against it.
    pub generation: u64,
    pub low_latency: bool,
    /// Bounded forward buffer in seconds.
    pub forward_buffer_secs: u32,
    /// Backward buffer retention.  `Some(0)` for previews (no backward
    /// seeking), `None` for the engine default.
    pub back_buffer_secs: Option<u32>,
    /// Previews start paused and only play on hover intent.
    pub start_paused: bool,
}

/// A playback fault as classified by the engine.  Only fatal faults warrant
/// tearing the session down and rebuilding it.
#[derive(Debug, Clone)]
pub struct PlayerEvent {
    pub target: SessionTarget,
    pub generation: u64,
    pub fatal: bool,
    pub detail: String,
}

pub type PlayerEventSender = mpsc::Sender<PlayerEvent>;

/// One live adaptive-playback engine instance, exclusively owned by its
/// session.  `destroy` must be safe to call more than once.
pub trait PlaybackEngine: Send {
    fn load_source(&mut self, url: &str) -> anyhow::Result<()>;
    fn attach_media(&mut self, sink: &SharedSink) -> anyhow::Result<()>;
    fn destroy(&mut self);
}

/// Creates engine instances.  `is_supported` gates the adaptive path; when
/// it returns false the pool falls back to native sink playback.
pub trait PlayerFactory: Send + Sync {
    fn is_supported(&self) -> bool;
    fn create(
        &self,
        opts: &PlayerOptions,
        events: PlayerEventSender,
    ) -> anyhow::Result<Box<dyn PlaybackEngine>>;
}

/// A display surface supplied by the view layer.  The engine treats sinks
/// as opaque shared resources it does not own; at most one session is ever
/// attached to a sink (enforced by destroy-before-attach).
pub trait MediaSink: Send + Sync {
    fn play(&self);
    fn pause(&self);
    /// Native-format capability probe, mirroring `canPlayType`.
    fn can_play_native(&self, mime: &str) -> bool;
    /// Degraded path: point the sink directly at the URL, no engine.
    fn set_source(&self, url: &str);
    /// Rewind to the start (used when the focused view closes).
    fn reset_position(&self);
    /// Native window id for engines that embed (mpv `--wid`), when the
    /// view has one.
    fn window_handle(&self) -> Option<i64>;
    fn request_pip(&self) -> anyhow::Result<()>;
    fn exit_pip(&self) -> anyhow::Result<()>;
    /// Whether a picture-in-picture overlay is active anywhere in the view.
    fn pip_active(&self) -> bool;
}

pub type SharedSink = Arc<dyn MediaSink>;
