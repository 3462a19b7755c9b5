//! mpv-backed playback engine.
//!
//! Production implementation of the playback contract: one mpv child
//! process per session, spawned when the session attaches and embedded into
//! the sink's native window when the view supplies one (`--wid`).  A
//! watcher task waits on the child; any exit that was not a deliberate
//! `destroy()` is reported as a fatal fault, which makes the pool rebuild
//! the session.  mpv classifies and survives transient stream errors
//! internally, so an exiting process is the fatal case here.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::player::{
    PlaybackEngine, PlayerEvent, PlayerEventSender, PlayerFactory, PlayerOptions, SharedSink,
};

pub struct MpvFactory {
    binary: Option<PathBuf>,
}

impl MpvFactory {
    /// Locate mpv once at startup.  When it is missing the pool degrades to
    /// native sink playback.
    pub fn discover() -> Self {
        let binary = dash_proto::platform::find_mpv_binary();
        match &binary {
            Some(path) => info!("mpv: using {}", path.display()),
            None => warn!("mpv: binary not found, adaptive playback disabled"),
        }
        Self { binary }
    }
}

impl PlayerFactory for MpvFactory {
    fn is_supported(&self) -> bool {
        self.binary.is_some()
    }

    fn create(
        &self,
        opts: &PlayerOptions,
        events: PlayerEventSender,
    ) -> anyhow::Result<Box<dyn PlaybackEngine>> {
        let binary = self
            .binary
            .clone()
            .ok_or_else(|| anyhow!("mpv binary not found"))?;
        Ok(Box::new(MpvPlayer {
            binary,
            opts: opts.clone(),
            events,
            url: None,
            kill_tx: None,
            destroyed: Arc::new(AtomicBool::new(false)),
        }))
    }
}

pub struct MpvPlayer {
    binary: PathBuf,
    opts: PlayerOptions,
    events: PlayerEventSender,
    url: Option<String>,
    /// Present while a child is running; firing it asks the watcher to kill.
    kill_tx: Option<oneshot::Sender<()>>,
    destroyed: Arc<AtomicBool>,
}

impl PlaybackEngine for MpvPlayer {
    fn load_source(&mut self, url: &str) -> anyhow::Result<()> {
        self.url = Some(url.to_string());
        Ok(())
    }

    fn attach_media(&mut self, sink: &SharedSink) -> anyhow::Result<()> {
        let url = self
            .url
            .clone()
            .ok_or_else(|| anyhow!("attach_media before load_source"))?;

        let args = build_args(&self.opts, &url, sink.window_handle());
        debug!("mpv: spawning for {}: {:?}", self.opts.target, args);
        let mut child = tokio::process::Command::new(&self.binary)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        info!(
            "mpv: pid {:?} playing {} for {}",
            child.id(),
            url,
            self.opts.target
        );

        let (kill_tx, mut kill_rx) = oneshot::channel::<()>();
        self.kill_tx = Some(kill_tx);

        let events = self.events.clone();
        let destroyed = Arc::clone(&self.destroyed);
        let target = self.opts.target;
        let generation = self.opts.generation;
        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    if destroyed.load(Ordering::SeqCst) {
                        return;
                    }
                    // Any exit we did not request is fatal, whatever the
                    // status: a live preview must not stay dark.
                    let detail = match status {
                        Ok(s) => format!("mpv exited: {}", s),
                        Err(e) => format!("mpv wait failed: {}", e),
                    };
                    let _ = events
                        .send(PlayerEvent { target, generation, fatal: true, detail })
                        .await;
                }
                _ = &mut kill_rx => {
                    let _ = child.kill().await;
                }
            }
        });
        Ok(())
    }

    fn destroy(&mut self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(kill_tx) = self.kill_tx.take() {
            debug!("mpv: destroying engine for {}", self.opts.target);
            let _ = kill_tx.send(());
        }
    }
}

impl Drop for MpvPlayer {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn build_args(opts: &PlayerOptions, url: &str, window: Option<i64>) -> Vec<String> {
    let mut args = vec!["--no-terminal".to_string(), "--quiet".to_string()];
    if opts.low_latency {
        args.push("--profile=low-latency".to_string());
    }
    args.push(format!("--cache-secs={}", opts.forward_buffer_secs));
    if let Some(back) = opts.back_buffer_secs {
        // Rough byte budget per buffered second; 0 disables backward
        // seeking entirely, which previews never need.
        args.push(format!("--demuxer-max-back-bytes={}", back as u64 * 1_000_000));
    }
    if opts.start_paused {
        args.push("--pause".to_string());
    }
    if let Some(wid) = window {
        args.push(format!("--wid={}", wid));
    }
    args.push(url.to_string());
    args
}
