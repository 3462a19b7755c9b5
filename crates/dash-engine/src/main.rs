use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dash_engine::core::{DashCore, EngineBroadcast, EngineEvent};
use dash_engine::mpvplayer::MpvFactory;
use dash_engine::player::{MediaSink, PlayerEvent, PlayerFactory, SharedSink};
use dash_engine::{channel, core};
use dash_proto::record::RecordId;
use tokio::sync::{broadcast, mpsc};

/// Sink the headless runner hands out for every record: no native window,
/// no native HLS support, so previews run through mpv in its own windows.
#[derive(Default)]
struct HeadlessSink;

impl MediaSink for HeadlessSink {
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
        anyhow::bail!("picture-in-picture is not available headless")
    }
    fn exit_pip(&self) -> anyhow::Result<()> {
        Ok(())
    }
    fn pip_active(&self) -> bool {
        false
    }
}

/// Grant every registry record a stable sink so the pool reconciles.  Sinks
/// must keep their identity across updates; recreating one would tear the
/// session down and rebuild it for nothing.
fn spawn_headless_view(
    mut updates: broadcast::Receiver<EngineBroadcast>,
    events: mpsc::Sender<EngineEvent>,
) {
    tokio::spawn(async move {
        let mut sinks: HashMap<RecordId, SharedSink> = HashMap::new();
        loop {
            match updates.recv().await {
                Ok(EngineBroadcast::RegistryUpdated(records)) => {
                    let ids: Vec<RecordId> = records.iter().map(|r| r.id).collect();
                    sinks.retain(|id, _| ids.contains(id));
                    for id in ids {
                        sinks
                            .entry(id)
                            .or_insert_with(|| Arc::new(HeadlessSink) as SharedSink);
                    }
                    if events
                        .send(EngineEvent::SinksChanged(sinks.clone()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("view: dropped {} broadcasts", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = dash_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("streamdash.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Allow RUST_LOG override; default to debug for app code but suppress
    // noisy connection-level DEBUG from HTTP/websocket internals.
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        "debug,hyper_util=warn,reqwest=warn,hyper=warn,tungstenite=warn".to_string()
    });
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    // Print log path to stderr so the operator can tail it immediately.
    eprintln!("streamdash log: {}", log_path.display());
    tracing::info!("streamdash starting…");

    let config = dash_proto::config::Config::load().unwrap_or_default();

    // ── Channels ─────────────────────────────────────────────────────────────
    let (event_tx, event_rx) = mpsc::channel::<EngineEvent>(1024);
    let (player_tx, player_rx) = mpsc::channel::<PlayerEvent>(256);
    let (broadcast_tx, broadcast_rx) = broadcast::channel::<EngineBroadcast>(1024);

    // ── Engine core ──────────────────────────────────────────────────────────
    let factory: Arc<dyn PlayerFactory> = Arc::new(MpvFactory::discover());
    let dash_core = DashCore::new(&config, factory, player_tx, broadcast_tx.clone());

    spawn_headless_view(broadcast_rx, event_tx.clone());

    // ── Live update channel ──────────────────────────────────────────────────
    channel::spawn(
        config.channel.ws_url.clone(),
        Duration::from_secs(config.channel.reconnect_delay_secs),
        event_tx.clone(),
    );

    let core_handle = tokio::spawn(async move {
        if let Err(e) = dash_core.run(event_rx, player_rx).await {
            tracing::error!("core exited with error: {}", e);
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("streamdash: ctrl-c, shutting down");
    let _ = event_tx.send(core::EngineEvent::Shutdown).await;
    let _ = core_handle.await;
    Ok(())
}
