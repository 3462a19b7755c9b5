//! Live update channel.
//!
//! Persistent websocket client to the backend's push endpoint.  The server
//! sends JSON arrays of record deltas as text frames; nothing is ever sent
//! back.  On any close — clean, abnormal, or a failed connect — the channel
//! sleeps a fixed delay and tries again, forever.  That simplicity is
//! deliberate: the backend is a trusted LAN peer, so there is no backoff
//! growth and no giving-up threshold.

use std::time::Duration;

use dash_proto::record::StreamPatch;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::core::EngineEvent;

pub fn spawn(
    url: String,
    reconnect_delay: Duration,
    tx: mpsc::Sender<EngineEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match tokio_tungstenite::connect_async(&url).await {
                Ok((ws, _)) => {
                    info!("channel: connected to {}", url);
                    if read_frames(ws, &tx).await.is_err() {
                        // Engine loop is gone; nobody left to deliver to.
                        return;
                    }
                }
                Err(e) => {
                    warn!("channel: connect to {} failed: {}", url, e);
                }
            }
            if tx.is_closed() {
                return;
            }
            debug!("channel: reconnecting in {:?}", reconnect_delay);
            tokio::time::sleep(reconnect_delay).await;
        }
    })
}

/// Pump one connection until it closes.  `Err` means the engine's event
/// channel is closed and the whole channel task should exit.
async fn read_frames(
    mut ws: impl StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    tx: &mpsc::Sender<EngineEvent>,
) -> Result<(), ()> {
    while let Some(frame) = ws.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<Vec<StreamPatch>>(&text) {
                Ok(batch) => {
                    debug!("channel: batch of {} deltas", batch.len());
                    if tx.send(EngineEvent::DeltaBatch(batch)).await.is_err() {
                        return Err(());
                    }
                }
                Err(e) => warn!("channel: malformed frame skipped: {}", e),
            },
            Ok(Message::Close(_)) => {
                info!("channel: server closed the connection");
                break;
            }
            // Pings are answered by tungstenite; binary frames are not part
            // of the protocol.
            Ok(_) => {}
            Err(e) => {
                warn!("channel: read error: {}", e);
                break;
            }
        }
    }
    Ok(())
}
