use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub streams: StreamsConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
}

/// REST backend used for listing records and issuing control commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

/// Live update channel (websocket push endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// Fixed delay between reconnect attempts.  No backoff growth — the
    /// backend is a trusted LAN peer and the channel retries forever.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

/// Where the HLS renditions live.  The playback URL for a record is
/// `{base_url}/{name}/{name}.m3u8` with spaces percent-escaped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamsConfig {
    #[serde(default = "default_stream_base")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Forward buffer for thumbnail previews.  Small: previews favor
    /// latency over smoothness and never seek backward.
    #[serde(default = "default_preview_buffer_secs")]
    pub preview_buffer_secs: u32,
    /// Forward buffer for the focused (enlarged) session.
    #[serde(default = "default_focused_buffer_secs")]
    pub focused_buffer_secs: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
        }
    }
}

impl Default for StreamsConfig {
    fn default() -> Self {
        Self {
            base_url: default_stream_base(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            preview_buffer_secs: default_preview_buffer_secs(),
            focused_buffer_secs: default_focused_buffer_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_ws_url() -> String {
    "ws://127.0.0.1:8000/ws/streams".to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    3
}

fn default_stream_base() -> String {
    "http://127.0.0.1:8000/streams".to_string()
}

fn default_preview_buffer_secs() -> u32 {
    5
}

fn default_focused_buffer_secs() -> u32 {
    10
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::info!("config: creating defaults at {}", path.display());
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
