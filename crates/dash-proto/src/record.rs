use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Stable identifier of one configured encoder.  Immutable for the record's
/// lifetime; the backend never reuses ids within a session.
pub type RecordId = u64;

/// MIME type a sink must accept to play HLS without an adaptive engine.
pub const HLS_MIME: &str = "application/vnd.apple.mpegurl";

/// Canonical description of one encoder/stream as held in the registry.
///
/// Only `id`, `name` and `pid` are meaningful to the engine.  Everything else
/// the backend sends (status text, bitrate, folder paths, …) is carried
/// opaquely in `extra` so it survives merges and round-trips.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StreamRecord {
    pub id: RecordId,
    /// Human-readable label.  Derives the playback URL; may change.
    #[serde(default)]
    pub name: String,
    /// Process id of the running encoder.  Present only while running;
    /// used as the argument to the stop command.
    #[serde(default)]
    pub pid: Option<u32>,
    /// Opaque status/metadata fields, merged shallowly.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StreamRecord {
    /// Playback URL for this record: `{base}/{enc}/{enc}.m3u8` where `enc`
    /// is the name with spaces replaced by `%20`.  The backend lays streams
    /// out under directories named exactly after the record, so no other
    /// characters are escaped.
    pub fn playback_url(&self, base: &str) -> String {
        let encoded = self.name.replace(' ', "%20");
        format!("{}/{}/{}.m3u8", base.trim_end_matches('/'), encoded, encoded)
    }
}

/// A partial update for one record, as delivered by the live update channel.
///
/// Field semantics follow JSON presence: an absent field keeps the prior
/// value, an explicit `null` pid clears it.  Flattened `extra` keys overlay
/// the record's keys shallowly; nested structures are replaced whole.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamPatch {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub pid: Option<Option<u32>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StreamPatch {
    /// Materialise a patch for an id the registry has never seen.
    pub fn into_record(self) -> StreamRecord {
        StreamRecord {
            id: self.id,
            name: self.name.unwrap_or_default(),
            pid: self.pid.flatten(),
            extra: self.extra,
        }
    }

    /// Overlay this patch onto an existing record, field-wise.
    pub fn apply_to(&self, record: &mut StreamRecord) {
        if let Some(name) = &self.name {
            record.name = name.clone();
        }
        if let Some(pid) = self.pid {
            record.pid = pid;
        }
        for (key, value) in &self.extra {
            record.extra.insert(key.clone(), value.clone());
        }
    }
}

/// Distinguishes `"pid": null` (outer Some, inner None) from an absent
/// `pid` field (outer None, via `#[serde(default)]`).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
