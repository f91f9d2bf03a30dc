use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Transport state as the host understands it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    Play,
    Pause,
    Stop,
}

impl PlaybackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackStatus::Play => "play",
            PlaybackStatus::Pause => "pause",
            PlaybackStatus::Stop => "stop",
        }
    }
}

/// Normalized playback snapshot pushed to the host.
///
/// Every field is optional: `None` means the daemon did not report it.
/// `samplerate`, `bitdepth` and `channels` are never reported by spop and are
/// left for the host to merge from another source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub status: Option<PlaybackStatus>,
    /// Zero-based index of the current track in the queue.
    pub position: Option<u32>,
    /// Elapsed time in milliseconds.
    pub seek: Option<u64>,
    /// Track length, passed through as the daemon reported it.
    pub duration: Option<Number>,
    pub samplerate: Option<u32>,
    pub bitdepth: Option<u32>,
    pub channels: Option<u32>,
}

/// One record of the daemon's catalog, kept as the daemon reported it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    /// Identifier the cache is keyed by.
    pub key: String,
    pub record: Map<String, Value>,
}

impl LibraryEntry {
    pub fn new(key: impl Into<String>, record: Map<String, Value>) -> Self {
        Self {
            key: key.into(),
            record,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.record.get("name").and_then(Value::as_str)
    }

    pub fn kind(&self) -> Option<&str> {
        self.record.get("type").and_then(Value::as_str)
    }
}
