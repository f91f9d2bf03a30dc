//! Maps spop's status JSON onto [`PlaybackState`].

use serde::Deserialize;
use serde_json::{Number, Value};
use spop_core::{PlaybackState, PlaybackStatus};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum TranslateError {
    #[error("not valid JSON: {0}")]
    Syntax(String),
    #[error("expected a JSON object")]
    NotAnObject,
    #[error("unexpected field type: {0}")]
    FieldType(String),
}

/// The subset of spop's status object the host cares about. Each field is
/// absent unless the daemon sent it; anything else in the object is ignored.
#[derive(Debug, Default, Deserialize)]
struct RawStatus {
    status: Option<String>,
    /// Seconds, fractional.
    position: Option<f64>,
    duration: Option<Number>,
    /// 1-based.
    current_track: Option<Number>,
}

pub fn translate(payload: &str) -> Result<PlaybackState, TranslateError> {
    let value: Value =
        serde_json::from_str(payload).map_err(|err| TranslateError::Syntax(err.to_string()))?;
    if !value.is_object() {
        return Err(TranslateError::NotAnObject);
    }
    let raw: RawStatus =
        serde_json::from_value(value).map_err(|err| TranslateError::FieldType(err.to_string()))?;

    Ok(PlaybackState {
        status: raw.status.as_deref().and_then(status_from_daemon),
        position: raw.current_track.as_ref().and_then(queue_index),
        seek: raw.position.map(seconds_to_millis),
        duration: raw.duration,
        samplerate: None,
        bitdepth: None,
        channels: None,
    })
}

fn status_from_daemon(status: &str) -> Option<PlaybackStatus> {
    match status {
        "playing" => Some(PlaybackStatus::Play),
        "paused" => Some(PlaybackStatus::Pause),
        "stopped" => Some(PlaybackStatus::Stop),
        _ => None,
    }
}

/// Zero-based queue index for a 1-based track number. Only whole numbers
/// from 1 up name a track; `3.0` counts, `2.5` does not.
fn queue_index(track: &Number) -> Option<u32> {
    let track = match track.as_u64() {
        Some(track) => track,
        None => {
            let track = track.as_f64()?;
            let whole = track.is_finite() && track.fract() == 0.0;
            if !whole || track < 1.0 || track > f64::from(u32::MAX) {
                return None;
            }
            track as u64
        }
    };
    u32::try_from(track).ok()?.checked_sub(1)
}

fn seconds_to_millis(seconds: f64) -> u64 {
    (seconds * 1000.0).round().max(0.0) as u64
}
