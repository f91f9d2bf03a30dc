use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Host-facing track identifier: the daemon URI, base64 encoded.
///
/// The encoding is reversible, `TrackId::from_uri(uri).to_uri()` always
/// yields `uri` again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct TrackId(pub String);

#[derive(Debug, Clone, Error)]
pub enum TrackIdError {
    #[error("track id {id:?} is not valid base64: {source}")]
    Base64 {
        id: String,
        source: base64::DecodeError,
    },
    #[error("track id {id:?} does not decode to UTF-8: {source}")]
    Utf8 {
        id: String,
        source: std::string::FromUtf8Error,
    },
}

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn from_uri(uri: &str) -> Self {
        Self(STANDARD.encode(uri.as_bytes()))
    }

    /// Recover the daemon URI this id was built from.
    pub fn to_uri(&self) -> Result<String, TrackIdError> {
        let bytes = STANDARD
            .decode(self.0.trim())
            .map_err(|source| TrackIdError::Base64 {
                id: self.0.clone(),
                source,
            })?;
        String::from_utf8(bytes).map_err(|source| TrackIdError::Utf8 {
            id: self.0.clone(),
            source,
        })
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TrackId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TrackId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for TrackId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
