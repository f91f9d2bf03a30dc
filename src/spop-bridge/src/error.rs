use crate::translate::TranslateError;
use spop_core::TrackIdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Which of the two daemon connections an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Command,
    Status,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Command => f.write_str("command"),
            ChannelKind::Status => f.write_str("status"),
        }
    }
}

/// Errors from bridge operations.
///
/// Cloneable so one transport failure can be handed to every exchange that
/// was waiting on the connection.
#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    #[error("failed to connect {channel} channel to {address}: {source}")]
    Connect {
        channel: ChannelKind,
        address: String,
        source: Arc<std::io::Error>,
    },
    #[error("{channel} channel transport failed: {source}")]
    Transport {
        channel: ChannelKind,
        source: Arc<std::io::Error>,
    },
    #[error("{channel} channel closed")]
    ConnectionClosed { channel: ChannelKind },
    #[error("malformed status payload: {0}")]
    Translation(#[from] TranslateError),
    #[error("daemon rejected `{command}`: {message}")]
    Rejected { command: String, message: String },
    #[error("unreadable library listing: {0}")]
    Listing(String),
    #[error(transparent)]
    TrackId(#[from] TrackIdError),
    #[error("no response to `{command}` within {after:?}")]
    Timeout { command: String, after: Duration },
    #[error("no tracks to play")]
    EmptyTrackList,
    #[error("track URI {uri:?} cannot be sent as a single command argument")]
    InvalidUri { uri: String },
}

impl BridgeError {
    pub(crate) fn transport(channel: ChannelKind, source: std::io::Error) -> Self {
        Self::Transport {
            channel,
            source: Arc::new(source),
        }
    }

    /// Transport failures leave the affected channel unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BridgeError::Connect { .. }
                | BridgeError::Transport { .. }
                | BridgeError::ConnectionClosed { .. }
        )
    }
}
