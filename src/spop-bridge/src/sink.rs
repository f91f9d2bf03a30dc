use crate::error::BridgeError;
use spop_core::PlaybackState;
use tokio::sync::mpsc;

/// The host side of the bridge: receives every translated status event and
/// every failure that has no caller to return to.
pub trait StateSink: Send + Sync {
    fn push_state(&self, state: PlaybackState);

    /// Report a failure. The default logs and swallows it.
    fn push_error(&self, error: &BridgeError) {
        tracing::warn!(error = %error, "spop bridge error");
    }
}

/// Sink that only logs; for callers that never look at pushed state.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl StateSink for LogSink {
    fn push_state(&self, state: PlaybackState) {
        tracing::info!(
            status = state.status.map(|s| s.as_str()).unwrap_or("unknown"),
            position = ?state.position,
            seek = ?state.seek,
            "spop state update"
        );
    }
}

/// What a [`ChannelSink`] forwards to its receiver.
#[derive(Debug, Clone)]
pub enum HostEvent {
    State(PlaybackState),
    Error(BridgeError),
}

/// Forwards pushes over an unbounded channel so the host can consume them
/// from its own task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<HostEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HostEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StateSink for ChannelSink {
    fn push_state(&self, state: PlaybackState) {
        if self.tx.send(HostEvent::State(state)).is_err() {
            tracing::debug!("state update dropped, host receiver is gone");
        }
    }

    fn push_error(&self, error: &BridgeError) {
        tracing::warn!(error = %error, "spop bridge error");
        // Ignore send errors (receiver may have been dropped)
        let _ = self.tx.send(HostEvent::Error(error.clone()));
    }
}
