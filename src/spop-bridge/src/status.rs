//! Long-poll status connection.
//!
//! Every line the daemon sends here is answered with `idle`, which asks for
//! the next state change. The first line is the greeting; every later line is
//! a status object that gets translated and pushed to the host.

use crate::error::{BridgeError, ChannelKind};
use crate::framer::LineFramer;
use crate::protocol::REARM;
use crate::sink::StateSink;
use crate::translate::translate;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusState {
    Connecting,
    Monitoring,
    Closed,
}

/// Owns the monitoring task; dropping it stops monitoring.
pub struct StatusChannel {
    state: watch::Receiver<StatusState>,
    task: JoinHandle<()>,
}

impl StatusChannel {
    pub fn spawn<S>(stream: S, sink: Arc<dyn StateSink>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (state_tx, state) = watch::channel(StatusState::Connecting);
        let task = tokio::spawn(monitor(stream, sink, state_tx));
        Self { state, task }
    }

    pub fn state(&self) -> StatusState {
        *self.state.borrow()
    }

    /// Resolves once the greeting has been seen.
    pub async fn ready(&self) -> Result<(), BridgeError> {
        let mut state = self.state.clone();
        let current = state
            .wait_for(|s| *s != StatusState::Connecting)
            .await
            .map(|s| *s)
            .unwrap_or(StatusState::Closed);
        match current {
            StatusState::Closed => Err(BridgeError::ConnectionClosed {
                channel: ChannelKind::Status,
            }),
            _ => Ok(()),
        }
    }
}

impl Drop for StatusChannel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn monitor<S>(stream: S, sink: Arc<dyn StateSink>, state: watch::Sender<StatusState>)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut framer = LineFramer::new();
    let mut buf = vec![0u8; READ_CHUNK];
    let rearm = format!("{REARM}\n");
    let mut greeted = false;

    let failure = loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                break BridgeError::ConnectionClosed {
                    channel: ChannelKind::Status,
                }
            }
            Ok(n) => n,
            Err(err) => break BridgeError::transport(ChannelKind::Status, err),
        };

        let mut write_failed = None;
        for message in framer.push(&buf[..n]) {
            // re-arm before handling so the daemon can queue the next change
            if let Err(err) = writer.write_all(rearm.as_bytes()).await {
                write_failed = Some(BridgeError::transport(ChannelKind::Status, err));
                break;
            }

            if !greeted {
                greeted = true;
                debug!(greeting = %message, "status channel monitoring");
                state.send_replace(StatusState::Monitoring);
                continue;
            }

            trace!(payload = %message, "status update");
            match translate(&message) {
                Ok(update) => sink.push_state(update),
                Err(err) => sink.push_error(&BridgeError::Translation(err)),
            }
        }
        if let Some(err) = write_failed {
            break err;
        }
    };

    state.send_replace(StatusState::Closed);
    sink.push_error(&failure);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{ChannelSink, HostEvent};
    use spop_core::PlaybackStatus;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, BufReader};

    #[tokio::test]
    async fn greeting_enters_monitoring_without_a_push() {
        let (client, server) = tokio::io::duplex(4096);
        let (sink, mut events) = ChannelSink::new();
        let channel = StatusChannel::spawn(client, Arc::new(sink));
        let (read, mut daemon) = tokio::io::split(server);
        let mut lines = BufReader::new(read).lines();

        daemon.write_all(b"spop 0.0.1\n").await.unwrap();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "idle");
        channel.ready().await.unwrap();
        assert_eq!(channel.state(), StatusState::Monitoring);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn every_update_is_rearmed_and_pushed() {
        let (client, server) = tokio::io::duplex(4096);
        let (sink, mut events) = ChannelSink::new();
        let _channel = StatusChannel::spawn(client, Arc::new(sink));
        let (read, mut daemon) = tokio::io::split(server);
        let mut lines = BufReader::new(read).lines();

        daemon.write_all(b"spop 0.0.1\n").await.unwrap();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "idle");

        daemon
            .write_all(b"{\"status\":\"paused\",\"current_track\":2}\n")
            .await
            .unwrap();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "idle");
        match events.recv().await {
            Some(HostEvent::State(state)) => {
                assert_eq!(state.status, Some(PlaybackStatus::Pause));
                assert_eq!(state.position, Some(1));
            }
            other => panic!("expected state, got {other:?}"),
        }

        // two updates in one write still get one idle each
        daemon
            .write_all(b"{\"status\":\"playing\"}\n{\"status\":\"stopped\"}\n")
            .await
            .unwrap();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "idle");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "idle");
        for expected in [PlaybackStatus::Play, PlaybackStatus::Stop] {
            match events.recv().await {
                Some(HostEvent::State(state)) => assert_eq!(state.status, Some(expected)),
                other => panic!("expected state, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn malformed_update_is_reported_and_monitoring_continues() {
        let (client, server) = tokio::io::duplex(4096);
        let (sink, mut events) = ChannelSink::new();
        let channel = StatusChannel::spawn(client, Arc::new(sink));
        let (read, mut daemon) = tokio::io::split(server);
        let mut lines = BufReader::new(read).lines();

        daemon.write_all(b"spop 0.0.1\nnot json\n").await.unwrap();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "idle");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "idle");
        assert!(matches!(
            events.recv().await,
            Some(HostEvent::Error(BridgeError::Translation(_)))
        ));
        assert_eq!(channel.state(), StatusState::Monitoring);

        daemon.write_all(b"{}\n").await.unwrap();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "idle");
        assert!(matches!(events.recv().await, Some(HostEvent::State(_))));
    }

    #[tokio::test]
    async fn daemon_hangup_is_pushed_as_error() {
        let (client, server) = tokio::io::duplex(4096);
        let (sink, mut events) = ChannelSink::new();
        let channel = StatusChannel::spawn(client, Arc::new(sink));
        drop(server);

        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap();
        assert!(matches!(
            event,
            Some(HostEvent::Error(BridgeError::ConnectionClosed {
                channel: ChannelKind::Status
            }))
        ));
        assert!(channel.ready().await.is_err());
    }
}
