//! Request/response channel to the daemon.
//!
//! One task owns the connection. Callers enqueue exchanges; the task writes
//! them one at a time and hands each response line to the oldest exchange
//! still waiting.

use crate::error::{BridgeError, ChannelKind};
use crate::framer::LineFramer;
use crate::protocol::Command;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, trace, warn};

const READ_CHUNK: usize = 8 * 1024;

/// Lifecycle of the command connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Waiting for the daemon greeting.
    Connecting,
    /// Idle, the next queued command may be written.
    Ready,
    /// One command written, its response not yet seen.
    AwaitingResponse,
    /// The connection failed or was closed.
    Closed,
}

type Reply = oneshot::Sender<Result<String, BridgeError>>;

struct PendingExchange {
    command: Command,
    reply: Reply,
}

impl PendingExchange {
    fn fail(self, error: BridgeError) {
        // the caller may have stopped waiting
        let _ = self.reply.send(Err(error));
    }
}

/// Handle to the command connection. Cheap to clone; the connection task
/// exits once every handle is dropped and nothing is left in flight.
#[derive(Clone)]
pub struct CommandChannel {
    requests: mpsc::UnboundedSender<PendingExchange>,
    state: watch::Receiver<ChannelState>,
    timeout: Option<Duration>,
}

/// A queued command whose response has not been collected yet.
#[must_use = "the response is only observed by awaiting `wait`"]
pub struct PendingResponse {
    line: String,
    response: oneshot::Receiver<Result<String, BridgeError>>,
    timeout: Option<Duration>,
}

impl PendingResponse {
    /// Wait for the daemon's answer. On timeout the exchange stays queued so
    /// the late response is still matched to it.
    pub async fn wait(self) -> Result<String, BridgeError> {
        let closed = BridgeError::ConnectionClosed {
            channel: ChannelKind::Command,
        };
        match self.timeout {
            Some(after) => match tokio::time::timeout(after, self.response).await {
                Ok(outcome) => outcome.unwrap_or(Err(closed)),
                Err(_) => Err(BridgeError::Timeout {
                    command: self.line,
                    after,
                }),
            },
            None => self.response.await.unwrap_or(Err(closed)),
        }
    }
}

impl CommandChannel {
    /// Start driving `stream` as a command connection. Must be called from
    /// within a Tokio runtime.
    pub fn spawn<S>(stream: S, timeout: Option<Duration>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (requests, inbox) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ChannelState::Connecting);
        let task = CommandTask {
            inbox,
            queue: VecDeque::new(),
            in_flight: None,
            framer: LineFramer::new(),
            state: ChannelState::Connecting,
            state_tx,
        };
        tokio::spawn(task.run(stream));

        Self {
            requests,
            state,
            timeout,
        }
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Resolves once the greeting has been seen.
    pub async fn ready(&self) -> Result<(), BridgeError> {
        let mut state = self.state.clone();
        let current = state
            .wait_for(|s| *s != ChannelState::Connecting)
            .await
            .map(|s| *s)
            .unwrap_or(ChannelState::Closed);
        if current == ChannelState::Closed {
            return Err(BridgeError::ConnectionClosed {
                channel: ChannelKind::Command,
            });
        }
        Ok(())
    }

    /// Queue `command` behind everything already queued. The position in the
    /// queue is fixed when this returns, before any await.
    pub fn enqueue(&self, command: Command) -> Result<PendingResponse, BridgeError> {
        let line = command.to_string();
        let (reply, response) = oneshot::channel();
        self.requests
            .send(PendingExchange { command, reply })
            .map_err(|_| BridgeError::ConnectionClosed {
                channel: ChannelKind::Command,
            })?;
        trace!(command = %line, "command queued");
        Ok(PendingResponse {
            line,
            response,
            timeout: self.timeout,
        })
    }

    /// Send `command` and wait for its response line.
    pub async fn send(&self, command: Command) -> Result<String, BridgeError> {
        self.enqueue(command)?.wait().await
    }
}

struct CommandTask {
    inbox: mpsc::UnboundedReceiver<PendingExchange>,
    queue: VecDeque<PendingExchange>,
    in_flight: Option<PendingExchange>,
    framer: LineFramer,
    state: ChannelState,
    state_tx: watch::Sender<ChannelState>,
}

impl CommandTask {
    async fn run<S>(mut self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (mut reader, mut writer) = tokio::io::split(stream);
        let mut buf = vec![0u8; READ_CHUNK];
        let mut accepting = true;

        loop {
            tokio::select! {
                request = self.inbox.recv(), if accepting => match request {
                    Some(exchange) => self.queue.push_back(exchange),
                    None => accepting = false,
                },
                read = reader.read(&mut buf) => match read {
                    Ok(0) => {
                        self.close(BridgeError::ConnectionClosed {
                            channel: ChannelKind::Command,
                        });
                        return;
                    }
                    Ok(n) => {
                        trace!(bytes = n, "command channel read");
                        for message in self.framer.push(&buf[..n]) {
                            self.on_message(message);
                        }
                    }
                    Err(err) => {
                        self.close(BridgeError::transport(ChannelKind::Command, err));
                        return;
                    }
                },
            }

            if let Err(err) = self.dispatch_next(&mut writer).await {
                self.close(err);
                return;
            }

            if !accepting && self.in_flight.is_none() && self.queue.is_empty() {
                debug!("command channel released");
                return;
            }
        }
    }

    fn on_message(&mut self, message: String) {
        match self.state {
            ChannelState::Connecting => {
                debug!(greeting = %message, "command channel ready");
                self.set_state(ChannelState::Ready);
            }
            ChannelState::AwaitingResponse => {
                if let Some(exchange) = self.in_flight.take() {
                    trace!(command = %exchange.command, "response received");
                    if exchange.reply.send(Ok(message)).is_err() {
                        debug!(command = %exchange.command, "response arrived after caller gave up");
                    }
                }
                self.set_state(ChannelState::Ready);
            }
            ChannelState::Ready => {
                warn!(line = %message, "discarding unsolicited line on command channel");
            }
            ChannelState::Closed => {}
        }
    }

    /// Write the oldest queued command if nothing is in flight.
    async fn dispatch_next<W>(&mut self, writer: &mut W) -> Result<(), BridgeError>
    where
        W: AsyncWrite + Unpin,
    {
        if self.state != ChannelState::Ready || self.in_flight.is_some() {
            return Ok(());
        }

        let Some(exchange) = self.next_live() else {
            return Ok(());
        };
        let line = exchange.command.to_line();
        debug!(command = %exchange.command, "sending command");
        self.in_flight = Some(exchange);
        self.set_state(ChannelState::AwaitingResponse);

        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|err| BridgeError::transport(ChannelKind::Command, err))?;
        writer
            .flush()
            .await
            .map_err(|err| BridgeError::transport(ChannelKind::Command, err))
    }

    /// Pop queued exchanges until one still has a caller waiting on it.
    fn next_live(&mut self) -> Option<PendingExchange> {
        while let Some(exchange) = self.queue.pop_front() {
            if exchange.reply.is_closed() {
                debug!(command = %exchange.command, "skipping abandoned command");
                continue;
            }
            return Some(exchange);
        }
        None
    }

    fn close(&mut self, error: BridgeError) {
        warn!(error = %error, "command channel closed");
        self.set_state(ChannelState::Closed);
        self.inbox.close();
        while let Ok(exchange) = self.inbox.try_recv() {
            self.queue.push_back(exchange);
        }
        if let Some(exchange) = self.in_flight.take() {
            exchange.fail(error.clone());
        }
        for exchange in self.queue.drain(..) {
            exchange.fail(error.clone());
        }
    }

    fn set_state(&mut self, state: ChannelState) {
        self.state = state;
        self.state_tx.send_replace(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};

    struct FakeDaemon {
        lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl FakeDaemon {
        async fn say(&mut self, line: &str) {
            self.writer
                .write_all(format!("{line}\n").as_bytes())
                .await
                .unwrap();
        }

        async fn expect(&mut self) -> String {
            self.lines.next_line().await.unwrap().expect("line from bridge")
        }

        async fn assert_silent(&mut self) {
            let read =
                tokio::time::timeout(Duration::from_millis(50), self.lines.next_line()).await;
            assert!(read.is_err(), "bridge wrote unexpectedly: {read:?}");
        }
    }

    fn connect(timeout: Option<Duration>) -> (CommandChannel, FakeDaemon) {
        let (client, server) = tokio::io::duplex(4096);
        let (read, writer) = tokio::io::split(server);
        let daemon = FakeDaemon {
            lines: BufReader::new(read).lines(),
            writer,
        };
        (CommandChannel::spawn(client, timeout), daemon)
    }

    #[tokio::test]
    async fn commands_wait_for_greeting() {
        let (channel, mut daemon) = connect(None);
        let pending = channel.enqueue(Command::Stop).unwrap();
        daemon.assert_silent().await;
        assert_eq!(channel.state(), ChannelState::Connecting);

        daemon.say("spop 0.0.1").await;
        channel.ready().await.unwrap();
        assert_eq!(daemon.expect().await, "stop");
        daemon.say(r#"{"status":"stopped"}"#).await;

        assert_eq!(pending.wait().await.unwrap(), r#"{"status":"stopped"}"#);
    }

    #[tokio::test]
    async fn responses_are_matched_in_order() {
        let (channel, mut daemon) = connect(None);
        daemon.say("spop 0.0.1").await;

        let first = channel
            .enqueue(Command::Play {
                uri: "spotify:track:a".into(),
            })
            .unwrap();
        let second = channel
            .enqueue(Command::Add {
                uri: "spotify:track:b".into(),
            })
            .unwrap();

        assert_eq!(daemon.expect().await, "uplay spotify:track:a");
        // one in flight at a time
        daemon.assert_silent().await;
        daemon.say("first").await;
        assert_eq!(daemon.expect().await, "uadd spotify:track:b");
        daemon.say("second").await;

        assert_eq!(first.wait().await.unwrap(), "first");
        assert_eq!(second.wait().await.unwrap(), "second");
    }

    #[tokio::test]
    async fn unsolicited_lines_are_dropped() {
        let (channel, mut daemon) = connect(None);
        daemon.say("spop 0.0.1").await;
        channel.ready().await.unwrap();
        daemon.say("noise").await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let pending = channel.enqueue(Command::Status).unwrap();
        assert_eq!(daemon.expect().await, "status");
        daemon.say("answer").await;
        assert_eq!(pending.wait().await.unwrap(), "answer");
    }

    #[tokio::test]
    async fn late_response_stays_with_timed_out_command() {
        let (channel, mut daemon) = connect(Some(Duration::from_millis(50)));
        daemon.say("spop 0.0.1").await;

        let slow = channel.send(Command::Status);
        let (slow, line) = tokio::join!(slow, daemon.expect());
        assert_eq!(line, "status");
        assert!(matches!(slow, Err(BridgeError::Timeout { .. })));

        let next = channel.enqueue(Command::Toggle).unwrap();
        daemon.say("late status").await;
        assert_eq!(daemon.expect().await, "toggle");
        daemon.say("toggled").await;
        assert_eq!(next.wait().await.unwrap(), "toggled");
    }

    #[tokio::test]
    async fn closed_connection_fails_waiters() {
        let (channel, mut daemon) = connect(None);
        daemon.say("spop 0.0.1").await;

        let in_flight = channel.enqueue(Command::List).unwrap();
        assert_eq!(daemon.expect().await, "ls");
        let queued = channel.enqueue(Command::Stop).unwrap();
        drop(daemon);

        assert!(matches!(
            in_flight.wait().await,
            Err(BridgeError::ConnectionClosed { .. })
        ));
        assert!(matches!(
            queued.wait().await,
            Err(BridgeError::ConnectionClosed { .. })
        ));
        assert_eq!(channel.state(), ChannelState::Closed);
        assert!(channel.enqueue(Command::Stop).is_err());
        assert!(channel.ready().await.is_err());
    }
}
