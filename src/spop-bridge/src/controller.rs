//! Public playback API on top of the two daemon connections.

use crate::command::{CommandChannel, PendingResponse};
use crate::error::{BridgeError, ChannelKind};
use crate::library::{library_slot, parse_listing, LibraryCache, LibraryWriter};
use crate::protocol::{rejection, Command};
use crate::sink::StateSink;
use crate::status::StatusChannel;
use crate::translate::translate;
use spop_core::{DaemonConfig, LibraryEntry, PlaybackState, TrackId};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{info, warn};

/// Controls one spop daemon.
///
/// Holds a command connection for request/response exchanges and a status
/// connection that pushes every state change to the [`StateSink`]. The
/// library is requested once, as the very first command.
pub struct SpopController {
    commands: CommandChannel,
    status: StatusChannel,
    library: LibraryCache,
}

impl SpopController {
    /// Open both connections to the daemon.
    pub async fn connect(
        daemon: &DaemonConfig,
        sink: Arc<dyn StateSink>,
    ) -> Result<Self, BridgeError> {
        let address = daemon.address();
        info!(%address, "connecting to spop");
        let command_stream = open(&address, ChannelKind::Command).await?;
        let status_stream = open(&address, ChannelKind::Status).await?;
        Ok(Self::from_streams(
            command_stream,
            status_stream,
            sink,
            daemon.command_timeout(),
        ))
    }

    /// Drive already-open streams. Must be called from within a Tokio runtime.
    pub fn from_streams<C, S>(
        command_stream: C,
        status_stream: S,
        sink: Arc<dyn StateSink>,
        command_timeout: Option<Duration>,
    ) -> Self
    where
        C: AsyncRead + AsyncWrite + Send + 'static,
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let commands = CommandChannel::spawn(command_stream, command_timeout);
        let status = StatusChannel::spawn(status_stream, sink.clone());
        let (writer, library) = library_slot();

        // queued synchronously so `ls` is ahead of any caller's command
        let listing = commands.enqueue(Command::List);
        tokio::spawn(load_library(listing, writer, sink));

        Self {
            commands,
            status,
            library,
        }
    }

    /// Resolves once both connections have seen the daemon greeting.
    pub async fn ready(&self) -> Result<(), BridgeError> {
        self.commands.ready().await?;
        self.status.ready().await
    }

    /// Replace the queue with `ids` and start playing the first one.
    ///
    /// Every id is decoded and checked before anything is sent. Returns the
    /// response to the last command issued.
    pub async fn clear_add_play_tracks(&self, ids: &[TrackId]) -> Result<String, BridgeError> {
        info!(tracks = ids.len(), "clear, add and play");
        let uris = ids
            .iter()
            .map(TrackId::to_uri)
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(uri) = uris.iter().find(|uri| !is_single_argument(uri)) {
            return Err(BridgeError::InvalidUri { uri: uri.clone() });
        }
        let (first, rest) = uris.split_first().ok_or(BridgeError::EmptyTrackList)?;

        let mut response = self.issue(Command::Play { uri: first.clone() }).await?;
        for uri in rest {
            response = self.issue(Command::Add { uri: uri.clone() }).await?;
        }
        Ok(response)
    }

    pub async fn stop(&self) -> Result<String, BridgeError> {
        info!("stop");
        self.issue(Command::Stop).await
    }

    /// Sends `toggle` whatever the daemon's current state is.
    pub async fn pause(&self) -> Result<String, BridgeError> {
        info!("pause");
        self.issue(Command::Toggle).await
    }

    /// Sends `toggle` whatever the daemon's current state is.
    pub async fn resume(&self) -> Result<String, BridgeError> {
        info!("resume");
        self.issue(Command::Toggle).await
    }

    /// The daemon's raw answer to `status`, untranslated.
    pub async fn get_state(&self) -> Result<String, BridgeError> {
        self.issue(Command::Status).await
    }

    /// `status` run through the same translation as pushed events.
    pub async fn playback_state(&self) -> Result<PlaybackState, BridgeError> {
        let raw = self.get_state().await?;
        Ok(translate(&raw)?)
    }

    /// The library, once the startup listing has completed.
    pub async fn get_library(&self) -> Vec<LibraryEntry> {
        self.library.entries().await
    }

    pub fn library(&self) -> &LibraryCache {
        &self.library
    }

    async fn issue(&self, command: Command) -> Result<String, BridgeError> {
        let line = command.to_string();
        let result = self
            .commands
            .send(command)
            .await
            .and_then(|response| accept(&line, response));
        if let Err(err) = &result {
            warn!(command = %line, error = %err, "spop command failed");
        }
        result
    }
}

async fn open(address: &str, channel: ChannelKind) -> Result<TcpStream, BridgeError> {
    TcpStream::connect(address)
        .await
        .map_err(|source| BridgeError::Connect {
            channel,
            address: address.to_string(),
            source: Arc::new(source),
        })
}

/// spop URIs never contain whitespace; any would split the argument or,
/// for line terminators, the command itself.
fn is_single_argument(uri: &str) -> bool {
    !uri.is_empty() && !uri.chars().any(char::is_whitespace)
}

fn accept(line: &str, response: String) -> Result<String, BridgeError> {
    match rejection(&response) {
        Some(message) => Err(BridgeError::Rejected {
            command: line.to_string(),
            message,
        }),
        None => Ok(response),
    }
}

async fn load_library(
    listing: Result<PendingResponse, BridgeError>,
    writer: LibraryWriter,
    sink: Arc<dyn StateSink>,
) {
    let entries = match listing {
        Ok(pending) => pending.wait().await,
        Err(err) => Err(err),
    }
    .and_then(|response| accept(&Command::List.to_string(), response))
    .and_then(|response| parse_listing(&response));

    match entries {
        Ok(entries) => {
            info!(entries = entries.len(), "library loaded");
            writer.fill(entries);
        }
        Err(err) => {
            sink.push_error(&err);
            writer.fill(Vec::new());
        }
    }
}
