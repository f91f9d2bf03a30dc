use anyhow::Result;
use clap::{Parser, Subcommand};
use spop_bridge::{ChannelSink, HostEvent, LogSink, SpopController, StateSink};
use spop_core::{init_logging, AppDirs, Config, DaemonConfig, TrackId, TrackIdError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(name = "spopctl", version, about = "Control a spop playback daemon")]
struct Cli {
    /// Daemon host override (takes precedence over config)
    #[arg(long, global = true)]
    host: Option<String>,
    /// Daemon port override (takes precedence over config)
    #[arg(long, global = true)]
    port: Option<u16>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Clear the queue, add the given track ids and play the first
    Play {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Like `play`, but takes spotify URIs
    PlayUri {
        #[arg(required = true)]
        uris: Vec<String>,
    },
    /// Stop playback
    Stop,
    /// Toggle playback
    Pause,
    /// Toggle playback
    Resume,
    /// Print the daemon's status
    Status,
    /// Print the daemon's playlists, one JSON object per line
    Library,
    /// Print every state change until interrupted
    Monitor,
    /// Turn a URI into a track id
    Encode { uri: String },
    /// Turn a track id back into its URI
    Decode { id: String },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("no tracks given")]
    NoTracks,
    #[error(transparent)]
    TrackId(#[from] TrackIdError),
}

impl Command {
    /// Track ids to play, validated before any connection is opened.
    fn track_ids(&self) -> Result<Option<Vec<TrackId>>, CliError> {
        let ids: Vec<TrackId> = match self {
            Command::Play { ids } => ids.iter().map(|id| TrackId::new(id.as_str())).collect(),
            Command::PlayUri { uris } => uris.iter().map(|uri| TrackId::from_uri(uri)).collect(),
            _ => return Ok(None),
        };
        if ids.is_empty() {
            return Err(CliError::NoTracks);
        }
        for id in &ids {
            id.to_uri()?;
        }
        Ok(Some(ids))
    }

    fn needs_daemon(&self) -> bool {
        !matches!(self, Command::Encode { .. } | Command::Decode { .. })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let dirs = AppDirs::discover()?;
    let config = Config::load_or_default(&dirs)?;
    let _logging = init_logging(&config.logging, &dirs)?;

    if !cli.command.needs_daemon() {
        return offline(&cli.command);
    }

    let tracks = cli.command.track_ids()?;
    let daemon = config.resolve_daemon(cli.host.as_deref(), cli.port)?;
    tracing::info!(
        "Using spop at {} (config dir: {})",
        daemon.address(),
        dirs.config_dir().display()
    );

    if matches!(cli.command, Command::Monitor) {
        return monitor(&daemon).await;
    }

    let controller = SpopController::connect(&daemon, Arc::new(LogSink)).await?;
    controller.ready().await?;

    match cli.command {
        Command::Play { .. } | Command::PlayUri { .. } => {
            let ids = tracks.unwrap_or_default();
            println!("{}", controller.clear_add_play_tracks(&ids).await?);
        }
        Command::Stop => println!("{}", controller.stop().await?),
        Command::Pause => println!("{}", controller.pause().await?),
        Command::Resume => println!("{}", controller.resume().await?),
        Command::Status => {
            let raw = controller.get_state().await?;
            println!("{raw}");
            match spop_bridge::translate(&raw) {
                Ok(state) => println!("{}", serde_json::to_string(&state)?),
                Err(err) => tracing::warn!(error = %err, "status did not translate"),
            }
        }
        Command::Library => {
            for entry in controller.get_library().await {
                println!("{}", serde_json::to_string(&entry)?);
            }
        }
        Command::Monitor | Command::Encode { .. } | Command::Decode { .. } => {}
    }

    Ok(())
}

fn offline(command: &Command) -> Result<()> {
    match command {
        Command::Encode { uri } => println!("{}", TrackId::from_uri(uri)),
        Command::Decode { id } => println!("{}", TrackId::new(id.as_str()).to_uri()?),
        _ => {}
    }
    Ok(())
}

async fn monitor(daemon: &DaemonConfig) -> Result<()> {
    let (sink, mut events) = ChannelSink::new();
    let sink: Arc<dyn StateSink> = Arc::new(sink);
    let controller = SpopController::connect(daemon, sink).await?;
    controller.ready().await?;
    println!("Monitoring spop at {} (Ctrl-C to stop)", daemon.address());

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(HostEvent::State(state)) => println!("{}", serde_json::to_string(&state)?),
                Some(HostEvent::Error(err)) if err.is_fatal() => return Err(err.into()),
                Some(HostEvent::Error(err)) => eprintln!("error: {err}"),
                None => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Monitor interrupted");
                return Ok(());
            }
        }
    }
}
