//! Bridge between a host player and the spop playback daemon.
//!
//! This crate provides:
//! - A command connection that exchanges one request line for one response
//!   line, queuing callers so only one command is ever in flight
//! - A status connection that long-polls the daemon with `idle` and pushes
//!   every state change to the host
//! - A translator from spop's status JSON to [`PlaybackState`]
//! - [`SpopController`], the playback API built on both
//!
//! # Protocol
//!
//! Both connections start with a greeting line from the daemon
//! (`spop 0.0.1`). Nothing is sent on the command connection until it has
//! been seen.
//!
//! ```text
//! command:  -> ls                      <- {"playlists": [...]}
//!           -> uplay spotify:track:x   <- {"status": "playing", ...}
//! status:   -> idle                    <- {"status": "paused", ...}
//!           -> idle                    ...
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use spop_bridge::{ChannelSink, SpopController};
//! use spop_core::{DaemonConfig, TrackId};
//! use std::sync::Arc;
//!
//! let (sink, mut events) = ChannelSink::new();
//! let controller = SpopController::connect(&DaemonConfig::default(), Arc::new(sink)).await?;
//! controller
//!     .clear_add_play_tracks(&[TrackId::from_uri("spotify:track:6rqhFgbbKwnb9MLmUQDhG6")])
//!     .await?;
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! ```
//!
//! [`PlaybackState`]: spop_core::PlaybackState

mod command;
mod controller;
mod error;
mod framer;
mod library;
pub mod protocol;
mod sink;
mod status;
mod translate;

pub use command::{ChannelState, CommandChannel, PendingResponse};
pub use controller::SpopController;
pub use error::{BridgeError, ChannelKind};
pub use framer::LineFramer;
pub use library::{library_slot, parse_listing, LibraryCache, LibraryWriter};
pub use protocol::{Command, REARM};
pub use sink::{ChannelSink, HostEvent, LogSink, StateSink};
pub use status::{StatusChannel, StatusState};
pub use translate::{translate, TranslateError};
