pub mod config;
pub mod logging;
pub mod models;
pub mod paths;
pub mod track_id;

pub use config::{
    Config, ConfigError, DaemonConfig, LogLevel, LoggingConfig, ValidationError,
    DEFAULT_DAEMON_PORT,
};
pub use logging::{init_logging, LoggingError, LoggingGuard};
pub use models::{LibraryEntry, PlaybackState, PlaybackStatus};
pub use paths::{AppDirs, DirsError};
pub use track_id::{TrackId, TrackIdError};

pub const APP_NAME: &str = "spopctl";
pub const APP_AUTHOR: &str = "Spopctl";
pub const APP_QUALIFIER: &str = "io";
