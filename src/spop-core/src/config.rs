use crate::paths::AppDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const CURRENT_CONFIG_VERSION: u32 = 1;

/// Port spop listens on when nothing else is configured.
pub const DEFAULT_DAEMON_PORT: u16 = 6602;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_config_version")]
    pub config_version: u32,
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            daemon: DaemonConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Where the spop daemon lives and how long to wait on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_daemon_host")]
    pub host: String,
    #[serde(default = "default_daemon_port")]
    pub port: u16,
    /// Upper bound on a single command/response exchange. `None` waits forever.
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            host: default_daemon_host(),
            port: default_daemon_port(),
            command_timeout_secs: None,
        }
    }
}

impl DaemonConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
    #[serde(default = "default_max_log_files")]
    pub max_log_files: usize,
    /// Log to stderr, leaving stdout for command output.
    #[serde(default = "default_console_enabled", alias = "stdout")]
    pub console: bool,
    /// Also write to a daily rolling file under the log directory.
    #[serde(default = "default_file_enabled")]
    pub file: bool,
    #[serde(default)]
    pub file_name: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_log_files: default_max_log_files(),
            console: default_console_enabled(),
            file: default_file_enabled(),
            file_name: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("config validation failed: {0}")]
    Validation(ValidationError),
    #[error("failed to prepare configuration directories: {0}")]
    Directories(#[from] crate::paths::DirsError),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("unsupported config_version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("daemon host must not be empty")]
    EmptyHost,
    #[error("daemon port must be non-zero")]
    ZeroPort,
    #[error("command_timeout_secs must be non-zero; omit it to wait forever")]
    ZeroTimeout,
}

impl Config {
    pub fn load_or_default(dirs: &AppDirs) -> Result<Self, ConfigError> {
        dirs.ensure_exists()?;
        Self::load_from(&Self::config_path(dirs))
    }

    /// Load a config file, falling back to defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate().map_err(ConfigError::Validation)?;
        Ok(config)
    }

    pub fn config_path(dirs: &AppDirs) -> PathBuf {
        dirs.config_dir().join("config.toml")
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.config_version != CURRENT_CONFIG_VERSION {
            return Err(ValidationError::UnsupportedVersion {
                found: self.config_version,
                expected: CURRENT_CONFIG_VERSION,
            });
        }
        validate_daemon(&self.daemon)
    }

    /// Apply command-line overrides on top of the configured daemon endpoint.
    /// CLI values take precedence over config.
    pub fn resolve_daemon(
        &self,
        cli_host: Option<&str>,
        cli_port: Option<u16>,
    ) -> Result<DaemonConfig, ValidationError> {
        let mut daemon = self.daemon.clone();
        if let Some(host) = cli_host {
            daemon.host = host.to_string();
        }
        if let Some(port) = cli_port {
            daemon.port = port;
        }
        validate_daemon(&daemon)?;
        Ok(daemon)
    }
}

fn validate_daemon(daemon: &DaemonConfig) -> Result<(), ValidationError> {
    if daemon.host.trim().is_empty() {
        return Err(ValidationError::EmptyHost);
    }
    if daemon.port == 0 {
        return Err(ValidationError::ZeroPort);
    }
    if daemon.command_timeout_secs == Some(0) {
        return Err(ValidationError::ZeroTimeout);
    }
    Ok(())
}

fn default_config_version() -> u32 {
    CURRENT_CONFIG_VERSION
}

fn default_daemon_host() -> String {
    "localhost".to_string()
}

fn default_daemon_port() -> u16 {
    DEFAULT_DAEMON_PORT
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_max_log_files() -> usize {
    7
}

fn default_console_enabled() -> bool {
    true
}

fn default_file_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.logging.max_log_files, 7);
        assert!(config.logging.console);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.daemon.address(), "localhost:6602");
        assert!(config.daemon.command_timeout().is_none());
    }

    #[test]
    fn invalid_version_rejected() {
        let mut config = Config::default();
        config.config_version = CURRENT_CONFIG_VERSION + 1;
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ValidationError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.daemon, DaemonConfig::default());
    }

    #[test]
    fn daemon_section_is_parsed() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"config_version = 1

[daemon]
host = "music.local"
port = 7000
command_timeout_secs = 5

[logging]
level = "debug"
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.daemon.address(), "music.local:7000");
        assert_eq!(config.daemon.command_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn zero_port_in_file_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[daemon]\nport = 0").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Validation(ValidationError::ZeroPort)
        ));
    }

    #[test]
    fn zero_timeout_in_file_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[daemon]\ncommand_timeout_secs = 0").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Validation(ValidationError::ZeroTimeout)
        ));
    }

    #[test]
    fn cli_overrides_take_precedence() {
        let config = Config::default();
        let daemon = config
            .resolve_daemon(Some("10.0.0.2"), Some(6603))
            .unwrap();
        assert_eq!(daemon.host, "10.0.0.2");
        assert_eq!(daemon.port, 6603);

        let err = config.resolve_daemon(Some("  "), None).unwrap_err();
        assert!(matches!(err, ValidationError::EmptyHost));
    }
}
