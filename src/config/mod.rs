//! Configuration management.
//!
//! Values are layered: built-in defaults, then a TOML file, then
//! `POSTURELOG_*` environment variables.

use crate::stream::StreamSettings;
use crate::{Error, Result};
use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application directory name used under the platform config and data dirs.
const APP_DIR: &str = "posturelog";

/// Database file name inside `data_dir` when no explicit path is configured.
const DEFAULT_DB_FILE: &str = "posture_logs.db";

/// Main configuration for posturelog.
#[derive(Debug, Clone)]
pub struct PostureConfig {
    /// Directory holding the database and other local state.
    pub data_dir: PathBuf,
    /// Explicit database path. Defaults to `data_dir/posture_logs.db`.
    pub database_path: Option<PathBuf>,
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Frame loop and writer settings.
    pub stream: StreamConfig,
    /// Dashboard aggregation settings.
    pub dashboard: DashboardConfig,
    /// Logging and metrics settings, resolved by [`crate::observability`].
    pub observability: ObservabilitySettings,
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

/// Frame loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Milliseconds between processed frames.
    pub frame_interval_ms: u64,
    /// Seconds after which a long segment is checkpointed.
    pub checkpoint_interval_secs: u64,
    /// Capacity of the queue in front of the event writer.
    pub writer_queue_capacity: usize,
}

/// Dashboard settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardConfig {
    /// Offset used for "today", weekday and month boundaries.
    pub utc_offset: FixedOffset,
    /// Recent-log limit when the caller gives none.
    pub default_log_limit: usize,
    /// Upper bound on any recent-log limit.
    pub max_log_limit: usize,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    /// Data directory.
    pub data_dir: Option<String>,
    /// Database path.
    pub database_path: Option<String>,
    /// Server section.
    pub server: Option<ConfigFileServer>,
    /// Stream section.
    pub stream: Option<ConfigFileStream>,
    /// Dashboard section.
    pub dashboard: Option<ConfigFileDashboard>,
    /// Observability section.
    pub observability: Option<ObservabilitySettings>,
}

/// Server section in config file.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigFileServer {
    /// Bind host.
    pub host: Option<String>,
    /// Bind port.
    pub port: Option<u16>,
}

/// Stream section in config file.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigFileStream {
    /// Frame interval in milliseconds.
    pub frame_interval_ms: Option<u64>,
    /// Checkpoint interval in seconds.
    pub checkpoint_interval_secs: Option<u64>,
    /// Writer queue capacity.
    pub writer_queue_capacity: Option<usize>,
}

/// Dashboard section in config file.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigFileDashboard {
    /// Offset such as `+02:00`, `-0530` or `Z`.
    pub utc_offset: Option<String>,
    /// Default recent-log limit.
    pub default_log_limit: Option<usize>,
    /// Maximum recent-log limit.
    pub max_log_limit: Option<usize>,
}

/// Observability section in config file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ObservabilitySettings {
    /// Logging settings.
    pub logging: Option<LoggingSettings>,
    /// Metrics settings.
    pub metrics: Option<MetricsSettings>,
}

/// Logging settings in config file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// `EnvFilter` directive, e.g. `posturelog=debug`.
    pub filter: Option<String>,
    /// Append logs to this file instead of stderr.
    pub file: Option<String>,
}

/// Metrics settings in config file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MetricsSettings {
    /// Whether the Prometheus exporter is installed.
    pub enabled: Option<bool>,
    /// Exporter listen port.
    pub port: Option<u16>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 33,
            checkpoint_interval_secs: crate::session::CHECKPOINT_INTERVAL_SECS,
            writer_queue_capacity: crate::storage::writer::DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            utc_offset: utc(),
            default_log_limit: crate::services::DEFAULT_LOG_LIMIT,
            max_log_limit: crate::services::MAX_LOG_LIMIT,
        }
    }
}

impl Default for PostureConfig {
    fn default() -> Self {
        let data_dir = directories::BaseDirs::new().map_or_else(
            || PathBuf::from(".posturelog"),
            |dirs| dirs.data_dir().join(APP_DIR),
        );
        Self {
            data_dir,
            database_path: None,
            server: ServerConfig::default(),
            stream: StreamConfig::default(),
            dashboard: DashboardConfig::default(),
            observability: ObservabilitySettings::default(),
        }
    }
}

impl PostureConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if it names
    /// an invalid UTC offset.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| Error::operation("read_config_file", e))?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for [`ConfigFile`].
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| Error::operation("parse_config_file", e))?;
        Self::from_config_file(file)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/posturelog/` on macOS)
    /// 2. XDG config dir (`~/.config/posturelog/` for Unix compatibility)
    ///
    /// Returns default configuration if no readable config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let candidates = [
            base_dirs.config_dir().join(APP_DIR).join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join(APP_DIR)
                .join("config.toml"),
        ];
        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load_from_file(path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config file");
                },
            }
        }

        Self::default()
    }

    /// Resolves configuration for a process: explicit path, then
    /// `POSTURELOG_CONFIG_PATH`, then the default locations, followed by
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named file cannot be loaded or an
    /// override is malformed.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var_os("POSTURELOG_CONFIG_PATH").map(PathBuf::from);
        let mut config = match explicit.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::load_default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies `POSTURELOG_*` overrides read through `lookup`.
    ///
    /// Recognised keys: `POSTURELOG_DATA_DIR`, `POSTURELOG_DATABASE_PATH`,
    /// `POSTURELOG_HOST`, `POSTURELOG_PORT`, `POSTURELOG_UTC_OFFSET`.
    /// Logging and metrics keys are resolved in [`crate::observability`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unparsable port or offset.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(dir) = get("POSTURELOG_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(path) = get("POSTURELOG_DATABASE_PATH") {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(host) = get("POSTURELOG_HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("POSTURELOG_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| Error::InvalidInput(format!("POSTURELOG_PORT: invalid port '{port}'")))?;
        }
        if let Some(offset) = get("POSTURELOG_UTC_OFFSET") {
            self.dashboard.utc_offset = parse_utc_offset(&offset)?;
        }
        Ok(())
    }

    /// Converts a [`ConfigFile`] to [`PostureConfig`].
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(data_dir) = file.data_dir {
            config.data_dir = PathBuf::from(data_dir);
        }
        config.database_path = file.database_path.map(PathBuf::from);
        if let Some(server) = file.server {
            if let Some(host) = server.host {
                config.server.host = host;
            }
            if let Some(port) = server.port {
                config.server.port = port;
            }
        }
        if let Some(stream) = file.stream {
            if let Some(v) = stream.frame_interval_ms {
                config.stream.frame_interval_ms = v;
            }
            if let Some(v) = stream.checkpoint_interval_secs {
                config.stream.checkpoint_interval_secs = v;
            }
            if let Some(v) = stream.writer_queue_capacity {
                config.stream.writer_queue_capacity = v;
            }
        }
        if let Some(dashboard) = file.dashboard {
            if let Some(offset) = dashboard.utc_offset {
                config.dashboard.utc_offset = parse_utc_offset(&offset)?;
            }
            if let Some(v) = dashboard.default_log_limit {
                config.dashboard.default_log_limit = v;
            }
            if let Some(v) = dashboard.max_log_limit {
                config.dashboard.max_log_limit = v;
            }
        }
        if let Some(observability) = file.observability {
            config.observability = observability;
        }

        Ok(config)
    }

    /// Converts back to the file form, e.g. for `config show`.
    #[must_use]
    pub fn to_config_file(&self) -> ConfigFile {
        ConfigFile {
            data_dir: Some(self.data_dir.display().to_string()),
            database_path: Some(self.database_path().display().to_string()),
            server: Some(ConfigFileServer {
                host: Some(self.server.host.clone()),
                port: Some(self.server.port),
            }),
            stream: Some(ConfigFileStream {
                frame_interval_ms: Some(self.stream.frame_interval_ms),
                checkpoint_interval_secs: Some(self.stream.checkpoint_interval_secs),
                writer_queue_capacity: Some(self.stream.writer_queue_capacity),
            }),
            dashboard: Some(ConfigFileDashboard {
                utc_offset: Some(self.dashboard.utc_offset.to_string()),
                default_log_limit: Some(self.dashboard.default_log_limit),
                max_log_limit: Some(self.dashboard.max_log_limit),
            }),
            observability: Some(self.observability.clone()),
        }
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Sets an explicit database path.
    #[must_use]
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// The SQLite file the log store opens.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join(DEFAULT_DB_FILE))
    }

    /// `host:port` for the HTTP listener.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Frame loop settings derived from the stream section.
    #[must_use]
    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            frame_interval: Duration::from_millis(self.stream.frame_interval_ms),
            checkpoint_interval_secs: self.stream.checkpoint_interval_secs,
            ..StreamSettings::default()
        }
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

/// Parses `Z`, `UTC`, `+HH`, `+HH:MM` or `+HHMM` (sign required otherwise).
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for anything else or offsets of a day or more.
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset> {
    let invalid = || Error::InvalidInput(format!("invalid UTC offset '{raw}'"));
    let s = raw.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return Ok(utc());
    }

    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => return Err(invalid()),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) || rest.matches(':').count() > 1 {
        return Err(invalid());
    }
    let (hours, minutes) = match digits.len() {
        2 => (&digits[..2], "0"),
        4 => (&digits[..2], &digits[2..]),
        _ => return Err(invalid()),
    };
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if minutes >= 60 {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}
