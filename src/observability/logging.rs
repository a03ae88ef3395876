//! Structured logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parses a format name. Unknown names fall back to [`LogFormat::Pretty`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// `EnvFilter` directive string.
    pub filter: String,
    /// Optional append-only log file. Logs go to stderr otherwise.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Builds logging configuration from config settings with env overrides.
    #[must_use]
    pub fn from_settings(settings: Option<&LoggingSettings>, verbose: bool) -> Self {
        Self::from_settings_with(settings, verbose, &|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_settings`], reading the environment through `lookup`.
    ///
    /// Filter precedence: `POSTURELOG_LOG`, `RUST_LOG`, the config file, then
    /// `debug` with `verbose` or `info` without.
    #[must_use]
    pub fn from_settings_with(
        settings: Option<&LoggingSettings>,
        verbose: bool,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Self {
        let non_empty = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let default_filter = if verbose { "debug" } else { "info" };
        let filter = non_empty(lookup("POSTURELOG_LOG"))
            .or_else(|| non_empty(lookup("RUST_LOG")))
            .or_else(|| non_empty(settings.and_then(|s| s.filter.clone())))
            .unwrap_or_else(|| default_filter.to_string());

        let format = non_empty(lookup("POSTURELOG_LOG_FORMAT"))
            .or_else(|| settings.and_then(|s| s.format.clone()))
            .map_or(LogFormat::Pretty, |f| LogFormat::parse(&f));

        let file = non_empty(lookup("POSTURELOG_LOG_FILE"))
            .or_else(|| non_empty(settings.and_then(|s| s.file.clone())))
            .map(PathBuf::from);

        Self {
            format,
            filter,
            file,
        }
    }
}
