//! Command handlers.
//!
//! - `dashboard.rs`: stats, today, week, month and logs queries
//! - `export.rs`: CSV/JSON export of the posture log
//! - `seed.rs`: sample data generation
//! - `replay.rs`: feeding a landmark recording through the stream controller
//! - `serve.rs`: the dashboard HTTP server
//! - `config.rs`: configuration display

mod config;
mod dashboard;
mod export;
mod replay;
mod seed;
mod serve;

pub use config::cmd_config;
pub use dashboard::{cmd_logs, cmd_month, cmd_stats, cmd_today, cmd_week};
pub use export::cmd_export;
pub use replay::cmd_replay;
pub use seed::cmd_seed;
pub use serve::cmd_serve;

use anyhow::Context;
use clap::{Subcommand, ValueEnum};
use posturelog::clock::{Clock, SystemClock};
use posturelog::config::PostureConfig;
use posturelog::services::{AggregationService, ManualLogService};
use posturelog::storage::SqlitePostureStore;
use std::sync::Arc;

/// Output format for query commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Aligned text.
    #[default]
    Table,
    /// The same JSON the HTTP API returns.
    Json,
}

/// Export file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ExportFormat {
    /// Comma-separated values with a header row.
    #[default]
    Csv,
    /// A JSON array of log entries.
    Json,
}

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
    /// Print the config file locations that are searched.
    Path,
}

/// Store, clock and configuration shared by the command handlers.
pub struct ServiceContext {
    /// Effective configuration.
    pub config: PostureConfig,
    /// The on-disk log store.
    pub store: Arc<SqlitePostureStore>,
    /// Wall clock.
    pub clock: Arc<dyn Clock>,
}

impl ServiceContext {
    /// Opens the configured database, creating it if needed.
    pub fn open(config: PostureConfig) -> anyhow::Result<Self> {
        let path = config.database_path();
        let store = SqlitePostureStore::new(path.clone())
            .with_context(|| format!("opening posture log at {}", path.display()))?;
        Ok(Self {
            config,
            store: Arc::new(store),
            clock: Arc::new(SystemClock),
        })
    }

    /// Dashboard queries with the configured offset and limits.
    pub fn aggregation(&self) -> AggregationService {
        let dashboard = &self.config.dashboard;
        AggregationService::new(self.store.clone(), self.clock.clone())
            .with_offset(dashboard.utc_offset)
            .with_log_limits(dashboard.default_log_limit, dashboard.max_log_limit)
    }

    /// Manual log creation.
    pub fn manual_logs(&self) -> ManualLogService {
        ManualLogService::new(self.store.clone(), self.clock.clone())
    }
}

/// Pretty-prints `value` as JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
