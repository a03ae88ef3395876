//! Binary entry point for posturelog.
//!
//! This binary provides the CLI for the posture log: the dashboard server,
//! dashboard queries, export, sample data and landmark replay.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use clap::{CommandFactory, Parser, Subcommand};
use commands::{
    ConfigAction, ExportFormat, OutputFormat, ServiceContext, cmd_config, cmd_export, cmd_logs,
    cmd_month, cmd_replay, cmd_seed, cmd_serve, cmd_stats, cmd_today, cmd_week,
};
use posturelog::config::PostureConfig;
use posturelog::observability::{self, InitOptions};
use std::path::PathBuf;
use std::process::ExitCode;

/// posturelog - posture session tracking and dashboard.
#[derive(Parser)]
#[command(name = "posturelog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run the dashboard HTTP API.
    Serve {
        /// Bind host (overrides config).
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides config).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show current score and week-over-week change.
    Stats {
        /// Output format.
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Show today's events by minute.
    Today {
        /// Output format.
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Show the trailing week by weekday.
    Week {
        /// Output format.
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Show this month by date.
    Month {
        /// Output format.
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// List recent posture events, newest first.
    Logs {
        /// Maximum number of entries.
        #[arg(short, long)]
        limit: Option<usize>,

        /// Inclusive start (RFC 3339 or YYYY-MM-DD).
        #[arg(long)]
        start: Option<String>,

        /// Inclusive end (RFC 3339 or YYYY-MM-DD).
        #[arg(long)]
        end: Option<String>,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Export the posture log.
    Export {
        /// File format.
        #[arg(short, long, value_enum, default_value_t)]
        format: ExportFormat,

        /// Output file (stdout when omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Inclusive start (RFC 3339 or YYYY-MM-DD).
        #[arg(long)]
        start: Option<String>,

        /// Inclusive end (RFC 3339 or YYYY-MM-DD).
        #[arg(long)]
        end: Option<String>,
    },

    /// Fill the log with a month of random sample events.
    Seed,

    /// Replay a JSONL landmark recording through the session tracker.
    Replay {
        /// Recording with one landmark frame per line.
        path: PathBuf,

        /// Pace frames at the configured frame interval.
        #[arg(long)]
        realtime: bool,
    },

    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Main entry point.
#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(
            *shell,
            &mut Cli::command(),
            "posturelog",
            &mut std::io::stdout(),
        );
        return ExitCode::SUCCESS;
    }

    let config = match PostureConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let expose_metrics = matches!(cli.command, Commands::Serve { .. });
    let _observability = match observability::init_from_config(
        &config.observability,
        InitOptions {
            verbose: cli.verbose,
            metrics_expose: expose_metrics,
        },
    ) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        },
    };

    match run_command(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
async fn run_command(command: Commands, mut config: PostureConfig) -> anyhow::Result<()> {
    if let Commands::Config { action } = &command {
        return cmd_config(&config, action);
    }
    if let Commands::Serve { host, port } = &command {
        if let Some(host) = host {
            config.server.host.clone_from(host);
        }
        if let Some(port) = port {
            config.server.port = *port;
        }
    }

    let ctx = ServiceContext::open(config)?;
    match command {
        Commands::Serve { .. } => cmd_serve(&ctx).await,
        Commands::Stats { format } => cmd_stats(&ctx, format),
        Commands::Today { format } => cmd_today(&ctx, format),
        Commands::Week { format } => cmd_week(&ctx, format),
        Commands::Month { format } => cmd_month(&ctx, format),
        Commands::Logs {
            limit,
            start,
            end,
            format,
        } => cmd_logs(&ctx, limit, start.as_deref(), end.as_deref(), format),
        Commands::Export {
            format,
            output,
            start,
            end,
        } => cmd_export(
            &ctx,
            format,
            output.as_deref(),
            start.as_deref(),
            end.as_deref(),
        ),
        Commands::Seed => cmd_seed(&ctx),
        Commands::Replay { path, realtime } => cmd_replay(&ctx, &path, realtime).await,
        Commands::Config { .. } | Commands::Completions { .. } => Ok(()),
    }
}
