//! Dashboard query commands.

use super::{OutputFormat, ServiceContext, print_json};
use posturelog::models::DataResponse;
use posturelog::services::RecentLogsQuery;

/// Stats command.
pub fn cmd_stats(ctx: &ServiceContext, format: OutputFormat) -> anyhow::Result<()> {
    let summary = ctx.aggregation().summary()?;
    match format {
        OutputFormat::Json => print_json(&summary),
        OutputFormat::Table => {
            println!("Current score:   {:>6.1}°", summary.current_score);
            println!("Weekly average:  {:>6.1}°", summary.weekly_average);
            println!("Weekly change:   {:>+6.1}°", summary.weekly_change);
            Ok(())
        },
    }
}

/// Today command.
pub fn cmd_today(ctx: &ServiceContext, format: OutputFormat) -> anyhow::Result<()> {
    let rows = ctx.aggregation().today()?;
    match format {
        OutputFormat::Json => print_json(&DataResponse::new(rows)),
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("No posture events today.");
            }
            println!("{:<6} {:>8} {:>8} {:>7}", "TIME", "GOOD(s)", "POOR(s)", "SCORE");
            for row in rows {
                println!(
                    "{:<6} {:>8} {:>8} {:>7.1}",
                    row.time, row.good, row.poor, row.score
                );
            }
            Ok(())
        },
    }
}

/// Week command.
pub fn cmd_week(ctx: &ServiceContext, format: OutputFormat) -> anyhow::Result<()> {
    let rows = ctx.aggregation().week()?;
    match format {
        OutputFormat::Json => print_json(&DataResponse::new(rows)),
        OutputFormat::Table => {
            println!("{:<4} {:>7} {:>9}", "DAY", "SCORE", "SESSIONS");
            for row in rows {
                println!("{:<4} {:>7.1} {:>9}", row.day, row.score, row.sessions);
            }
            Ok(())
        },
    }
}

/// Month command.
pub fn cmd_month(ctx: &ServiceContext, format: OutputFormat) -> anyhow::Result<()> {
    let rows = ctx.aggregation().month()?;
    match format {
        OutputFormat::Json => print_json(&DataResponse::new(rows)),
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("No posture events this month.");
            }
            println!("{:<6} {:>7} {:>9}", "DATE", "SCORE", "SESSIONS");
            for row in rows {
                println!("{:<6} {:>7.1} {:>9}", row.date, row.score, row.sessions);
            }
            Ok(())
        },
    }
}

/// Logs command.
pub fn cmd_logs(
    ctx: &ServiceContext,
    limit: Option<usize>,
    start: Option<&str>,
    end: Option<&str>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let service = ctx.aggregation();
    let request = RecentLogsQuery {
        limit,
        start: start.map(|raw| service.parse_date_bound(raw)).transpose()?,
        end: end.map(|raw| service.parse_date_bound(raw)).transpose()?,
    };
    let rows = service.recent_logs(request)?;
    match format {
        OutputFormat::Json => print_json(&DataResponse::new(rows)),
        OutputFormat::Table => {
            for row in rows {
                println!(
                    "{}  {:<4}  {}  {}",
                    row.timestamp, row.posture_type, row.notes, row.id
                );
            }
            Ok(())
        },
    }
}
