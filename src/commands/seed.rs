//! Seed command.

use super::ServiceContext;
use chrono::{DateTime, Duration, Utc};
use posturelog::services::seed::sample_events;
use posturelog::storage::{LogQuery, PostureLogStore};

/// Seed command.
///
/// Appends a month of random sample events ending now.
pub fn cmd_seed(ctx: &ServiceContext) -> anyhow::Result<()> {
    let now = ctx.clock.now();
    let offset = ctx.config.dashboard.utc_offset;
    let events = sample_events(now, offset, &mut rand::rng());

    println!("Creating sample posture data...");
    for event in &events {
        ctx.store.append(event)?;
    }
    println!("Created {} posture log entries.", events.len());

    let local_midnight = now
        .with_timezone(&offset)
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(offset).single())
        .map_or(now, |midnight| midnight.to_utc());
    let count_since = |since: DateTime<Utc>| ctx.store.count(&LogQuery::new().since(since).until(now));

    println!();
    println!("Summary:");
    println!("  Today's logs: {}", count_since(local_midnight)?);
    println!("  This week:    {}", count_since(now - Duration::days(7))?);
    println!("  This month:   {}", count_since(now - Duration::days(30))?);
    Ok(())
}
