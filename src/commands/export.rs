//! Export command.

use super::{ExportFormat, ServiceContext};
use anyhow::Context;
use posturelog::models::{LogEntry, PostureEvent};
use posturelog::storage::{LogQuery, PostureLogStore, SortOrder};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Export command.
///
/// Writes every event in the optional date range, oldest first, to `output`
/// or stdout.
pub fn cmd_export(
    ctx: &ServiceContext,
    format: ExportFormat,
    output: Option<&Path>,
    start: Option<&str>,
    end: Option<&str>,
) -> anyhow::Result<()> {
    let aggregation = ctx.aggregation();
    let mut query = LogQuery::new().order(SortOrder::Ascending);
    query.since = start.map(|raw| aggregation.parse_date_bound(raw)).transpose()?;
    query.until = end.map(|raw| aggregation.parse_date_bound(raw)).transpose()?;

    let events = ctx.store.stream(query);
    let sink: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    let written = match format {
        ExportFormat::Csv => write_csv(events, sink)?,
        ExportFormat::Json => write_json(events, sink)?,
    };
    tracing::info!(events = written, format = ?format, "Exported posture log");
    Ok(())
}

/// Writes events as CSV with a header row. Returns the number of rows.
pub fn write_csv<I, W>(events: I, sink: W) -> anyhow::Result<usize>
where
    I: IntoIterator<Item = posturelog::Result<PostureEvent>>,
    W: Write,
{
    let mut writer = csv::Writer::from_writer(sink);
    let mut rows = 0;
    for event in events {
        writer.serialize(LogEntry::from(&event?))?;
        rows += 1;
    }
    writer.flush()?;
    Ok(rows)
}

/// Writes events as a pretty-printed JSON array. Returns the number of entries.
pub fn write_json<I, W>(events: I, mut sink: W) -> anyhow::Result<usize>
where
    I: IntoIterator<Item = posturelog::Result<PostureEvent>>,
    W: Write,
{
    let entries = events
        .into_iter()
        .map(|event| event.map(|e| LogEntry::from(&e)))
        .collect::<posturelog::Result<Vec<_>>>()?;
    serde_json::to_writer_pretty(&mut sink, &entries)?;
    writeln!(sink)?;
    sink.flush()?;
    Ok(entries.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use posturelog::models::PostureStatus;

    fn events() -> Vec<posturelog::Result<PostureEvent>> {
        let ts = Utc.with_ymd_and_hms(2024, 3, 4, 9, 30, 0).unwrap();
        vec![
            Ok(PostureEvent::new(ts, PostureStatus::Good, 101.5, 42).with_id("a")),
            Ok(PostureEvent::new(ts, PostureStatus::Bad, 80.0, 7).with_id("b")),
        ]
    }

    #[test]
    fn test_write_csv() {
        let mut out = Vec::new();
        assert_eq!(write_csv(events(), &mut out).unwrap(), 2);
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("_id,timestamp,postureType,angle,duration,notes")
        );
        assert_eq!(
            lines.next(),
            Some("a,2024-03-04T09:30:00+00:00,good,101.5,42,101.5° for 42s")
        );
        assert_eq!(lines.count(), 1);
    }

    #[test]
    fn test_write_json() {
        let mut out = Vec::new();
        assert_eq!(write_json(events(), &mut out).unwrap(), 2);
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value[1]["_id"], "b");
        assert_eq!(value[1]["postureType"], "bad");
    }

    #[test]
    fn test_store_error_aborts_export() {
        let mut failing = events();
        failing.push(Err(posturelog::Error::query("fetch_page", "locked")));
        assert!(write_csv(failing, Vec::new()).is_err());
    }
}
