//! Replay command.

use super::{ServiceContext, print_json};
use chrono::Utc;
use posturelog::clock::ManualClock;
use posturelog::storage::{EventWriter, PostureLogStore};
use posturelog::stream::{JsonlLandmarkSource, StreamController, StreamSettings, TracingSink};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(Serialize)]
struct ReplaySummary {
    #[serde(flatten)]
    session: posturelog::stream::SessionReport,
    events_written: u64,
    write_failures: u64,
}

/// Replay command.
///
/// Feeds a JSONL landmark recording through a stream controller. The clock
/// follows the frame timestamps, so durations match the recording. Frames
/// are processed as fast as possible unless `realtime` is set. Ctrl-C stops
/// the replay and flushes the open segment.
pub async fn cmd_replay(ctx: &ServiceContext, path: &Path, realtime: bool) -> anyhow::Result<()> {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let source = JsonlLandmarkSource::open(path, Some(clock.clone()))?;

    let store: Arc<dyn PostureLogStore> = ctx.store.clone();
    let (writer, writer_handle) =
        EventWriter::spawn(store, ctx.config.stream.writer_queue_capacity)?;

    let settings = if realtime {
        ctx.config.stream_settings()
    } else {
        StreamSettings {
            frame_interval: Duration::ZERO,
            ..ctx.config.stream_settings()
        }
    };
    let mut controller =
        StreamController::new(Box::new(source), Box::new(TracingSink), clock, writer, settings);

    controller.start().await?;
    if let Some(stop) = controller.stop_handle() {
        ctrlc::set_handler(move || stop.stop())?;
    }
    let report = controller.wait().await?.unwrap_or_default();
    controller.disconnect().await?;

    let stats = writer_handle.join()?;
    print_json(&ReplaySummary {
        session: report,
        events_written: stats.written,
        write_failures: stats.failed,
    })
}
