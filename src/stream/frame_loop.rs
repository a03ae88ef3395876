//! The per-stream frame loop.

use super::sink::{FrameSink, FrameUpdate};
use super::source::{LandmarkSource, SourcePoll};
use crate::classifier::classify_frame;
use crate::clock::Clock;
use crate::models::PostureEvent;
use crate::session::SessionTracker;
use crate::storage::EventWriter;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Counters for one run of the frame loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    /// Frames read from the source.
    pub frames: u64,
    /// Frames classified and accepted by the tracker.
    pub classified: u64,
    /// Frames without a usable pose or rejected by the tracker.
    pub skipped: u64,
    /// Posture events handed to the writer, including the final flush.
    pub events_emitted: u64,
    /// Events the writer queue refused.
    pub events_dropped: u64,
    /// True if the loop ended because the sink went away.
    pub disconnected: bool,
}

/// Everything the loop needs besides its source and sink.
pub(super) struct LoopContext {
    pub clock: Arc<dyn Clock>,
    pub writer: EventWriter,
    pub stop: Arc<AtomicBool>,
    pub frame_interval: Duration,
    pub not_ready_backoff: Duration,
    pub checkpoint_interval_secs: u64,
}

/// Source and sink handed back to the controller when the loop exits.
pub(super) struct LoopOutcome {
    pub source: Box<dyn LandmarkSource>,
    pub sink: Box<dyn FrameSink>,
    pub report: SessionReport,
}

/// Runs until stopped, disconnected or the source is exhausted, then flushes
/// the open segment at `clock.now()`.
pub(super) async fn run(
    mut source: Box<dyn LandmarkSource>,
    mut sink: Box<dyn FrameSink>,
    ctx: LoopContext,
) -> LoopOutcome {
    let mut tracker = SessionTracker::new(ctx.checkpoint_interval_secs);
    let mut report = SessionReport::default();
    tracing::info!("posture stream started");
    metrics::counter!("posture_stream_sessions_total").increment(1);

    while !ctx.stop.load(Ordering::Acquire) {
        let frame = match source.poll_frame() {
            SourcePoll::Frame(frame) => frame,
            SourcePoll::NotReady => {
                tokio::time::sleep(ctx.not_ready_backoff).await;
                continue;
            },
            SourcePoll::Exhausted => {
                tracing::debug!("landmark source exhausted");
                break;
            },
        };
        report.frames += 1;

        let update = match classify_frame(&frame) {
            Ok(Some(classification)) => {
                match tracker.observe(&classification) {
                    Ok(observed) => {
                        report.classified += 1;
                        metrics::counter!("posture_frames_total", "outcome" => "classified")
                            .increment(1);
                        if let Some(event) = observed {
                            emit(&ctx.writer, event, &mut report);
                        }
                    },
                    Err(e) => {
                        report.skipped += 1;
                        metrics::counter!("posture_frames_total", "outcome" => "out_of_order")
                            .increment(1);
                        tracing::warn!(error = %e, "classification rejected by tracker");
                    },
                }
                FrameUpdate::classified(&classification)
            },
            Ok(None) => {
                report.skipped += 1;
                metrics::counter!("posture_frames_total", "outcome" => "no_pose").increment(1);
                FrameUpdate::unknown()
            },
            Err(e) => {
                report.skipped += 1;
                metrics::counter!("posture_frames_total", "outcome" => "degenerate").increment(1);
                tracing::debug!(error = %e, "skipping degenerate frame");
                FrameUpdate::unknown()
            },
        };

        if let Err(e) = sink.publish(&update) {
            tracing::info!(error = %e, "client disconnected");
            report.disconnected = true;
            break;
        }

        if ctx.frame_interval.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(ctx.frame_interval).await;
        }
    }

    if let Some(event) = tracker.stop(ctx.clock.now()) {
        emit(&ctx.writer, event, &mut report);
    }

    tracing::info!(
        frames = report.frames,
        classified = report.classified,
        skipped = report.skipped,
        events = report.events_emitted,
        "posture stream stopped"
    );
    LoopOutcome {
        source,
        sink,
        report,
    }
}

fn emit(writer: &EventWriter, event: PostureEvent, report: &mut SessionReport) {
    metrics::counter!("posture_events_emitted_total", "status" => event.status.as_str())
        .increment(1);
    tracing::debug!(
        status = %event.status,
        angle = event.angle,
        duration_seconds = event.duration_seconds,
        "posture event emitted"
    );
    report.events_emitted += 1;
    if !writer.submit(event) {
        report.events_dropped += 1;
    }
}
