//! Per-connection stream lifecycle.
//!
//! A [`StreamController`] owns one landmark source and one frame sink. On
//! `start` it moves them into a tokio task running the frame loop with a
//! fresh [`SessionTracker`](crate::session::SessionTracker); on `stop` it
//! raises an atomic flag, waits for the loop to flush the open segment and
//! takes the source and sink back.
//!
//! ```text
//!            start                 stop / exhausted / disconnect
//!   Idle ──────────────▶ Running ─────────────────────────────▶ Idle
//!    ▲  start (no-op) ◀──┘                                        │
//!    └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The tracker lives inside the loop task; control messages only touch the
//! flag, so tracker state is never mutated from two contexts.

mod frame_loop;
mod sink;
mod source;

pub use frame_loop::SessionReport;
pub use sink::{ChannelSink, FramePosture, FrameSink, FrameUpdate, TracingSink};
pub use source::{ChannelSource, JsonlLandmarkSource, LandmarkSource, SourcePoll};

use crate::clock::Clock;
use crate::session::CHECKPOINT_INTERVAL_SECS;
use crate::storage::EventWriter;
use crate::{Error, Result};
use frame_loop::{LoopContext, LoopOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Default pause after each processed frame (~30 fps).
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Pause before polling again when the source has no frame ready.
pub const DEFAULT_NOT_READY_BACKOFF: Duration = Duration::from_millis(10);

/// Frame loop timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    /// Pause after each processed frame. Zero only yields to the runtime.
    pub frame_interval: Duration,
    /// Pause when the source is not ready.
    pub not_ready_backoff: Duration,
    /// Seconds after which a long segment is checkpointed.
    pub checkpoint_interval_secs: u64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            frame_interval: DEFAULT_FRAME_INTERVAL,
            not_ready_backoff: DEFAULT_NOT_READY_BACKOFF,
            checkpoint_interval_secs: CHECKPOINT_INTERVAL_SECS,
        }
    }
}

/// Control message from the client: `{"command": "start" | "stop"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum ControlCommand {
    /// Begin (or keep) processing frames.
    Start,
    /// Stop processing and flush the open segment.
    Stop,
}

impl ControlCommand {
    /// Parses a raw control message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for malformed JSON or unknown commands.
    pub fn parse(message: &str) -> Result<Self> {
        serde_json::from_str(message)
            .map_err(|e| Error::InvalidInput(format!("invalid control message: {e}")))
    }
}

enum ControllerState {
    Idle {
        source: Box<dyn LandmarkSource>,
        sink: Box<dyn FrameSink>,
    },
    Running {
        stop: Arc<AtomicBool>,
        task: JoinHandle<LoopOutcome>,
    },
    Released,
}

/// Cloneable request to stop a running loop, usable from outside the runtime
/// (e.g. a signal handler). The controller still collects the report.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Raises the stop flag; the loop exits before its next frame.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Start/stop lifecycle for one client stream.
pub struct StreamController {
    state: ControllerState,
    clock: Arc<dyn Clock>,
    writer: EventWriter,
    settings: StreamSettings,
}

impl StreamController {
    /// Creates an idle controller.
    #[must_use]
    pub fn new(
        source: Box<dyn LandmarkSource>,
        sink: Box<dyn FrameSink>,
        clock: Arc<dyn Clock>,
        writer: EventWriter,
        settings: StreamSettings,
    ) -> Self {
        Self {
            state: ControllerState::Idle { source, sink },
            clock,
            writer,
            settings,
        }
    }

    /// Returns true while the frame loop task has not finished.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(&self.state, ControllerState::Running { task, .. } if !task.is_finished())
    }

    /// Handle for stopping the current run, `None` unless running.
    #[must_use]
    pub fn stop_handle(&self) -> Option<StopHandle> {
        match &self.state {
            ControllerState::Running { stop, .. } => Some(StopHandle(Arc::clone(stop))),
            _ => None,
        }
    }

    /// Starts the frame loop on the current tokio runtime.
    ///
    /// Returns `false` without side effects if the loop is already running.
    /// A loop that ended on its own (source exhausted, client gone) is
    /// collected first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] after [`disconnect`](Self::disconnect)
    /// and [`Error::OperationFailed`] if a finished loop task panicked.
    pub async fn start(&mut self) -> Result<bool> {
        if self.is_running() {
            tracing::debug!("start ignored: stream already running");
            return Ok(false);
        }
        if matches!(self.state, ControllerState::Running { .. }) {
            self.collect(false).await?;
        }

        let (source, sink) = match std::mem::replace(&mut self.state, ControllerState::Released) {
            ControllerState::Idle { source, sink } => (source, sink),
            other => {
                self.state = other;
                return Err(Error::InvalidInput("stream has been released".to_string()));
            },
        };

        let stop = Arc::new(AtomicBool::new(false));
        let ctx = LoopContext {
            clock: Arc::clone(&self.clock),
            writer: self.writer.clone(),
            stop: Arc::clone(&stop),
            frame_interval: self.settings.frame_interval,
            not_ready_backoff: self.settings.not_ready_backoff,
            checkpoint_interval_secs: self.settings.checkpoint_interval_secs,
        };
        let task = tokio::spawn(frame_loop::run(source, sink, ctx));
        self.state = ControllerState::Running { stop, task };
        Ok(true)
    }

    /// Stops the frame loop and waits for the final flush.
    ///
    /// Returns the loop report, or `None` if the stream was idle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the loop task panicked; the
    /// source and sink are lost in that case.
    pub async fn stop(&mut self) -> Result<Option<SessionReport>> {
        self.collect(true).await
    }

    /// Waits for the loop to end on its own (source exhausted or client gone).
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the loop task panicked.
    pub async fn wait(&mut self) -> Result<Option<SessionReport>> {
        self.collect(false).await
    }

    /// Applies a raw `{"command": ...}` message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for malformed messages; see
    /// [`start`](Self::start) and [`stop`](Self::stop) otherwise.
    pub async fn handle_message(&mut self, message: &str) -> Result<Option<SessionReport>> {
        match ControlCommand::parse(message)? {
            ControlCommand::Start => {
                self.start().await?;
                Ok(None)
            },
            ControlCommand::Stop => self.stop().await,
        }
    }

    /// Stops the loop and releases the source and sink.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the loop task panicked.
    pub async fn disconnect(mut self) -> Result<Option<SessionReport>> {
        let report = self.collect(true).await?;
        self.state = ControllerState::Released;
        Ok(report)
    }

    async fn collect(&mut self, signal_stop: bool) -> Result<Option<SessionReport>> {
        if !matches!(self.state, ControllerState::Running { .. }) {
            return Ok(None);
        }
        let ControllerState::Running { stop, task } =
            std::mem::replace(&mut self.state, ControllerState::Released)
        else {
            return Ok(None);
        };

        if signal_stop {
            stop.store(true, Ordering::Release);
        }
        let outcome = task
            .await
            .map_err(|e| Error::operation("join_frame_loop", e))?;
        self.state = ControllerState::Idle {
            source: outcome.source,
            sink: outcome.sink,
        };
        Ok(Some(outcome.report))
    }
}

impl Drop for StreamController {
    /// A dropped controller still stops its loop; the open segment is
    /// flushed by the detached task.
    fn drop(&mut self) {
        if let ControllerState::Running { stop, .. } = &self.state {
            stop.store(true, Ordering::Release);
        }
    }
}
