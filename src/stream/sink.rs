//! Per-frame status consumers.

use crate::models::{Classification, PostureStatus};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::error::TrySendError;

/// Posture label shown to the client for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FramePosture {
    /// Hip angle above the threshold.
    #[serde(rename = "Good Posture")]
    Good,
    /// Hip angle at or below the threshold.
    #[serde(rename = "Bad Posture")]
    Bad,
    /// No usable pose in the frame.
    Unknown,
}

impl From<PostureStatus> for FramePosture {
    fn from(status: PostureStatus) -> Self {
        match status {
            PostureStatus::Good => Self::Good,
            PostureStatus::Bad => Self::Bad,
        }
    }
}

/// Status message sent to the client after every processed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameUpdate {
    /// Label for the frame.
    pub posture: FramePosture,
    /// Hip angle truncated to whole degrees (0 when unknown).
    pub angle: i64,
}

impl FrameUpdate {
    /// Update for a frame with no usable pose.
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            posture: FramePosture::Unknown,
            angle: 0,
        }
    }

    /// Update for a classified frame.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn classified(classification: &Classification) -> Self {
        Self {
            posture: classification.label.into(),
            angle: classification.angle.trunc() as i64,
        }
    }
}

/// Receiver of per-frame updates.
///
/// An error means the client is gone; the frame loop stops as if
/// disconnected.
pub trait FrameSink: Send + 'static {
    /// Delivers one update.
    ///
    /// # Errors
    ///
    /// Returns an error when the client can no longer receive updates.
    fn publish(&mut self, update: &FrameUpdate) -> Result<()>;
}

/// Forwards updates over a bounded tokio channel.
///
/// A full channel drops the update: a slow client sees fewer frames but never
/// slows classification.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<FrameUpdate>,
}

impl ChannelSink {
    /// Wraps the sending half of an update channel.
    #[must_use]
    pub const fn new(tx: Sender<FrameUpdate>) -> Self {
        Self { tx }
    }
}

impl FrameSink for ChannelSink {
    fn publish(&mut self, update: &FrameUpdate) -> Result<()> {
        match self.tx.try_send(*update) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                metrics::counter!("posture_frame_updates_dropped_total").increment(1);
                Ok(())
            },
            Err(TrySendError::Closed(_)) => Err(Error::operation(
                "publish_frame_update",
                "client channel closed",
            )),
        }
    }
}

/// Logs updates at trace level; used when nobody is watching (replay).
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl FrameSink for TracingSink {
    fn publish(&mut self, update: &FrameUpdate) -> Result<()> {
        tracing::trace!(posture = ?update.posture, angle = update.angle, "frame update");
        Ok(())
    }
}
