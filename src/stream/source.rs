//! Landmark frame sources.
//!
//! The pose-estimation service is external; these adapters turn its output
//! into [`SourcePoll`]s for the frame loop.

use crate::clock::{Clock, ManualClock};
use crate::models::LandmarkFrame;
use crate::{Error, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, TryRecvError};

/// Outcome of polling a source once.
#[derive(Debug, Clone, PartialEq)]
pub enum SourcePoll {
    /// A frame is available.
    Frame(LandmarkFrame),
    /// Nothing yet; poll again after a short back-off.
    NotReady,
    /// The source has ended.
    Exhausted,
}

/// A producer of pose frames.
///
/// `poll_frame` may block briefly (a camera read), but must not wait
/// indefinitely: the frame loop checks its stop flag between polls.
pub trait LandmarkSource: Send + 'static {
    /// Returns the next frame, if any.
    fn poll_frame(&mut self) -> SourcePoll;
}

/// Frames pushed from another thread over a channel.
///
/// Dropping every sender exhausts the source.
#[derive(Debug)]
pub struct ChannelSource {
    rx: Receiver<LandmarkFrame>,
}

impl ChannelSource {
    /// Wraps the receiving half of a frame channel.
    #[must_use]
    pub const fn new(rx: Receiver<LandmarkFrame>) -> Self {
        Self { rx }
    }
}

impl LandmarkSource for ChannelSource {
    fn poll_frame(&mut self) -> SourcePoll {
        match self.rx.try_recv() {
            Ok(frame) => SourcePoll::Frame(frame),
            Err(TryRecvError::Empty) => SourcePoll::NotReady,
            Err(TryRecvError::Disconnected) => SourcePoll::Exhausted,
        }
    }
}

/// Recorded frames, one JSON [`LandmarkFrame`] per line.
///
/// When constructed with a [`ManualClock`], the clock follows the
/// `captured_at` of each frame read so that the session flush on exhaustion
/// happens at the last recorded instant rather than wall-clock time.
pub struct JsonlLandmarkSource<R> {
    reader: R,
    clock: Option<Arc<ManualClock>>,
    line: String,
    line_no: usize,
    malformed: usize,
}

impl JsonlLandmarkSource<BufReader<File>> {
    /// Opens a JSONL recording.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the file cannot be opened.
    pub fn open(path: &Path, clock: Option<Arc<ManualClock>>) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            Error::operation("open_landmark_recording", format!("{}: {e}", path.display()))
        })?;
        Ok(Self::new(BufReader::new(file), clock))
    }
}

impl<R: BufRead> JsonlLandmarkSource<R> {
    /// Reads frames from any buffered reader.
    pub const fn new(reader: R, clock: Option<Arc<ManualClock>>) -> Self {
        Self {
            reader,
            clock,
            line: String::new(),
            line_no: 0,
            malformed: 0,
        }
    }

    /// Number of lines skipped because they were not valid frames.
    #[must_use]
    pub const fn malformed_lines(&self) -> usize {
        self.malformed
    }
}

impl<R: BufRead + Send + 'static> LandmarkSource for JsonlLandmarkSource<R> {
    fn poll_frame(&mut self) -> SourcePoll {
        loop {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => return SourcePoll::Exhausted,
                Ok(_) => {},
                Err(e) => {
                    tracing::warn!(line = self.line_no + 1, error = %e, "landmark recording unreadable");
                    return SourcePoll::Exhausted;
                },
            }
            self.line_no += 1;

            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<LandmarkFrame>(trimmed) {
                Ok(frame) => {
                    if let Some(clock) = &self.clock
                        && frame.captured_at > clock.now()
                    {
                        clock.set(frame.captured_at);
                    }
                    return SourcePoll::Frame(frame);
                },
                Err(e) => {
                    self.malformed += 1;
                    tracing::warn!(line = self.line_no, error = %e, "skipping malformed landmark frame");
                },
            }
        }
    }
}
