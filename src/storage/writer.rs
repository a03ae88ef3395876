//! Background event persistence.
//!
//! The frame loop must never block on storage. Events are handed to a bounded
//! queue drained by a dedicated writer thread; when the queue is full the
//! event is dropped and counted.

use super::traits::PostureLogStore;
use crate::models::PostureEvent;
use crate::{Error, Result};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};

/// Default queue capacity between the frame loop and the writer thread.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Totals reported when the writer thread exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Events appended to the store.
    pub written: u64,
    /// Events the store rejected.
    pub failed: u64,
}

/// Cloneable, non-blocking handle for submitting events.
#[derive(Debug, Clone)]
pub struct EventWriter {
    tx: SyncSender<PostureEvent>,
}

/// Owns the writer thread. Join it after every [`EventWriter`] is dropped.
#[derive(Debug)]
pub struct WriterHandle {
    thread: JoinHandle<WriterStats>,
}

impl EventWriter {
    /// Starts a writer thread appending to `store`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the thread cannot be spawned.
    pub fn spawn(
        store: Arc<dyn PostureLogStore>,
        capacity: usize,
    ) -> Result<(Self, WriterHandle)> {
        let (tx, rx) = mpsc::sync_channel(capacity.max(1));
        let thread = thread::Builder::new()
            .name("posture-event-writer".to_string())
            .spawn(move || drain(store.as_ref(), &rx))
            .map_err(|e| Error::operation("spawn_event_writer", e))?;
        Ok((Self { tx }, WriterHandle { thread }))
    }

    /// Queues `event` for persistence without blocking.
    ///
    /// Returns `false` if the event was dropped because the queue is full or
    /// the writer has stopped.
    pub fn submit(&self, event: PostureEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => {
                metrics::counter!("posture_events_queued_total").increment(1);
                true
            },
            Err(TrySendError::Full(event)) => {
                tracing::warn!(event_id = %event.id, "event queue full, dropping posture event");
                metrics::counter!("posture_events_dropped_total", "reason" => "queue_full")
                    .increment(1);
                false
            },
            Err(TrySendError::Disconnected(event)) => {
                tracing::warn!(event_id = %event.id, "event writer stopped, dropping posture event");
                metrics::counter!("posture_events_dropped_total", "reason" => "disconnected")
                    .increment(1);
                false
            },
        }
    }
}

impl WriterHandle {
    /// Waits for the writer thread to drain the queue and exit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the writer thread panicked.
    pub fn join(self) -> Result<WriterStats> {
        self.thread
            .join()
            .map_err(|_| Error::operation("join_event_writer", "writer thread panicked"))
    }
}

fn drain(store: &dyn PostureLogStore, rx: &Receiver<PostureEvent>) -> WriterStats {
    let mut stats = WriterStats::default();
    for event in rx {
        match store.append(&event) {
            Ok(()) => {
                stats.written += 1;
                tracing::debug!(
                    event_id = %event.id,
                    status = %event.status,
                    duration_seconds = event.duration_seconds,
                    "posture event persisted"
                );
            },
            Err(e) => {
                stats.failed += 1;
                tracing::warn!(event_id = %event.id, error = %e, "failed to persist posture event");
                metrics::counter!(
                    "posture_event_write_failures_total",
                    "backend" => store.name()
                )
                .increment(1);
            },
        }
    }
    tracing::debug!(written = stats.written, failed = stats.failed, "event writer stopped");
    stats
}
