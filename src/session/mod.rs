//! Posture session state machine.
//!
//! A [`SessionTracker`] consumes classifications for one stream, in timestamp
//! order, and turns them into discrete [`PostureEvent`]s.
//!
//! # States
//!
//! | State | Meaning |
//! |-------|---------|
//! | Idle | No classification seen since creation or the last stop |
//! | Tracking(status) | One open segment holding `status` since `segment_start` |
//!
//! # Transitions
//!
//! | Input | From | Event emitted |
//! |-------|------|---------------|
//! | first classification | Idle | none |
//! | same status, checkpoint interval elapsed | Tracking | checkpoint for the current status |
//! | different status | Tracking | closing event for the previous status |
//! | stop | Tracking | final event for the open segment |
//!
//! Events are only emitted with a strictly positive whole-second duration.
//! Degenerate frames never reach the tracker.

use crate::models::{Classification, PostureEvent, PostureStatus};
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};

/// Default interval after which a long-running segment is checkpointed.
pub const CHECKPOINT_INTERVAL_SECS: u64 = 30;

/// The open segment of a tracking session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionState {
    /// Status held by the open segment.
    pub current_status: PostureStatus,
    /// Angle of the latest classification.
    pub current_angle: f64,
    /// Start of the open segment.
    pub segment_start: DateTime<Utc>,
    /// Time of the last checkpoint (or segment start).
    pub last_checkpoint: DateTime<Utc>,
}

impl SessionState {
    fn begin(classification: &Classification) -> Self {
        Self {
            current_status: classification.label,
            current_angle: classification.angle,
            segment_start: classification.timestamp,
            last_checkpoint: classification.timestamp,
        }
    }

    /// Builds the event describing the segment up to `at`, if it has a
    /// positive whole-second duration.
    fn close(&self, at: DateTime<Utc>) -> Option<PostureEvent> {
        let seconds = whole_seconds(at - self.segment_start);
        (seconds > 0)
            .then(|| PostureEvent::new(at, self.current_status, self.current_angle, seconds))
    }
}

/// Floors a non-negative duration to whole seconds.
fn whole_seconds(span: Duration) -> u64 {
    u64::try_from(span.num_seconds()).unwrap_or(0)
}

/// Per-stream posture state machine.
///
/// Owned by a single frame loop; it holds no locks and is not shared.
#[derive(Debug, Clone)]
pub struct SessionTracker {
    state: Option<SessionState>,
    checkpoint_interval: Duration,
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new(CHECKPOINT_INTERVAL_SECS)
    }
}

impl SessionTracker {
    /// Creates an idle tracker with the given checkpoint interval in seconds.
    ///
    /// An interval of zero is raised to one second.
    #[must_use]
    pub fn new(checkpoint_interval_secs: u64) -> Self {
        let secs = i64::try_from(checkpoint_interval_secs.max(1)).unwrap_or(i64::MAX);
        Self {
            state: None,
            checkpoint_interval: Duration::seconds(secs),
        }
    }

    /// Returns the open segment, or `None` when idle.
    #[must_use]
    pub const fn state(&self) -> Option<&SessionState> {
        self.state.as_ref()
    }

    /// Returns true when no segment is open.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.state.is_none()
    }

    /// Feeds one classification into the state machine.
    ///
    /// Returns the event produced by this transition, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the classification is older than the
    /// open segment's last boundary. State is left untouched in that case.
    pub fn observe(&mut self, classification: &Classification) -> Result<Option<PostureEvent>> {
        let t = classification.timestamp;

        let Some(state) = self.state.as_mut() else {
            self.state = Some(SessionState::begin(classification));
            return Ok(None);
        };

        if t < state.segment_start || t < state.last_checkpoint {
            return Err(Error::InvalidInput(format!(
                "classification at {t} precedes open segment start {}",
                state.segment_start
            )));
        }

        if classification.label != state.current_status {
            let closing = state.close(t);
            *state = SessionState::begin(classification);
            return Ok(closing);
        }

        state.current_angle = classification.angle;
        if t - state.last_checkpoint < self.checkpoint_interval {
            return Ok(None);
        }

        let checkpoint = state.close(t);
        state.segment_start = t;
        state.last_checkpoint = t;
        Ok(checkpoint)
    }

    /// Closes the open segment at `at` and returns to idle.
    ///
    /// Returns the final event when the segment lasted at least one whole
    /// second. A stop time earlier than the segment start yields no event.
    pub fn stop(&mut self, at: DateTime<Utc>) -> Option<PostureEvent> {
        self.state.take().and_then(|state| state.close(at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn good(secs: i64, angle: f64) -> Classification {
        Classification::new(t(secs), angle, PostureStatus::Good)
    }

    fn bad(secs: i64, angle: f64) -> Classification {
        Classification::new(t(secs), angle, PostureStatus::Bad)
    }

    #[test]
    fn test_first_classification_opens_segment() {
        let mut tracker = SessionTracker::default();
        assert!(tracker.is_idle());
        assert!(tracker.observe(&good(0, 120.0)).unwrap().is_none());

        let state = tracker.state().unwrap();
        assert_eq!(state.current_status, PostureStatus::Good);
        assert_eq!(state.segment_start, t(0));
        assert_eq!(state.last_checkpoint, t(0));
    }

    #[test]
    fn test_status_change_closes_previous_segment_with_previous_angle() {
        let mut tracker = SessionTracker::default();
        tracker.observe(&good(0, 120.0)).unwrap();
        tracker.observe(&good(4, 118.0)).unwrap();

        let event = tracker.observe(&bad(10, 80.0)).unwrap().unwrap();
        assert_eq!(event.status, PostureStatus::Good);
        assert!((event.angle - 118.0).abs() < f64::EPSILON);
        assert_eq!(event.duration_seconds, 10);
        assert_eq!(event.timestamp, t(10));

        let state = tracker.state().unwrap();
        assert_eq!(state.current_status, PostureStatus::Bad);
        assert_eq!(state.segment_start, t(10));
    }

    #[test]
    fn test_subsecond_status_change_emits_nothing() {
        let mut tracker = SessionTracker::default();
        tracker.observe(&good(0, 120.0)).unwrap();
        let flip = Classification::new(
            t(0) + Duration::milliseconds(400),
            70.0,
            PostureStatus::Bad,
        );
        assert!(tracker.observe(&flip).unwrap().is_none());
        assert_eq!(
            tracker.state().unwrap().current_status,
            PostureStatus::Bad
        );
    }

    #[test]
    fn test_checkpoints_split_long_segment() {
        let mut tracker = SessionTracker::default();
        let mut events = Vec::new();
        for secs in [0, 30, 60, 95] {
            if let Some(e) = tracker.observe(&good(secs, 110.0)).unwrap() {
                events.push(e);
            }
        }
        if let Some(e) = tracker.stop(t(95)) {
            events.push(e);
        }

        let durations: Vec<u64> = events.iter().map(|e| e.duration_seconds).collect();
        assert_eq!(durations, vec![30, 30, 35]);
        assert_eq!(durations.iter().sum::<u64>(), 95);
        assert!(events.iter().all(|e| e.status == PostureStatus::Good));
    }

    #[test]
    fn test_checkpoint_uses_latest_angle() {
        let mut tracker = SessionTracker::default();
        tracker.observe(&good(0, 100.0)).unwrap();
        let event = tracker.observe(&good(31, 140.0)).unwrap().unwrap();
        assert!((event.angle - 140.0).abs() < f64::EPSILON);
        assert_eq!(event.duration_seconds, 31);
    }

    #[test]
    fn test_no_checkpoint_before_interval() {
        let mut tracker = SessionTracker::default();
        for secs in 0..30 {
            assert!(tracker.observe(&good(secs, 100.0)).unwrap().is_none());
        }
    }

    #[test]
    fn test_stop_emits_final_event() {
        let mut tracker = SessionTracker::default();
        tracker.observe(&bad(0, 75.0)).unwrap();
        let event = tracker.stop(t(12)).unwrap();
        assert_eq!(event.duration_seconds, 12);
        assert_eq!(event.status, PostureStatus::Bad);
        assert!(tracker.is_idle());
    }

    #[test]
    fn test_immediate_stop_emits_nothing() {
        let mut tracker = SessionTracker::default();
        tracker.observe(&bad(0, 75.0)).unwrap();
        assert!(tracker.stop(t(0)).is_none());
        assert!(tracker.is_idle());
    }

    #[test]
    fn test_stop_when_idle_emits_nothing() {
        let mut tracker = SessionTracker::default();
        assert!(tracker.stop(t(100)).is_none());
    }

    #[test]
    fn test_out_of_order_classification_rejected() {
        let mut tracker = SessionTracker::default();
        tracker.observe(&good(10, 100.0)).unwrap();
        let err = tracker.observe(&bad(5, 70.0)).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(
            tracker.state().unwrap().current_status,
            PostureStatus::Good
        );
    }

    #[test]
    fn test_alternating_statuses_emit_one_event_per_transition() {
        let mut tracker = SessionTracker::default();
        let mut total = 0;
        let mut count = 0;
        for i in 0..10 {
            let c = if i % 2 == 0 { good(i * 3, 110.0) } else { bad(i * 3, 70.0) };
            if let Some(e) = tracker.observe(&c).unwrap() {
                total += e.duration_seconds;
                count += 1;
            }
        }
        assert_eq!(count, 9);
        assert_eq!(total, 27);
    }

    #[test]
    fn test_restart_after_stop_begins_fresh_segment() {
        let mut tracker = SessionTracker::new(10);
        tracker.observe(&good(0, 100.0)).unwrap();
        tracker.stop(t(5));
        assert!(tracker.observe(&good(100, 100.0)).unwrap().is_none());
        assert_eq!(tracker.state().unwrap().segment_start, t(100));
    }
}
