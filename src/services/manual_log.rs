//! Manually entered posture log records.

use crate::clock::Clock;
use crate::models::{LogEntry, NewLogRequest, PostureEvent};
use crate::storage::PostureLogStore;
use crate::{Error, Result};
use std::sync::Arc;
use tracing::instrument;

/// Appends posture events that did not come from a tracked stream.
pub struct ManualLogService {
    store: Arc<dyn PostureLogStore>,
    clock: Arc<dyn Clock>,
}

impl ManualLogService {
    /// Creates the service.
    #[must_use]
    pub fn new(store: Arc<dyn PostureLogStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Validates `request`, timestamps it with the clock and appends it.
    ///
    /// Unlike tracked events this write is synchronous: the caller is waiting
    /// for the created record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the angle is not within `[0, 180]`
    /// or the duration is zero, and [`Error::WriteFailed`] if the store
    /// rejects the event.
    #[instrument(skip(self), fields(posture = %request.posture_type))]
    pub fn create(&self, request: &NewLogRequest) -> Result<LogEntry> {
        if !(0.0..=180.0).contains(&request.angle) {
            return Err(Error::InvalidInput(format!(
                "angle must be within [0, 180], got {}",
                request.angle
            )));
        }
        if request.duration == 0 {
            return Err(Error::InvalidInput(
                "duration must be at least one second".to_string(),
            ));
        }

        let event = PostureEvent::new(
            self.clock.now(),
            request.posture_type,
            request.angle,
            request.duration,
        );
        self.store.append(&event)?;

        tracing::info!(event_id = %event.id, "Recorded manual posture log");
        metrics::counter!("posture_manual_logs_total").increment(1);
        Ok(LogEntry::from(&event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::PostureStatus;
    use crate::storage::InMemoryPostureStore;
    use chrono::{TimeZone, Utc};

    fn service() -> (Arc<InMemoryPostureStore>, ManualLogService) {
        let store = Arc::new(InMemoryPostureStore::new());
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap());
        let service = ManualLogService::new(store.clone(), Arc::new(clock));
        (store, service)
    }

    #[test]
    fn test_create_appends_and_renders() {
        let (store, service) = service();
        let entry = service
            .create(&NewLogRequest {
                posture_type: PostureStatus::Good,
                angle: 104.0,
                duration: 60,
            })
            .unwrap();
        assert_eq!(entry.notes, "104.0° for 60s");
        assert_eq!(entry.timestamp, "2024-03-04T09:00:00+00:00");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_create_rejects_out_of_range() {
        let (store, service) = service();
        for (angle, duration) in [(181.0, 10), (-1.0, 10), (f64::NAN, 10), (95.0, 0)] {
            let err = service
                .create(&NewLogRequest {
                    posture_type: PostureStatus::Bad,
                    angle,
                    duration,
                })
                .unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)));
        }
        assert!(store.is_empty());
    }
}
