//! Dashboard response records.
//!
//! Field names follow the JSON contract consumed by the dashboard frontend.

use super::{PostureEvent, PostureStatus};
use crate::services::round1;
use serde::{Deserialize, Serialize};

/// `{data: [...]}` envelope used by every list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataResponse<T> {
    /// Result rows.
    pub data: Vec<T>,
}

impl<T> DataResponse<T> {
    /// Wraps rows in the envelope.
    #[must_use]
    pub const fn new(data: Vec<T>) -> Self {
        Self { data }
    }
}

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    /// Angle of the most recent event (90 when the log is empty).
    pub current_score: f64,
    /// Mean angle over the trailing seven days.
    pub weekly_average: f64,
    /// Difference between this week's and last week's mean angle.
    pub weekly_change: f64,
}

/// Per-minute bucket for today's chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyBucket {
    /// `HH:MM` of the events in this bucket.
    pub time: String,
    /// Seconds of good posture.
    pub good: u64,
    /// Seconds of poor posture.
    pub poor: u64,
    /// Mean angle, one decimal place.
    pub score: f64,
}

/// Per-weekday bucket for the week chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekdayBucket {
    /// Abbreviated weekday name (`Mon`..`Sun`).
    pub day: String,
    /// Mean angle, one decimal place (0 when the weekday has no events).
    pub score: f64,
    /// Number of events.
    pub sessions: u64,
}

/// Per-date bucket for the month chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateBucket {
    /// `MM/DD` of the events in this bucket.
    pub date: String,
    /// Mean angle, one decimal place.
    pub score: f64,
    /// Number of events.
    pub sessions: u64,
}

/// A posture event rendered for the recent-log listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Event identifier.
    #[serde(rename = "_id")]
    pub id: String,
    /// RFC 3339 timestamp.
    pub timestamp: String,
    /// `good` or `bad`.
    pub posture_type: PostureStatus,
    /// Hip angle in degrees.
    pub angle: f64,
    /// Duration in seconds.
    pub duration: u64,
    /// Derived `"{angle}° for {duration}s"` note.
    pub notes: String,
}

impl From<&PostureEvent> for LogEntry {
    fn from(event: &PostureEvent) -> Self {
        let angle = round1(event.angle);
        Self {
            id: event.id.to_string(),
            timestamp: event.timestamp.to_rfc3339(),
            posture_type: event.status,
            angle,
            duration: event.duration_seconds,
            notes: format!("{angle:.1}° for {}s", event.duration_seconds),
        }
    }
}

/// Body of a manual log entry (`POST /api/logs`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLogRequest {
    /// `good` or `bad`.
    pub posture_type: PostureStatus,
    /// Hip angle in degrees.
    pub angle: f64,
    /// Duration in seconds.
    pub duration: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_log_entry_notes() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 4, 9, 30, 0).unwrap();
        let event = PostureEvent::new(ts, PostureStatus::Good, 101.25, 42).with_id("evt-1");
        let entry = LogEntry::from(&event);
        assert!((entry.angle - 101.3).abs() < 1e-9);
        assert_eq!(entry.notes, "101.3° for 42s");
        assert_eq!(entry.id, "evt-1");
        assert_eq!(entry.timestamp, "2024-03-04T09:30:00+00:00");

        let event = PostureEvent::new(ts, PostureStatus::Bad, 85.0, 7);
        assert_eq!(LogEntry::from(&event).notes, "85.0° for 7s");
    }

    #[test]
    fn test_log_entry_rounds_raw_classifier_angle() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 4, 9, 30, 0).unwrap();
        let event = PostureEvent::new(ts, PostureStatus::Good, 126.869_897_645_844_02, 12);
        let entry = LogEntry::from(&event);
        assert!((entry.angle - 126.9).abs() < 1e-9);
        assert_eq!(entry.notes, "126.9° for 12s");
    }

    #[test]
    fn test_log_entry_json_field_names() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 4, 9, 30, 0).unwrap();
        let event = PostureEvent::new(ts, PostureStatus::Bad, 80.0, 3).with_id("abc");
        let value = serde_json::to_value(LogEntry::from(&event)).unwrap();
        assert_eq!(value["_id"], "abc");
        assert_eq!(value["postureType"], "bad");
        assert_eq!(value["duration"], 3);
    }

    #[test]
    fn test_summary_json_field_names() {
        let summary = DashboardSummary {
            current_score: 90.0,
            weekly_average: 90.0,
            weekly_change: 0.0,
        };
        let value = serde_json::to_value(summary).unwrap();
        assert_eq!(value["currentScore"], 90.0);
        assert_eq!(value["weeklyAverage"], 90.0);
        assert_eq!(value["weeklyChange"], 0.0);
    }
}
