//! Posture status, classifications and persisted posture events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Binary posture label produced by the classifier and stored on events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostureStatus {
    /// Hip angle above the good-posture threshold.
    Good,
    /// Hip angle at or below the threshold.
    Bad,
}

impl PostureStatus {
    /// Returns the status as its stored string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Bad => "bad",
        }
    }

    /// Parses a status from a string (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "good" => Some(Self::Good),
            "bad" => Some(Self::Bad),
            _ => None,
        }
    }
}

impl fmt::Display for PostureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for PostureStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
            .ok_or_else(|| crate::Error::InvalidInput(format!("unknown posture status: {s}")))
    }
}

/// Unique identifier for a posture event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Creates an event ID from an existing string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh time-ordered (UUIDv7) event ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for EventId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One frame's classification result.
///
/// Derived per frame and never persisted directly. The serialized form is the
/// boundary input accepted by the tracker: `{timestamp, label, angle}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// When the frame was captured.
    pub timestamp: DateTime<Utc>,
    /// Hip angle in degrees, in `[0, 180]`.
    pub angle: f64,
    /// Posture label derived from the angle.
    pub label: PostureStatus,
}

impl Classification {
    /// Creates a classification.
    #[must_use]
    pub const fn new(timestamp: DateTime<Utc>, angle: f64, label: PostureStatus) -> Self {
        Self {
            timestamp,
            angle,
            label,
        }
    }
}

/// A persisted posture event.
///
/// Created only by the session tracker (or by an explicit manual log entry),
/// immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostureEvent {
    /// Unique identifier.
    pub id: EventId,
    /// When the event was recorded (end of the span it describes).
    pub timestamp: DateTime<Utc>,
    /// Posture held during the span.
    pub status: PostureStatus,
    /// Hip angle in degrees at the end of the span.
    pub angle: f64,
    /// Whole seconds the status held before this event.
    pub duration_seconds: u64,
}

impl PostureEvent {
    /// Creates an event with a freshly generated ID.
    #[must_use]
    pub fn new(
        timestamp: DateTime<Utc>,
        status: PostureStatus,
        angle: f64,
        duration_seconds: u64,
    ) -> Self {
        Self {
            id: EventId::generate(),
            timestamp,
            status,
            angle,
            duration_seconds,
        }
    }

    /// Replaces the generated ID (used by stores that rehydrate rows).
    #[must_use]
    pub fn with_id(mut self, id: impl Into<EventId>) -> Self {
        self.id = id.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!(PostureStatus::parse("GOOD"), Some(PostureStatus::Good));
        assert_eq!(PostureStatus::parse(" bad "), Some(PostureStatus::Bad));
        assert_eq!(PostureStatus::parse("moderate"), None);
    }

    #[test]
    fn test_status_from_str_error() {
        let err = "slouch".parse::<PostureStatus>().unwrap_err();
        assert!(err.to_string().contains("slouch"));
    }

    #[test]
    fn test_status_serde_lowercase() {
        let json = serde_json::to_string(&PostureStatus::Good).unwrap();
        assert_eq!(json, "\"good\"");
        let back: PostureStatus = serde_json::from_str("\"bad\"").unwrap();
        assert_eq!(back, PostureStatus::Bad);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = EventId::generate();
        let b = EventId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_classification_boundary_form() {
        let c: Classification = serde_json::from_str(
            r#"{"timestamp":"2024-03-04T09:00:00Z","label":"good","angle":101.5}"#,
        )
        .unwrap();
        assert_eq!(c.label, PostureStatus::Good);
        assert!((c.angle - 101.5).abs() < f64::EPSILON);
    }
}
