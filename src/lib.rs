//! # posturelog
//!
//! Posture session tracking and dashboard aggregation for pose landmark streams.
//!
//! posturelog consumes normalized 2-D body landmarks produced by an external
//! pose-estimation service, classifies each frame as good or bad posture,
//! tracks how long each posture persists, and writes discrete posture events
//! to a log store. The same store backs a set of time-bucketed dashboard
//! queries (today by minute, this week by weekday, this month by date).
//!
//! ## Pipeline
//!
//! ```text
//! LandmarkFrame -> classify_frame -> SessionTracker -> EventWriter -> PostureLogStore
//!                                                                         |
//!                          dashboard request -> AggregationService -------+
//! ```
//!
//! ## Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use posturelog::session::SessionTracker;
//! use posturelog::models::{Classification, PostureStatus};
//!
//! let t0 = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
//! let mut tracker = SessionTracker::default();
//! assert!(tracker.observe(&Classification::new(t0, 120.0, PostureStatus::Good)).unwrap().is_none());
//!
//! let t1 = t0 + chrono::Duration::seconds(12);
//! let event = tracker.stop(t1).unwrap();
//! assert_eq!(event.duration_seconds, 12);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod classifier;
pub mod clock;
pub mod config;
pub mod models;
pub mod observability;
#[cfg(feature = "http")]
pub mod server;
pub mod services;
pub mod session;
pub mod storage;
pub mod stream;

pub use classifier::{classify, classify_frame};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::PostureConfig;
pub use models::{Classification, EventId, LandmarkFrame, Point, PostureEvent, PostureStatus};
pub use services::AggregationService;
pub use session::SessionTracker;
pub use storage::{InMemoryPostureStore, LogQuery, PostureLogStore, SqlitePostureStore};
pub use stream::StreamController;

/// Error type for posturelog operations.
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `DegenerateInput` | A landmark triple has a zero-length limb vector or non-finite coordinates |
/// | `InvalidInput` | Malformed boundary input, out-of-order classification timestamps |
/// | `WriteFailed` | Appending a posture event to the log store fails |
/// | `QueryFailed` | Reading from the log store fails during aggregation or listing |
/// | `OperationFailed` | Config loading, file I/O, runtime or server setup fails |
/// | `FeatureNotEnabled` | Using features requiring compile-time flags |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The classifier cannot compute an angle for the given points.
    ///
    /// Callers skip the frame: no tracker state changes and no event is emitted.
    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - A control message is not valid JSON or names an unknown command
    /// - A classification is older than the open segment start
    /// - A posture status string is neither `good` nor `bad`
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A log store write failed.
    ///
    /// Persistence is best-effort: the event writer logs and drops these.
    #[error("write '{operation}' failed: {cause}")]
    WriteFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A log store read failed.
    ///
    /// Surfaced to dashboard callers; aggregates are never defaulted on failure.
    #[error("query '{operation}' failed: {cause}")]
    QueryFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Feature not enabled (requires feature flag).
    #[error("feature not enabled: {0} (compile with --features {0})")]
    FeatureNotEnabled(String),
}

impl Error {
    /// Builds an [`Error::OperationFailed`] from an operation name and any displayable cause.
    pub fn operation(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }

    /// Builds an [`Error::QueryFailed`].
    pub fn query(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::QueryFailed {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }

    /// Builds an [`Error::WriteFailed`].
    pub fn write(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::WriteFailed {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for posturelog operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("test error".to_string());
        assert_eq!(err.to_string(), "invalid input: test error");

        let err = Error::operation("test", "failed");
        assert_eq!(err.to_string(), "operation 'test' failed: failed");

        let err = Error::query("latest", "database is locked");
        assert_eq!(err.to_string(), "query 'latest' failed: database is locked");

        let err = Error::write("append", "disk full");
        assert_eq!(err.to_string(), "write 'append' failed: disk full");

        let err = Error::DegenerateInput("zero-length vector".to_string());
        assert_eq!(err.to_string(), "degenerate input: zero-length vector");
    }
}
