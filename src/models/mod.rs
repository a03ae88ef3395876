//! Data models for posturelog.
//!
//! This module contains the core data structures shared by the classifier,
//! the session tracker, the log store and the dashboard queries.

mod dashboard;
mod event;
mod landmark;

pub use dashboard::{
    DashboardSummary, DataResponse, DateBucket, HourlyBucket, LogEntry, NewLogRequest,
    WeekdayBucket,
};
pub use event::{Classification, EventId, PostureEvent, PostureStatus};
pub use landmark::{Landmark, LandmarkFrame, Point, PoseLandmark};
