//! Dashboard-facing services.
//!
//! Services sit between the HTTP/CLI surfaces and the log store.

mod aggregation;
mod manual_log;
pub mod seed;

pub use aggregation::{
    AggregationService, DEFAULT_LOG_LIMIT, MAX_LOG_LIMIT, RecentLogsQuery, round1,
};
pub use manual_log::ManualLogService;
