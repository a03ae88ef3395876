//! `SQLite` posture log backend.
//!
//! - [`connection`]: mutex acquisition with poison recovery and pragma setup
//! - [`sql`]: numbered-parameter WHERE/ORDER construction for keyset scans
//! - [`metrics`]: per-operation counters and latency histograms

mod connection;
mod metrics;
mod sql;
mod store;

pub use connection::{
    MUTEX_LOCK_TIMEOUT, acquire_lock, acquire_lock_with_timeout, configure_connection,
};
pub use metrics::record_operation_metrics;
pub use sql::build_where_clause_numbered;
pub use store::SqlitePostureStore;
