//! Posture log storage.
//!
//! The log is append-only and read by time range. Two backends implement
//! [`PostureLogStore`]:
//!
//! - [`SqlitePostureStore`]: durable, single file, WAL mode
//! - [`InMemoryPostureStore`]: tests and throwaway sessions
//!
//! Reads go through [`LogStream`], which pages lazily so aggregation never
//! holds the whole log in memory. Writes from the frame loop go through
//! [`EventWriter`] so a slow disk cannot stall classification.

// Dropping the connection guard a few statements early gains nothing.
#![allow(clippy::significant_drop_tightening)]

mod cursor;
mod memory;
pub mod sqlite;
mod traits;
pub mod writer;

pub use cursor::{DEFAULT_PAGE_SIZE, LogStream};
pub use memory::InMemoryPostureStore;
pub use sqlite::SqlitePostureStore;
pub use traits::{LogQuery, PageCursor, PostureLogStore, SortOrder};
pub use writer::{EventWriter, WriterHandle, WriterStats};
