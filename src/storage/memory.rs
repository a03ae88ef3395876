//! In-memory posture log for tests and throwaway sessions.

use super::traits::{LogQuery, PageCursor, PostureLogStore, SortOrder};
use crate::models::PostureEvent;
use crate::{Error, Result};
use std::sync::RwLock;

/// Non-persistent [`PostureLogStore`].
///
/// Events are kept sorted by `(timestamp, id)` so pages can be cut without
/// re-sorting. Uses `RwLock` so dashboard reads do not block each other.
#[derive(Debug, Default)]
pub struct InMemoryPostureStore {
    events: RwLock<Vec<PostureEvent>>,
}

impl InMemoryPostureStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Returns true if nothing has been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PostureLogStore for InMemoryPostureStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn append(&self, event: &PostureEvent) -> Result<()> {
        let mut events = self
            .events
            .write()
            .map_err(|_| Error::write("append", "lock poisoned"))?;
        let key = (event.timestamp, &event.id);
        let idx = events.partition_point(|e| (e.timestamp, &e.id) <= key);
        events.insert(idx, event.clone());
        Ok(())
    }

    fn fetch_page(
        &self,
        query: &LogQuery,
        after: Option<&PageCursor>,
        page_size: usize,
    ) -> Result<Vec<PostureEvent>> {
        let events = self
            .events
            .read()
            .map_err(|_| Error::query("fetch_page", "lock poisoned"))?;

        let keep = |e: &&PostureEvent| {
            query.matches(e) && after.is_none_or(|cursor| cursor.precedes(e, query.order))
        };
        let page = match query.order {
            SortOrder::Ascending => events
                .iter()
                .filter(keep)
                .take(page_size)
                .cloned()
                .collect(),
            SortOrder::Descending => events
                .iter()
                .rev()
                .filter(keep)
                .take(page_size)
                .cloned()
                .collect(),
        };
        Ok(page)
    }
}
