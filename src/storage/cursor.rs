//! Lazy paged scans over a posture log.
//!
//! The log is unbounded over time, so aggregation never materializes it.
//! A [`LogStream`] pulls fixed-size pages from the store on demand using a
//! keyset cursor of `(timestamp, id)`.

use super::traits::{LogQuery, PageCursor, PostureLogStore};
use crate::Result;
use crate::models::PostureEvent;
use std::collections::VecDeque;

/// Default number of events fetched per page.
pub const DEFAULT_PAGE_SIZE: usize = 256;

/// Iterator over the events matching a [`LogQuery`].
///
/// Yields `Err` at most once; the stream is exhausted afterwards.
pub struct LogStream<'a, S: ?Sized + PostureLogStore = dyn PostureLogStore> {
    store: &'a S,
    query: LogQuery,
    page_size: usize,
    buffer: VecDeque<PostureEvent>,
    cursor: Option<PageCursor>,
    yielded: usize,
    exhausted: bool,
}

impl<'a, S: ?Sized + PostureLogStore> LogStream<'a, S> {
    /// Creates a stream with the default page size.
    #[must_use]
    pub fn new(store: &'a S, query: LogQuery) -> Self {
        Self::with_page_size(store, query, DEFAULT_PAGE_SIZE)
    }

    /// Creates a stream that fetches `page_size` events at a time.
    ///
    /// A page size of zero is raised to one.
    #[must_use]
    pub fn with_page_size(store: &'a S, query: LogQuery, page_size: usize) -> Self {
        Self {
            store,
            query,
            page_size: page_size.max(1),
            buffer: VecDeque::new(),
            cursor: None,
            yielded: 0,
            exhausted: false,
        }
    }

    fn remaining(&self) -> Option<usize> {
        self.query.limit.map(|limit| limit.saturating_sub(self.yielded))
    }

    fn refill(&mut self) -> Result<()> {
        let want = self
            .remaining()
            .map_or(self.page_size, |left| left.min(self.page_size));
        let page = self
            .store
            .fetch_page(&self.query, self.cursor.as_ref(), want)?;

        if page.len() < want {
            self.exhausted = true;
        }
        if let Some(last) = page.last() {
            self.cursor = Some(PageCursor::after(last));
        }
        self.buffer.extend(page);
        Ok(())
    }
}

impl<S: ?Sized + PostureLogStore> Iterator for LogStream<'_, S> {
    type Item = Result<PostureEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining() == Some(0) {
            return None;
        }

        if self.buffer.is_empty() {
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.refill() {
                self.exhausted = true;
                self.buffer.clear();
                return Some(Err(e));
            }
        }

        let event = self.buffer.pop_front()?;
        self.yielded += 1;
        Some(Ok(event))
    }
}
