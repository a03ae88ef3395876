//! Posture log store contract.

use super::cursor::LogStream;
use crate::models::{EventId, PostureEvent, PostureStatus};
use crate::Result;
use chrono::{DateTime, Utc};

/// Ordering of a log scan by timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Newest first.
    #[default]
    Descending,
    /// Oldest first.
    Ascending,
}

/// Range and filter for a log scan.
///
/// All bounds are optional; an empty query scans the whole log newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogQuery {
    /// Inclusive lower bound.
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound.
    pub until: Option<DateTime<Utc>>,
    /// Exclusive upper bound.
    pub before: Option<DateTime<Utc>>,
    /// Restrict to one posture status.
    pub status: Option<PostureStatus>,
    /// Scan order.
    pub order: SortOrder,
    /// Maximum number of events to yield.
    pub limit: Option<usize>,
}

impl LogQuery {
    /// Creates an unbounded, newest-first query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the inclusive lower bound.
    #[must_use]
    pub const fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Sets the inclusive upper bound.
    #[must_use]
    pub const fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    /// Sets the exclusive upper bound.
    #[must_use]
    pub const fn before(mut self, before: DateTime<Utc>) -> Self {
        self.before = Some(before);
        self
    }

    /// Restricts the scan to one status.
    #[must_use]
    pub const fn with_status(mut self, status: PostureStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the scan order.
    #[must_use]
    pub const fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Sets the maximum number of events.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if `event` falls inside the bounds and status filter.
    #[must_use]
    pub fn matches(&self, event: &PostureEvent) -> bool {
        self.since.is_none_or(|since| event.timestamp >= since)
            && self.until.is_none_or(|until| event.timestamp <= until)
            && self.before.is_none_or(|before| event.timestamp < before)
            && self.status.is_none_or(|status| event.status == status)
    }
}

/// Keyset position after the last event of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    /// Timestamp of the last event returned.
    pub timestamp: DateTime<Utc>,
    /// ID of the last event returned (tie-breaker).
    pub id: EventId,
}

impl PageCursor {
    /// Cursor positioned after `event`.
    #[must_use]
    pub fn after(event: &PostureEvent) -> Self {
        Self {
            timestamp: event.timestamp,
            id: event.id.clone(),
        }
    }

    /// Returns true if `event` comes strictly after this cursor in `order`.
    #[must_use]
    pub fn precedes(&self, event: &PostureEvent, order: SortOrder) -> bool {
        let key = (event.timestamp, &event.id);
        let cursor = (self.timestamp, &self.id);
        match order {
            SortOrder::Descending => key < cursor,
            SortOrder::Ascending => key > cursor,
        }
    }
}

/// Append-only posture event log.
///
/// Implementations must be safe to read from several threads while one
/// writer appends. Reads may lag the latest append.
pub trait PostureLogStore: Send + Sync {
    /// Short backend name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Appends one event.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::WriteFailed`] if the event cannot be stored.
    fn append(&self, event: &PostureEvent) -> Result<()>;

    /// Fetches up to `page_size` events matching `query` that come strictly
    /// after `after` in the query order. `query.limit` is ignored here; the
    /// [`LogStream`] enforces it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::QueryFailed`] if the store cannot be read.
    fn fetch_page(
        &self,
        query: &LogQuery,
        after: Option<&PageCursor>,
        page_size: usize,
    ) -> Result<Vec<PostureEvent>>;

    /// Lazily scans the log.
    fn stream(&self, query: LogQuery) -> LogStream<'_, Self>
    where
        Self: Sized,
    {
        LogStream::new(self, query)
    }

    /// Returns the most recent event.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::QueryFailed`] if the store cannot be read.
    fn latest(&self) -> Result<Option<PostureEvent>> {
        Ok(self.fetch_page(&LogQuery::new(), None, 1)?.into_iter().next())
    }

    /// Mean angle over events matching `query`, or `None` if there are none.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::QueryFailed`] if the store cannot be read.
    fn average_angle(&self, query: &LogQuery) -> Result<Option<f64>> {
        let mut sum = 0.0;
        let mut count = 0_u64;
        for event in LogStream::new(self, query.clone()) {
            sum += event?.angle;
            count += 1;
        }
        #[allow(clippy::cast_precision_loss)]
        Ok((count > 0).then(|| sum / count as f64))
    }

    /// Number of events matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::QueryFailed`] if the store cannot be read.
    fn count(&self, query: &LogQuery) -> Result<u64> {
        let mut count = 0_u64;
        for event in LogStream::new(self, query.clone()) {
            event?;
            count += 1;
        }
        Ok(count)
    }
}
