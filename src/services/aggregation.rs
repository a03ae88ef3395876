//! Dashboard aggregation over the posture log.
//!
//! Every window is derived from the injected [`Clock`] and a fixed UTC offset
//! that defines local midnight, weekday names and month boundaries. Angles
//! are accumulated at full precision and rounded to one decimal place only
//! when a bucket is emitted.

use crate::classifier::NEUTRAL_ANGLE_DEG;
use crate::clock::Clock;
use crate::models::{
    DashboardSummary, DateBucket, HourlyBucket, LogEntry, PostureEvent, PostureStatus,
    WeekdayBucket,
};
use crate::storage::{LogQuery, LogStream, PostureLogStore, SortOrder};
use crate::{Error, Result};
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Number of entries returned by the recent-log listing when none is requested.
pub const DEFAULT_LOG_LIMIT: usize = 10;

/// Upper bound on a single recent-log request.
pub const MAX_LOG_LIMIT: usize = 1000;

/// Score reported for a weekday with no events.
const EMPTY_WEEKDAY_SCORE: f64 = 0.0;

/// Canonical week order.
const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Rounds to one decimal place, half away from zero.
#[must_use]
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Parameters of a recent-log request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecentLogsQuery {
    /// Maximum entries; the service default when `None`.
    pub limit: Option<usize>,
    /// Inclusive lower bound on the event timestamp.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the event timestamp.
    pub end: Option<DateTime<Utc>>,
}

/// Running totals for one bucket.
#[derive(Debug, Default, Clone, Copy)]
struct Accumulator {
    good_seconds: u64,
    poor_seconds: u64,
    angle_sum: f64,
    samples: u64,
}

impl Accumulator {
    fn add(&mut self, event: &PostureEvent) {
        match event.status {
            PostureStatus::Good => self.good_seconds += event.duration_seconds,
            PostureStatus::Bad => self.poor_seconds += event.duration_seconds,
        }
        self.angle_sum += event.angle;
        self.samples += 1;
    }

    #[allow(clippy::cast_precision_loss)]
    fn score_or(&self, fallback: f64) -> f64 {
        if self.samples == 0 {
            fallback
        } else {
            round1(self.angle_sum / self.samples as f64)
        }
    }
}

/// Read-only dashboard queries.
///
/// Cheap to share behind an `Arc`; every query is an independent scan and
/// may run concurrently with appends.
pub struct AggregationService {
    store: Arc<dyn PostureLogStore>,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
    default_log_limit: usize,
    max_log_limit: usize,
}

impl AggregationService {
    /// Creates a service reporting in UTC with the default log limits.
    #[must_use]
    pub fn new(store: Arc<dyn PostureLogStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            offset: Utc.fix(),
            default_log_limit: DEFAULT_LOG_LIMIT,
            max_log_limit: MAX_LOG_LIMIT,
        }
    }

    /// Sets the offset that defines local days, weekdays and months.
    #[must_use]
    pub const fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Sets the default and maximum recent-log limits.
    ///
    /// The maximum is raised to at least one and the default is capped by it.
    #[must_use]
    pub fn with_log_limits(mut self, default_limit: usize, max_limit: usize) -> Self {
        self.max_log_limit = max_limit.max(1);
        self.default_log_limit = default_limit.min(self.max_log_limit);
        self
    }

    /// Returns the configured UTC offset.
    #[must_use]
    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Parses a `startDate`/`endDate` bound: RFC 3339, or `YYYY-MM-DD` taken
    /// as local midnight.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `raw` is neither form.
    pub fn parse_date_bound(&self, raw: &str) -> Result<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Ok(ts.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(|date| self.local_midnight(date))
            .map_err(|_| Error::InvalidInput(format!("invalid date '{raw}'")))
    }

    /// Headline numbers: latest angle and week-over-week average change.
    ///
    /// Each input falls back to the neutral 90 degrees when its window is
    /// empty; the change is computed before rounding.
    #[instrument(skip(self), fields(query = "summary"))]
    pub fn summary(&self) -> Result<DashboardSummary> {
        self.timed("summary", || {
            let now = self.clock.now();
            let week_ago = now - Duration::days(7);
            let two_weeks_ago = now - Duration::days(14);

            let current = self
                .store
                .latest()?
                .map_or(NEUTRAL_ANGLE_DEG, |event| event.angle);
            let weekly = self
                .store
                .average_angle(&LogQuery::new().since(week_ago).until(now))?
                .unwrap_or(NEUTRAL_ANGLE_DEG);
            let previous = self
                .store
                .average_angle(&LogQuery::new().since(two_weeks_ago).before(week_ago))?
                .unwrap_or(NEUTRAL_ANGLE_DEG);

            Ok(DashboardSummary {
                current_score: round1(current),
                weekly_average: round1(weekly),
                weekly_change: round1(weekly - previous),
            })
        })
    }

    /// Today's events bucketed by local `HH:MM`, ascending.
    #[instrument(skip(self), fields(query = "today"))]
    pub fn today(&self) -> Result<Vec<HourlyBucket>> {
        self.timed("today", || {
            let now = self.clock.now();
            let local_today = now.with_timezone(&self.offset).date_naive();
            let query = LogQuery::new()
                .since(self.local_midnight(local_today))
                .until(now)
                .order(SortOrder::Ascending);

            let buckets = self.bucket_by(query, |ts| ts.format("%H:%M").to_string())?;
            Ok(buckets
                .into_iter()
                .map(|(time, acc)| HourlyBucket {
                    time,
                    good: acc.good_seconds,
                    poor: acc.poor_seconds,
                    score: acc.score_or(NEUTRAL_ANGLE_DEG),
                })
                .collect())
        })
    }

    /// Trailing seven days bucketed by weekday name, always `Mon..Sun`.
    ///
    /// Buckets are keyed by weekday name only, so a window that spans two
    /// local dates with the same weekday merges them.
    #[instrument(skip(self), fields(query = "week"))]
    pub fn week(&self) -> Result<Vec<WeekdayBucket>> {
        self.timed("week", || {
            let now = self.clock.now();
            let query = LogQuery::new()
                .since(now - Duration::days(7))
                .until(now)
                .order(SortOrder::Ascending);

            let mut days = [Accumulator::default(); 7];
            for event in LogStream::new(self.store.as_ref(), query) {
                let event = event?;
                let weekday = event.timestamp.with_timezone(&self.offset).weekday();
                days[weekday.num_days_from_monday() as usize].add(&event);
            }

            Ok(WEEKDAYS
                .iter()
                .zip(days)
                .map(|(day, acc)| WeekdayBucket {
                    day: (*day).to_string(),
                    score: acc.score_or(EMPTY_WEEKDAY_SCORE),
                    sessions: acc.samples,
                })
                .collect())
        })
    }

    /// This calendar month bucketed by local `MM/DD`, ascending.
    #[instrument(skip(self), fields(query = "month"))]
    pub fn month(&self) -> Result<Vec<DateBucket>> {
        self.timed("month", || {
            let now = self.clock.now();
            let local = now.with_timezone(&self.offset).date_naive();
            let first = local.with_day(1).unwrap_or(local);
            let query = LogQuery::new()
                .since(self.local_midnight(first))
                .until(now)
                .order(SortOrder::Ascending);

            let buckets = self.bucket_by(query, |ts| ts.format("%m/%d").to_string())?;
            Ok(buckets
                .into_iter()
                .map(|(date, acc)| DateBucket {
                    date,
                    score: acc.score_or(NEUTRAL_ANGLE_DEG),
                    sessions: acc.samples,
                })
                .collect())
        })
    }

    /// Most recent events first, rendered for the log listing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `start` is after `end`, or
    /// [`Error::QueryFailed`] if the store cannot be read.
    #[instrument(skip(self), fields(query = "recent_logs"))]
    pub fn recent_logs(&self, request: RecentLogsQuery) -> Result<Vec<LogEntry>> {
        if let (Some(start), Some(end)) = (request.start, request.end)
            && start > end
        {
            return Err(Error::InvalidInput(format!(
                "startDate {start} is after endDate {end}"
            )));
        }

        self.timed("recent_logs", || {
            let limit = request
                .limit
                .unwrap_or(self.default_log_limit)
                .min(self.max_log_limit);
            let mut query = LogQuery::new().limit(limit);
            query.since = request.start;
            query.until = request.end;

            LogStream::new(self.store.as_ref(), query)
                .map(|event| event.map(|e| LogEntry::from(&e)))
                .collect()
        })
    }

    fn local_midnight(&self, date: NaiveDate) -> DateTime<Utc> {
        let offset = Duration::seconds(i64::from(self.offset.local_minus_utc()));
        (date.and_time(NaiveTime::MIN) - offset).and_utc()
    }

    fn bucket_by(
        &self,
        query: LogQuery,
        key: impl Fn(DateTime<FixedOffset>) -> String,
    ) -> Result<BTreeMap<String, Accumulator>> {
        let mut buckets: BTreeMap<String, Accumulator> = BTreeMap::new();
        for event in LogStream::new(self.store.as_ref(), query) {
            let event = event?;
            let local = event.timestamp.with_timezone(&self.offset);
            buckets.entry(key(local)).or_default().add(&event);
        }
        Ok(buckets)
    }

    fn timed<T>(&self, query: &'static str, run: impl FnOnce() -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let result = run();
        let status = if result.is_ok() { "success" } else { "error" };
        metrics::counter!("dashboard_queries_total", "query" => query, "status" => status)
            .increment(1);
        metrics::histogram!("dashboard_query_duration_ms", "query" => query)
            .record(start.elapsed().as_secs_f64() * 1000.0);
        if let Err(e) = &result {
            tracing::warn!(query, backend = self.store.name(), error = %e, "dashboard query failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::{InMemoryPostureStore, PageCursor};
    use chrono::TimeZone;

    /// Monday 2024-03-04 15:00 UTC.
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap()
    }

    fn service_with(events: &[PostureEvent]) -> AggregationService {
        let store = InMemoryPostureStore::new();
        for event in events {
            store.append(event).unwrap();
        }
        AggregationService::new(Arc::new(store), Arc::new(ManualClock::new(now())))
    }

    fn ev(ts: DateTime<Utc>, status: PostureStatus, angle: f64, duration: u64) -> PostureEvent {
        PostureEvent::new(ts, status, angle, duration)
    }

    #[test]
    fn test_round1_half_away_from_zero() {
        assert!((round1(93.25) - 93.3).abs() < 1e-9);
        assert!((round1(-0.25) + 0.3).abs() < 1e-9);
        assert!((round1(90.0) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_empty_store_is_neutral() {
        let summary = service_with(&[]).summary().unwrap();
        assert_eq!(
            summary,
            DashboardSummary {
                current_score: 90.0,
                weekly_average: 90.0,
                weekly_change: 0.0,
            }
        );
    }

    #[test]
    fn test_summary_week_over_week() {
        let service = service_with(&[
            ev(now() - Duration::days(10), PostureStatus::Bad, 80.0, 30),
            ev(now() - Duration::days(2), PostureStatus::Good, 100.0, 30),
            ev(now() - Duration::hours(1), PostureStatus::Good, 110.5, 30),
        ]);
        let summary = service.summary().unwrap();
        assert!((summary.current_score - 110.5).abs() < 1e-9);
        assert!((summary.weekly_average - 105.3).abs() < 1e-9);
        // 105.25 - 80.0, rounded after subtraction
        assert!((summary.weekly_change - 25.3).abs() < 1e-9);
    }

    #[test]
    fn test_summary_previous_week_excludes_boundary() {
        let service = service_with(&[ev(
            now() - Duration::days(7),
            PostureStatus::Good,
            120.0,
            30,
        )]);
        let summary = service.summary().unwrap();
        assert!((summary.weekly_average - 120.0).abs() < 1e-9);
        assert!((summary.weekly_change - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_today_buckets_by_minute() {
        let service = service_with(&[
            ev(now() - Duration::days(1), PostureStatus::Good, 150.0, 99),
            ev(Utc.with_ymd_and_hms(2024, 3, 4, 9, 15, 5).unwrap(), PostureStatus::Good, 100.0, 30),
            ev(Utc.with_ymd_and_hms(2024, 3, 4, 9, 15, 50).unwrap(), PostureStatus::Bad, 80.0, 12),
            ev(Utc.with_ymd_and_hms(2024, 3, 4, 8, 2, 0).unwrap(), PostureStatus::Bad, 70.0, 5),
        ]);
        let today = service.today().unwrap();
        assert_eq!(
            today,
            vec![
                HourlyBucket {
                    time: "08:02".to_string(),
                    good: 0,
                    poor: 5,
                    score: 70.0,
                },
                HourlyBucket {
                    time: "09:15".to_string(),
                    good: 30,
                    poor: 12,
                    score: 90.0,
                },
            ]
        );
        assert_eq!(service.today().unwrap(), today);
    }

    #[test]
    fn test_today_respects_offset() {
        // 23:30 local on March 3rd at -05:00 is 04:30 UTC on March 4th.
        let service = service_with(&[ev(
            Utc.with_ymd_and_hms(2024, 3, 4, 4, 30, 0).unwrap(),
            PostureStatus::Good,
            100.0,
            30,
        )]);
        assert_eq!(service.today().unwrap().len(), 1);

        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let service = service_with(&[ev(
            Utc.with_ymd_and_hms(2024, 3, 4, 4, 30, 0).unwrap(),
            PostureStatus::Good,
            100.0,
            30,
        )])
        .with_offset(offset);
        assert!(service.today().unwrap().is_empty());
    }

    #[test]
    fn test_week_has_seven_fixed_buckets() {
        let service = service_with(&[
            ev(now() - Duration::hours(2), PostureStatus::Good, 100.0, 30),
            ev(now() - Duration::hours(3), PostureStatus::Bad, 81.0, 30),
            ev(now() - Duration::days(2), PostureStatus::Good, 95.0, 30),
            ev(now() - Duration::days(9), PostureStatus::Good, 170.0, 30),
        ]);
        let week = service.week().unwrap();
        let days: Vec<_> = week.iter().map(|b| b.day.as_str()).collect();
        assert_eq!(days, WEEKDAYS);

        assert_eq!(week[0].sessions, 2);
        assert!((week[0].score - 90.5).abs() < 1e-9);
        assert_eq!(week[5].sessions, 1);
        assert!((week[5].score - 95.0).abs() < 1e-9);
        assert_eq!(week[3].sessions, 0);
        assert!(week[3].score.abs() < f64::EPSILON);
    }

    #[test]
    fn test_week_aliases_same_weekday() {
        // Exactly seven days back is still inside the window and is also a Monday.
        let service = service_with(&[
            ev(now() - Duration::days(7), PostureStatus::Good, 120.0, 30),
            ev(now(), PostureStatus::Good, 100.0, 30),
        ]);
        let week = service.week().unwrap();
        assert_eq!(week[0].sessions, 2);
        assert!((week[0].score - 110.0).abs() < 1e-9);
    }

    #[test]
    fn test_month_same_day_mean() {
        let day = Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap();
        let service = service_with(&[
            ev(day, PostureStatus::Bad, 80.0, 30),
            ev(day + Duration::minutes(5), PostureStatus::Good, 100.0, 30),
            ev(day + Duration::minutes(9), PostureStatus::Bad, 90.0, 30),
            ev(Utc.with_ymd_and_hms(2024, 2, 29, 10, 0, 0).unwrap(), PostureStatus::Good, 150.0, 30),
        ]);
        let month = service.month().unwrap();
        assert_eq!(
            month,
            vec![DateBucket {
                date: "03/02".to_string(),
                score: 90.0,
                sessions: 3,
            }]
        );
    }

    #[test]
    fn test_recent_logs_newest_first_with_limit() {
        let events: Vec<_> = (1..=5)
            .map(|i| ev(now() - Duration::minutes(10 - i), PostureStatus::Good, 100.0, 30))
            .collect();
        let service = service_with(&events);

        let logs = service
            .recent_logs(RecentLogsQuery {
                limit: Some(2),
                ..RecentLogsQuery::default()
            })
            .unwrap();
        let ids: Vec<_> = logs.iter().map(|l| l.id.clone()).collect();
        assert_eq!(ids, vec![events[4].id.to_string(), events[3].id.to_string()]);
    }

    #[test]
    fn test_recent_logs_default_and_cap() {
        let events: Vec<_> = (0..20)
            .map(|i| ev(now() - Duration::minutes(i), PostureStatus::Bad, 85.0, 30))
            .collect();
        let service = service_with(&events);
        assert_eq!(service.recent_logs(RecentLogsQuery::default()).unwrap().len(), 10);

        let service = service_with(&events).with_log_limits(10, 5);
        let logs = service
            .recent_logs(RecentLogsQuery {
                limit: Some(1000),
                ..RecentLogsQuery::default()
            })
            .unwrap();
        assert_eq!(logs.len(), 5);
    }

    #[test]
    fn test_recent_logs_date_range() {
        let events: Vec<_> = (0..6)
            .map(|i| ev(now() - Duration::days(i), PostureStatus::Good, 100.0, 30))
            .collect();
        let service = service_with(&events);
        let logs = service
            .recent_logs(RecentLogsQuery {
                limit: Some(50),
                start: Some(now() - Duration::days(3)),
                end: Some(now() - Duration::days(1)),
            })
            .unwrap();
        assert_eq!(logs.len(), 3);

        let err = service
            .recent_logs(RecentLogsQuery {
                limit: None,
                start: Some(now()),
                end: Some(now() - Duration::days(1)),
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    struct BrokenStore;

    impl PostureLogStore for BrokenStore {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn append(&self, _event: &PostureEvent) -> Result<()> {
            Ok(())
        }

        fn fetch_page(
            &self,
            _query: &LogQuery,
            _after: Option<&PageCursor>,
            _page_size: usize,
        ) -> Result<Vec<PostureEvent>> {
            Err(Error::query("fetch_page", "connection refused"))
        }
    }

    #[test]
    fn test_store_failure_is_not_defaulted() {
        let service =
            AggregationService::new(Arc::new(BrokenStore), Arc::new(ManualClock::new(now())));
        assert!(matches!(service.summary(), Err(Error::QueryFailed { .. })));
        assert!(matches!(service.today(), Err(Error::QueryFailed { .. })));
        assert!(matches!(service.week(), Err(Error::QueryFailed { .. })));
        assert!(matches!(service.month(), Err(Error::QueryFailed { .. })));
    }

    #[test]
    fn test_parse_date_bound() {
        let service = service_with(&[])
            .with_offset(FixedOffset::east_opt(2 * 3600).unwrap());
        assert_eq!(
            service.parse_date_bound("2024-03-04").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 3, 22, 0, 0).unwrap()
        );
        assert_eq!(
            service.parse_date_bound("2024-03-04T10:00:00Z").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap()
        );
        assert!(matches!(
            service.parse_date_bound("last tuesday"),
            Err(Error::InvalidInput(_))
        ));
    }
}
