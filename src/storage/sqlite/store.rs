//! `SQLite`-backed posture log.

use super::connection::{
    MUTEX_LOCK_TIMEOUT, acquire_lock, acquire_lock_with_timeout, configure_connection,
};
use super::metrics::{record_operation_metrics, status_label};
use super::sql::{EVENT_COLUMNS, build_where_clause_numbered, order_clause, to_micros};
use crate::models::{EventId, PostureEvent, PostureStatus};
use crate::storage::traits::{LogQuery, PageCursor, PostureLogStore};
use crate::{Error, Result};
use chrono::DateTime;
use rusqlite::{Connection, Row, params, params_from_iter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::instrument;

const BACKEND: &str = "sqlite";

/// Durable posture log in a single `SQLite` file.
///
/// # Schema
///
/// ```sql
/// posture_logs(
///     id TEXT PRIMARY KEY,
///     timestamp_us INTEGER NOT NULL,   -- microseconds since the Unix epoch, UTC
///     posture_status TEXT NOT NULL,    -- 'good' | 'bad'
///     angle REAL NOT NULL,
///     duration INTEGER NOT NULL        -- whole seconds
/// )
/// ```
///
/// Scans are served from `(timestamp_us DESC)` and
/// `(posture_status, timestamp_us DESC)` indexes.
pub struct SqlitePostureStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqlitePostureStore {
    /// Opens (or creates) the log at `db_path`.
    ///
    /// Missing parent directories are created.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the file cannot be opened or the
    /// schema cannot be created.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::operation("create_data_dir", e))?;
        }

        let conn = Connection::open(&db_path).map_err(|e| Error::operation("open_sqlite", e))?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates a store backed by a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::operation("open_sqlite_in_memory", e))?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path (`None` for in-memory).
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        configure_connection(&conn)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS posture_logs (
                id TEXT PRIMARY KEY,
                timestamp_us INTEGER NOT NULL,
                posture_status TEXT NOT NULL,
                angle REAL NOT NULL,
                duration INTEGER NOT NULL
            )",
            [],
        )
        .map_err(|e| Error::operation("create_posture_logs_table", e))?;

        // Index creation failures only cost scan speed.
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_posture_logs_timestamp ON posture_logs(timestamp_us DESC)",
            [],
        );
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_posture_logs_status_timestamp ON posture_logs(posture_status, timestamp_us DESC)",
            [],
        );
        Ok(())
    }

    fn event_from_row(row: &Row<'_>) -> rusqlite::Result<PostureEvent> {
        let id: String = row.get(0)?;
        let micros: i64 = row.get(1)?;
        let status: String = row.get(2)?;
        let angle: f64 = row.get(3)?;
        let duration: i64 = row.get(4)?;

        let conversion = |idx: usize, msg: String| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                msg.into(),
            )
        };

        let timestamp = DateTime::from_timestamp_micros(micros)
            .ok_or_else(|| conversion(1, format!("timestamp out of range: {micros}")))?;
        let status = PostureStatus::parse(&status)
            .ok_or_else(|| conversion(2, format!("unknown posture status: {status}")))?;
        let duration_seconds = u64::try_from(duration)
            .map_err(|_| conversion(4, format!("negative duration: {duration}")))?;

        Ok(PostureEvent {
            id: EventId::new(id),
            timestamp,
            status,
            angle,
            duration_seconds,
        })
    }

    /// Runs a single-value aggregate (`AVG(angle)`, `COUNT(*)`) over `query`.
    ///
    /// `query.limit` is honored by aggregating over a limited subquery.
    fn aggregate<T: rusqlite::types::FromSql>(
        &self,
        expr: &str,
        query: &LogQuery,
        operation: &'static str,
    ) -> Result<T> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            let (clause, params, next_idx) = build_where_clause_numbered(query, None, 1);
            let sql = match query.limit {
                Some(limit) => format!(
                    "SELECT {expr} FROM (SELECT angle FROM posture_logs{clause}{} LIMIT ?{next_idx})",
                    order_clause(query.order)
                ),
                None => format!("SELECT {expr} FROM posture_logs{clause}"),
            };

            let mut values = params;
            if let Some(limit) = query.limit {
                values.push(rusqlite::types::Value::Integer(
                    i64::try_from(limit).unwrap_or(i64::MAX),
                ));
            }

            conn.query_row(&sql, params_from_iter(values), |row| row.get(0))
                .map_err(|e| Error::query(operation, e))
        })();

        record_operation_metrics(BACKEND, operation, start, status_label(&result));
        result
    }
}

impl PostureLogStore for SqlitePostureStore {
    fn name(&self) -> &'static str {
        BACKEND
    }

    #[instrument(skip(self, event), fields(operation = "append", backend = "sqlite", event.id = %event.id))]
    fn append(&self, event: &PostureEvent) -> Result<()> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock_with_timeout(&self.conn, MUTEX_LOCK_TIMEOUT)
                .map_err(|e| Error::write("append", e))?;
            let duration = i64::try_from(event.duration_seconds)
                .map_err(|e| Error::write("append", e))?;

            conn.execute(
                "INSERT INTO posture_logs (id, timestamp_us, posture_status, angle, duration)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    event.id.as_str(),
                    to_micros(event.timestamp),
                    event.status.as_str(),
                    event.angle,
                    duration
                ],
            )
            .map_err(|e| Error::write("insert_posture_log", e))?;
            Ok(())
        })();

        record_operation_metrics(BACKEND, "append", start, status_label(&result));
        result
    }

    #[instrument(skip(self, query, after), fields(operation = "fetch_page", backend = "sqlite"))]
    fn fetch_page(
        &self,
        query: &LogQuery,
        after: Option<&PageCursor>,
        page_size: usize,
    ) -> Result<Vec<PostureEvent>> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            let (clause, mut values, next_idx) = build_where_clause_numbered(query, after, 1);
            let sql = format!(
                "SELECT {EVENT_COLUMNS} FROM posture_logs{clause}{} LIMIT ?{next_idx}",
                order_clause(query.order)
            );
            values.push(rusqlite::types::Value::Integer(
                i64::try_from(page_size).unwrap_or(i64::MAX),
            ));

            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| Error::query("prepare_fetch_page", e))?;
            let rows = stmt
                .query_map(params_from_iter(values), Self::event_from_row)
                .map_err(|e| Error::query("fetch_page", e))?;

            let events = rows
                .map(|row| row.map_err(|e| Error::query("fetch_page_row", e)))
                .collect::<Result<Vec<_>>>()?;
            Ok(events)
        })();

        record_operation_metrics(BACKEND, "fetch_page", start, status_label(&result));
        result
    }

    #[instrument(skip(self, query), fields(operation = "average_angle", backend = "sqlite"))]
    fn average_angle(&self, query: &LogQuery) -> Result<Option<f64>> {
        self.aggregate("AVG(angle)", query, "average_angle")
    }

    #[instrument(skip(self, query), fields(operation = "count", backend = "sqlite"))]
    fn count(&self, query: &LogQuery) -> Result<u64> {
        let count: i64 = self.aggregate("COUNT(*)", query, "count")?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
