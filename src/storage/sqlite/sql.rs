//! SQL construction for posture log scans.
//!
//! Every clause uses numbered parameters (`?1`, `?2`, ...); values never get
//! interpolated into the SQL text.

use crate::storage::traits::{LogQuery, PageCursor, SortOrder};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;

/// Column list shared by every row-returning select.
pub const EVENT_COLUMNS: &str = "id, timestamp_us, posture_status, angle, duration";

/// Converts a timestamp to the stored microsecond column value.
#[must_use]
pub fn to_micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

/// Builds the WHERE clause for `query`, optionally continuing after `cursor`.
///
/// Returns the clause (empty, or starting with ` WHERE `), the parameter
/// values in order and the next free parameter index.
#[must_use]
pub fn build_where_clause_numbered(
    query: &LogQuery,
    cursor: Option<&PageCursor>,
    start_param: usize,
) -> (String, Vec<Value>, usize) {
    let mut conditions = Vec::new();
    let mut params = Vec::new();
    let mut param_idx = start_param;

    let mut push = |condition: &str, value: Value, conditions: &mut Vec<String>| {
        conditions.push(condition.replace("{}", &format!("?{param_idx}")));
        params.push(value);
        param_idx += 1;
    };

    if let Some(since) = query.since {
        push("timestamp_us >= {}", Value::Integer(to_micros(since)), &mut conditions);
    }
    if let Some(until) = query.until {
        push("timestamp_us <= {}", Value::Integer(to_micros(until)), &mut conditions);
    }
    if let Some(before) = query.before {
        push("timestamp_us < {}", Value::Integer(to_micros(before)), &mut conditions);
    }
    if let Some(status) = query.status {
        push(
            "posture_status = {}",
            Value::Text(status.as_str().to_string()),
            &mut conditions,
        );
    }

    if let Some(cursor) = cursor {
        let cmp = match query.order {
            SortOrder::Descending => "<",
            SortOrder::Ascending => ">",
        };
        let ts_param = param_idx;
        let id_param = param_idx + 1;
        conditions.push(format!(
            "(timestamp_us {cmp} ?{ts_param} OR (timestamp_us = ?{ts_param} AND id {cmp} ?{id_param}))"
        ));
        params.push(Value::Integer(to_micros(cursor.timestamp)));
        params.push(Value::Text(cursor.id.as_str().to_string()));
        param_idx += 2;
    }

    let clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    (clause, params, param_idx)
}

/// ORDER BY clause matching the keyset cursor.
#[must_use]
pub const fn order_clause(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Descending => " ORDER BY timestamp_us DESC, id DESC",
        SortOrder::Ascending => " ORDER BY timestamp_us ASC, id ASC",
    }
}
