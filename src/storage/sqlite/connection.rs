//! Connection handling for the `SQLite` posture log.
//!
//! The store holds one `Mutex<Connection>`. Reads from the dashboard and the
//! single event writer serialize on it; WAL mode keeps readers from stalling
//! on the writer at the file level.

use crate::{Error, Result};
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Upper bound on waiting for the connection mutex during appends.
pub const MUTEX_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Acquires the mutex, recovering from poison.
///
/// A panic while holding the connection does not leave it unusable, so the
/// guard is recovered and a warning is logged.
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Acquires the mutex, giving up after `timeout`.
///
/// Used on the write path so a stuck reader cannot stall the frame loop's
/// writer thread indefinitely.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if the lock cannot be acquired in time.
pub fn acquire_lock_with_timeout<T>(
    mutex: &Mutex<T>,
    timeout: Duration,
) -> Result<MutexGuard<'_, T>> {
    let start = Instant::now();
    let sleep_duration = Duration::from_millis(10);

    loop {
        match mutex.try_lock() {
            Ok(guard) => return Ok(guard),
            Err(std::sync::TryLockError::Poisoned(poisoned)) => {
                tracing::warn!("SQLite mutex was poisoned, recovering");
                metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
                return Ok(poisoned.into_inner());
            },
            Err(std::sync::TryLockError::WouldBlock) => {
                if start.elapsed() > timeout {
                    metrics::counter!("sqlite_mutex_timeout_total").increment(1);
                    return Err(Error::operation(
                        "acquire_lock",
                        format!("Lock acquisition timed out after {timeout:?}"),
                    ));
                }
                std::thread::sleep(sleep_duration);
            },
        }
    }
}

/// Applies WAL journaling, NORMAL synchronous and a 5 s busy timeout.
///
/// `journal_mode` returns a row, so pragmas go through `pragma_update` and
/// their results are ignored; in-memory databases silently keep `memory`.
///
/// # Errors
///
/// Currently infallible; kept fallible for callers that `?` it.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    let _ = conn.pragma_update(None, "busy_timeout", "5000");
    Ok(())
}
