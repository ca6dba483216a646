//! Shared connection handling for the `SQLite` cache store.
//!
//! This module provides utilities for managing `SQLite` connections with proper
//! mutex handling, poison recovery, and concurrency configuration.

use crate::{Error, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Busy timeout applied to every connection, in milliseconds.
pub const BUSY_TIMEOUT_MS: u32 = 5000;

/// Helper to acquire mutex lock with poison recovery.
///
/// If the mutex is poisoned (due to a panic in a previous critical section),
/// we recover the inner value and log a warning. This prevents cascading
/// failures when one check panics.
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

/// Opens a file-backed connection.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if the database cannot be opened.
pub fn open_connection(path: &Path) -> Result<Connection> {
    Connection::open(path).map_err(|e| Error::OperationFailed {
        operation: "open_sqlite".to_string(),
        cause: e.to_string(),
    })
}

/// Opens a private in-memory connection.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if the database cannot be opened.
pub fn open_in_memory() -> Result<Connection> {
    Connection::open_in_memory().map_err(|e| Error::OperationFailed {
        operation: "open_sqlite_memory".to_string(),
        cause: e.to_string(),
    })
}

/// Configures a `SQLite` connection for a shared, multi-writer cache.
///
/// # Configuration Applied
///
/// - **WAL mode**: readers proceed while other submissions append
/// - **NORMAL synchronous**: balances durability with insert latency
/// - **`busy_timeout`**: waits [`BUSY_TIMEOUT_MS`] for locks instead of failing immediately
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if the busy timeout cannot be applied.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    // journal_mode returns a row ("wal" or "memory"), so its result is ignored
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    conn.busy_timeout(Duration::from_millis(u64::from(BUSY_TIMEOUT_MS)))
        .map_err(|e| Error::OperationFailed {
            operation: "configure_busy_timeout".to_string(),
            cause: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_acquire_lock_concurrent() {
        let mutex = Arc::new(Mutex::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let mutex = Arc::clone(&mutex);
                thread::spawn(move || {
                    *acquire_lock(&mutex) += 1;
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(*acquire_lock(&mutex), 8);
    }

    #[test]
    fn test_acquire_lock_recovers_poison() {
        let mutex = Arc::new(Mutex::new(1));
        let poisoner = Arc::clone(&mutex);
        let _ = thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the mutex");
        })
        .join();

        assert!(mutex.is_poisoned());
        assert_eq!(*acquire_lock(&mutex), 1);
    }

    #[test]
    fn test_configure_connection() {
        let conn = open_in_memory().unwrap();
        configure_connection(&conn).unwrap();

        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .unwrap();
        // In-memory databases cannot use WAL and report "memory"
        assert!(
            journal_mode.eq_ignore_ascii_case("wal") || journal_mode.eq_ignore_ascii_case("memory"),
            "unexpected journal mode '{journal_mode}'"
        );

        let busy_timeout: u32 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .unwrap();
        assert_eq!(busy_timeout, BUSY_TIMEOUT_MS);
    }
}
