//! In-memory cache store for testing.
//!
//! Evaluates predicates directly against stored records. Results agree with
//! [`SqliteCacheStore`](super::SqliteCacheStore) for the same data.

use crate::models::CacheRecord;
use crate::storage::predicate::Predicate;
use crate::storage::sqlite::record_operation_metrics;
use crate::storage::traits::CacheStore;
use crate::{Error, Result};
use chrono::SubsecRound;
use std::sync::RwLock;
use std::time::Instant;

/// In-memory cache store.
///
/// Uses `RwLock` for thread-safe access with reader-writer semantics.
/// Data is not persisted between runs.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    records: RwLock<Vec<CacheRecord>>,
}

impl InMemoryCacheStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record, assigning the next id, and returns that id.
    ///
    /// Timestamps are kept to the millisecond, as in the `SQLite` store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if an exclusivity column holds a
    /// combined mask, or an error if the lock is poisoned.
    pub fn insert(&self, record: &CacheRecord) -> Result<i64> {
        let start = Instant::now();
        let result = record
            .validate()
            .and_then(|()| {
                self.records.write().map_err(|_| Error::OperationFailed {
                    operation: "insert".to_string(),
                    cause: "Lock poisoned".to_string(),
                })
            })
            .map(|mut records| {
                let id = records.last().map_or(1, |last| last.id + 1);
                let mut stored = record.clone();
                stored.id = id;
                stored.date_added = stored.date_added.trunc_subsecs(3);
                stored.exclusive_expire_date =
                    stored.exclusive_expire_date.map(|d| d.trunc_subsecs(3));
                records.push(stored);
                id
            });

        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics("memory", "insert", start, status);
        result
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Returns true if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for InMemoryCacheStore {
    fn count(&self, predicate: &Predicate) -> Result<u64> {
        let start = Instant::now();
        let result = self
            .records
            .read()
            .map_err(|_| Error::OperationFailed {
                operation: "count".to_string(),
                cause: "Lock poisoned".to_string(),
            })
            .map(|records| records.iter().filter(|r| predicate.matches(r)).count() as u64);

        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics("memory", "count", start, status);
        result
    }

    fn find_first(&self, predicate: &Predicate) -> Result<Option<CacheRecord>> {
        let start = Instant::now();
        let result = self
            .records
            .read()
            .map_err(|_| Error::OperationFailed {
                operation: "find_first".to_string(),
                cause: "Lock poisoned".to_string(),
            })
            .map(|records| records.iter().find(|r| predicate.matches(r)).cloned());

        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics("memory", "find_first", start, status);
        result
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
