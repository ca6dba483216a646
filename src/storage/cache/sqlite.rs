//! SQLite-backed cache store.
//!
//! Holds the append-only `contact_cache` table. Checks read it through
//! rendered predicates with bound parameters.

use crate::models::CacheRecord;
use crate::storage::predicate::Predicate;
use crate::storage::sqlite::{
    CACHE_TABLE, CacheRow, TABLE_ALIAS, acquire_lock, build_record_from_row, configure_connection,
    insert_record, open_connection, open_in_memory, record_operation_metrics, render_predicate,
    select_list,
};
use crate::storage::traits::CacheStore;
use crate::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params_from_iter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::instrument;

/// SQLite-backed cache store.
///
/// # Concurrency Model
///
/// Uses a `Mutex<Connection>` for thread-safe access. WAL mode and a busy
/// timeout let several processes share one database file.
pub struct SqliteCacheStore {
    /// Connection to the `SQLite` database.
    conn: Mutex<Connection>,
    /// Path to the `SQLite` database (None for in-memory).
    db_path: Option<PathBuf>,
}

impl SqliteCacheStore {
    /// Opens (or creates) a cache database at `db_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let conn = open_connection(&db_path)?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };

        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory cache store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(open_in_memory()?),
            db_path: None,
        };

        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path.
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Initializes the database schema.
    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        configure_connection(&conn)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS contact_cache (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                client_id INTEGER NOT NULL,
                contact_id INTEGER,
                email TEXT,
                phone TEXT,
                mobile TEXT,
                address1 TEXT,
                address2 TEXT,
                city TEXT,
                state TEXT,
                zipcode TEXT,
                country TEXT,
                category_id INTEGER,
                utm_source TEXT,
                date_added INTEGER NOT NULL,
                exclusive_pattern INTEGER,
                exclusive_scope INTEGER,
                exclusive_expire_date INTEGER
            )",
            [],
        )
        .map_err(|e| Error::OperationFailed {
            operation: "create_contact_cache_table".to_string(),
            cause: e.to_string(),
        })?;

        Self::create_indexes(&conn);
        Ok(())
    }

    /// Creates indexes for the columns the checks filter on.
    fn create_indexes(conn: &Connection) {
        // Limit windows filter on client and date together
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_contact_cache_client_date
             ON contact_cache(client_id, date_added)",
            [],
        );
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_contact_cache_email ON contact_cache(email)",
            [],
        );
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_contact_cache_phone ON contact_cache(phone)",
            [],
        );
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_contact_cache_mobile ON contact_cache(mobile)",
            [],
        );
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_contact_cache_contact ON contact_cache(contact_id)",
            [],
        );
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_contact_cache_expire
             ON contact_cache(exclusive_expire_date)",
            [],
        );
    }

    /// Appends a submission to the cache and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    #[instrument(skip(self, record), fields(operation = "insert", backend = "sqlite", client.id = record.client_id))]
    pub fn insert(&self, record: &CacheRecord) -> Result<i64> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            insert_record(&conn, record)
        })();

        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics("sqlite", "insert", start, status);
        result
    }
}

impl CacheStore for SqliteCacheStore {
    #[instrument(skip(self, predicate), fields(operation = "count", backend = "sqlite"))]
    fn count(&self, predicate: &Predicate) -> Result<u64> {
        let start = Instant::now();
        let result = (|| {
            let (clause, params, _) = render_predicate(predicate, 1);
            let sql = format!("SELECT COUNT(*) FROM {CACHE_TABLE} {TABLE_ALIAS} WHERE {clause}");
            tracing::debug!(sql = %sql, params = params.len(), "counting cache rows");

            let conn = acquire_lock(&self.conn);
            let count: i64 = conn
                .query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))
                .map_err(|e| Error::OperationFailed {
                    operation: "count_cache_rows".to_string(),
                    cause: e.to_string(),
                })?;

            u64::try_from(count).map_err(|e| Error::OperationFailed {
                operation: "count_cache_rows".to_string(),
                cause: e.to_string(),
            })
        })();

        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics("sqlite", "count", start, status);
        result
    }

    #[instrument(skip(self, predicate), fields(operation = "find_first", backend = "sqlite"))]
    fn find_first(&self, predicate: &Predicate) -> Result<Option<CacheRecord>> {
        let start = Instant::now();
        let result = (|| {
            let (clause, params, _) = render_predicate(predicate, 1);
            let sql = format!(
                "SELECT {} FROM {CACHE_TABLE} {TABLE_ALIAS} WHERE {clause} \
                 ORDER BY {TABLE_ALIAS}.id ASC LIMIT 1",
                select_list()
            );
            tracing::debug!(sql = %sql, params = params.len(), "finding first cache row");

            let conn = acquire_lock(&self.conn);
            let row = conn
                .query_row(&sql, params_from_iter(params.iter()), CacheRow::from_row)
                .optional()
                .map_err(|e| Error::OperationFailed {
                    operation: "find_first_cache_row".to_string(),
                    cause: e.to_string(),
                })?;

            row.map(build_record_from_row).transpose()
        })();

        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics("sqlite", "find_first", start, status);
        result
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MatchingFlags, ScopeFlags};
    use crate::storage::predicate::Column;
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::TempDir;

    fn store() -> SqliteCacheStore {
        SqliteCacheStore::in_memory().unwrap()
    }

    #[test]
    fn test_insert_assigns_incremental_ids() {
        let store = store();
        let now = Utc::now();
        let first = store.insert(&CacheRecord::new(1, now)).unwrap();
        let second = store.insert(&CacheRecord::new(1, now)).unwrap();
        assert_eq!(second, first + 1);
    }

    #[test]
    fn test_count_with_window() {
        let store = store();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        store.insert(&CacheRecord::new(7, now - Duration::days(1))).unwrap();
        store.insert(&CacheRecord::new(7, now - Duration::days(10))).unwrap();
        store.insert(&CacheRecord::new(8, now)).unwrap();

        let predicate = Predicate::And(vec![
            Predicate::Equals(Column::ClientId, 7_i64.into()),
            Predicate::Gte(Column::DateAdded, (now - Duration::days(7)).into()),
        ]);
        assert_eq!(store.count(&predicate).unwrap(), 1);
    }

    #[test]
    fn test_find_first_returns_lowest_id() {
        let store = store();
        let now = Utc::now();
        store
            .insert(&CacheRecord::new(1, now).with_email("a@b.com"))
            .unwrap();
        let second = store
            .insert(&CacheRecord::new(2, now).with_email("a@b.com"))
            .unwrap();
        store
            .insert(&CacheRecord::new(3, now).with_email("other@b.com"))
            .unwrap();

        let found = store
            .find_first(&Predicate::Equals(Column::Email, "a@b.com".into()))
            .unwrap()
            .unwrap();
        assert_eq!(found.id, second - 1);
        assert_eq!(found.client_id, 1);
    }

    #[test]
    fn test_find_first_none() {
        let store = store();
        let found = store
            .find_first(&Predicate::Equals(Column::Email, "missing@b.com".into()))
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_exclusivity_round_trips_through_table() {
        let store = store();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let expires = now + Duration::days(30);
        store
            .insert(&CacheRecord::new(4, now).with_mobile("+15551234567").with_exclusivity(
                MatchingFlags::MOBILE,
                ScopeFlags::CATEGORY,
                Some(expires),
            ))
            .unwrap();

        let found = store
            .find_first(&Predicate::In(
                Column::ExclusivePattern,
                vec![8_i64.into(), 9_i64.into()],
            ))
            .unwrap()
            .unwrap();
        assert_eq!(found.exclusive_pattern, Some(MatchingFlags::MOBILE));
        assert_eq!(found.exclusive_scope, Some(ScopeFlags::CATEGORY));
        assert_eq!(found.exclusive_expire_date, Some(expires));
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.db");
        {
            let store = SqliteCacheStore::new(&path).unwrap();
            assert_eq!(store.db_path(), Some(path.as_path()));
            store.insert(&CacheRecord::new(1, Utc::now())).unwrap();
        }

        let reopened = SqliteCacheStore::new(&path).unwrap();
        assert_eq!(reopened.count(&Predicate::And(vec![])).unwrap(), 1);
    }
}
