//! Cache store trait.
//!
//! The cache is an append-only log of accepted submissions. The gate checks
//! only ever read it, through a [`Predicate`] and one of two modes: a count or
//! the first matching row.
//!
//! # Available Implementations
//!
//! | Backend | Use Case | Features |
//! |---------|----------|----------|
//! | `SqliteCacheStore` | Default; embedded or shared file | Bound parameters, WAL |
//! | `InMemoryCacheStore` | Tests and embedding | Direct predicate evaluation |
//!
//! # Consistency
//!
//! Other submissions append concurrently. A row inserted while a check runs may
//! or may not be visible to that check; the checks are advisory gates and
//! tolerate that skew. Stores never lock or transact on behalf of a check and
//! never retry: a failed query surfaces as an error.

use crate::Result;
use crate::models::CacheRecord;
use crate::storage::predicate::Predicate;

/// Trait for cache store backends.
///
/// # Implementor Notes
///
/// - Methods use `&self` to enable sharing via `Arc<dyn CacheStore>`
/// - Use interior mutability (e.g., `Mutex<Connection>`) for mutable state
/// - Bind every predicate value as a parameter, never inline it
/// - `find_first` must return rows in insertion order when several match
pub trait CacheStore: Send + Sync {
    /// Counts rows matching `predicate`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn count(&self, predicate: &Predicate) -> Result<u64>;

    /// Returns the first row matching `predicate`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn find_first(&self, predicate: &Predicate) -> Result<Option<CacheRecord>>;

    /// Returns the backend name used in metrics labels.
    fn backend_name(&self) -> &'static str;
}
