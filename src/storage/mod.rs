//! Storage layer abstraction.
//!
//! The contact cache is reached through the [`CacheStore`] trait:
//! - **Predicates**: backend-neutral filter trees ([`predicate`])
//! - **Backends**: `SQLite` ([`SqliteCacheStore`]) and in-memory ([`InMemoryCacheStore`])
//! - **`SQLite` plumbing**: connection handling, rendering, row mapping ([`sqlite`])

// Allow significant_drop_tightening - dropping database connections slightly early
// provides no meaningful benefit.
#![allow(clippy::significant_drop_tightening)]
// Allow cast_possible_truncation for usize counts widened to u64.
#![allow(clippy::cast_possible_truncation)]
// Allow redundant_closure_call for the result-then-record-metrics pattern.
#![allow(clippy::redundant_closure_call)]

pub mod cache;
pub mod predicate;
pub mod sqlite;
pub mod traits;

pub use cache::{InMemoryCacheStore, SqliteCacheStore};
pub use predicate::{Column, Predicate, Value};
pub use traits::CacheStore;
