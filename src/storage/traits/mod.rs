//! Storage backend traits.

mod cache;

pub use cache::CacheStore;
