//! Cache store backends.

mod memory;
mod sqlite;

pub use memory::InMemoryCacheStore;
pub use sqlite::SqliteCacheStore;
