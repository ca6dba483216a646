//! Shared `SQLite` infrastructure for the cache store.
//!
//! ## Module Structure
//!
//! - [`connection`]: Connection handling ([`Mutex<Connection>`](rusqlite::Connection), lock acquisition, configuration)
//! - [`sql`]: Predicate rendering with numbered parameters
//! - [`record_row`]: Row conversion for [`CacheRecord`](crate::models::CacheRecord)
//! - [`metrics`]: Shared metrics recording helpers

mod connection;
mod metrics;
mod record_row;
mod sql;

pub use connection::{
    BUSY_TIMEOUT_MS, acquire_lock, configure_connection, open_connection, open_in_memory,
};
pub use metrics::record_operation_metrics;
pub use record_row::{CacheRow, RECORD_COLUMNS, build_record_from_row, insert_record, select_list};
pub use sql::{CACHE_TABLE, TABLE_ALIAS, render_predicate, to_sql_value};
