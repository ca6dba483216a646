//! # Contact Gate
//!
//! Rule-driven limit, duplicate and exclusivity checks over a contact cache.
//!
//! Every accepted contact submission is appended to a cache. Before a new
//! contact is sent to a client, the gate asks three read-only questions:
//!
//! - **Limits**: has the client already received its budget for the window?
//! - **Duplicates**: was this contact sent to the client recently?
//! - **Exclusivity**: has another submission reserved this contact?
//!
//! Rules are ordered lists of bitmask-driven criteria; the checks compose
//! them into predicate trees executed by a [`storage::CacheStore`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use contact_gate::{CacheGate, GateConfig, models::{Contact, ContactClient, parse_duplicate_rules}};
//!
//! let gate = CacheGate::from_config(&GateConfig::load_default().with_env_overrides()?)?;
//! let rules = parse_duplicate_rules(client_json)?;
//! if let Some(previous) = gate.find_duplicate(&contact, &client, &rules, utm_source)? {
//!     println!("duplicate of cache row {}", previous.id);
//! }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::GateConfig;
pub use models::{
    CacheRecord, Contact, ContactClient, DuplicateRule, LimitRule, MatchingFlags, ScopeFlags,
};
pub use services::gate::{CacheGate, E164Normalizer, LimitHit, PhoneNormalizer};
pub use storage::{CacheStore, InMemoryCacheStore, SqliteCacheStore};

/// Error type for gate operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
/// "No match" is never an error: checks return `Ok(None)`.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Malformed rule JSON, unusable phone numbers, bad config values |
/// | `InvalidDuration` | A rule's ISO-8601 duration cannot be parsed or applied |
/// | `OperationFailed` | `SQLite` queries fail, config files cannot be read |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - Rule JSON does not deserialize
    /// - A phone number cannot be normalized (recovered by the checks)
    /// - A configuration value is out of range
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A rule duration is malformed.
    ///
    /// Fatal for the check evaluating the rule: its window cannot be computed.
    #[error("invalid duration '{value}': {reason}")]
    InvalidDuration {
        /// The offending duration string.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An operation failed.
    ///
    /// Raised when:
    /// - `SQLite` database operations fail
    /// - Configuration or log files cannot be read or opened
    /// - A stored row holds a value outside its domain
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for gate operations.
pub type Result<T> = std::result::Result<T, Error>;
