//! Submission gate checks over the contact cache.
//!
//! Three read-only checks decide whether a contact may be sent to a client:
//! 1. **Limits**: has the client received too many submissions in a window?
//! 2. **Duplicates**: was this contact already sent to the client recently?
//! 3. **Exclusivity**: has another submission reserved this contact?
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          CacheGate                           │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────────┐  │
//! │  │ limit        │  │ duplicate    │  │ exclusive          │  │
//! │  │ OR-group per │  │ OR-group per │  │ AND-group per type │  │
//! │  │ rule, count  │  │ rule, first  │  │ and scope, first   │  │
//! │  └──────┬───────┘  └──────┬───────┘  └─────────┬──────────┘  │
//! │         └────── builder: FilterGroup → Predicate ─┘           │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                ▼
//!                           CacheStore
//! ```
//!
//! The group builders are pure and can be inspected without a store.

pub mod builder;
pub mod duplicate;
pub mod exclusive;
pub mod limit;
mod phone;
mod service;

pub use builder::{Combinator, FilterGroup, build_predicate, count_matching, first_matching};
pub use duplicate::duplicate_groups;
pub use exclusive::exclusive_groups;
pub use limit::{LimitHit, limit_group};
pub use phone::{E164Normalizer, PhoneNormalizer, usable_phone};
pub use service::CacheGate;
