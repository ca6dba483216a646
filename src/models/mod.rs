//! Data models for contact-gate.
//!
//! This module contains the rule, contact and cache record types shared by the
//! gate checks and the stores.

mod contact;
pub mod duration;
mod flags;
mod record;
mod rule;

pub use contact::{Contact, ContactClient, non_empty, non_empty_title, title_case};
pub use duration::RuleDuration;
pub use flags::{MatchingFlags, ScopeFlags, bits_set_up_to};
pub use record::CacheRecord;
pub use rule::{DuplicateRule, LimitRule, parse_duplicate_rules, parse_limit_rules};
