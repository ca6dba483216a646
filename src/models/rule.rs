//! Limit and duplicate rules.
//!
//! Rules arrive from client configuration as JSON documents of the form
//! `{"rules": [...]}`. Order is the caller's priority and is never re-sorted.

use crate::models::duration::window_start;
use crate::models::{MatchingFlags, ScopeFlags};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A budget rule: at most `quantity` submissions in `duration`, narrowed by `scope`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitRule {
    /// Scope value: a UTM source or a category id, depending on `scope`.
    #[serde(default)]
    pub value: String,
    /// Scope bits narrowing the count.
    pub scope: ScopeFlags,
    /// ISO-8601 window length.
    pub duration: String,
    /// Submissions allowed inside the window.
    pub quantity: u64,
}

impl LimitRule {
    /// Creates a rule.
    #[must_use]
    pub fn new(
        value: impl Into<String>,
        scope: ScopeFlags,
        duration: impl Into<String>,
        quantity: u64,
    ) -> Self {
        Self {
            value: value.into(),
            scope,
            duration: duration.into(),
            quantity,
        }
    }

    /// Returns the oldest instant inside this rule's window.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDuration`] if `duration` is malformed.
    pub fn window_start(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        window_start(&self.duration, now)
    }
}

/// A duplicate rule: a prior submission matching on `matching`, narrowed by `scope`,
/// inside `duration`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateRule {
    /// Contact fields compared.
    pub matching: MatchingFlags,
    /// Scope bits narrowing the match.
    pub scope: ScopeFlags,
    /// ISO-8601 window length.
    pub duration: String,
}

impl DuplicateRule {
    /// Creates a rule.
    #[must_use]
    pub fn new(matching: MatchingFlags, scope: ScopeFlags, duration: impl Into<String>) -> Self {
        Self {
            matching,
            scope,
            duration: duration.into(),
        }
    }

    /// Returns the oldest instant inside this rule's window.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDuration`] if `duration` is malformed.
    pub fn window_start(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        window_start(&self.duration, now)
    }
}

#[derive(Deserialize)]
struct RuleDocument<R> {
    #[serde(default = "Vec::new")]
    rules: Vec<R>,
}

fn parse_rules<R: for<'de> Deserialize<'de>>(json: &str, kind: &str) -> Result<Vec<R>> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str::<RuleDocument<R>>(json)
        .map(|doc| doc.rules)
        .map_err(|e| Error::InvalidInput(format!("{kind} rules: {e}")))
}

/// Parses a client's limit configuration.
///
/// An empty document yields no rules.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the JSON does not describe limit rules.
///
/// # Example
///
/// ```rust
/// use contact_gate::models::{ScopeFlags, parse_limit_rules};
///
/// let rules = parse_limit_rules(
///     r#"{"rules": [{"value": "", "scope": 1, "duration": "P1D", "quantity": 100}]}"#,
/// )?;
/// assert_eq!(rules[0].scope, ScopeFlags::GLOBAL);
/// # Ok::<(), contact_gate::Error>(())
/// ```
pub fn parse_limit_rules(json: &str) -> Result<Vec<LimitRule>> {
    parse_rules(json, "limit")
}

/// Parses a client's duplicate configuration.
///
/// An empty document yields no rules.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the JSON does not describe duplicate rules.
pub fn parse_duplicate_rules(json: &str) -> Result<Vec<DuplicateRule>> {
    parse_rules(json, "duplicate")
}
