//! Budget limits.
//!
//! Each rule counts the client's submissions inside the rule's window,
//! optionally narrowed to a UTM source or a category. The first rule whose
//! count exceeds its quantity is reported; later rules are not evaluated.

use crate::Result;
use crate::models::{ContactClient, LimitRule, ScopeFlags};
use crate::services::gate::builder::{FilterGroup, count_matching};
use crate::storage::predicate::Column;
use crate::storage::traits::CacheStore;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A rule that has been exceeded, with the count observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LimitHit {
    /// The exceeded rule.
    pub rule: LimitRule,
    /// Submissions counted inside the rule's window.
    pub count: u64,
}

/// Parses the leading integer of `value`, as a lenient numeric cast would.
///
/// Leading whitespace and a sign are accepted; parsing stops at the first
/// non-digit. Anything without leading digits is zero.
fn leading_integer(value: &str) -> i64 {
    let trimmed = value.trim_start();
    let (sign, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1, &trimmed[1..]),
        Some(b'+') => (1, &trimmed[1..]),
        _ => (1, trimmed),
    };
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let digits = &rest[..digits_end];
    if digits.is_empty() {
        return 0;
    }
    digits
        .parse::<i64>()
        .map_or(if sign < 0 { i64::MIN } else { i64::MAX }, |n| sign * n)
}

/// Builds the OR-group counted for one rule.
///
/// # Errors
///
/// Returns [`Error::InvalidDuration`](crate::Error::InvalidDuration) if the
/// rule's duration is malformed.
pub fn limit_group(rule: &LimitRule, client_id: i64, now: DateTime<Utc>) -> Result<FilterGroup> {
    let cutoff = rule.window_start(now)?;
    let mut group = FilterGroup::any().with_window(client_id, cutoff);

    if rule.scope.has_flag(ScopeFlags::UTM_SOURCE) {
        let source = rule.value.trim();
        if !source.is_empty() {
            group = group.with_field(Column::UtmSource, source);
        }
    }
    if rule.scope.has_flag(ScopeFlags::CATEGORY) {
        let category = leading_integer(&rule.value);
        if category != 0 {
            group = group.with_field(Column::CategoryId, category);
        }
    }

    Ok(group)
}

/// Returns the first rule whose window count exceeds its quantity.
///
/// # Errors
///
/// Returns an error if a duration is malformed or the store query fails.
pub fn find_limit<S: CacheStore + ?Sized>(
    store: &S,
    client: &ContactClient,
    rules: &[LimitRule],
    now: DateTime<Utc>,
) -> Result<Option<LimitHit>> {
    for (index, rule) in rules.iter().enumerate() {
        let group = limit_group(rule, client.id, now)?;
        let count = count_matching(store, std::slice::from_ref(&group))?;
        tracing::debug!(
            rule.index = index,
            rule.quantity = rule.quantity,
            count,
            "evaluated limit rule"
        );

        if count > rule.quantity {
            return Ok(Some(LimitHit {
                rule: rule.clone(),
                count,
            }));
        }
    }
    Ok(None)
}
