//! Filter group composition.
//!
//! Evaluators describe what they want to match as an ordered list of
//! [`FilterGroup`]s. [`build_predicate`] folds them into one [`Predicate`]:
//!
//! ```text
//! (untagged_1 OR untagged_2 ...)
//!   AND ((tagged_1 OR tagged_2 ...)
//!        AND (exclusive_expire_date IS NULL OR exclusive_expire_date >= tag))
//! ```
//!
//! Either side is omitted when it has no groups. Groups with no fields and no
//! window are dropped, so a rule with nothing usable never turns into a
//! match-everything clause.

use crate::Result;
use crate::models::CacheRecord;
use crate::storage::predicate::{Column, Predicate, Value};
use crate::storage::traits::CacheStore;
use chrono::{DateTime, Utc};

/// How a group's fields are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// Any field may match (OR).
    Any,
    /// Every field must match (AND).
    All,
}

/// An immutable set of field constraints built with consuming methods.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGroup {
    combinator: Combinator,
    fields: Vec<(Column, Vec<Value>)>,
    nested: Vec<Self>,
    window: Option<(i64, DateTime<Utc>)>,
    expiration: Option<DateTime<Utc>>,
}

impl FilterGroup {
    const fn new(combinator: Combinator) -> Self {
        Self {
            combinator,
            fields: Vec::new(),
            nested: Vec::new(),
            window: None,
            expiration: None,
        }
    }

    /// Creates an OR-group.
    #[must_use]
    pub const fn any() -> Self {
        Self::new(Combinator::Any)
    }

    /// Creates an AND-group.
    #[must_use]
    pub const fn all() -> Self {
        Self::new(Combinator::All)
    }

    /// Sets `column = value`, replacing any earlier value for `column`.
    #[must_use]
    pub fn with_field(self, column: Column, value: impl Into<Value>) -> Self {
        self.with_values(column, vec![value.into()])
    }

    /// Sets `column IN values`, replacing any earlier value for `column`.
    #[must_use]
    pub fn with_values(mut self, column: Column, values: Vec<Value>) -> Self {
        if let Some(entry) = self.fields.iter_mut().find(|(c, _)| *c == column) {
            entry.1 = values;
        } else {
            self.fields.push((column, values));
        }
        self
    }

    /// Adds a nested group as one more term of this group. Empty groups are ignored.
    #[must_use]
    pub fn with_group(mut self, group: Self) -> Self {
        if !group.is_empty() {
            self.nested.push(group);
        }
        self
    }

    /// Restricts the group to `client_id = client_id AND date_added >= cutoff`.
    #[must_use]
    pub const fn with_window(mut self, client_id: i64, cutoff: DateTime<Utc>) -> Self {
        self.window = Some((client_id, cutoff));
        self
    }

    /// Tags the group so that only reservations unexpired at `at` match.
    #[must_use]
    pub const fn with_expiration(mut self, at: DateTime<Utc>) -> Self {
        self.expiration = Some(at);
        self
    }

    /// Returns the combinator.
    #[must_use]
    pub const fn combinator(&self) -> Combinator {
        self.combinator
    }

    /// Returns the values set for `column`, if any.
    #[must_use]
    pub fn values(&self, column: Column) -> Option<&[Value]> {
        self.fields
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, values)| values.as_slice())
    }

    /// Returns the columns set on this group, in insertion order.
    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.fields.iter().map(|(column, _)| *column)
    }

    /// Returns the window, if any.
    #[must_use]
    pub const fn window(&self) -> Option<(i64, DateTime<Utc>)> {
        self.window
    }

    /// Returns the expiration tag, if any.
    #[must_use]
    pub const fn expiration(&self) -> Option<DateTime<Utc>> {
        self.expiration
    }

    /// Returns true if the group has no field constraints.
    #[must_use]
    pub fn has_no_fields(&self) -> bool {
        self.fields.is_empty() && self.nested.is_empty()
    }

    /// Returns true if the group constrains nothing and would be dropped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.has_no_fields() && self.window.is_none()
    }

    /// Returns the group's own body, without its expiration tag.
    fn body(&self) -> Option<Predicate> {
        let mut terms: Vec<Predicate> = self
            .fields
            .iter()
            .map(|(column, values)| match values.as_slice() {
                [single] => Predicate::Equals(*column, single.clone()),
                _ => Predicate::In(*column, values.clone()),
            })
            .collect();
        terms.extend(self.nested.iter().filter_map(Self::body));

        let fields = if terms.is_empty() {
            None
        } else {
            Some(match self.combinator {
                Combinator::Any => Predicate::any(terms),
                Combinator::All => Predicate::all(terms),
            })
        };

        match (fields, self.window) {
            (None, None) => None,
            (Some(fields), None) => Some(fields),
            (fields, Some((client_id, cutoff))) => {
                let mut parts = vec![
                    Predicate::Equals(Column::ClientId, client_id.into()),
                    Predicate::Gte(Column::DateAdded, cutoff.into()),
                ];
                parts.extend(fields);
                Some(Predicate::all(parts))
            },
        }
    }
}

/// Folds filter groups into one predicate.
///
/// Returns `None` when no group survives; callers treat that as "no match"
/// without querying the store.
#[must_use]
pub fn build_predicate(groups: &[FilterGroup]) -> Option<Predicate> {
    let mut untagged = Vec::new();
    let mut tagged = Vec::new();
    let mut tag: Option<DateTime<Utc>> = None;

    for group in groups {
        let Some(body) = group.body() else { continue };
        match group.expiration {
            None => untagged.push(body),
            Some(at) => {
                // Groups built together share one tag; the latest one wins
                tag = Some(tag.map_or(at, |current| current.max(at)));
                tagged.push(body);
            },
        }
    }

    let mut parts = Vec::new();
    if !untagged.is_empty() {
        parts.push(Predicate::any(untagged));
    }
    if let Some(at) = tag {
        parts.push(Predicate::all(vec![
            Predicate::any(tagged),
            Predicate::Or(vec![
                Predicate::IsNull(Column::ExclusiveExpireDate),
                Predicate::Gte(Column::ExclusiveExpireDate, at.into()),
            ]),
        ]));
    }

    if parts.is_empty() {
        None
    } else {
        Some(Predicate::all(parts))
    }
}

/// Counts rows matching `groups`. Zero without a query when nothing survives.
///
/// # Errors
///
/// Returns an error if the store query fails.
pub fn count_matching<S: CacheStore + ?Sized>(store: &S, groups: &[FilterGroup]) -> Result<u64> {
    build_predicate(groups).map_or(Ok(0), |predicate| store.count(&predicate))
}

/// Returns the first row matching `groups`. `None` without a query when nothing survives.
///
/// # Errors
///
/// Returns an error if the store query fails.
pub fn first_matching<S: CacheStore + ?Sized>(
    store: &S,
    groups: &[FilterGroup],
) -> Result<Option<CacheRecord>> {
    build_predicate(groups).map_or(Ok(None), |predicate| store.find_first(&predicate))
}
