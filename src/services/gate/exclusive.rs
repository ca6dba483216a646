//! Exclusivity conflicts.
//!
//! A cached submission may reserve a contact for its client under one matching
//! type and one scope until an expiry. A new submission conflicts when any of
//! its identifying fields equals a live reservation made under that field's
//! type or a lower-numbered type that is also active in the request.
//!
//! Every matching type yields one AND-group at global scope and, for a
//! categorised client, a second one at category scope:
//!
//! ```text
//! email = ? AND exclusive_pattern IN (1, 2) AND exclusive_scope IN (1)
//! email = ? AND exclusive_pattern IN (1, 2) AND category_id = ? AND exclusive_scope IN (1, 2)
//! ```
//!
//! Address is never part of an exclusivity check.

use crate::Result;
use crate::models::{CacheRecord, Contact, ContactClient, MatchingFlags, ScopeFlags, bits_set_up_to, non_empty};
use crate::services::gate::builder::{FilterGroup, first_matching};
use crate::services::gate::phone::{PhoneNormalizer, usable_phone};
use crate::storage::predicate::{Column, Value};
use crate::storage::traits::CacheStore;
use chrono::{DateTime, Utc};

fn subsumption_set(max: u32, mask: u32) -> Vec<Value> {
    bits_set_up_to(max, mask).into_iter().map(Value::from).collect()
}

/// Returns the identifying value for each active matching type, in priority order.
fn identifiers<N: PhoneNormalizer + ?Sized>(
    contact: &Contact,
    matching: MatchingFlags,
    normalizer: &N,
) -> Vec<(MatchingFlags, Column, Value)> {
    let candidates = [
        (
            MatchingFlags::EXPLICIT,
            Column::ContactId,
            contact.id.map(Value::from),
        ),
        (
            MatchingFlags::EMAIL,
            Column::Email,
            non_empty(contact.email.as_deref()).map(Value::from),
        ),
        (
            MatchingFlags::PHONE,
            Column::Phone,
            usable_phone(normalizer, contact.phone.as_deref()).map(Value::from),
        ),
        (
            MatchingFlags::MOBILE,
            Column::Mobile,
            usable_phone(normalizer, contact.mobile.as_deref()).map(Value::from),
        ),
    ];

    candidates
        .into_iter()
        .filter(|(flag, _, _)| matching.has_flag(*flag))
        .filter_map(|(flag, column, value)| value.map(|value| (flag, column, value)))
        .collect()
}

/// Builds the exclusivity groups for `contact`, all tagged to expire-check at `now`.
#[must_use]
pub fn exclusive_groups<N: PhoneNormalizer + ?Sized>(
    contact: &Contact,
    client: &ContactClient,
    matching: MatchingFlags,
    normalizer: &N,
    now: DateTime<Utc>,
) -> Vec<FilterGroup> {
    let scopes = ScopeFlags::EXCLUSIVE.bits();
    let base: Vec<FilterGroup> = identifiers(contact, matching, normalizer)
        .into_iter()
        .map(|(flag, column, value)| {
            FilterGroup::all().with_field(column, value).with_values(
                Column::ExclusivePattern,
                subsumption_set(flag.bits(), matching.bits()),
            )
        })
        .collect();

    let global = base.iter().cloned().map(|group| {
        group
            .with_values(
                Column::ExclusiveScope,
                subsumption_set(ScopeFlags::GLOBAL.bits(), scopes),
            )
            .with_expiration(now)
    });

    let category = client.category().into_iter().flat_map(|category_id| {
        base.iter().cloned().map(move |group| {
            group
                .with_field(Column::CategoryId, category_id)
                .with_values(
                    Column::ExclusiveScope,
                    subsumption_set(ScopeFlags::CATEGORY.bits(), scopes),
                )
                .with_expiration(now)
        })
    });

    global.chain(category).collect()
}

/// Returns the first live reservation that conflicts with `contact`.
///
/// # Errors
///
/// Returns an error if the store query fails.
pub fn find_exclusive<S, N>(
    store: &S,
    normalizer: &N,
    contact: &Contact,
    client: &ContactClient,
    matching: MatchingFlags,
    now: DateTime<Utc>,
) -> Result<Option<CacheRecord>>
where
    S: CacheStore + ?Sized,
    N: PhoneNormalizer + ?Sized,
{
    let groups = exclusive_groups(contact, client, matching, normalizer, now);
    if groups.is_empty() {
        tracing::debug!(matching = %matching, "no usable exclusivity identifiers");
    }
    first_matching(store, &groups)
}
