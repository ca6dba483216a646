//! Duplicate detection.
//!
//! Each rule contributes one OR-group over the contact fields its matching
//! bits select, windowed by client and the rule's duration. All surviving
//! groups run in a single first-row query.

use crate::Result;
use crate::models::{
    CacheRecord, Contact, ContactClient, DuplicateRule, MatchingFlags, ScopeFlags, non_empty,
    non_empty_title,
};
use crate::services::gate::builder::{FilterGroup, first_matching};
use crate::services::gate::phone::{PhoneNormalizer, usable_phone};
use crate::storage::predicate::Column;
use crate::storage::traits::CacheStore;
use chrono::{DateTime, Utc};

/// Builds the compound address match.
///
/// A street line alone is not matchable: `address1` plus a city or a zipcode
/// is required. Every other component is added only when non-empty.
fn address_group(contact: &Contact) -> Option<FilterGroup> {
    let address1 = non_empty_title(contact.address1.as_deref())?;
    let city = non_empty_title(contact.city.as_deref());
    let zipcode = non_empty_title(contact.zipcode.as_deref());
    if city.is_none() && zipcode.is_none() {
        return None;
    }

    let optional = [
        (Column::Address2, non_empty_title(contact.address2.as_deref())),
        (Column::City, city),
        (Column::State, non_empty_title(contact.state.as_deref())),
        (Column::Zipcode, zipcode),
        (Column::Country, non_empty_title(contact.country.as_deref())),
    ];
    Some(optional.into_iter().fold(
        FilterGroup::all().with_field(Column::Address1, address1),
        |group, (column, value)| match value {
            Some(value) => group.with_field(column, value),
            None => group,
        },
    ))
}

/// Builds the OR-group for one rule, without its window.
fn rule_fields<N: PhoneNormalizer + ?Sized>(
    rule: &DuplicateRule,
    contact: &Contact,
    client: &ContactClient,
    utm_source: Option<&str>,
    normalizer: &N,
) -> FilterGroup {
    let mut group = FilterGroup::any();

    if rule.matching.has_flag(MatchingFlags::EXPLICIT) {
        if let Some(id) = contact.id {
            group = group.with_field(Column::ContactId, id);
        }
    }
    if rule.matching.has_flag(MatchingFlags::EMAIL) {
        if let Some(email) = non_empty(contact.email.as_deref()) {
            group = group.with_field(Column::Email, email);
        }
    }
    if rule.matching.has_flag(MatchingFlags::PHONE) {
        if let Some(phone) = usable_phone(normalizer, contact.phone.as_deref()) {
            group = group.with_field(Column::Phone, phone);
        }
    }
    if rule.matching.has_flag(MatchingFlags::MOBILE) {
        if let Some(mobile) = usable_phone(normalizer, contact.mobile.as_deref()) {
            group = group.with_field(Column::Mobile, mobile);
        }
    }
    if rule.matching.has_flag(MatchingFlags::ADDRESS) {
        if let Some(address) = address_group(contact) {
            group = group.with_group(address);
        }
    }

    if rule.scope.has_flag(ScopeFlags::UTM_SOURCE) {
        if let Some(source) = non_empty(utm_source) {
            group = group.with_field(Column::UtmSource, source);
        }
    }
    if rule.scope.has_flag(ScopeFlags::CATEGORY) {
        if let Some(category) = client.category() {
            group = group.with_field(Column::CategoryId, category);
        }
    }

    group
}

/// Builds one windowed OR-group per rule that has a usable field.
///
/// Rules with nothing usable are skipped before their duration is parsed.
///
/// # Errors
///
/// Returns [`Error::InvalidDuration`](crate::Error::InvalidDuration) if a
/// contributing rule's duration is malformed.
pub fn duplicate_groups<N: PhoneNormalizer + ?Sized>(
    contact: &Contact,
    client: &ContactClient,
    rules: &[DuplicateRule],
    utm_source: Option<&str>,
    normalizer: &N,
    now: DateTime<Utc>,
) -> Result<Vec<FilterGroup>> {
    let mut groups = Vec::with_capacity(rules.len());
    for (index, rule) in rules.iter().enumerate() {
        let group = rule_fields(rule, contact, client, utm_source, normalizer);
        if group.has_no_fields() {
            tracing::debug!(rule.index = index, "duplicate rule has no usable fields, skipping");
            continue;
        }
        groups.push(group.with_window(client.id, rule.window_start(now)?));
    }
    Ok(groups)
}

/// Returns the first cached submission that duplicates `contact` under any rule.
///
/// # Errors
///
/// Returns an error if a duration is malformed or the store query fails.
pub fn find_duplicate<S, N>(
    store: &S,
    normalizer: &N,
    contact: &Contact,
    client: &ContactClient,
    rules: &[DuplicateRule],
    utm_source: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Option<CacheRecord>>
where
    S: CacheStore + ?Sized,
    N: PhoneNormalizer + ?Sized,
{
    let groups = duplicate_groups(contact, client, rules, utm_source, normalizer, now)?;
    first_matching(store, &groups)
}
