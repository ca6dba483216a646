//! Property-based tests for rule evaluation.
//!
//! Uses proptest to verify invariants across random inputs:
//! - The integer scan behind exclusivity subsumption sets
//! - Flag decomposition recombines to the named bits of a mask
//! - Group building never yields a vacuous predicate
//! - Exclusivity groups never reference address columns
//! - Rendered SQL binds every value and never inlines it

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::{TimeZone, Utc};
use contact_gate::models::{
    CacheRecord, Contact, ContactClient, DuplicateRule, MatchingFlags, ScopeFlags, bits_set_up_to,
};
use contact_gate::services::gate::{
    E164Normalizer, FilterGroup, build_predicate, duplicate_groups, exclusive_groups,
};
use contact_gate::storage::predicate::{Column, Predicate};
use contact_gate::storage::sqlite::render_predicate;
use proptest::prelude::*;

const ADDRESS_COLUMNS: [Column; 6] = [
    Column::Address1,
    Column::Address2,
    Column::City,
    Column::State,
    Column::Zipcode,
    Column::Country,
];

fn contact_strategy() -> impl Strategy<Value = Contact> {
    (
        proptest::option::of(1_i64..10_000),
        proptest::option::of("[a-z]{1,8}@[a-z]{1,8}\\.com"),
        proptest::option::of("[0-9]{10}"),
        proptest::option::of("\\+?[0-9 ()-]{0,14}"),
        proptest::option::of("[0-9]{1,4} [A-Za-z ]{0,12}"),
        proptest::option::of("[A-Za-z ]{0,10}"),
        proptest::option::of("[0-9]{0,5}"),
    )
        .prop_map(|(id, email, phone, mobile, address1, city, zipcode)| Contact {
            id,
            email,
            phone,
            mobile,
            address1,
            city,
            zipcode,
            ..Contact::default()
        })
}

proptest! {
    /// Property: the scan returns exactly the ascending integers in 1..=max overlapping mask.
    #[test]
    fn prop_bits_set_up_to_is_literal_scan(max in 0_u32..64, mask in 0_u32..64) {
        let result = bits_set_up_to(max, mask);
        prop_assert!(result.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(result.iter().all(|i| (1..=max).contains(i) && i & mask != 0));
        let missing = (1..=max).filter(|i| i & mask != 0).count();
        prop_assert_eq!(result.len(), missing);
    }

    /// Property: every single bit of mask at or below max is in the set.
    #[test]
    fn prop_bits_set_up_to_contains_active_single_bits(max in 1_u32..32, mask in 0_u32..32) {
        let result = bits_set_up_to(max, mask);
        for bit in (0..5).map(|shift| 1_u32 << shift).filter(|b| *b <= max && mask & b != 0) {
            prop_assert!(result.contains(&bit));
        }
    }

    /// Property: decomposition recombines to the named bits of the mask.
    #[test]
    fn prop_flag_decomposition_recombines(bits in 0_u32..256) {
        let flags = MatchingFlags::from_bits(bits);
        let recombined = flags.flags().into_iter().fold(0, |acc, f| acc | f.bits());
        prop_assert_eq!(recombined, bits & 0b1_1111);
        prop_assert!(flags.flags().iter().all(|f| f.bits().is_power_of_two()));

        let scopes = ScopeFlags::from_bits(bits);
        let recombined = scopes.flags().into_iter().fold(0, |acc, f| acc | f.bits());
        prop_assert_eq!(recombined, bits & 0b111);
    }

    /// Property: a predicate built from groups never matches a record that no group matches.
    #[test]
    fn prop_build_predicate_is_never_vacuous(
        email in proptest::option::of("[a-z]{1,6}@x\\.com"),
        phone in proptest::option::of("\\+1[0-9]{10}"),
        client_id in 1_i64..5,
    ) {
        let mut group = FilterGroup::any();
        if let Some(email) = &email {
            group = group.with_field(Column::Email, email.as_str());
        }
        if let Some(phone) = &phone {
            group = group.with_field(Column::Phone, phone.as_str());
        }

        let stranger = CacheRecord::new(client_id, Utc::now())
            .with_email("nobody@elsewhere.org")
            .with_phone("+44999");

        match build_predicate(&[group]) {
            None => prop_assert!(email.is_none() && phone.is_none()),
            Some(predicate) => prop_assert!(!predicate.matches(&stranger)),
        }
    }

    /// Property: exclusivity groups never reference address columns, whatever the mask.
    #[test]
    fn prop_exclusive_never_uses_address(
        contact in contact_strategy(),
        matching in 0_u32..32,
        category in proptest::option::of(1_i64..10),
    ) {
        let client = category.map_or(ContactClient::new(1), |c| ContactClient::new(1).with_category(c));
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let groups = exclusive_groups(
            &contact,
            &client,
            MatchingFlags::from_bits(matching),
            &E164Normalizer::default(),
            now,
        );
        let expected_scopes = if client.category().is_some() { 2 } else { 1 };
        prop_assert_eq!(groups.len() % expected_scopes, 0);

        if let Some(predicate) = build_predicate(&groups) {
            prop_assert!(ADDRESS_COLUMNS.iter().all(|c| !predicate.references(*c)));
            prop_assert!(predicate.references(Column::ExclusiveExpireDate));
        }
    }

    /// Property: duplicate groups are never empty and always windowed.
    #[test]
    fn prop_duplicate_groups_are_windowed(contact in contact_strategy(), matching in 0_u32..32) {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let rules = [DuplicateRule::new(MatchingFlags::from_bits(matching), ScopeFlags::GLOBAL, "P7D")];
        let groups = duplicate_groups(
            &contact,
            &ContactClient::new(9),
            &rules,
            None,
            &E164Normalizer::default(),
            now,
        )
        .unwrap();

        prop_assert!(groups.len() <= 1);
        for group in &groups {
            prop_assert!(!group.has_no_fields());
            prop_assert_eq!(group.window().map(|(client, _)| client), Some(9));
        }
    }

    /// Property: rendered SQL binds every value; placeholders match parameters.
    #[test]
    fn prop_render_binds_all_values(values in proptest::collection::vec("[a-z' ;-]{0,12}", 0..6)) {
        let predicate = Predicate::Or(
            values
                .iter()
                .map(|v| Predicate::Equals(Column::Email, v.as_str().into()))
                .collect(),
        );
        let (clause, params, next) = render_predicate(&predicate, 1);

        prop_assert_eq!(params.len(), values.len());
        prop_assert_eq!(next, values.len() + 1);
        prop_assert_eq!(clause.matches('?').count(), values.len());
        prop_assert!(!clause.contains('\''));
    }
}
