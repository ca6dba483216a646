//! Integration tests for contact-gate.
//!
//! Every scenario runs against both the file-backed `SQLite` store and the
//! in-memory store; the two must agree.
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::too_many_lines,
    clippy::doc_markdown
)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use contact_gate::models::{
    CacheRecord, Contact, ContactClient, DuplicateRule, LimitRule, MatchingFlags, ScopeFlags,
    parse_duplicate_rules, parse_limit_rules,
};
use contact_gate::services::gate::{CacheGate, E164Normalizer, exclusive_groups};
use contact_gate::storage::{CacheStore, InMemoryCacheStore, SqliteCacheStore};
use contact_gate::{Error, GateConfig};
use std::sync::Arc;
use tempfile::TempDir;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 1, 9, 30, 0).unwrap()
}

/// A store that accepts inserts, so scenarios can be written once.
trait SeedableStore: CacheStore {
    fn seed(&self, record: CacheRecord) -> i64;
}

impl SeedableStore for SqliteCacheStore {
    fn seed(&self, record: CacheRecord) -> i64 {
        self.insert(&record).unwrap()
    }
}

impl SeedableStore for InMemoryCacheStore {
    fn seed(&self, record: CacheRecord) -> i64 {
        self.insert(&record).unwrap()
    }
}

fn gate<S: SeedableStore>(store: S) -> (Arc<S>, CacheGate<S, E164Normalizer>) {
    let store = Arc::new(store);
    let gate = CacheGate::new(Arc::clone(&store), Arc::new(E164Normalizer::default()));
    (store, gate)
}

/// Runs `scenario` against a file-backed SQLite store and an in-memory store.
fn on_both_stores(scenario: impl Fn(&dyn Fn(CacheRecord) -> i64, &dyn GateChecks)) {
    let dir = TempDir::new().unwrap();
    let (sqlite, sqlite_gate) = gate(SqliteCacheStore::new(dir.path().join("cache.db")).unwrap());
    scenario(&|record| sqlite.seed(record), &sqlite_gate);

    let (memory, memory_gate) = gate(InMemoryCacheStore::new());
    scenario(&|record| memory.seed(record), &memory_gate);
}

/// Object-safe view of the gate used by shared scenarios.
trait GateChecks {
    fn limit(&self, client: &ContactClient, rules: &[LimitRule]) -> Option<(LimitRule, u64)>;
    fn duplicate(
        &self,
        contact: &Contact,
        client: &ContactClient,
        rules: &[DuplicateRule],
        utm_source: Option<&str>,
    ) -> Option<CacheRecord>;
    fn exclusive(&self, contact: &Contact, client: &ContactClient, matching: MatchingFlags) -> Option<CacheRecord>;
}

impl<S: CacheStore> GateChecks for CacheGate<S, E164Normalizer> {
    fn limit(&self, client: &ContactClient, rules: &[LimitRule]) -> Option<(LimitRule, u64)> {
        self.find_limit_at(client, rules, now())
            .unwrap()
            .map(|hit| (hit.rule, hit.count))
    }

    fn duplicate(
        &self,
        contact: &Contact,
        client: &ContactClient,
        rules: &[DuplicateRule],
        utm_source: Option<&str>,
    ) -> Option<CacheRecord> {
        self.find_duplicate_at(contact, client, rules, utm_source, now())
            .unwrap()
    }

    fn exclusive(&self, contact: &Contact, client: &ContactClient, matching: MatchingFlags) -> Option<CacheRecord> {
        self.find_exclusive_at(contact, client, matching, now()).unwrap()
    }
}

#[test]
fn test_limit_window_boundary() {
    on_both_stores(|seed, gate| {
        let quantity = 3;
        for _ in 0..=quantity {
            seed(CacheRecord::new(3, now() - Duration::days(1)));
        }
        for _ in 0..quantity {
            seed(CacheRecord::new(3, now() - Duration::days(20)));
        }
        let rule = LimitRule::new("", ScopeFlags::GLOBAL, "P7D", quantity);

        let (hit, count) = gate.limit(&ContactClient::new(3), std::slice::from_ref(&rule)).unwrap();
        assert_eq!(hit, rule);
        assert_eq!(count, quantity + 1);

        // Exactly `quantity` inside the window passes this rule and moves on
        let relaxed = LimitRule::new("", ScopeFlags::GLOBAL, "P7D", quantity + 1);
        let strict_monthly = LimitRule::new("", ScopeFlags::GLOBAL, "P1M", 5);
        let (hit, count) = gate
            .limit(&ContactClient::new(3), &[relaxed, strict_monthly.clone()])
            .unwrap();
        assert_eq!(hit, strict_monthly);
        assert_eq!(count, 2 * quantity + 1);
    });
}

#[test]
fn test_limit_narrowed_by_utm_source_and_category() {
    on_both_stores(|seed, gate| {
        seed(CacheRecord::new(3, now() - Duration::hours(2)).with_utm_source("google"));
        seed(CacheRecord::new(3, now() - Duration::hours(2)).with_utm_source("google"));
        seed(CacheRecord::new(3, now() - Duration::hours(2)).with_utm_source("bing").with_category_id(12));

        let client = ContactClient::new(3);
        let by_source = [LimitRule::new("google", ScopeFlags::UTM_SOURCE, "P1D", 1)];
        assert_eq!(gate.limit(&client, &by_source).map(|(_, c)| c), Some(2));

        let by_category = [LimitRule::new("12", ScopeFlags::CATEGORY, "P1D", 1)];
        assert!(gate.limit(&client, &by_category).is_none());

        let by_other_source = [LimitRule::new("yahoo", ScopeFlags::UTM_SOURCE, "P1D", 0)];
        assert!(gate.limit(&client, &by_other_source).is_none());
    });
}

#[test]
fn test_duplicate_scenarios() {
    on_both_stores(|seed, gate| {
        let contact = Contact::new(7).with_email("a@b.com").with_phone("");
        let client = ContactClient::new(3);
        let rules = [DuplicateRule::new(
            MatchingFlags::EMAIL | MatchingFlags::PHONE,
            ScopeFlags::GLOBAL,
            "P7D",
        )];

        seed(CacheRecord::new(3, now() - Duration::days(10)).with_email("a@b.com"));
        assert!(gate.duplicate(&contact, &client, &rules, None).is_none());

        let id = seed(CacheRecord::new(3, now() - Duration::days(2)).with_email("a@b.com"));
        let found = gate.duplicate(&contact, &client, &rules, None).unwrap();
        assert_eq!(found.id, id);

        // Unchanged store, same answer
        assert_eq!(gate.duplicate(&contact, &client, &rules, None), Some(found));
    });
}

#[test]
fn test_address_only_rule_without_locality_is_skipped() {
    on_both_stores(|seed, gate| {
        seed(CacheRecord::new(3, now()).with_address([Some("1 Main St"), None, None, None, None, None]));
        let contact = Contact::default().with_address1("1 Main St");
        let rules = [DuplicateRule::new(MatchingFlags::ADDRESS, ScopeFlags::GLOBAL, "P7D")];

        assert!(gate.duplicate(&contact, &ContactClient::new(3), &rules, None).is_none());
    });
}

#[test]
fn test_exclusivity_expiry() {
    on_both_stores(|seed, gate| {
        let contact = Contact::new(7).with_email("a@b.com");
        let client = ContactClient::new(3);

        seed(
            CacheRecord::new(5, now() - Duration::days(40))
                .with_email("a@b.com")
                .with_exclusivity(MatchingFlags::EMAIL, ScopeFlags::GLOBAL, Some(now() - Duration::days(10))),
        );
        assert!(gate.exclusive(&contact, &client, MatchingFlags::EXCLUSIVE_DEFAULT).is_none());

        let live = seed(
            CacheRecord::new(6, now() - Duration::days(1))
                .with_email("a@b.com")
                .with_exclusivity(MatchingFlags::EMAIL, ScopeFlags::GLOBAL, Some(now() + Duration::days(29))),
        );
        let found = gate.exclusive(&contact, &client, MatchingFlags::EXCLUSIVE_DEFAULT).unwrap();
        assert_eq!(found.id, live);
        assert!(found.is_exclusive_at(now()));
    });
}

#[test]
fn test_exclusivity_expiry_below_one_second() {
    let at = Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap();
    let check_at = at + Duration::milliseconds(900);
    let contact = Contact::new(7).with_email("a@b.com");
    let client = ContactClient::new(3);

    for (expires, live) in [
        (at + Duration::milliseconds(400), false),
        (check_at - Duration::microseconds(1), false),
        (check_at, true),
        (at + Duration::milliseconds(901), true),
    ] {
        let dir = TempDir::new().unwrap();
        let reservation = CacheRecord::new(5, at)
            .with_email("a@b.com")
            .with_exclusivity(MatchingFlags::EMAIL, ScopeFlags::GLOBAL, Some(expires));

        let (sqlite, sqlite_gate) = gate(SqliteCacheStore::new(dir.path().join("cache.db")).unwrap());
        sqlite.seed(reservation.clone());
        let (memory, memory_gate) = gate(InMemoryCacheStore::new());
        memory.seed(reservation);

        for found in [
            sqlite_gate.find_exclusive_at(&contact, &client, MatchingFlags::EXCLUSIVE_DEFAULT, check_at),
            memory_gate.find_exclusive_at(&contact, &client, MatchingFlags::EXCLUSIVE_DEFAULT, check_at),
        ] {
            let found = found.unwrap();
            assert_eq!(found.is_some(), live, "expires {expires}");
            assert!(found.is_none_or(|record| record.is_exclusive_at(check_at)));
        }
    }
}

#[test]
fn test_limit_window_edge_below_one_second() {
    on_both_stores(|seed, gate| {
        // 7 days and 300ms before now(): outside a P7D window by 300ms
        seed(CacheRecord::new(3, now() - Duration::days(7) - Duration::milliseconds(300)));
        seed(CacheRecord::new(3, now() - Duration::days(7)));
        let rules = [LimitRule::new("", ScopeFlags::GLOBAL, "P7D", 0)];

        assert_eq!(gate.limit(&ContactClient::new(3), &rules).map(|(_, c)| c), Some(1));
    });
}

#[test]
fn test_combined_exclusivity_mask_is_rejected_by_both_stores() {
    let dir = TempDir::new().unwrap();
    let combined = CacheRecord::new(5, now()).with_email("a@b.com").with_exclusivity(
        MatchingFlags::EMAIL | MatchingFlags::PHONE,
        ScopeFlags::GLOBAL,
        None,
    );
    let rules = [DuplicateRule::new(MatchingFlags::EMAIL, ScopeFlags::GLOBAL, "P1D")];
    let contact = Contact::default().with_email("a@b.com");
    let client = ContactClient::new(5);

    let sqlite = SqliteCacheStore::new(dir.path().join("cache.db")).unwrap();
    assert!(matches!(sqlite.insert(&combined), Err(Error::InvalidInput(_))));
    let memory = InMemoryCacheStore::new();
    assert!(matches!(memory.insert(&combined), Err(Error::InvalidInput(_))));

    // Nothing was written, so later checks stay clean rather than failing on the row
    let (_, sqlite_gate) = gate(sqlite);
    let (_, memory_gate) = gate(memory);
    assert_eq!(sqlite_gate.duplicate(&contact, &client, &rules, None), None);
    assert_eq!(memory_gate.duplicate(&contact, &client, &rules, None), None);
}

#[test]
fn test_exclusivity_lower_priority_type_conflicts() {
    on_both_stores(|seed, gate| {
        // Reserved by contact id; the new request has the same id and email
        seed(
            CacheRecord::new(5, now())
                .with_contact_id(7)
                .with_email("a@b.com")
                .with_exclusivity(MatchingFlags::EXPLICIT, ScopeFlags::GLOBAL, None),
        );

        let contact = Contact::new(7).with_email("a@b.com");
        let client = ContactClient::new(3);
        assert!(gate.exclusive(&contact, &client, MatchingFlags::EXCLUSIVE_DEFAULT).is_some());
        // With EXPLICIT inactive the explicit reservation is out of reach
        assert!(gate.exclusive(&contact, &client, MatchingFlags::EMAIL).is_none());
    });
}

#[test]
fn test_exclusivity_category_scope() {
    on_both_stores(|seed, gate| {
        seed(
            CacheRecord::new(5, now())
                .with_mobile("+15551234567")
                .with_category_id(4)
                .with_exclusivity(MatchingFlags::MOBILE, ScopeFlags::CATEGORY, None),
        );
        let contact = Contact::default().with_mobile("(555) 123-4567");

        assert!(gate.exclusive(&contact, &ContactClient::new(3), MatchingFlags::EXCLUSIVE_DEFAULT).is_none());
        assert!(
            gate.exclusive(&contact, &ContactClient::new(3).with_category(4), MatchingFlags::EXCLUSIVE_DEFAULT)
                .is_some()
        );
    });
}

#[test]
fn test_exclusive_groups_never_touch_address() {
    let contact = Contact::new(7)
        .with_email("a@b.com")
        .with_address1("1 Main St")
        .with_city("Springfield");
    let groups = exclusive_groups(
        &contact,
        &ContactClient::new(3).with_category(2),
        MatchingFlags::from_bits(31),
        &E164Normalizer::default(),
        now(),
    );
    let predicate = contact_gate::services::gate::build_predicate(&groups).unwrap();
    let (clause, _, _) = contact_gate::storage::sqlite::render_predicate(&predicate, 1);
    for column in ["address1", "address2", "city", "state", "zipcode", "country"] {
        assert!(!clause.contains(&format!("c.{column}")), "{column} in {clause}");
    }
}

#[test]
fn test_rules_from_json() {
    let limits = parse_limit_rules(
        r#"{"rules": [
            {"value": "google", "scope": 4, "duration": "P1D", "quantity": 10},
            {"value": "", "scope": 1, "duration": "PT1H", "quantity": 2}
        ]}"#,
    )
    .unwrap();
    assert_eq!(limits.len(), 2);
    assert_eq!(limits[0].scope, ScopeFlags::UTM_SOURCE);

    let duplicates = parse_duplicate_rules(
        r#"{"rules": [{"matching": 6, "scope": 1, "duration": "P30D"}]}"#,
    )
    .unwrap();
    assert_eq!(duplicates[0].matching, MatchingFlags::EMAIL | MatchingFlags::PHONE);

    assert!(matches!(parse_limit_rules("{\"rules\": 5}"), Err(Error::InvalidInput(_))));
}

#[test]
fn test_gate_from_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gate").join("cache.db");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let config = GateConfig::default()
        .with_database_path(&path)
        .with_phone_country_code("44");

    let gate = CacheGate::from_config(&config).unwrap();
    assert_eq!(gate.store().db_path(), Some(path.as_path()));

    gate.store()
        .insert(&CacheRecord::new(1, Utc::now()).with_phone("+442079460958"))
        .unwrap();
    let found = gate
        .find_duplicate(
            &Contact::default().with_phone("020 7946 0958"),
            &ContactClient::new(1),
            &[DuplicateRule::new(MatchingFlags::PHONE, ScopeFlags::GLOBAL, "P1D")],
            None,
        )
        .unwrap();
    // National numbers with a trunk zero are not placed; the field is dropped
    assert!(found.is_none());

    let found = gate
        .find_duplicate(
            &Contact::default().with_phone("+44 20 7946 0958"),
            &ContactClient::new(1),
            &[DuplicateRule::new(MatchingFlags::PHONE, ScopeFlags::GLOBAL, "P1D")],
            None,
        )
        .unwrap();
    assert!(found.is_some());
}

#[test]
fn test_configured_exclusive_matching_drives_default_check() {
    let dir = TempDir::new().unwrap();
    let base = GateConfig::default().with_database_path(dir.path().join("cache.db"));
    let contact = Contact::new(7).with_email("a@b.com");
    let client = ContactClient::new(3);

    let gate = CacheGate::from_config(&base).unwrap();
    assert_eq!(gate.exclusive_matching(), MatchingFlags::EXCLUSIVE_DEFAULT);
    gate.store()
        .insert(
            &CacheRecord::new(5, Utc::now())
                .with_email("a@b.com")
                .with_exclusivity(MatchingFlags::EMAIL, ScopeFlags::GLOBAL, None),
        )
        .unwrap();
    assert!(gate.find_exclusive_default(&contact, &client).unwrap().is_some());

    let mut mobile_only = base;
    mobile_only.exclusive_matching = MatchingFlags::MOBILE;
    let gate = CacheGate::from_config(&mobile_only).unwrap();
    assert_eq!(gate.exclusive_matching(), MatchingFlags::MOBILE);
    assert!(gate.find_exclusive_default(&contact, &client).unwrap().is_none());
}

#[test]
fn test_invalid_country_code_in_config() {
    let dir = TempDir::new().unwrap();
    let config = GateConfig::default()
        .with_database_path(dir.path().join("cache.db"))
        .with_phone_country_code("abc");
    assert!(matches!(CacheGate::from_config(&config), Err(Error::InvalidInput(_))));
}

#[test]
fn test_malformed_duration_surfaces() {
    let (_, gate) = gate(InMemoryCacheStore::new());
    let err = gate
        .find_limit(&ContactClient::new(1), &[LimitRule::new("", ScopeFlags::GLOBAL, "one day", 1)])
        .unwrap_err();
    assert!(matches!(err, Error::InvalidDuration { .. }));
}
