//! Gate service.
//!
//! [`CacheGate`] runs the three submission checks against a shared cache
//! store and records their outcome as logs and metrics.

use crate::Result;
use crate::config::GateConfig;
use crate::models::{CacheRecord, Contact, ContactClient, DuplicateRule, LimitRule, MatchingFlags};
use crate::services::gate::phone::{E164Normalizer, PhoneNormalizer};
use crate::services::gate::{duplicate, exclusive, limit};
use crate::services::gate::limit::LimitHit;
use crate::storage::cache::SqliteCacheStore;
use crate::storage::traits::CacheStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Limit, duplicate and exclusivity checks over a cache store.
///
/// # Example
///
/// ```rust
/// use contact_gate::models::{CacheRecord, Contact, ContactClient, MatchingFlags};
/// use contact_gate::services::gate::{CacheGate, E164Normalizer};
/// use contact_gate::storage::InMemoryCacheStore;
/// use std::sync::Arc;
///
/// let store = Arc::new(InMemoryCacheStore::new());
/// let gate = CacheGate::new(Arc::clone(&store), Arc::new(E164Normalizer::default()));
///
/// let contact = Contact::new(7).with_email("a@b.com");
/// let conflict = gate.find_exclusive(&contact, &ContactClient::new(3), MatchingFlags::EXCLUSIVE_DEFAULT)?;
/// assert!(conflict.is_none());
///
/// // Same check with the gate's configured mask
/// let conflict = gate.find_exclusive_default(&contact, &ContactClient::new(3))?;
/// assert!(conflict.is_none());
/// # Ok::<(), contact_gate::Error>(())
/// ```
pub struct CacheGate<S: CacheStore + ?Sized, N: PhoneNormalizer + ?Sized> {
    store: Arc<S>,
    normalizer: Arc<N>,
    exclusive_matching: MatchingFlags,
}

impl<S: CacheStore + ?Sized, N: PhoneNormalizer + ?Sized> Clone for CacheGate<S, N> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            normalizer: Arc::clone(&self.normalizer),
            exclusive_matching: self.exclusive_matching,
        }
    }
}

impl CacheGate<SqliteCacheStore, E164Normalizer> {
    /// Opens the configured `SQLite` cache and builds the default normalizer.
    ///
    /// The configured `exclusive_matching` becomes the mask used by
    /// [`find_exclusive_default`](CacheGate::find_exclusive_default).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the country code
    /// is invalid.
    pub fn from_config(config: &GateConfig) -> Result<Self> {
        let store = SqliteCacheStore::new(&config.database_path)?;
        let normalizer = E164Normalizer::new(config.phone_country_code.as_str())?;
        tracing::info!(
            database = %config.database_path.display(),
            country_code = normalizer.country_code(),
            exclusive_matching = %config.exclusive_matching,
            "cache gate ready"
        );
        Ok(Self::new(Arc::new(store), Arc::new(normalizer))
            .with_exclusive_matching(config.exclusive_matching))
    }
}

impl<S: CacheStore + ?Sized, N: PhoneNormalizer + ?Sized> CacheGate<S, N> {
    /// Creates a gate over `store` using `normalizer` for phone fields.
    ///
    /// The default exclusivity mask is [`MatchingFlags::EXCLUSIVE_DEFAULT`].
    #[must_use]
    pub const fn new(store: Arc<S>, normalizer: Arc<N>) -> Self {
        Self {
            store,
            normalizer,
            exclusive_matching: MatchingFlags::EXCLUSIVE_DEFAULT,
        }
    }

    /// Sets the mask used by [`find_exclusive_default`](Self::find_exclusive_default).
    #[must_use]
    pub const fn with_exclusive_matching(mut self, matching: MatchingFlags) -> Self {
        self.exclusive_matching = matching;
        self
    }

    /// Returns the default exclusivity mask.
    #[must_use]
    pub const fn exclusive_matching(&self) -> MatchingFlags {
        self.exclusive_matching
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the first limit rule the client has exceeded.
    ///
    /// # Errors
    ///
    /// Returns an error if a rule duration is malformed or the store fails.
    pub fn find_limit(&self, client: &ContactClient, rules: &[LimitRule]) -> Result<Option<LimitHit>> {
        self.find_limit_at(client, rules, Utc::now())
    }

    /// [`find_limit`](Self::find_limit) evaluated at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if a rule duration is malformed or the store fails.
    #[instrument(
        skip(self, client, rules),
        fields(
            operation = "find_limit",
            backend = self.store.backend_name(),
            client.id = client.id,
            rules = rules.len()
        )
    )]
    pub fn find_limit_at(
        &self,
        client: &ContactClient,
        rules: &[LimitRule],
        now: DateTime<Utc>,
    ) -> Result<Option<LimitHit>> {
        let start = Instant::now();
        let result = limit::find_limit(&*self.store, client, rules, now);

        if let Ok(Some(hit)) = &result {
            tracing::info!(
                client.id = client.id,
                scope = %hit.rule.scope,
                duration = %hit.rule.duration,
                quantity = hit.rule.quantity,
                count = hit.count,
                "limit exceeded"
            );
        }
        record_check_metrics("limit", &result, start);
        result
    }

    /// Returns the first cached submission that duplicates `contact`.
    ///
    /// # Errors
    ///
    /// Returns an error if a contributing rule duration is malformed or the store fails.
    pub fn find_duplicate(
        &self,
        contact: &Contact,
        client: &ContactClient,
        rules: &[DuplicateRule],
        utm_source: Option<&str>,
    ) -> Result<Option<CacheRecord>> {
        self.find_duplicate_at(contact, client, rules, utm_source, Utc::now())
    }

    /// [`find_duplicate`](Self::find_duplicate) evaluated at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if a contributing rule duration is malformed or the store fails.
    #[instrument(
        skip(self, contact, client, rules, utm_source),
        fields(
            operation = "find_duplicate",
            backend = self.store.backend_name(),
            client.id = client.id,
            rules = rules.len()
        )
    )]
    pub fn find_duplicate_at(
        &self,
        contact: &Contact,
        client: &ContactClient,
        rules: &[DuplicateRule],
        utm_source: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheRecord>> {
        let start = Instant::now();
        let result = duplicate::find_duplicate(
            &*self.store,
            &*self.normalizer,
            contact,
            client,
            rules,
            utm_source,
            now,
        );

        if let Ok(Some(record)) = &result {
            tracing::info!(
                client.id = client.id,
                cache.id = record.id,
                "duplicate found"
            );
        }
        record_check_metrics("duplicate", &result, start);
        result
    }

    /// Returns the first live exclusivity reservation that conflicts with `contact`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn find_exclusive(
        &self,
        contact: &Contact,
        client: &ContactClient,
        matching: MatchingFlags,
    ) -> Result<Option<CacheRecord>> {
        self.find_exclusive_at(contact, client, matching, Utc::now())
    }

    /// [`find_exclusive`](Self::find_exclusive) evaluated at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    #[instrument(
        skip(self, contact, client, matching),
        fields(
            operation = "find_exclusive",
            backend = self.store.backend_name(),
            client.id = client.id,
            matching = %matching
        )
    )]
    pub fn find_exclusive_at(
        &self,
        contact: &Contact,
        client: &ContactClient,
        matching: MatchingFlags,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheRecord>> {
        let start = Instant::now();
        let result =
            exclusive::find_exclusive(&*self.store, &*self.normalizer, contact, client, matching, now);

        if let Ok(Some(record)) = &result {
            tracing::info!(
                client.id = client.id,
                cache.id = record.id,
                reserved_by = record.client_id,
                "exclusivity conflict"
            );
        }
        record_check_metrics("exclusive", &result, start);
        result
    }

    /// [`find_exclusive`](Self::find_exclusive) with the gate's configured mask.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn find_exclusive_default(
        &self,
        contact: &Contact,
        client: &ContactClient,
    ) -> Result<Option<CacheRecord>> {
        self.find_exclusive_at(contact, client, self.exclusive_matching, Utc::now())
    }
}

/// Records the outcome and latency of one check.
#[allow(clippy::cast_precision_loss)]
fn record_check_metrics<T>(check: &'static str, result: &Result<Option<T>>, start: Instant) {
    let outcome = match result {
        Ok(Some(_)) => "hit",
        Ok(None) => "clear",
        Err(e) => {
            tracing::warn!(check, error = %e, "gate check failed");
            "error"
        },
    };
    metrics::counter!(
        "gate_checks_total",
        "check" => check,
        "result" => outcome
    )
    .increment(1);
    metrics::histogram!(
        "gate_check_duration_ms",
        "check" => check
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}
