//! Cache record model.

use crate::models::{MatchingFlags, ScopeFlags};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A snapshot of a previously accepted contact submission.
///
/// Rows are appended by the accept path and only read by the gate checks.
/// `exclusive_pattern` and `exclusive_scope` each hold a single bit when the
/// row reserves exclusivity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Row id assigned by the store.
    pub id: i64,
    /// Client the submission was accepted for.
    pub client_id: i64,
    /// Contact id, when the contact was persisted.
    pub contact_id: Option<i64>,
    /// Trimmed email.
    pub email: Option<String>,
    /// Normalized phone.
    pub phone: Option<String>,
    /// Normalized mobile.
    pub mobile: Option<String>,
    /// Title-cased street line.
    pub address1: Option<String>,
    /// Title-cased secondary street line.
    pub address2: Option<String>,
    /// Title-cased city.
    pub city: Option<String>,
    /// Title-cased state.
    pub state: Option<String>,
    /// Title-cased zipcode.
    pub zipcode: Option<String>,
    /// Title-cased country.
    pub country: Option<String>,
    /// Category of the client at accept time.
    pub category_id: Option<i64>,
    /// UTM source of the submission.
    pub utm_source: Option<String>,
    /// When the submission was accepted.
    pub date_added: DateTime<Utc>,
    /// Matching bit the exclusivity reservation was made under.
    pub exclusive_pattern: Option<MatchingFlags>,
    /// Scope bit the exclusivity reservation was made under.
    pub exclusive_scope: Option<ScopeFlags>,
    /// When the reservation lapses. `None` never lapses.
    pub exclusive_expire_date: Option<DateTime<Utc>>,
}

impl CacheRecord {
    /// Creates a record for `client_id` accepted at `date_added` with no fields set.
    #[must_use]
    pub const fn new(client_id: i64, date_added: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            client_id,
            contact_id: None,
            email: None,
            phone: None,
            mobile: None,
            address1: None,
            address2: None,
            city: None,
            state: None,
            zipcode: None,
            country: None,
            category_id: None,
            utm_source: None,
            date_added,
            exclusive_pattern: None,
            exclusive_scope: None,
            exclusive_expire_date: None,
        }
    }

    /// Sets the contact id.
    #[must_use]
    pub const fn with_contact_id(mut self, contact_id: i64) -> Self {
        self.contact_id = Some(contact_id);
        self
    }

    /// Sets the email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the phone.
    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Sets the mobile.
    #[must_use]
    pub fn with_mobile(mut self, mobile: impl Into<String>) -> Self {
        self.mobile = Some(mobile.into());
        self
    }

    /// Sets the address components, in `address1, address2, city, state, zipcode, country` order.
    #[must_use]
    pub fn with_address(mut self, address: [Option<&str>; 6]) -> Self {
        let [address1, address2, city, state, zipcode, country] =
            address.map(|part| part.map(str::to_string));
        self.address1 = address1;
        self.address2 = address2;
        self.city = city;
        self.state = state;
        self.zipcode = zipcode;
        self.country = country;
        self
    }

    /// Sets the category.
    #[must_use]
    pub const fn with_category_id(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Sets the UTM source.
    #[must_use]
    pub fn with_utm_source(mut self, utm_source: impl Into<String>) -> Self {
        self.utm_source = Some(utm_source.into());
        self
    }

    /// Reserves exclusivity under a single matching bit and scope bit.
    #[must_use]
    pub const fn with_exclusivity(
        mut self,
        pattern: MatchingFlags,
        scope: ScopeFlags,
        expires: Option<DateTime<Utc>>,
    ) -> Self {
        self.exclusive_pattern = Some(pattern);
        self.exclusive_scope = Some(scope);
        self.exclusive_expire_date = expires;
        self
    }

    /// Checks that the exclusivity columns each hold at most a single bit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `exclusive_pattern` or
    /// `exclusive_scope` is a combined or empty mask.
    pub fn validate(&self) -> Result<()> {
        let pattern = self.exclusive_pattern.map(MatchingFlags::bits);
        let scope = self.exclusive_scope.map(ScopeFlags::bits);
        for (column, bits) in [("exclusive_pattern", pattern), ("exclusive_scope", scope)] {
            if let Some(bits) = bits.filter(|b| !b.is_power_of_two()) {
                return Err(Error::InvalidInput(format!(
                    "{column} must be a single bit, got {bits}"
                )));
            }
        }
        Ok(())
    }

    /// Returns true if the row holds a reservation that is still live at `now`.
    #[must_use]
    pub fn is_exclusive_at(&self, now: DateTime<Utc>) -> bool {
        self.exclusive_pattern.is_some()
            && self.exclusive_expire_date.is_none_or(|expires| expires >= now)
    }
}
