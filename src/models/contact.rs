//! Contact and client views consumed by the gate checks.
//!
//! Both types are read-only snapshots of the caller's objects. Raw field
//! values are kept as received; trimming, title-casing and phone
//! normalization happen while rules are evaluated.

use serde::{Deserialize, Serialize};

/// The contact being submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Contact id, absent for contacts not yet persisted.
    pub id: Option<i64>,
    /// Email as entered.
    pub email: Option<String>,
    /// Phone as entered.
    pub phone: Option<String>,
    /// Mobile as entered.
    pub mobile: Option<String>,
    /// Street line.
    pub address1: Option<String>,
    /// Secondary street line.
    pub address2: Option<String>,
    /// City.
    pub city: Option<String>,
    /// State or region.
    pub state: Option<String>,
    /// Postal code.
    pub zipcode: Option<String>,
    /// Country.
    pub country: Option<String>,
}

impl Contact {
    /// Creates a persisted contact with no fields set.
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
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

    /// Sets the street line.
    #[must_use]
    pub fn with_address1(mut self, address1: impl Into<String>) -> Self {
        self.address1 = Some(address1.into());
        self
    }

    /// Sets the secondary street line.
    #[must_use]
    pub fn with_address2(mut self, address2: impl Into<String>) -> Self {
        self.address2 = Some(address2.into());
        self
    }

    /// Sets the city.
    #[must_use]
    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    /// Sets the state.
    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Sets the postal code.
    #[must_use]
    pub fn with_zipcode(mut self, zipcode: impl Into<String>) -> Self {
        self.zipcode = Some(zipcode.into());
        self
    }

    /// Sets the country.
    #[must_use]
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }
}

/// The downstream client a contact is being sent to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactClient {
    /// Client id.
    pub id: i64,
    /// Category the client belongs to.
    pub category_id: Option<i64>,
}

impl ContactClient {
    /// Creates an uncategorised client.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self {
            id,
            category_id: None,
        }
    }

    /// Sets the category.
    #[must_use]
    pub const fn with_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Returns the category id when it is set and non-zero.
    #[must_use]
    pub fn category(&self) -> Option<i64> {
        self.category_id.filter(|id| *id != 0)
    }
}

/// Upper-cases the first character of every whitespace-separated word, then trims.
///
/// Characters after the first of each word are left untouched, so `"mcDonald"`
/// becomes `"McDonald"`.
#[must_use]
pub fn title_case(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut at_word_start = true;
    for c in value.chars() {
        if at_word_start && !c.is_whitespace() {
            result.extend(c.to_uppercase());
        } else {
            result.push(c);
        }
        at_word_start = c.is_whitespace();
    }
    result.trim().to_string()
}

/// Returns the trimmed value when it is non-empty.
#[must_use]
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Returns the title-cased, trimmed value when it is non-empty.
#[must_use]
pub fn non_empty_title(value: Option<&str>) -> Option<String> {
    value.map(title_case).filter(|v| !v.is_empty())
}
