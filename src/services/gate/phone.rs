//! Phone number normalization.
//!
//! Duplicate and exclusivity checks compare phone numbers in E.164 form
//! (`+` followed by 8 to 15 digits). A number that cannot be normalized is not
//! usable for matching; the checks drop that field and carry on.

use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Digits, common separators and an optional leading `+` or `00` prefix.
static DIALABLE: Lazy<Result<Regex>> = Lazy::new(|| {
    Regex::new(r"^(?:\+|00)?[0-9][0-9 ().\-]*$").map_err(|e| Error::OperationFailed {
        operation: "compile_phone_pattern".to_string(),
        cause: e.to_string(),
    })
});

/// Minimum digit count of an international number.
const MIN_DIGITS: usize = 8;

/// Maximum digit count allowed by E.164.
const MAX_DIGITS: usize = 15;

/// Digit count of a national significant number in the default numbering plan.
const NATIONAL_DIGITS: usize = 10;

/// Normalizes raw phone input into a canonical, comparable form.
pub trait PhoneNormalizer: Send + Sync {
    /// Returns the normalized number.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the input is not a usable phone number.
    fn normalize(&self, raw: &str) -> Result<String>;
}

/// E.164 normalizer with a default country code for national numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct E164Normalizer {
    country_code: String,
}

impl E164Normalizer {
    /// Creates a normalizer that prefixes national numbers with `country_code`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `country_code` is not 1 to 3 digits.
    pub fn new(country_code: impl Into<String>) -> Result<Self> {
        let country_code = country_code.into();
        let code = country_code.trim().trim_start_matches('+');
        if code.is_empty() || code.len() > 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidInput(format!(
                "invalid country code: {country_code:?}"
            )));
        }
        Ok(Self {
            country_code: code.to_string(),
        })
    }

    /// Returns the configured country code, without `+`.
    #[must_use]
    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    fn international(digits: &str, raw: &str) -> Result<String> {
        if (MIN_DIGITS..=MAX_DIGITS).contains(&digits.len()) && !digits.starts_with('0') {
            Ok(format!("+{digits}"))
        } else {
            Err(Error::InvalidInput(format!("not an E.164 number: {raw:?}")))
        }
    }
}

impl Default for E164Normalizer {
    fn default() -> Self {
        Self {
            country_code: "1".to_string(),
        }
    }
}

impl PhoneNormalizer for E164Normalizer {
    fn normalize(&self, raw: &str) -> Result<String> {
        let trimmed = raw.trim();
        let pattern = (*DIALABLE).as_ref().map_err(|e| Error::OperationFailed {
            operation: "normalize_phone".to_string(),
            cause: e.to_string(),
        })?;
        if !pattern.is_match(trimmed) {
            return Err(Error::InvalidInput(format!("not a phone number: {raw:?}")));
        }

        let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();

        if trimmed.starts_with('+') {
            return Self::international(&digits, raw);
        }
        if let Some(rest) = digits.strip_prefix("00") {
            return Self::international(rest, raw);
        }
        if digits.len() == NATIONAL_DIGITS {
            return Self::international(&format!("{}{digits}", self.country_code), raw);
        }
        if digits.len() == self.country_code.len() + NATIONAL_DIGITS
            && digits.starts_with(self.country_code.as_str())
        {
            return Self::international(&digits, raw);
        }

        Err(Error::InvalidInput(format!(
            "cannot place national number: {raw:?}"
        )))
    }
}

/// Normalizes an optional raw number, treating blanks and failures as absent.
pub fn usable_phone<N: PhoneNormalizer + ?Sized>(
    normalizer: &N,
    raw: Option<&str>,
) -> Option<String> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    match normalizer.normalize(raw) {
        Ok(normalized) if !normalized.is_empty() => Some(normalized),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "phone not usable for matching");
            None
        },
    }
}
