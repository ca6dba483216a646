//! Row conversion utilities for `SQLite` cache storage.
//!
//! [`CacheRow`] maps the table schema with primitive types; use
//! [`build_record_from_row`] to convert it into a [`CacheRecord`].

use crate::models::{CacheRecord, MatchingFlags, ScopeFlags};
use crate::storage::sqlite::sql::TABLE_ALIAS;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};

/// Column list selected for a full row, in [`CacheRow`] field order.
pub const RECORD_COLUMNS: [&str; 18] = [
    "id",
    "client_id",
    "contact_id",
    "email",
    "phone",
    "mobile",
    "address1",
    "address2",
    "city",
    "state",
    "zipcode",
    "country",
    "category_id",
    "utm_source",
    "date_added",
    "exclusive_pattern",
    "exclusive_scope",
    "exclusive_expire_date",
];

/// Returns the aliased select list for a full row.
#[must_use]
pub fn select_list() -> String {
    RECORD_COLUMNS
        .iter()
        .map(|column| format!("{TABLE_ALIAS}.{column}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Internal representation of a cache row.
#[derive(Debug)]
pub struct CacheRow {
    /// Row id.
    pub id: i64,
    /// Client id.
    pub client_id: i64,
    /// Contact id.
    pub contact_id: Option<i64>,
    /// Email.
    pub email: Option<String>,
    /// Phone.
    pub phone: Option<String>,
    /// Mobile.
    pub mobile: Option<String>,
    /// Street line.
    pub address1: Option<String>,
    /// Secondary street line.
    pub address2: Option<String>,
    /// City.
    pub city: Option<String>,
    /// State.
    pub state: Option<String>,
    /// Zipcode.
    pub zipcode: Option<String>,
    /// Country.
    pub country: Option<String>,
    /// Category id.
    pub category_id: Option<i64>,
    /// UTM source.
    pub utm_source: Option<String>,
    /// Unix milliseconds.
    pub date_added: i64,
    /// Single matching bit.
    pub exclusive_pattern: Option<i64>,
    /// Single scope bit.
    pub exclusive_scope: Option<i64>,
    /// Unix milliseconds.
    pub exclusive_expire_date: Option<i64>,
}

impl CacheRow {
    /// Reads a row selected with [`select_list`].
    ///
    /// # Errors
    ///
    /// Returns the underlying `rusqlite` error if a column has an unexpected type.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            client_id: row.get(1)?,
            contact_id: row.get(2)?,
            email: row.get(3)?,
            phone: row.get(4)?,
            mobile: row.get(5)?,
            address1: row.get(6)?,
            address2: row.get(7)?,
            city: row.get(8)?,
            state: row.get(9)?,
            zipcode: row.get(10)?,
            country: row.get(11)?,
            category_id: row.get(12)?,
            utm_source: row.get(13)?,
            date_added: row.get(14)?,
            exclusive_pattern: row.get(15)?,
            exclusive_scope: row.get(16)?,
            exclusive_expire_date: row.get(17)?,
        })
    }
}

fn timestamp(column: &str, millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| Error::OperationFailed {
        operation: "read_cache_row".to_string(),
        cause: format!("{column} out of range: {millis}"),
    })
}

fn single_bit(column: &str, bits: i64) -> Result<u32> {
    u32::try_from(bits)
        .ok()
        .filter(|b| b.is_power_of_two())
        .ok_or_else(|| Error::OperationFailed {
            operation: "read_cache_row".to_string(),
            cause: format!("{column} is not a single bit: {bits}"),
        })
}

/// Converts a `CacheRow` into a `CacheRecord`.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if a timestamp is out of range or an
/// exclusivity column holds a combined mask.
pub fn build_record_from_row(row: CacheRow) -> Result<CacheRecord> {
    Ok(CacheRecord {
        id: row.id,
        client_id: row.client_id,
        contact_id: row.contact_id,
        email: row.email,
        phone: row.phone,
        mobile: row.mobile,
        address1: row.address1,
        address2: row.address2,
        city: row.city,
        state: row.state,
        zipcode: row.zipcode,
        country: row.country,
        category_id: row.category_id,
        utm_source: row.utm_source,
        date_added: timestamp("date_added", row.date_added)?,
        exclusive_pattern: row
            .exclusive_pattern
            .map(|bits| single_bit("exclusive_pattern", bits).map(MatchingFlags::from_bits))
            .transpose()?,
        exclusive_scope: row
            .exclusive_scope
            .map(|bits| single_bit("exclusive_scope", bits).map(ScopeFlags::from_bits))
            .transpose()?,
        exclusive_expire_date: row
            .exclusive_expire_date
            .map(|millis| timestamp("exclusive_expire_date", millis))
            .transpose()?,
    })
}

/// Appends a record and returns its row id. The record's own `id` is ignored.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if an exclusivity column holds a combined
/// mask, or [`Error::OperationFailed`] if the insert fails.
pub fn insert_record(conn: &Connection, record: &CacheRecord) -> Result<i64> {
    record.validate()?;
    conn.execute(
        "INSERT INTO contact_cache (
            client_id, contact_id, email, phone, mobile, address1, address2, city, state,
            zipcode, country, category_id, utm_source, date_added, exclusive_pattern,
            exclusive_scope, exclusive_expire_date
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            record.client_id,
            record.contact_id,
            record.email,
            record.phone,
            record.mobile,
            record.address1,
            record.address2,
            record.city,
            record.state,
            record.zipcode,
            record.country,
            record.category_id,
            record.utm_source,
            record.date_added.timestamp_millis(),
            record.exclusive_pattern.map(MatchingFlags::bits),
            record.exclusive_scope.map(ScopeFlags::bits),
            record.exclusive_expire_date.map(|d| d.timestamp_millis()),
        ],
    )
    .map_err(|e| Error::OperationFailed {
        operation: "insert_cache_record".to_string(),
        cause: e.to_string(),
    })?;

    Ok(conn.last_insert_rowid())
}
