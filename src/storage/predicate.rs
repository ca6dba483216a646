//! Predicate trees over the cache table.
//!
//! The gate checks describe "what would count as a match" as a [`Predicate`];
//! each [`CacheStore`](crate::storage::traits::CacheStore) interprets the tree
//! in its own way (SQL with bound parameters, or direct evaluation).

use crate::models::CacheRecord;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::fmt;

/// Columns of the cache table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    /// `client_id`
    ClientId,
    /// `contact_id`
    ContactId,
    /// `email`
    Email,
    /// `phone`
    Phone,
    /// `mobile`
    Mobile,
    /// `address1`
    Address1,
    /// `address2`
    Address2,
    /// `city`
    City,
    /// `state`
    State,
    /// `zipcode`
    Zipcode,
    /// `country`
    Country,
    /// `category_id`
    CategoryId,
    /// `utm_source`
    UtmSource,
    /// `date_added`
    DateAdded,
    /// `exclusive_pattern`
    ExclusivePattern,
    /// `exclusive_scope`
    ExclusiveScope,
    /// `exclusive_expire_date`
    ExclusiveExpireDate,
}

impl Column {
    /// Returns the SQL column name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClientId => "client_id",
            Self::ContactId => "contact_id",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Mobile => "mobile",
            Self::Address1 => "address1",
            Self::Address2 => "address2",
            Self::City => "city",
            Self::State => "state",
            Self::Zipcode => "zipcode",
            Self::Country => "country",
            Self::CategoryId => "category_id",
            Self::UtmSource => "utm_source",
            Self::DateAdded => "date_added",
            Self::ExclusivePattern => "exclusive_pattern",
            Self::ExclusiveScope => "exclusive_scope",
            Self::ExclusiveExpireDate => "exclusive_expire_date",
        }
    }

    /// Returns true for the street address columns.
    #[must_use]
    pub const fn is_address(self) -> bool {
        matches!(
            self,
            Self::Address1
                | Self::Address2
                | Self::City
                | Self::State
                | Self::Zipcode
                | Self::Country
        )
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value bound into a predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Integer column value.
    Int(i64),
    /// Text column value.
    Text(String),
    /// Timestamp column value.
    Timestamp(DateTime<Utc>),
}

impl Value {
    fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Timestamp(a), Self::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

/// A boolean expression over cache columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `column = value`
    Equals(Column, Value),
    /// `column IN (values)`. An empty list matches nothing.
    In(Column, Vec<Value>),
    /// `column >= value`
    Gte(Column, Value),
    /// `column IS NULL`
    IsNull(Column),
    /// All children hold. An empty list matches everything.
    And(Vec<Self>),
    /// Any child holds. An empty list matches nothing.
    Or(Vec<Self>),
}

impl Predicate {
    /// Conjunction that collapses a single child into itself.
    #[must_use]
    pub fn all(mut children: Vec<Self>) -> Self {
        if children.len() == 1 {
            children.remove(0)
        } else {
            Self::And(children)
        }
    }

    /// Disjunction that collapses a single child into itself.
    #[must_use]
    pub fn any(mut children: Vec<Self>) -> Self {
        if children.len() == 1 {
            children.remove(0)
        } else {
            Self::Or(children)
        }
    }

    /// Returns true if `column` appears anywhere in the tree.
    #[must_use]
    pub fn references(&self, column: Column) -> bool {
        match self {
            Self::Equals(c, _) | Self::In(c, _) | Self::Gte(c, _) | Self::IsNull(c) => {
                *c == column
            },
            Self::And(children) | Self::Or(children) => {
                children.iter().any(|child| child.references(column))
            },
        }
    }

    /// Evaluates the predicate against a record.
    ///
    /// Comparisons against a missing value are false, as in SQL.
    #[must_use]
    pub fn matches(&self, record: &CacheRecord) -> bool {
        match self {
            Self::Equals(column, value) => column_value(record, *column).as_ref() == Some(value),
            Self::In(column, values) => {
                column_value(record, *column).is_some_and(|v| values.contains(&v))
            },
            Self::Gte(column, value) => column_value(record, *column)
                .and_then(|v| v.compare(value))
                .is_some_and(Ordering::is_ge),
            Self::IsNull(column) => column_value(record, *column).is_none(),
            Self::And(children) => children.iter().all(|child| child.matches(record)),
            Self::Or(children) => children.iter().any(|child| child.matches(record)),
        }
    }
}

/// Reads a column from a record.
#[must_use]
pub fn column_value(record: &CacheRecord, column: Column) -> Option<Value> {
    let text = |v: &Option<String>| v.clone().map(Value::Text);
    match column {
        Column::ClientId => Some(Value::Int(record.client_id)),
        Column::ContactId => record.contact_id.map(Value::Int),
        Column::Email => text(&record.email),
        Column::Phone => text(&record.phone),
        Column::Mobile => text(&record.mobile),
        Column::Address1 => text(&record.address1),
        Column::Address2 => text(&record.address2),
        Column::City => text(&record.city),
        Column::State => text(&record.state),
        Column::Zipcode => text(&record.zipcode),
        Column::Country => text(&record.country),
        Column::CategoryId => record.category_id.map(Value::Int),
        Column::UtmSource => text(&record.utm_source),
        Column::DateAdded => Some(Value::Timestamp(record.date_added)),
        Column::ExclusivePattern => record.exclusive_pattern.map(|p| p.bits().into()),
        Column::ExclusiveScope => record.exclusive_scope.map(|s| s.bits().into()),
        Column::ExclusiveExpireDate => record.exclusive_expire_date.map(Value::Timestamp),
    }
}
