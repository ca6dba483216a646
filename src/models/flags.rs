//! Matching and scope bitmasks.
//!
//! Rules describe *which contact fields must match* ([`MatchingFlags`]) and
//! *which context narrows the match* ([`ScopeFlags`]) as small bitmasks. Cache
//! rows persist a single bit of each for exclusivity reservations; combined
//! masks only exist while a rule is being evaluated.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

macro_rules! rule_flags {
    (
        $(#[$meta:meta])*
        $name:ident { $( $(#[$cmeta:meta])* $flag:ident = $value:expr ),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            $(
                $(#[$cmeta])*
                pub const $flag: Self = Self($value);
            )+

            /// Every named flag, lowest bit first.
            pub const ALL: &'static [Self] = &[$(Self::$flag),+];

            /// Wraps a raw mask. Unknown bits are kept as-is.
            #[must_use]
            pub const fn from_bits(bits: u32) -> Self {
                Self(bits)
            }

            /// Returns the raw mask.
            #[must_use]
            pub const fn bits(self) -> u32 {
                self.0
            }

            /// Returns true if any bit of `flag` is set in this mask.
            #[must_use]
            pub const fn has_flag(self, flag: Self) -> bool {
                self.0 & flag.0 != 0
            }

            /// Returns true if no bit is set.
            #[must_use]
            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// Decomposes the mask into its named single-bit flags.
            #[must_use]
            pub fn flags(self) -> Vec<Self> {
                Self::ALL
                    .iter()
                    .copied()
                    .filter(|flag| self.has_flag(*flag))
                    .collect()
            }
        }

        impl BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl From<u32> for $name {
            fn from(bits: u32) -> Self {
                Self(bits)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#07b}", self.0)
            }
        }
    };
}

rule_flags! {
    /// Which contact fields a rule compares against the cache.
    MatchingFlags {
        /// Same contact id.
        EXPLICIT = 1,
        /// Same trimmed email.
        EMAIL = 2,
        /// Same normalized phone.
        PHONE = 4,
        /// Same normalized mobile.
        MOBILE = 8,
        /// Same street address (never used for exclusivity).
        ADDRESS = 16,
    }
}

rule_flags! {
    /// Which context dimension narrows a rule.
    ScopeFlags {
        /// Every submission to the client.
        GLOBAL = 1,
        /// Submissions sharing the client's category.
        CATEGORY = 2,
        /// Submissions sharing a UTM source.
        UTM_SOURCE = 4,
    }
}

impl MatchingFlags {
    /// Matching types considered by exclusivity checks unless told otherwise.
    pub const EXCLUSIVE_DEFAULT: Self = Self(1 | 2 | 4 | 8);
}

impl ScopeFlags {
    /// Scopes an exclusivity reservation can be held under.
    pub const EXCLUSIVE: Self = Self(1 | 2);
}

/// Collects every integer in `1..=max` that shares a bit with `mask`.
///
/// This is a literal integer scan, not a bit-position scan: composite values
/// such as `3` are tested and returned when they overlap `mask`. Exclusivity
/// uses the result as an `IN` list against stored single-bit patterns, where a
/// composite member can never match a stored value.
///
/// # Examples
///
/// ```
/// use contact_gate::models::bits_set_up_to;
///
/// assert_eq!(bits_set_up_to(4, 0b1010), vec![2, 3]);
/// assert_eq!(bits_set_up_to(2, 0b1111), vec![1, 2]);
/// assert!(bits_set_up_to(0, 0b1111).is_empty());
/// ```
#[must_use]
pub fn bits_set_up_to(max: u32, mask: u32) -> Vec<u32> {
    (1..=max).filter(|i| i & mask != 0).collect()
}
