//! [`Amount`] represents a fee, deposit or balance on the compute ledger.
//!
//! This module holds its type definition, decimal parsing and serde implementations.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// A non-negative ledger amount in fixed point with [`Amount::DECIMALS`] fractional digits.
///
/// Uses a `u128` count of the smallest unit internally, so decimal fees such as
/// `0.01` are represented exactly.
///
/// ```
/// use compute_kit::types::Amount;
///
/// let fee: Amount = "0.01".parse().unwrap();
/// assert_eq!(fee.to_string(), "0.01");
/// assert!(!fee.is_zero());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(pub u128);

impl Amount {
    /// Number of fractional decimal digits.
    pub const DECIMALS: u32 = 18;

    /// Smallest units per whole token.
    pub const UNIT: u128 = 10u128.pow(Self::DECIMALS);

    pub const ZERO: Amount = Amount(0);

    /// Creates an amount from a count of the smallest unit.
    pub const fn from_base_units(units: u128) -> Self {
        Amount(units)
    }

    /// Creates an amount from a whole number of tokens.
    pub fn from_tokens(tokens: u64) -> Self {
        Amount(tokens as u128 * Self::UNIT)
    }

    pub const fn base_units(&self) -> u128 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns `self` if it is strictly positive, otherwise an [`Error::InvalidAmountError`].
    pub fn require_positive(self) -> Result<Self, Error> {
        if self.is_zero() {
            Err(Error::InvalidAmountError(
                "amount must be greater than zero".to_string(),
            ))
        } else {
            Ok(self)
        }
    }

    pub const fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }
}

impl From<u64> for Amount {
    fn from(tokens: u64) -> Self {
        Amount::from_tokens(tokens)
    }
}

impl FromStr for Amount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| Error::InvalidAmountError(format!("'{s}': {reason}"));

        let trimmed = s.trim();
        if trimmed.starts_with('-') {
            return Err(invalid("amount must not be negative"));
        }
        let trimmed = trimmed.strip_prefix('+').unwrap_or(trimmed);

        let (whole, fraction) = match trimmed.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (trimmed, ""),
        };

        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid("empty amount"));
        }
        if !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid("not a decimal number"));
        }
        if fraction.len() > Self::DECIMALS as usize {
            return Err(invalid("too many fractional digits"));
        }

        let whole_units = if whole.is_empty() {
            0
        } else {
            whole
                .parse::<u128>()
                .ok()
                .and_then(|w| w.checked_mul(Self::UNIT))
                .ok_or_else(|| invalid("amount is too large"))?
        };

        let fraction_units = if fraction.is_empty() {
            0
        } else {
            let padded = format!("{fraction:0<width$}", width = Self::DECIMALS as usize);
            padded
                .parse::<u128>()
                .map_err(|_| invalid("not a decimal number"))?
        };

        whole_units
            .checked_add(fraction_units)
            .map(Amount)
            .ok_or_else(|| invalid("amount is too large"))
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let whole = self.0 / Self::UNIT;
        let fraction = self.0 % Self::UNIT;
        if fraction == 0 {
            return write!(f, "{whole}");
        }
        let digits = format!("{fraction:0>width$}", width = Self::DECIMALS as usize);
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct AmountVisitor;

        impl serde::de::Visitor<'_> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "a non-negative decimal amount as a string or number")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Amount, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Amount, E> {
                Ok(Amount::from_tokens(v))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Amount, E> {
                u64::try_from(v)
                    .map(Amount::from_tokens)
                    .map_err(|_| E::custom("amount must not be negative"))
            }

            fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Amount, E> {
                if !v.is_finite() {
                    return Err(E::custom("amount must be finite"));
                }
                v.to_string().parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}
