//! Census tract identifier normalization.
//!
//! Spanish INE census section codes are ten decimal digits:
//! province (2) + municipality (3) + district (2) + section (3), e.g.
//! `"0801901001"`. Source files frequently drop the leading zero or
//! store the code as a number, so all constructors normalize to the
//! fixed-width string.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of digits in a normalized census tract identifier.
pub const TRACT_ID_LEN: usize = 10;

/// Number of leading digits identifying municipality + district.
pub const DISTRICT_PREFIX_LEN: usize = 7;

/// Errors produced when normalizing a census tract identifier.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IdentifierError {
    /// The identifier was empty or whitespace.
    #[error("Empty census tract identifier")]
    Empty,

    /// The identifier contained non-digit characters.
    #[error("Census tract identifier '{value}' is not numeric")]
    NotNumeric {
        /// The rejected raw value.
        value: String,
    },

    /// The identifier has more digits than a tract code allows.
    #[error("Census tract identifier '{value}' has {len} digits (max {TRACT_ID_LEN})")]
    TooLong {
        /// The rejected raw value.
        value: String,
        /// Number of significant digits found.
        len: usize,
    },

    /// The identifier was a negative number.
    #[error("Census tract identifier {value} is negative")]
    Negative {
        /// The rejected value.
        value: i64,
    },

    /// The identifier was a non-integral or non-finite floating point number.
    #[error("Census tract identifier {value} is not an integer")]
    NotIntegral {
        /// The rejected value.
        value: f64,
    },
}

/// A normalized, ten-digit census tract identifier.
///
/// Two tracts are equal iff their normalized codes match.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TractId(String);

impl TractId {
    /// Normalizes a raw textual identifier.
    ///
    /// Accepts surrounding whitespace and an all-zero fractional part
    /// (`"801901001.0"`, as written by spreadsheet exports of integer
    /// columns). Shorter codes are left-padded with zeros.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] if the value is empty, non-numeric, or
    /// longer than [`TRACT_ID_LEN`] significant digits.
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(IdentifierError::Empty);
        }

        let digits = match trimmed.split_once('.') {
            Some((int_part, frac)) if !frac.is_empty() && frac.bytes().all(|b| b == b'0') => {
                int_part
            }
            Some(_) => {
                return Err(IdentifierError::NotNumeric {
                    value: trimmed.to_string(),
                });
            }
            None => trimmed,
        };

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IdentifierError::NotNumeric {
                value: trimmed.to_string(),
            });
        }

        if digits.len() > TRACT_ID_LEN {
            // Extra leading zeros are still a valid code.
            let significant = digits.trim_start_matches('0');
            if significant.len() > TRACT_ID_LEN {
                return Err(IdentifierError::TooLong {
                    value: trimmed.to_string(),
                    len: significant.len(),
                });
            }
            return Ok(Self(format!("{significant:0>TRACT_ID_LEN$}")));
        }

        Ok(Self(format!("{digits:0>TRACT_ID_LEN$}")))
    }

    /// Normalizes an integer identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] if the value is negative or has more
    /// than [`TRACT_ID_LEN`] digits.
    pub fn from_integer(value: i64) -> Result<Self, IdentifierError> {
        if value < 0 {
            return Err(IdentifierError::Negative { value });
        }
        Self::parse(&value.to_string())
    }

    /// Normalizes an integral floating point identifier (e.g. a JSON
    /// number such as `801901001.0`).
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] if the value is not a finite,
    /// non-negative integer of at most [`TRACT_ID_LEN`] digits.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_f64(value: f64) -> Result<Self, IdentifierError> {
        if !value.is_finite() || value.fract() != 0.0 || value.abs() >= 1e15 {
            return Err(IdentifierError::NotIntegral { value });
        }
        Self::from_integer(value as i64)
    }

    /// Returns the normalized ten-digit code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the municipality + district prefix (first
    /// [`DISTRICT_PREFIX_LEN`] digits).
    #[must_use]
    pub fn district_prefix(&self) -> &str {
        &self.0[..DISTRICT_PREFIX_LEN]
    }
}

impl fmt::Display for TractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TractId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TractId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<i64> for TractId {
    type Error = IdentifierError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_integer(value)
    }
}

impl From<TractId> for String {
    fn from(value: TractId) -> Self {
        value.0
    }
}

impl AsRef<str> for TractId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
