#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Asking-price observation types.
//!
//! A [`PriceRecord`] is one (tract, period, operation, typology) asking
//! price after the operation and typology codes have been resolved through
//! their lookup tables. [`Period`] is the coarse time bucket the dataset is
//! published in.

use std::str::FromStr;

use chrono::NaiveDate;
use price_map_geography_models::TractId;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Error returned when a period label cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid period {value:?}: expected YYYY-MM-DD, YYYY-MM or YYYYQn")]
pub struct PeriodError {
    /// The label that failed to parse.
    pub value: String,
}

/// A time bucket, identified by its first day.
///
/// Quarterly and monthly labels are normalized to the first day of the
/// quarter/month so records from differently formatted sources line up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period(NaiveDate);

impl Period {
    /// The period starting on the first day of quarter `quarter` (1-4).
    #[must_use]
    pub fn quarter(year: i32, quarter: u32) -> Option<Self> {
        if !(1..=4).contains(&quarter) {
            return None;
        }
        NaiveDate::from_ymd_opt(year, (quarter - 1) * 3 + 1, 1).map(Self)
    }

    /// The period starting on the first day of `month`.
    #[must_use]
    pub fn month(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self)
    }

    /// First day of the period.
    #[must_use]
    pub const fn start(self) -> NaiveDate {
        self.0
    }

    /// Parses a period label.
    ///
    /// Accepts `YYYY-MM-DD`, `YYYY-MM`, `YYYYQn`, `YYYY-Qn` and `YYYY Qn`
    /// (the quarter marker is case-insensitive). A trailing time component
    /// (`2020-01-01T00:00:00`, `2020-01-01 00:00:00`) is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodError`] if the label matches none of the formats.
    pub fn parse(raw: &str) -> Result<Self, PeriodError> {
        let err = || PeriodError {
            value: raw.to_string(),
        };
        let trimmed = raw.trim();

        if let Some((year, quarter)) = trimmed.split_once(['Q', 'q']) {
            let year = year.trim_end_matches(['-', ' ']);
            let year: i32 = year.parse().map_err(|_| err())?;
            let quarter: u32 = quarter.parse().map_err(|_| err())?;
            return Self::quarter(year, quarter).ok_or_else(err);
        }

        let date_part = trimmed
            .split_once(['T', ' '])
            .map_or(trimmed, |(date, _)| date);

        if let Ok(date) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
            return Ok(Self(date));
        }

        let (year, month) = date_part.split_once('-').ok_or_else(err)?;
        let year: i32 = year.parse().map_err(|_| err())?;
        let month: u32 = month.parse().map_err(|_| err())?;
        Self::month(year, month).ok_or_else(err)
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for Period {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Period {
    type Error = PeriodError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}

impl From<NaiveDate> for Period {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

/// Listing operation an asking price refers to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OperationType {
    /// Properties listed for sale
    #[strum(to_string = "sale", serialize = "buy")]
    Sale,
    /// Properties listed for rent
    Rent,
}

impl OperationType {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Sale, Self::Rent]
    }
}

/// One asking-price observation after lookup joins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    /// Census tract the listing belongs to.
    pub tract: TractId,
    /// Time bucket of the observation.
    pub period: Period,
    /// Sale or rent.
    pub operation: OperationType,
    /// Typology short name (flat, penthouse, ...).
    pub typology: String,
    /// Asking price per square meter, `None` when the source cell is empty.
    pub price: Option<f64>,
}

/// How prices of a (period, operation) group are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// Arithmetic mean
    #[default]
    Mean,
    /// Middle value; the average of the two middle values for even counts
    Median,
}

impl Aggregation {
    /// Lowercase name of the aggregation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Median => "median",
        }
    }
}

impl std::fmt::Display for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aggregation {
    type Err = InvalidAggregationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            _ => Err(InvalidAggregationError {
                value: s.to_string(),
            }),
        }
    }
}

/// Error returned when an aggregation name is neither `mean` nor `median`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidAggregationError {
    /// The name that was provided.
    pub value: String,
}

impl std::fmt::Display for InvalidAggregationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid aggregation {:?}: expected mean or median",
            self.value
        )
    }
}

impl std::error::Error for InvalidAggregationError {}
