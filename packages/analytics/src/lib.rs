#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Price analytics over census tract selections.
//!
//! Aggregates asking prices over the tracts a geometry impacts, fits
//! trend curves to the resulting series, merges intervention windows and
//! assembles treated/district/control comparisons. Every function here is
//! a pure computation over borrowed reference data.

pub mod aggregate;
pub mod compare;
pub mod intervals;
pub mod labels;
pub mod trend;

pub use aggregate::aggregate;
pub use compare::{ComparisonRequest, MarketData, TreatedArea, compare};
pub use intervals::merge_intervals;
pub use labels::InterventionLabels;
pub use trend::{extract_trend, extract_trend_with};

use chrono::NaiveDate;
use price_map_geography::GeoError;
use price_map_market_models::InvalidAggregationError;
use price_map_spatial::SpatialError;
use thiserror::Error;

/// Errors that can occur during analytics operations.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// An interval ends before it starts.
    #[error("Invalid interval: start {start} is after end {end}")]
    InvalidInterval {
        /// Interval start.
        start: NaiveDate,
        /// Interval end.
        end: NaiveDate,
    },

    /// Aggregation name is not `mean` or `median`.
    #[error("Invalid aggregation operation {value:?}: expected mean or median")]
    InvalidOperation {
        /// The rejected name.
        value: String,
    },

    /// A series has too few observations to fit a trend.
    #[error("Series {name:?} has {observations} observation(s), at least {required} needed")]
    InsufficientData {
        /// Series name.
        name: String,
        /// Present values in the series.
        observations: usize,
        /// Minimum needed.
        required: usize,
    },

    /// The trend system could not be solved.
    #[error("Trend fit failed: {message}")]
    TrendFit {
        /// Description of what went wrong.
        message: String,
    },

    /// The treated selection has no geometry.
    #[error("Query geometry is empty")]
    EmptyQuery,

    /// Reprojecting a query failed.
    #[error(transparent)]
    Geo(#[from] GeoError),
}

impl From<SpatialError> for AnalyticsError {
    fn from(error: SpatialError) -> Self {
        match error {
            SpatialError::EmptyQuery => Self::EmptyQuery,
            SpatialError::Geo(e) => Self::Geo(e),
        }
    }
}

impl From<InvalidAggregationError> for AnalyticsError {
    fn from(error: InvalidAggregationError) -> Self {
        Self::InvalidOperation { value: error.value }
    }
}

/// Parses an aggregation name.
///
/// # Errors
///
/// Returns [`AnalyticsError::InvalidOperation`] for anything other than
/// `mean` or `median`.
pub fn parse_aggregation(value: &str) -> Result<price_map_market_models::Aggregation, AnalyticsError> {
    Ok(value.parse()?)
}
