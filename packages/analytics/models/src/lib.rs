#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Result types for price aggregation, trend extraction and comparisons.
//!
//! Defines the aggregated price table, the per-operation series and trend
//! curves cut from it, intervention windows, and the bundle a comparison
//! hands back to the presentation layer.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use price_map_geography_models::TractId;
use price_map_market_models::{OperationType, Period};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Aggregated prices: one row per period, one column per operation type.
///
/// Periods are sorted ascending and every column has exactly one cell per
/// period. A `None` cell means no price was observed for that
/// (period, operation), which is distinct from a zero price.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateSeries {
    /// Sorted, deduplicated period index.
    pub periods: Vec<Period>,
    /// Cells per operation type, aligned with `periods`.
    pub columns: BTreeMap<OperationType, Vec<Option<f64>>>,
}

impl AggregateSeries {
    /// Returns `true` if the filter matched no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Operation types that have a column.
    pub fn operations(&self) -> impl Iterator<Item = OperationType> + '_ {
        self.columns.keys().copied()
    }

    /// The column for `operation` as a named series.
    #[must_use]
    pub fn column(&self, operation: OperationType, name: impl Into<String>) -> Option<PriceSeries> {
        let cells = self.columns.get(&operation)?;
        Some(PriceSeries {
            name: name.into(),
            points: self
                .periods
                .iter()
                .zip(cells)
                .map(|(&period, &value)| SeriesPoint { period, value })
                .collect(),
        })
    }

    /// Most recent period in the index.
    #[must_use]
    pub fn latest_period(&self) -> Option<Period> {
        self.periods.last().copied()
    }
}

/// One cell of a [`PriceSeries`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Time bucket.
    pub period: Period,
    /// Aggregated price, `None` when missing.
    pub value: Option<f64>,
}

/// A named single-operation price series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    /// Display name, carried through to the trend.
    pub name: String,
    /// Points in period order.
    pub points: Vec<SeriesPoint>,
}

impl PriceSeries {
    /// Builds a series from (period, value) pairs.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        points: impl IntoIterator<Item = (Period, Option<f64>)>,
    ) -> Self {
        Self {
            name: name.into(),
            points: points
                .into_iter()
                .map(|(period, value)| SeriesPoint { period, value })
                .collect(),
        }
    }

    /// Number of points, missing ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the series has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points that carry a value.
    pub fn present(&self) -> impl Iterator<Item = (Period, f64)> + '_ {
        self.points
            .iter()
            .filter_map(|point| point.value.map(|value| (point.period, value)))
    }
}

/// One point of a fitted trend curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// Time bucket.
    pub period: Period,
    /// Trend component at the period.
    pub value: f64,
}

/// Smoothed trend component of a [`PriceSeries`].
///
/// Has the same name and the same period index as the series it was fitted
/// on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSeries {
    /// Name of the source series.
    pub name: String,
    /// Points in period order.
    pub points: Vec<TrendPoint>,
}

/// Parameters of the trend model.
///
/// All fields default, so a partial `[trend]` table in the dataset config
/// only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Number of potential changepoints.
    pub changepoints: usize,
    /// Fraction of the history changepoints are placed in.
    pub changepoint_range: f64,
    /// Prior scale of the changepoint rate adjustments.
    pub changepoint_prior_scale: f64,
    /// Prior scale of the seasonal Fourier coefficients.
    pub seasonality_prior_scale: f64,
    /// Maximum Fourier order of yearly seasonality.
    pub yearly_order: usize,
    /// Assumed observation noise on the scaled values.
    pub noise_scale: f64,
    /// Fewest present values a series needs to be fitted.
    pub min_observations: usize,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            yearly_order: 10,
            noise_scale: 0.05,
            min_observations: 2,
        }
    }
}

/// A closed date range annotated with intervention labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    /// First day of the window.
    pub start: NaiveDate,
    /// Last day of the window.
    pub end: NaiveDate,
    /// Short labels of the interventions active in the window.
    pub labels: BTreeSet<String>,
}

impl Interval {
    /// A window carrying a single label.
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate, label: impl Into<String>) -> Self {
        Self {
            start,
            end,
            labels: BTreeSet::from([label.into()]),
        }
    }
}

/// An [`Interval`] produced by merging; no two merged intervals overlap.
pub type MergedInterval = Interval;

/// Tract group a comparison series was aggregated over.
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SeriesGroup {
    /// Tracts touched by the drawn area or the selected interventions
    Treated,
    /// Remaining tracts of the treated tracts' districts
    District,
    /// Tracts touched by the drawn control area
    Control,
}

impl SeriesGroup {
    /// Human-readable prefix used in series names.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Treated => "Average",
            Self::District => "District",
            Self::Control => "Control",
        }
    }
}

/// Identifies a comparison series by group and operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeriesLabel {
    /// Tract group.
    pub group: SeriesGroup,
    /// Sale or rent.
    pub operation: OperationType,
}

impl std::fmt::Display for SeriesLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let operation = match self.operation {
            OperationType::Sale => "buy",
            OperationType::Rent => "rent",
        };
        write!(f, "{} {operation}", self.group.title())
    }
}

/// Which operation types a comparison keeps.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PriceType {
    /// Sale and rent series
    #[default]
    Both,
    /// Sale series only
    #[strum(to_string = "sale", serialize = "buy")]
    Sale,
    /// Rent series only
    Rent,
}

impl PriceType {
    /// Returns `true` if series of `operation` are kept.
    #[must_use]
    pub const fn includes(self, operation: OperationType) -> bool {
        matches!(
            (self, operation),
            (Self::Both, _) | (Self::Sale, OperationType::Sale) | (Self::Rent, OperationType::Rent)
        )
    }
}

/// Outcome of aggregating one tract group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GroupStatus {
    /// The group's tracts had price records.
    Matched {
        /// Number of periods in the aggregated index.
        periods: usize,
    },
    /// The group had no tracts, or none of its tracts had records.
    NoMatch,
}

/// Tract membership and status of one comparison group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    /// Which group.
    pub group: SeriesGroup,
    /// Tracts aggregated for the group.
    pub tracts: BTreeSet<TractId>,
    /// Whether any price data matched.
    pub status: GroupStatus,
}

/// A price series of a comparison, with its trend when requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSeries {
    /// Group and operation.
    pub label: SeriesLabel,
    /// Aggregated prices.
    pub values: PriceSeries,
    /// Fitted trend; `None` when trends were not requested or the series
    /// had too few observations.
    pub trend: Option<TrendSeries>,
}

/// Everything a comparison produced, ready for presentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonBundle {
    /// Treated, district and control groups, in that order, as requested.
    pub groups: Vec<GroupSummary>,
    /// Series ordered by group, then operation.
    pub series: Vec<ComparisonSeries>,
    /// Merged intervention windows over the treated tracts.
    pub windows: Vec<MergedInterval>,
}

impl ComparisonBundle {
    /// Drops the series whose operation `price_type` excludes.
    #[must_use]
    pub fn with_price_type(mut self, price_type: PriceType) -> Self {
        self.series
            .retain(|series| price_type.includes(series.label.operation));
        self
    }

    /// Summary of `group`, if it was part of the comparison.
    #[must_use]
    pub fn group(&self, group: SeriesGroup) -> Option<&GroupSummary> {
        self.groups.iter().find(|summary| summary.group == group)
    }

    /// Looks up a series by label.
    #[must_use]
    pub fn series(&self, label: SeriesLabel) -> Option<&ComparisonSeries> {
        self.series.iter().find(|series| series.label == label)
    }
}
