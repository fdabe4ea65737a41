//! Treated / district / control price comparisons.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use price_map_analytics_models::{
    AggregateSeries, ComparisonBundle, ComparisonSeries, GroupStatus, GroupSummary, Interval,
    PriceType, SeriesGroup, SeriesLabel, TrendConfig,
};
use price_map_geography::{Intervention, QueryGeometry};
use price_map_geography_models::TractId;
use price_map_market_models::{Aggregation, PriceRecord};
use price_map_spatial::SpatialIndex;

use crate::labels::InterventionLabels;
use crate::{AnalyticsError, aggregate, extract_trend_with, merge_intervals};

/// Reference data a comparison reads from.
///
/// Loaded once by the caller and borrowed for every comparison.
#[derive(Clone, Copy)]
pub struct MarketData<'a> {
    /// Tract polygons.
    pub index: &'a SpatialIndex,
    /// Joined price observations.
    pub records: &'a [PriceRecord],
    /// Urban interventions.
    pub interventions: &'a [Intervention],
    /// Title to short-label table for intervention windows.
    pub labels: &'a InterventionLabels,
}

/// How the treated tracts are selected.
#[derive(Debug, Clone, PartialEq)]
pub enum TreatedArea {
    /// Tracts impacted by a drawn geometry.
    Drawn(QueryGeometry),
    /// Tracts impacted by the footprints of the interventions named by id
    /// or title.
    Interventions(Vec<String>),
}

/// Parameters of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRequest {
    /// Treated selection.
    pub treated: TreatedArea,
    /// Also aggregate the rest of the treated tracts' districts.
    pub district: bool,
    /// Drawn control area, if any.
    pub control: Option<QueryGeometry>,
    /// Fit a trend to every series.
    pub include_trends: bool,
    /// How prices within a group are combined.
    pub aggregation: Aggregation,
    /// Which operation types to keep.
    pub price_type: PriceType,
    /// End date for interventions still ongoing.
    pub as_of: Option<NaiveDate>,
    /// Trend model parameters.
    pub trend: TrendConfig,
}

impl ComparisonRequest {
    /// A request with trends on, mean aggregation, both price types and no
    /// district or control group.
    #[must_use]
    pub fn new(treated: TreatedArea) -> Self {
        Self {
            treated,
            district: false,
            control: None,
            include_trends: true,
            aggregation: Aggregation::Mean,
            price_type: PriceType::Both,
            as_of: None,
            trend: TrendConfig::default(),
        }
    }

    #[must_use]
    pub const fn with_district(mut self, district: bool) -> Self {
        self.district = district;
        self
    }

    #[must_use]
    pub fn with_control(mut self, control: QueryGeometry) -> Self {
        self.control = Some(control);
        self
    }

    #[must_use]
    pub const fn with_trends(mut self, include_trends: bool) -> Self {
        self.include_trends = include_trends;
        self
    }

    #[must_use]
    pub const fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    #[must_use]
    pub const fn with_price_type(mut self, price_type: PriceType) -> Self {
        self.price_type = price_type;
        self
    }

    #[must_use]
    pub const fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = Some(as_of);
        self
    }

    #[must_use]
    pub fn with_trend_config(mut self, trend: TrendConfig) -> Self {
        self.trend = trend;
        self
    }
}

/// Runs a comparison.
///
/// Resolves the treated tracts, then the district and control groups when
/// requested, aggregates each group independently, fits trends, and
/// collects the merged windows of the interventions registered in treated
/// tracts. Groups without data are reported as
/// [`GroupStatus::NoMatch`]; a series too short for a trend keeps its
/// values and gets no trend.
///
/// # Errors
///
/// * [`AnalyticsError::EmptyQuery`] if the treated geometry is empty or no
///   intervention matches the selection
/// * [`AnalyticsError::Geo`] if a geometry cannot be reprojected
/// * [`AnalyticsError::TrendFit`] if a trend system cannot be solved
/// * [`AnalyticsError::InvalidInterval`] if a treated intervention's
///   recorded end precedes its start
pub fn compare(
    data: &MarketData<'_>,
    request: &ComparisonRequest,
) -> Result<ComparisonBundle, AnalyticsError> {
    let treated = treated_tracts(data, &request.treated)?;

    let mut groups = vec![(SeriesGroup::Treated, treated.clone())];
    if request.district {
        groups.push((SeriesGroup::District, data.index.district_ids(&treated)));
    }
    if let Some(control) = request.control.as_ref().filter(|control| !control.is_empty()) {
        groups.push((SeriesGroup::Control, data.index.impacted_ids(control)?));
    }

    let mut bundle = ComparisonBundle::default();
    let mut treated_latest = None;

    for (group, tracts) in groups {
        log::debug!("Comparison group {group}: {} tract(s)", tracts.len());

        let aggregated = aggregate(data.records, &tracts, request.aggregation)
            .filter(|series| !series.is_empty());

        let status = match &aggregated {
            Some(series) => GroupStatus::Matched {
                periods: series.periods.len(),
            },
            None => GroupStatus::NoMatch,
        };

        if let Some(series) = aggregated {
            if group == SeriesGroup::Treated {
                treated_latest = series.latest_period();
            }
            bundle
                .series
                .extend(group_series(group, &series, request)?);
        }

        bundle.groups.push(GroupSummary {
            group,
            tracts,
            status,
        });
    }

    let as_of = request
        .as_of
        .or_else(|| treated_latest.map(price_map_market_models::Period::start));
    bundle.windows = intervention_windows(data, &treated, as_of)?;

    Ok(bundle.with_price_type(request.price_type))
}

fn treated_tracts(
    data: &MarketData<'_>,
    treated: &TreatedArea,
) -> Result<BTreeSet<TractId>, AnalyticsError> {
    match treated {
        TreatedArea::Drawn(query) => Ok(data.index.impacted_ids(query)?),
        TreatedArea::Interventions(selectors) => {
            for selector in selectors {
                if !data.interventions.iter().any(|i| i.matches(selector)) {
                    log::warn!("No intervention matches {selector:?}, ignoring it");
                }
            }

            let selected: Vec<&Intervention> = data
                .interventions
                .iter()
                .filter(|intervention| selectors.iter().any(|s| intervention.matches(s)))
                .collect();
            if selected.is_empty() {
                return Err(AnalyticsError::EmptyQuery);
            }

            Ok(data
                .index
                .impacted_regions(&selected)?
                .into_iter()
                .map(|region| region.id.clone())
                .collect())
        }
    }
}

fn group_series(
    group: SeriesGroup,
    aggregated: &AggregateSeries,
    request: &ComparisonRequest,
) -> Result<Vec<ComparisonSeries>, AnalyticsError> {
    let mut series = Vec::new();

    for operation in aggregated.operations() {
        let label = SeriesLabel { group, operation };
        let Some(values) = aggregated.column(operation, label.to_string()) else {
            continue;
        };

        let trend = if request.include_trends {
            match extract_trend_with(&values, &request.trend) {
                Ok(trend) => Some(trend),
                Err(AnalyticsError::InsufficientData {
                    observations,
                    required,
                    ..
                }) => {
                    log::debug!(
                        "Skipping trend for {label}: {observations} observation(s), {required} needed"
                    );
                    None
                }
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        series.push(ComparisonSeries {
            label,
            values,
            trend,
        });
    }

    Ok(series)
}

/// Merged windows of the interventions registered in `treated` tracts.
///
/// Ongoing interventions run until `as_of` (never before their start), or
/// are shown as a single day when there is no reference date. Recorded end
/// dates are used as-is, so an end before the start is an
/// [`AnalyticsError::InvalidInterval`].
fn intervention_windows(
    data: &MarketData<'_>,
    treated: &BTreeSet<TractId>,
    as_of: Option<NaiveDate>,
) -> Result<Vec<Interval>, AnalyticsError> {
    let intervals = data
        .interventions
        .iter()
        .filter(|intervention| treated.contains(&intervention.tract))
        .map(|intervention| {
            let end = intervention.end.unwrap_or_else(|| {
                as_of.map_or(intervention.start, |as_of| as_of.max(intervention.start))
            });
            Interval::new(intervention.start, end, data.labels.label(&intervention.title))
        })
        .collect();

    merge_intervals(intervals)
}
