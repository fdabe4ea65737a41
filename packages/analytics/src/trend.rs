//! Trend extraction for price series.
//!
//! The model is additive: a piecewise-linear growth term whose slope may
//! change at a fixed grid of candidate changepoints, plus a yearly Fourier
//! seasonality when the history covers at least two years. Coefficients
//! are the MAP estimate under Gaussian priors, which reduces to a ridge
//! regression on max-abs-scaled values. Only the growth term is returned.

use std::f64::consts::PI;

use chrono::{Datelike as _, NaiveDate};
use nalgebra::{DMatrix, DVector};
use price_map_analytics_models::{PriceSeries, TrendConfig, TrendPoint, TrendSeries};

use crate::AnalyticsError;

const DAYS_PER_YEAR: f64 = 365.25;

/// Histories at least this long get a yearly seasonal term.
const MIN_SEASONAL_SPAN_DAYS: f64 = 2.0 * DAYS_PER_YEAR;

/// Prior scale of the base offset and growth rate.
const GROWTH_PRIOR_SCALE: f64 = 5.0;

/// Extracts the trend of `series` with the default [`TrendConfig`].
///
/// # Errors
///
/// See [`extract_trend_with`].
pub fn extract_trend(series: &PriceSeries) -> Result<TrendSeries, AnalyticsError> {
    extract_trend_with(series, &TrendConfig::default())
}

/// Extracts the trend of `series`.
///
/// The model is fitted on the present values and evaluated at every
/// period of the series, missing ones included, so the output has the
/// same name and period index as the (period-sorted) input.
///
/// # Errors
///
/// Returns [`AnalyticsError::InsufficientData`] if the series has fewer
/// present values than `config.min_observations` (at least 2) or all of
/// them fall on the same day, and [`AnalyticsError::TrendFit`] if the
/// regularized system cannot be solved.
pub fn extract_trend_with(
    series: &PriceSeries,
    config: &TrendConfig,
) -> Result<TrendSeries, AnalyticsError> {
    let mut sorted = series.clone();
    sorted.points.sort_by_key(|point| point.period);

    let observed: Vec<(f64, f64)> = sorted
        .present()
        .filter(|(_, value)| value.is_finite())
        .map(|(period, value)| (day_number(period.start()), value))
        .collect();

    let required = config.min_observations.max(2);
    let insufficient = || AnalyticsError::InsufficientData {
        name: series.name.clone(),
        observations: observed.len(),
        required,
    };
    if observed.len() < required {
        return Err(insufficient());
    }

    let first_day = observed[0].0;
    let span = observed[observed.len() - 1].0 - first_day;
    if span <= 0.0 {
        return Err(insufficient());
    }

    let model = TrendModel::new(&observed, first_day, span, config);
    let coefficients = model.fit(&observed)?;

    Ok(TrendSeries {
        name: series.name.clone(),
        points: sorted
            .points
            .iter()
            .map(|point| TrendPoint {
                period: point.period,
                value: model.growth(day_number(point.period.start()), &coefficients),
            })
            .collect(),
    })
}

/// Design of the regression: time scaling, changepoints and seasonality.
struct TrendModel {
    first_day: f64,
    span: f64,
    y_scale: f64,
    /// Changepoint locations on the scaled time axis.
    changepoints: Vec<f64>,
    fourier_order: usize,
    prior_scales: Vec<f64>,
    noise_scale: f64,
}

impl TrendModel {
    fn new(observed: &[(f64, f64)], first_day: f64, span: f64, config: &TrendConfig) -> Self {
        let y_scale = observed
            .iter()
            .map(|&(_, y)| y.abs())
            .fold(0.0_f64, f64::max);
        let y_scale = if y_scale > 0.0 { y_scale } else { 1.0 };

        let scaled: Vec<f64> = observed
            .iter()
            .map(|&(day, _)| (day - first_day) / span)
            .collect();
        let changepoints = changepoint_grid(&scaled, config);
        let fourier_order = fourier_order(observed.len(), span, config);

        let mut prior_scales = vec![GROWTH_PRIOR_SCALE; 2];
        prior_scales.extend(std::iter::repeat_n(
            config.changepoint_prior_scale,
            changepoints.len(),
        ));
        prior_scales.extend(std::iter::repeat_n(
            config.seasonality_prior_scale,
            2 * fourier_order,
        ));

        Self {
            first_day,
            span,
            y_scale,
            changepoints,
            fourier_order,
            prior_scales,
            noise_scale: config.noise_scale,
        }
    }

    fn width(&self) -> usize {
        self.prior_scales.len()
    }

    fn scaled_time(&self, day: f64) -> f64 {
        (day - self.first_day) / self.span
    }

    /// Regression row for one day.
    fn features(&self, day: f64) -> Vec<f64> {
        let t = self.scaled_time(day);
        let mut row = Vec::with_capacity(self.width());
        row.push(1.0);
        row.push(t);
        row.extend(self.changepoints.iter().map(|&s| (t - s).max(0.0)));
        for order in 1..=self.fourier_order {
            #[allow(clippy::cast_precision_loss)]
            let angle = 2.0 * PI * order as f64 * day / DAYS_PER_YEAR;
            row.push(angle.sin());
            row.push(angle.cos());
        }
        row
    }

    /// Solves `(XᵀX + Λ) β = Xᵀy` on the scaled values.
    fn fit(&self, observed: &[(f64, f64)]) -> Result<DVector<f64>, AnalyticsError> {
        let rows: Vec<f64> = observed
            .iter()
            .flat_map(|&(day, _)| self.features(day))
            .collect();
        let design = DMatrix::from_row_slice(observed.len(), self.width(), &rows);
        let targets = DVector::from_iterator(
            observed.len(),
            observed.iter().map(|&(_, y)| y / self.y_scale),
        );
        let penalty = DVector::from_iterator(
            self.width(),
            self.prior_scales
                .iter()
                .map(|scale| (self.noise_scale / scale).powi(2)),
        );

        let normal = design.tr_mul(&design) + DMatrix::from_diagonal(&penalty);
        let rhs = design.tr_mul(&targets);

        let cholesky = normal.cholesky().ok_or_else(|| AnalyticsError::TrendFit {
            message: "normal equations are not positive definite".to_string(),
        })?;

        Ok(cholesky.solve(&rhs))
    }

    /// Growth component at `day`, in the original units.
    fn growth(&self, day: f64, coefficients: &DVector<f64>) -> f64 {
        let t = self.scaled_time(day);
        let adjustments: f64 = self
            .changepoints
            .iter()
            .zip(coefficients.iter().skip(2))
            .map(|(&s, delta)| delta * (t - s).max(0.0))
            .sum();
        (coefficients[0] + coefficients[1] * t + adjustments) * self.y_scale
    }
}

/// Candidate changepoints: evenly spaced observation times within the
/// first `changepoint_range` of the history, excluding the first.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn changepoint_grid(scaled: &[f64], config: &TrendConfig) -> Vec<f64> {
    let history = ((scaled.len() as f64) * config.changepoint_range.clamp(0.0, 1.0)).floor() as usize;
    let count = config.changepoints.min(history.saturating_sub(1));
    if count == 0 {
        return Vec::new();
    }

    let step = (history - 1) as f64 / count as f64;

    (1..=count)
        .map(|i| {
            let index = (step * i as f64).round() as usize;
            scaled[index.min(scaled.len() - 1)]
        })
        .collect()
}

/// Yearly Fourier order, zero when the history is shorter than two years.
fn fourier_order(observations: usize, span: f64, config: &TrendConfig) -> usize {
    if span < MIN_SEASONAL_SPAN_DAYS {
        return 0;
    }
    #[allow(clippy::cast_precision_loss)]
    let per_year = observations as f64 * DAYS_PER_YEAR / span;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let sampling_limit = (per_year / 2.0).floor() as usize;
    config.yearly_order.min(sampling_limit)
}

/// Days since 0001-01-01.
fn day_number(date: NaiveDate) -> f64 {
    f64::from(date.num_days_from_ce())
}
