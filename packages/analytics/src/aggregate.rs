//! Aggregation of asking prices over a tract selection.

use std::collections::{BTreeMap, BTreeSet};

use price_map_analytics_models::AggregateSeries;
use price_map_geography_models::TractId;
use price_map_market_models::{Aggregation, OperationType, Period, PriceRecord};

/// Aggregates the records of `tracts` into a period × operation table.
///
/// Returns `None` when `tracts` is empty (nothing selected). A selection
/// that matches no records yields `Some` of an empty series. Missing
/// prices are skipped; a (period, operation) group with no present price
/// becomes a missing cell.
#[must_use]
pub fn aggregate(
    records: &[PriceRecord],
    tracts: &BTreeSet<TractId>,
    aggregation: Aggregation,
) -> Option<AggregateSeries> {
    if tracts.is_empty() {
        return None;
    }

    let mut periods = BTreeSet::new();
    let mut groups: BTreeMap<(Period, OperationType), Vec<f64>> = BTreeMap::new();

    for record in records.iter().filter(|record| tracts.contains(&record.tract)) {
        periods.insert(record.period);
        let prices = groups.entry((record.period, record.operation)).or_default();
        if let Some(price) = record.price.filter(|price| price.is_finite()) {
            prices.push(price);
        }
    }

    let periods: Vec<Period> = periods.into_iter().collect();
    let operations: BTreeSet<OperationType> = groups.keys().map(|&(_, operation)| operation).collect();

    let columns = operations
        .into_iter()
        .map(|operation| {
            let cells = periods
                .iter()
                .map(|&period| {
                    groups
                        .get_mut(&(period, operation))
                        .and_then(|prices| combine(prices, aggregation))
                })
                .collect();
            (operation, cells)
        })
        .collect();

    Some(AggregateSeries { periods, columns })
}

fn combine(prices: &mut [f64], aggregation: Aggregation) -> Option<f64> {
    if prices.is_empty() {
        return None;
    }

    #[allow(clippy::cast_precision_loss)]
    let count = prices.len() as f64;

    match aggregation {
        Aggregation::Mean => Some(prices.iter().sum::<f64>() / count),
        Aggregation::Median => {
            prices.sort_by(f64::total_cmp);
            let mid = prices.len() / 2;
            if prices.len() % 2 == 0 {
                Some(f64::midpoint(prices[mid - 1], prices[mid]))
            } else {
                Some(prices[mid])
            }
        }
    }
}
