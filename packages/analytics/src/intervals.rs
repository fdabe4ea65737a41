//! Merging of intervention windows.

use price_map_analytics_models::{Interval, MergedInterval};

use crate::AnalyticsError;

/// Merges overlapping or touching intervals.
///
/// Intervals are stably sorted by start and scanned once; an interval
/// starting on or before the current end extends it and contributes its
/// labels. The result is sorted by start and pairwise disjoint.
///
/// # Errors
///
/// Returns [`AnalyticsError::InvalidInterval`] if any interval ends
/// before it starts.
pub fn merge_intervals(mut intervals: Vec<Interval>) -> Result<Vec<MergedInterval>, AnalyticsError> {
    if let Some(bad) = intervals.iter().find(|interval| interval.start > interval.end) {
        return Err(AnalyticsError::InvalidInterval {
            start: bad.start,
            end: bad.end,
        });
    }

    intervals.sort_by_key(|interval| interval.start);

    let mut merged: Vec<MergedInterval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        match merged.last_mut() {
            Some(current) if interval.start <= current.end => {
                current.end = current.end.max(interval.end);
                current.labels.extend(interval.labels);
            }
            _ => merged.push(interval),
        }
    }

    Ok(merged)
}
