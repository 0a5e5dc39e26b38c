// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::{CaltrackError, QualityWarning, TimeSeriesFrame};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;

/// Clips a merged meter+temperature frame to the most recent `max_days`
/// days ending at `end` (closed interval on both boundaries, so 365 days of
/// hourly data yields 8761 rows).
///
/// `end` must be present in the frame's index and the index must be strictly
/// increasing; both are hard preconditions. When the available history is
/// shorter than requested, the truncated window is returned together with an
/// `incomplete_baseline_data` warning carrying the actual vs. requested span.
pub fn get_baseline_data(
    data: &TimeSeriesFrame,
    end: DateTime<Utc>,
    max_days: u32,
) -> Result<(TimeSeriesFrame, Vec<QualityWarning>), CaltrackError> {
    if !data.has_strictly_increasing_index() {
        return Err(CaltrackError::invalid_input(
            "baseline selection requires a strictly increasing index",
        ));
    }
    if data.index().binary_search(&end).is_err() {
        return Err(CaltrackError::invalid_input(format!(
            "end timestamp {end} is not present in the data index"
        )));
    }

    let start = end - Duration::days(i64::from(max_days));
    let rows: Vec<usize> = data
        .index()
        .iter()
        .enumerate()
        .filter(|(_, ts)| **ts >= start && **ts <= end)
        .map(|(row, _)| row)
        .collect();
    let baseline = data.take(&rows);

    let mut warnings = Vec::new();
    let first_kept = baseline.index()[0];
    if first_kept > start {
        let actual_days = (end - first_kept).num_days();
        warnings.push(QualityWarning::new(
            "caltrack_hourly.incomplete_baseline_data",
            format!(
                "Data does not cover the full requested baseline period. \
                 Requested {max_days} days, got {actual_days} days."
            ),
            json!({
                "requested_days": max_days,
                "actual_days": actual_days,
            }),
        ));
    }

    tracing::debug!(
        rows = baseline.len(),
        max_days,
        warnings = warnings.len(),
        "selected baseline window"
    );
    Ok((baseline, warnings))
}
