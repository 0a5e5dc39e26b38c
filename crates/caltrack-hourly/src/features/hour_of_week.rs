// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use super::{FeatureExtractor, FeatureOutput, FeatureParameters, Kwargs};
use caltrack_core::{CaltrackError, Column, QualityWarning, TimeSeriesFrame};
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde_json::json;

pub(crate) const HOURS_PER_WEEK: usize = 168;

/// Categorical label in 1..=168 for the (day-of-week, hour-of-day) pair,
/// with Monday 00:00 mapping to 1.
pub fn hour_of_week_label(ts: &DateTime<Utc>) -> u32 {
    ts.weekday().num_days_from_monday() * 24 + ts.hour() + 1
}

/// Hour-of-week categorical feature extractor.
pub struct HourOfWeekFeature;

impl FeatureExtractor for HourOfWeekFeature {
    fn name(&self) -> &'static str {
        "hour_of_week"
    }

    fn accepted_kwargs(&self) -> &'static [&'static str] {
        &[]
    }

    fn extract(
        &self,
        data: &TimeSeriesFrame,
        _kwargs: &Kwargs,
    ) -> Result<FeatureOutput, CaltrackError> {
        let labels: Vec<f64> = data
            .index()
            .iter()
            .map(|ts| f64::from(hour_of_week_label(ts)))
            .collect();

        let mut seen = [false; HOURS_PER_WEEK + 1];
        for ts in data.index() {
            seen[hour_of_week_label(ts) as usize] = true;
        }
        let num_missing_hours = (1..=HOURS_PER_WEEK).filter(|&h| !seen[h]).count();

        let mut warnings = Vec::new();
        if num_missing_hours > 0 {
            warnings.push(QualityWarning::new(
                "caltrack_hourly.missing_hours_of_week",
                format!(
                    "Data does not include all hours of week. \
                     {num_missing_hours} hours missing."
                ),
                json!({ "num_missing_hours": num_missing_hours }),
            ));
        }

        let mut features = TimeSeriesFrame::new(data.index().to_vec());
        features.push_column("hour_of_week", Column::Float(labels))?;
        if let Some(model_ids) = data.model_id_column() {
            features.push_column("model_id", Column::ModelId(model_ids.to_vec()))?;
        }

        Ok(FeatureOutput {
            features,
            parameters: FeatureParameters::new(),
            warnings,
        })
    }
}
