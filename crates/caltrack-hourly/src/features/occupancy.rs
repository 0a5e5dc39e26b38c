// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use super::hour_of_week::{hour_of_week_label, HOURS_PER_WEEK};
use super::{
    missing_model_id_warning, missing_weight_warning, FeatureExtractor, FeatureOutput,
    FeatureParameters, KwargValue, Kwargs,
};
use crate::wls;
use caltrack_core::{CaltrackError, Column, ModelId, QualityWarning, TimeSeriesFrame};
use indexmap::IndexMap;
use nalgebra::{DMatrix, DVector};
use serde_json::json;
use std::collections::HashMap;

/// Default cutoff for the per-bucket temperature-sensitivity score.
pub const DEFAULT_OCCUPANCY_THRESHOLD: f64 = 0.65;

/// One `(model, hour-of-week)` bucket's occupancy classification.
/// `occupancy` stays `None` when the bucket's regression failed or the
/// bucket had no data.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OccupancyBucket {
    pub model_id: ModelId,
    pub hour_of_week: u32,
    pub occupancy: Option<bool>,
}

/// Mapping from `(model, hour-of-week)` buckets to occupancy states.
///
/// 168 rows per fitted model; `shape()` reports three logical columns
/// (model id, hour of week, occupancy).
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OccupancyLookup {
    rows: Vec<OccupancyBucket>,
}

impl OccupancyLookup {
    pub fn from_rows(rows: Vec<OccupancyBucket>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[OccupancyBucket] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), 3)
    }

    pub fn occupancy(&self, model_id: &ModelId, hour_of_week: u32) -> Option<bool> {
        self.rows
            .iter()
            .find(|bucket| bucket.hour_of_week == hour_of_week && bucket.model_id == *model_id)
            .and_then(|bucket| bucket.occupancy)
    }

    pub fn occupied_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|bucket| bucket.occupancy == Some(true))
            .count()
    }
}

/// Temperature-derived occupancy-state feature extractor.
///
/// Fits one small weighted regression of `meter_value` on
/// `temperature_mean` per `(model, hour-of-week)` bucket and thresholds the
/// bucket's weighted R² against `threshold`. A caller-supplied
/// `occupancy_lookup` kwarg skips the fitting entirely (reuse path).
pub struct OccupancyFeature;

impl FeatureExtractor for OccupancyFeature {
    fn name(&self) -> &'static str {
        "occupancy"
    }

    fn accepted_kwargs(&self) -> &'static [&'static str] {
        &["threshold", "occupancy_lookup"]
    }

    fn extract(
        &self,
        data: &TimeSeriesFrame,
        kwargs: &Kwargs,
    ) -> Result<FeatureOutput, CaltrackError> {
        let mut warnings = Vec::new();
        let n = data.len();
        let columns = data.column_names();

        let threshold = kwargs
            .get("threshold")
            .and_then(KwargValue::as_f64)
            .unwrap_or(DEFAULT_OCCUPANCY_THRESHOLD);
        let provided = kwargs.get("occupancy_lookup").and_then(KwargValue::as_lookup);

        let model_ids: Vec<ModelId> = match data.model_id_column() {
            Some(ids) => ids.to_vec(),
            None => {
                warnings.push(missing_model_id_warning(&columns));
                let months = data.months_present();
                let implicit = if months.is_empty() {
                    ModelId::all_months()
                } else {
                    ModelId::new(months)?
                };
                vec![implicit; n]
            }
        };
        let weights: Vec<f64> = match data.float_column("weight") {
            Some(weights) => weights.to_vec(),
            None => {
                warnings.push(missing_weight_warning(&columns));
                vec![1.0; n]
            }
        };

        let hours: Vec<u32> = data.index().iter().map(hour_of_week_label).collect();
        let mut groups: IndexMap<ModelId, Vec<usize>> = IndexMap::new();
        for (row, id) in model_ids.iter().enumerate() {
            groups.entry(id.clone()).or_default().push(row);
        }

        let lookup = match provided {
            Some(lookup) => lookup.clone(),
            None => fit_lookup(data, &groups, &hours, &weights, threshold, &mut warnings),
        };

        let by_bucket: HashMap<(&ModelId, u32), Option<bool>> = lookup
            .rows()
            .iter()
            .map(|bucket| ((&bucket.model_id, bucket.hour_of_week), bucket.occupancy))
            .collect();
        let occupancy: Vec<f64> = model_ids
            .iter()
            .zip(&hours)
            .map(|(id, &how)| match by_bucket.get(&(id, how)) {
                Some(Some(true)) => 1.0,
                Some(Some(false)) => 0.0,
                _ => f64::NAN,
            })
            .collect();

        let mut features = TimeSeriesFrame::new(data.index().to_vec());
        features.push_column("occupancy", Column::Float(occupancy))?;
        features.push_column("model_id", Column::ModelId(model_ids))?;

        let mut parameters = FeatureParameters::new();
        parameters.insert("occupancy_lookup".to_string(), KwargValue::Lookup(lookup));

        Ok(FeatureOutput {
            features,
            parameters,
            warnings,
        })
    }
}

fn fit_lookup(
    data: &TimeSeriesFrame,
    groups: &IndexMap<ModelId, Vec<usize>>,
    hours: &[u32],
    weights: &[f64],
    threshold: f64,
    warnings: &mut Vec<QualityWarning>,
) -> OccupancyLookup {
    let mut rows = Vec::with_capacity(groups.len() * HOURS_PER_WEEK);
    let inputs = match (
        data.float_column("meter_value"),
        data.float_column("temperature_mean"),
    ) {
        (Some(meter), Some(temp)) => Ok((meter, temp)),
        _ => {
            let missing: Vec<&str> = ["meter_value", "temperature_mean"]
                .into_iter()
                .filter(|column| data.float_column(column).is_none())
                .collect();
            Err(CaltrackError::invalid_input(format!(
                "Data does not include columns: {missing:?}"
            )))
        }
    };

    for (model_id, member_rows) in groups {
        let (meter, temp) = match &inputs {
            Ok(pair) => *pair,
            Err(err) => {
                // The whole model is undeterminable; one warning, all of
                // its buckets stay undetermined.
                warnings.push(failed_model_warning(model_id, None, &err.to_string()));
                for how in 1..=HOURS_PER_WEEK as u32 {
                    rows.push(OccupancyBucket {
                        model_id: model_id.clone(),
                        hour_of_week: how,
                        occupancy: None,
                    });
                }
                continue;
            }
        };

        let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); HOURS_PER_WEEK + 1];
        for &row in member_rows {
            buckets[hours[row] as usize].push(row);
        }

        for how in 1..=HOURS_PER_WEEK as u32 {
            let members = &buckets[how as usize];
            let occupancy = if members.is_empty() {
                None
            } else {
                match bucket_sensitivity(meter, temp, weights, members) {
                    Ok(score) => Some(score >= threshold),
                    Err(err) => {
                        warnings.push(failed_model_warning(model_id, Some(how), &err.to_string()));
                        None
                    }
                }
            };
            rows.push(OccupancyBucket {
                model_id: model_id.clone(),
                hour_of_week: how,
                occupancy,
            });
        }
    }

    OccupancyLookup::from_rows(rows)
}

/// Weighted R² of `meter_value ~ temperature_mean` over one bucket's rows.
fn bucket_sensitivity(
    meter: &[f64],
    temp: &[f64],
    weights: &[f64],
    rows: &[usize],
) -> Result<f64, CaltrackError> {
    let x = DMatrix::from_fn(rows.len(), 2, |r, c| {
        if c == 0 {
            1.0
        } else {
            temp[rows[r]]
        }
    });
    let y = DVector::from_iterator(rows.len(), rows.iter().map(|&r| meter[r]));
    let w = DVector::from_iterator(rows.len(), rows.iter().map(|&r| weights[r]));
    let names = ["Intercept".to_string(), "temperature_mean".to_string()];
    let model = wls::fit(&names, &x, &y, &w)?;
    Ok(model.r_squared)
}

fn failed_model_warning(
    model_id: &ModelId,
    hour_of_week: Option<u32>,
    traceback: &str,
) -> QualityWarning {
    let mut data = json!({
        "model_id": model_id.months(),
        "traceback": traceback,
    });
    if let Some(how) = hour_of_week {
        data["hour_of_week"] = json!(how);
    }
    QualityWarning::new(
        "caltrack_hourly.failed_occupancy_model",
        format!("Error encountered in weighted least squares fit for model id: {model_id}"),
        data,
    )
}
