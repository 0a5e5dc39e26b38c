// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use caltrack_core::{days_in_month, CaltrackError, Column, ModelId, QualityWarning, TimeSeriesFrame};
use chrono::Datelike;
use serde_json::json;
use std::str::FromStr;

/// Minimum fraction of a covered month's hours that must be present before
/// the model is flagged with an `insufficient_hourly_coverage` warning.
pub const MIN_HOURLY_COVERAGE: f64 = 0.9;

const FLANKING_MONTH_WEIGHT: f64 = 0.5;
const REQUIRED_COLUMNS: [&str; 2] = ["meter_value", "temperature_mean"];

/// Baseline segmentation policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentType {
    /// One model over every month present; weight always 1.
    Single,
    /// Twelve independent monthly models; weight always 1.
    OneMonth,
    /// One model per center month, borrowing both neighboring months at
    /// weight 1.
    ThreeMonth,
    /// Like `ThreeMonth`, but borrowed neighboring months are down-weighted.
    ThreeMonthWeighted,
}

impl SegmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentType::Single => "single",
            SegmentType::OneMonth => "one_month",
            SegmentType::ThreeMonth => "three_month",
            SegmentType::ThreeMonthWeighted => "three_month_weighted",
        }
    }
}

impl FromStr for SegmentType {
    type Err = CaltrackError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "single" => Ok(SegmentType::Single),
            "one_month" => Ok(SegmentType::OneMonth),
            "three_month" => Ok(SegmentType::ThreeMonth),
            "three_month_weighted" => Ok(SegmentType::ThreeMonthWeighted),
            other => Err(CaltrackError::invalid_input(format!(
                "Invalid segment type: '{other}'"
            ))),
        }
    }
}

fn wrap_prev(month: u32) -> u32 {
    if month == 1 { 12 } else { month - 1 }
}

fn wrap_next(month: u32) -> u32 {
    if month == 12 { 1 } else { month + 1 }
}

struct MonthIndex {
    /// Chronological row indices per calendar month (1..=12).
    rows: Vec<Vec<usize>>,
    /// Year of the first observation per month, for day counting.
    first_year: Vec<Option<i32>>,
}

impl MonthIndex {
    fn build(data: &TimeSeriesFrame) -> Self {
        let mut rows: Vec<Vec<usize>> = vec![Vec::new(); 13];
        let mut first_year: Vec<Option<i32>> = vec![None; 13];
        for (row, ts) in data.index().iter().enumerate() {
            let month = ts.month() as usize;
            if rows[month].is_empty() {
                first_year[month] = Some(ts.year());
            }
            rows[month].push(row);
        }
        Self { rows, first_year }
    }

    fn rows(&self, month: u32) -> &[usize] {
        &self.rows[month as usize]
    }

    fn has(&self, month: u32) -> bool {
        !self.rows[month as usize].is_empty()
    }

    /// Hours present divided by the hours in the month's calendar span.
    fn hourly_coverage(&self, month: u32) -> f64 {
        let present = self.rows[month as usize].len() as f64;
        let year = match self.first_year[month as usize] {
            Some(year) => year,
            None => return 0.0,
        };
        let expected = f64::from(days_in_month(year, month)) * 24.0;
        present / expected
    }
}

struct SegmentModel {
    model_id: ModelId,
    /// Covered months, in `[prev, center, next]` order where applicable.
    coverage: Vec<u32>,
    rows: Vec<usize>,
    weights: Vec<f64>,
}

/// Replicates baseline rows into one or more named models per the chosen
/// segmentation policy, attaching a per-row `weight` and `model_id`.
///
/// Hard failures: missing `meter_value`/`temperature_mean` columns. Months
/// entirely absent from the baseline drop their monthly models and are
/// reported once in a trailing `incomplete_calendar_year_coverage` warning;
/// covered months with fewer than [`MIN_HOURLY_COVERAGE`] of their expected
/// hours keep their models but emit `insufficient_hourly_coverage` warnings.
pub fn segment_timeseries(
    data: &TimeSeriesFrame,
    segment_type: SegmentType,
) -> Result<(TimeSeriesFrame, Vec<QualityWarning>), CaltrackError> {
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !data.has_column(column))
        .collect();
    if !missing.is_empty() {
        return Err(CaltrackError::invalid_input(format!(
            "Data does not include columns: {missing:?}"
        )));
    }

    let by_month = MonthIndex::build(data);
    let models = build_models(data, &by_month, segment_type)?;

    let mut warnings = Vec::new();
    for model in &models {
        for &month in &model.coverage {
            let coverage = by_month.hourly_coverage(month);
            if coverage < MIN_HOURLY_COVERAGE {
                warnings.push(QualityWarning::new(
                    "caltrack_hourly.insufficient_hourly_coverage",
                    format!(
                        "Data for this model does not meet the minimum hourly \
                         sufficiency criteria. Month {month}: hourly coverage {coverage:.4}"
                    ),
                    json!({
                        "model_id": model.model_id.months(),
                        "month": month,
                        "hourly_coverage": coverage,
                    }),
                ));
            }
        }
    }

    let missing_months: Vec<u32> = (1..=12).filter(|&m| !by_month.has(m)).collect();
    if !missing_months.is_empty() {
        warnings.push(QualityWarning::new(
            "caltrack_hourly.incomplete_calendar_year_coverage",
            format!(
                "Data does not cover full calendar year. {} Missing monthly models: {:?}",
                missing_months.len(),
                missing_months
            ),
            json!({
                "num_missing_months": missing_months.len(),
                "missing_months": missing_months,
            }),
        ));
    }

    let segmented = assemble_frame(data, &models)?;
    tracing::debug!(
        segment_type = segment_type.as_str(),
        models = models.len(),
        rows = segmented.len(),
        warnings = warnings.len(),
        "segmented baseline"
    );
    Ok((segmented, warnings))
}

fn build_models(
    data: &TimeSeriesFrame,
    by_month: &MonthIndex,
    segment_type: SegmentType,
) -> Result<Vec<SegmentModel>, CaltrackError> {
    let mut models = Vec::new();
    match segment_type {
        SegmentType::Single => {
            let present = data.months_present();
            if !present.is_empty() {
                let rows: Vec<usize> = (0..data.len()).collect();
                let weights = vec![1.0; rows.len()];
                models.push(SegmentModel {
                    model_id: ModelId::new(present.iter().copied())?,
                    coverage: present,
                    rows,
                    weights,
                });
            }
        }
        SegmentType::OneMonth => {
            for month in 1..=12 {
                if !by_month.has(month) {
                    continue;
                }
                let rows = by_month.rows(month).to_vec();
                let weights = vec![1.0; rows.len()];
                models.push(SegmentModel {
                    model_id: ModelId::single(month)?,
                    coverage: vec![month],
                    rows,
                    weights,
                });
            }
        }
        SegmentType::ThreeMonth | SegmentType::ThreeMonthWeighted => {
            let flank_weight = match segment_type {
                SegmentType::ThreeMonthWeighted => FLANKING_MONTH_WEIGHT,
                _ => 1.0,
            };
            for center in 1..=12 {
                if !by_month.has(center) {
                    continue;
                }
                let coverage: Vec<u32> = [wrap_prev(center), center, wrap_next(center)]
                    .into_iter()
                    .filter(|&month| by_month.has(month))
                    .collect();
                let mut rows: Vec<usize> = coverage
                    .iter()
                    .flat_map(|&month| by_month.rows(month).iter().copied())
                    .collect();
                rows.sort_unstable();
                let weights: Vec<f64> = rows
                    .iter()
                    .map(|&row| {
                        if data.index()[row].month() == center {
                            1.0
                        } else {
                            flank_weight
                        }
                    })
                    .collect();
                models.push(SegmentModel {
                    model_id: ModelId::single(center)?,
                    coverage,
                    rows,
                    weights,
                });
            }
        }
    }
    Ok(models)
}

fn assemble_frame(
    data: &TimeSeriesFrame,
    models: &[SegmentModel],
) -> Result<TimeSeriesFrame, CaltrackError> {
    let mut rows = Vec::new();
    let mut weights = Vec::new();
    let mut model_ids = Vec::new();
    for model in models {
        rows.extend_from_slice(&model.rows);
        weights.extend_from_slice(&model.weights);
        model_ids.extend(std::iter::repeat_n(model.model_id.clone(), model.rows.len()));
    }

    let mut segmented = data.take(&rows);
    segmented.push_column("weight", Column::Float(weights))?;
    segmented.push_column("model_id", Column::ModelId(model_ids))?;
    Ok(segmented)
}
