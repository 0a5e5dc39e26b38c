// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Full-pipeline test: baseline window selection, weighted three-month
//! segmentation, feature extraction, and per-model consumption fits over a
//! synthetic year of hourly data.

use caltrack_core::{get_baseline_data, Column, TimeSeriesFrame};
use caltrack_hourly::features::{find, ExtractorSpec, KwargValue};
use caltrack_hourly::{
    caltrack_hourly_method, get_design_matrix, segment_timeseries, ModelStatus, SegmentType,
};
use chrono::{DateTime, Duration, Utc};
use std::f64::consts::TAU;

/// A year of hourly data with a seasonal temperature cycle and a load that
/// follows the hour of week plus a mild temperature response.
fn synthetic_year() -> TimeSeriesFrame {
    let start: DateTime<Utc> = "2017-01-01T00:00:00Z".parse().expect("timestamp");
    let hours = 365 * 24 + 1;
    let index: Vec<DateTime<Utc>> = (0..hours)
        .map(|h| start + Duration::hours(h as i64))
        .collect();

    let temperature: Vec<f64> = (0..hours)
        .map(|h| {
            let seasonal = 12.0 * (TAU * h as f64 / 8760.0 - TAU / 4.0).sin();
            let diurnal = 6.0 * (TAU * (h % 24) as f64 / 24.0).sin();
            55.0 + seasonal + diurnal
        })
        .collect();
    let meter: Vec<f64> = index
        .iter()
        .zip(&temperature)
        .map(|(ts, &temp)| {
            let hour = caltrack_hourly::features::hour_of_week_label(ts);
            4.0 + 0.02 * f64::from(hour) + 0.05 * (temp - 55.0).abs()
        })
        .collect();

    let mut frame = TimeSeriesFrame::new(index);
    frame
        .push_column("meter_value", Column::Float(meter))
        .expect("column push should succeed");
    frame
        .push_column("temperature_mean", Column::Float(temperature))
        .expect("column push should succeed");
    frame
        .push_column(
            "n_days_dropped",
            Column::Float(vec![0.0; hours]),
        )
        .expect("column push should succeed");
    frame
        .push_column("n_days_kept", Column::Float(vec![1.0; hours]))
        .expect("column push should succeed");
    frame
}

fn extractor_specs() -> Vec<ExtractorSpec> {
    vec![
        ExtractorSpec::new(find("hour_of_week").expect("registered extractor")),
        ExtractorSpec::new(find("occupancy").expect("registered extractor")),
    ]
}

#[test]
fn full_year_pipeline_is_clean_end_to_end() {
    let data = synthetic_year();
    let end = *data.index().last().expect("non-empty index");

    let (baseline, baseline_warnings) =
        get_baseline_data(&data, end, 365).expect("baseline selection should succeed");
    assert!(baseline_warnings.is_empty());
    assert_eq!(baseline.shape(), (8761, 4));

    let (segmented, segment_warnings) =
        segment_timeseries(&baseline, SegmentType::ThreeMonthWeighted)
            .expect("segmentation should succeed");
    assert!(segment_warnings.is_empty());
    assert_eq!(segmented.shape(), (8761 * 3, 6));

    let (matrix, parameters, matrix_warnings) =
        get_design_matrix(&segmented, &extractor_specs()).expect("assembly should succeed");
    assert!(matrix_warnings.is_empty());
    assert_eq!(matrix.shape().1, 8);
    assert_eq!(matrix.len(), segmented.len());
    let lookup = parameters["occupancy"]
        .get("occupancy_lookup")
        .and_then(KwargValue::as_lookup)
        .expect("occupancy lookup present");
    assert_eq!(lookup.shape(), (168 * 12, 3));

    let fit = caltrack_hourly_method(&segmented, None, &extractor_specs())
        .expect("method should not hard-fail");
    assert_eq!(fit.status, ModelStatus::Success);
    assert!(fit.warnings.is_empty());

    let model = fit.model.expect("model present");
    assert_eq!(model.model_object.len(), 12);
    for wls in model.model_object.values() {
        assert_eq!(wls.coefficients.len(), 168);
        assert!(wls.coefficients.iter().all(|c| c.is_finite()));
    }
    assert_eq!(model.model_params.shape(), (12, 168));
}

#[test]
fn truncated_year_pipeline_accumulates_stage_warnings() {
    let data = synthetic_year();
    let end = *data.index().last().expect("non-empty index");

    // Only the last 90 days make it into the baseline.
    let (baseline, baseline_warnings) =
        get_baseline_data(&data, end, 90).expect("baseline selection should succeed");
    assert!(baseline_warnings.is_empty());
    assert_eq!(baseline.len(), 90 * 24 + 1);

    let (segmented, segment_warnings) =
        segment_timeseries(&baseline, SegmentType::ThreeMonthWeighted)
            .expect("segmentation should succeed");
    let last = segment_warnings.last().expect("missing-month warning expected");
    assert_eq!(
        last.qualified_name,
        "caltrack_hourly.incomplete_calendar_year_coverage"
    );
    assert_eq!(last.data["num_missing_months"], 8);

    // The surviving four monthly models still fit.
    let fit = caltrack_hourly_method(&segmented, None, &extractor_specs())
        .expect("method should not hard-fail");
    assert_eq!(fit.status, ModelStatus::Success);
    assert!(fit.warnings.is_empty());
    assert_eq!(fit.model.expect("model present").model_object.len(), 4);
}
