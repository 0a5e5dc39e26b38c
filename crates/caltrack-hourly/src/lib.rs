// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! The CalTRACK hourly energy-consumption method.
//!
//! Pipeline: baseline window selection (from `caltrack-core`) →
//! [`segment_timeseries`] → [`get_design_matrix`] over registered
//! [`features::FeatureExtractor`]s → [`caltrack_hourly_method`], which fits
//! one weighted regression per `model_id` and aggregates the coefficients.
//!
//! Every stage returns its result together with a vector of
//! [`caltrack_core::QualityWarning`]s; hard errors are reserved for invalid
//! arguments and precondition violations.

mod design_matrix;
pub mod features;
mod fit;
mod formula;
mod segment;
pub mod wls;

pub use caltrack_core::{
    get_baseline_data, CaltrackError, Column, ModelId, QualityWarning, TimeSeriesFrame,
};
pub use design_matrix::{get_design_matrix, DesignMatrixParameters};
pub use fit::{
    caltrack_hourly_method, CoefficientTable, HourlyModel, ModelFit, ModelStatus, DEFAULT_FORMULA,
};
pub use formula::{Formula, RealizedDesign, Term};
pub use segment::{segment_timeseries, SegmentType, MIN_HOURLY_COVERAGE};
