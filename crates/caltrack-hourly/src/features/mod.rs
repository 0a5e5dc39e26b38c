// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Pluggable feature extractors for the CalTRACK hourly design matrix.
//!
//! Extractors implement a uniform capability: segmented frame plus keyword
//! arguments in, feature frame plus parameter bundle plus warnings out. The
//! built-ins are resolvable by name through [`find`].

mod hour_of_week;
mod occupancy;

use caltrack_core::{CaltrackError, QualityWarning, TimeSeriesFrame};
use indexmap::IndexMap;
use serde_json::json;
use std::sync::Arc;

pub use hour_of_week::{hour_of_week_label, HourOfWeekFeature};
pub use occupancy::{
    OccupancyBucket, OccupancyFeature, OccupancyLookup, DEFAULT_OCCUPANCY_THRESHOLD,
};

/// A keyword-argument (or extractor parameter) value.
#[derive(Clone, Debug, PartialEq)]
pub enum KwargValue {
    Float(f64),
    Int(i64),
    Lookup(OccupancyLookup),
}

impl KwargValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            KwargValue::Float(value) => Some(*value),
            KwargValue::Int(value) => Some(*value as f64),
            KwargValue::Lookup(_) => None,
        }
    }

    pub fn as_lookup(&self) -> Option<&OccupancyLookup> {
        match self {
            KwargValue::Lookup(lookup) => Some(lookup),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            KwargValue::Float(value) => json!(value),
            KwargValue::Int(value) => json!(value),
            KwargValue::Lookup(lookup) => {
                serde_json::to_value(lookup).unwrap_or(serde_json::Value::Null)
            }
        }
    }
}

/// Ordered keyword arguments supplied to an extractor.
pub type Kwargs = IndexMap<String, KwargValue>;

/// Parameter bundle returned by an extractor; values are kwargs-compatible
/// so a returned parameter (e.g. an occupancy lookup) can be fed back in.
pub type FeatureParameters = IndexMap<String, KwargValue>;

/// Output of one extractor run.
#[derive(Clone, Debug)]
pub struct FeatureOutput {
    /// Feature columns; index must exactly match the input frame's index.
    pub features: TimeSeriesFrame,
    pub parameters: FeatureParameters,
    pub warnings: Vec<QualityWarning>,
}

/// Uniform feature-extractor capability.
pub trait FeatureExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Declared keyword-argument schema; anything else is rejected by the
    /// design-matrix assembler before invocation.
    fn accepted_kwargs(&self) -> &'static [&'static str];

    fn extract(
        &self,
        data: &TimeSeriesFrame,
        kwargs: &Kwargs,
    ) -> Result<FeatureOutput, CaltrackError>;
}

/// One entry of the design-matrix assembly list.
#[derive(Clone)]
pub struct ExtractorSpec {
    pub extractor: Arc<dyn FeatureExtractor>,
    pub kwargs: Kwargs,
}

impl ExtractorSpec {
    pub fn new(extractor: Arc<dyn FeatureExtractor>) -> Self {
        Self {
            extractor,
            kwargs: Kwargs::new(),
        }
    }

    pub fn with_kwargs(extractor: Arc<dyn FeatureExtractor>, kwargs: Kwargs) -> Self {
        Self { extractor, kwargs }
    }
}

/// Resolves a built-in extractor by registry name.
pub fn find(name: &str) -> Option<Arc<dyn FeatureExtractor>> {
    match name {
        "hour_of_week" => Some(Arc::new(HourOfWeekFeature)),
        "occupancy" => Some(Arc::new(OccupancyFeature)),
        _ => None,
    }
}

pub(crate) fn missing_model_id_warning(columns: &[String]) -> QualityWarning {
    QualityWarning::new(
        "caltrack_hourly.missing_model_id",
        "Data does not include a model_id column; treating all rows as a single segment.",
        json!({ "dataframe_columns": columns }),
    )
}

pub(crate) fn missing_weight_warning(columns: &[String]) -> QualityWarning {
    QualityWarning::new(
        "caltrack_hourly.missing_weight_column",
        "Data does not include a weight column; using a weight of 1 for every row.",
        json!({ "dataframe_columns": columns }),
    )
}

#[cfg(test)]
mod tests {
    use super::{find, KwargValue};

    #[test]
    fn registry_resolves_built_ins() {
        assert_eq!(find("hour_of_week").expect("registered").name(), "hour_of_week");
        assert_eq!(find("occupancy").expect("registered").name(), "occupancy");
        assert!(find("unknown_feature").is_none());
    }

    #[test]
    fn kwarg_numeric_coercion() {
        assert_eq!(KwargValue::Float(0.5).as_f64(), Some(0.5));
        assert_eq!(KwargValue::Int(2).as_f64(), Some(2.0));
        assert!(KwargValue::Float(0.5).as_lookup().is_none());
    }

    #[test]
    fn kwarg_json_rendering() {
        assert_eq!(KwargValue::Int(55).to_json(), serde_json::json!(55));
        assert_eq!(KwargValue::Float(0.25).to_json(), serde_json::json!(0.25));
    }
}
