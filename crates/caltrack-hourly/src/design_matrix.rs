// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Design-matrix assembly over a list of feature extractors.

use crate::features::{
    missing_model_id_warning, missing_weight_warning, ExtractorSpec, FeatureParameters,
};
use caltrack_core::{CaltrackError, QualityWarning, TimeSeriesFrame};
use indexmap::IndexMap;
use serde_json::json;

/// Parameter bundles returned by the extractors, keyed by extractor name.
pub type DesignMatrixParameters = IndexMap<String, FeatureParameters>;

/// Runs every extractor against `data` and merges the feature columns
/// into a single frame.
///
/// Assembly is all-or-nothing: an extractor invoked with kwargs outside
/// its declared schema, or returning a feature frame whose index does not
/// match `data`, aborts the whole assembly. The result is then an empty
/// frame and empty parameters, with the abort warning explaining why.
pub fn get_design_matrix(
    data: &TimeSeriesFrame,
    specs: &[ExtractorSpec],
) -> Result<(TimeSeriesFrame, DesignMatrixParameters, Vec<QualityWarning>), CaltrackError> {
    let mut warnings = Vec::new();
    let columns = data.column_names();
    if !data.has_column("model_id") {
        warnings.push(missing_model_id_warning(&columns));
    }
    if !data.has_column("weight") {
        warnings.push(missing_weight_warning(&columns));
    }

    let mut merged = data.clone();
    let mut parameters = DesignMatrixParameters::new();
    for spec in specs {
        let name = spec.extractor.name();
        let accepted = spec.extractor.accepted_kwargs();
        let rejected: Vec<&String> = spec
            .kwargs
            .keys()
            .filter(|key| !accepted.contains(&key.as_str()))
            .collect();
        if !rejected.is_empty() {
            let kwargs: serde_json::Map<String, serde_json::Value> = spec
                .kwargs
                .iter()
                .map(|(key, value)| (key.clone(), value.to_json()))
                .collect();
            warnings.push(QualityWarning::new(
                "caltrack_hourly.design_matrix_wrong_kwargs",
                format!("Wrong kwargs for function: {name}"),
                json!({
                    "function": name,
                    "kwargs": kwargs,
                }),
            ));
            return Ok((TimeSeriesFrame::empty(), DesignMatrixParameters::new(), warnings));
        }

        tracing::debug!(extractor = name, "running feature extractor");
        let output = spec.extractor.extract(data, &spec.kwargs)?;
        if output.features.index() != data.index() {
            warnings.push(QualityWarning::new(
                "caltrack_hourly.design_matrix_unmatched_index",
                format!("Function returned feature matrix with unmatched index: {name}"),
                json!({ "function": name }),
            ));
            return Ok((TimeSeriesFrame::empty(), DesignMatrixParameters::new(), warnings));
        }

        // Segmentation-column warnings were already issued above; drop the
        // extractor's own copies.
        for warning in output.warnings {
            let duplicate = matches!(
                warning.qualified_name.as_str(),
                "caltrack_hourly.missing_model_id" | "caltrack_hourly.missing_weight_column"
            ) && warnings.contains(&warning);
            if !duplicate {
                warnings.push(warning);
            }
        }
        if !output.parameters.is_empty() {
            parameters.insert(name.to_string(), output.parameters);
        }
        for (column, values) in output.features.into_columns() {
            if !merged.has_column(&column) {
                merged.push_column(column, values)?;
            }
        }
    }

    Ok((merged, parameters, warnings))
}
