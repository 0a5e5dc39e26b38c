// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! CalTRACK hourly model fitting: one weighted regression per model id.

use crate::design_matrix::get_design_matrix;
use crate::features::ExtractorSpec;
use crate::formula::Formula;
use crate::wls::{self, WlsModel};
use caltrack_core::{CaltrackError, Column, ModelId, QualityWarning, TimeSeriesFrame};
use indexmap::IndexMap;
use nalgebra::DVector;
use rayon::prelude::*;
use serde_json::json;
use std::fmt;

/// Consumption formula used when the caller does not supply one.
pub const DEFAULT_FORMULA: &str = "meter_value ~ C(hour_of_week) - 1";

/// Terminal state of one fitting attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelStatus {
    NoData,
    MissingFeatures,
    FailedModels,
    Success,
}

impl ModelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelStatus::NoData => "NO DATA",
            ModelStatus::MissingFeatures => "MISSING FEATURES",
            ModelStatus::FailedModels => "FAILED MODELS",
            ModelStatus::Success => "SUCCESS",
        }
    }
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fitted per-model regressions, keyed by model id in fit order, with
/// their coefficients collected into one table.
#[derive(Clone, Debug)]
pub struct HourlyModel {
    pub formula: Formula,
    pub model_object: IndexMap<ModelId, WlsModel>,
    pub model_params: CoefficientTable,
}

/// Coefficients of every successful model in one table.
///
/// Rows are model ids; columns are the union of coefficient names across
/// models, in first-appearance order. A model missing a column (a
/// categorical level it never observed) holds NaN there.
#[derive(Clone, Debug)]
pub struct CoefficientTable {
    names: Vec<String>,
    rows: Vec<(ModelId, Vec<f64>)>,
}

impl CoefficientTable {
    pub fn from_models(models: &IndexMap<ModelId, WlsModel>) -> Self {
        let mut names: Vec<String> = Vec::new();
        for model in models.values() {
            for name in &model.names {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        let rows = models
            .iter()
            .map(|(id, model)| {
                let values = names
                    .iter()
                    .map(|name| model.coefficient(name).unwrap_or(f64::NAN))
                    .collect();
                (id.clone(), values)
            })
            .collect();
        Self { names, rows }
    }

    /// `(models, coefficients)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.names.len())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn model_ids(&self) -> impl Iterator<Item = &ModelId> {
        self.rows.iter().map(|(id, _)| id)
    }

    pub fn value(&self, model_id: &ModelId, name: &str) -> Option<f64> {
        let col = self.names.iter().position(|n| n == name)?;
        self.rows
            .iter()
            .find(|(id, _)| id == model_id)
            .map(|(_, values)| values[col])
    }
}

/// Result of [`caltrack_hourly_method`].
#[derive(Clone, Debug)]
pub struct ModelFit {
    pub status: ModelStatus,
    pub method_name: &'static str,
    pub model: Option<HourlyModel>,
    pub warnings: Vec<QualityWarning>,
}

impl ModelFit {
    fn degenerate(status: ModelStatus, warnings: Vec<QualityWarning>) -> Self {
        Self {
            status,
            method_name: METHOD_NAME,
            model: None,
            warnings,
        }
    }
}

const METHOD_NAME: &str = "caltrack_hourly_method";

/// Fits the CalTRACK hourly consumption model.
///
/// When `preprocessors` is non-empty the design matrix is assembled first
/// and its warnings flow into the result. A missing `model_id` column means
/// a single implicit model over all twelve months; a missing `weight`
/// column means uniform weights. Individual model failures are recorded as
/// warnings, not errors; only invalid arguments (an unparseable formula)
/// fail hard.
pub fn caltrack_hourly_method(
    data: &TimeSeriesFrame,
    formula: Option<&str>,
    preprocessors: &[ExtractorSpec],
) -> Result<ModelFit, CaltrackError> {
    let formula = Formula::parse(formula.unwrap_or(DEFAULT_FORMULA))?;

    let mut warnings = Vec::new();
    let mut working = if preprocessors.is_empty() {
        data.clone()
    } else {
        let (frame, _parameters, assembly_warnings) = get_design_matrix(data, preprocessors)?;
        warnings.extend(assembly_warnings);
        frame
    };

    if working.is_empty() {
        warnings.push(QualityWarning::new(
            "caltrack_hourly.no_data",
            "No data available. Cannot fit model.",
            json!({}),
        ));
        return Ok(ModelFit::degenerate(ModelStatus::NoData, warnings));
    }

    let rows = working.len();
    if working.model_id_column().is_none() {
        working.push_column(
            "model_id",
            Column::ModelId(vec![ModelId::all_months(); rows]),
        )?;
    }
    if working.float_column("weight").is_none() {
        working.push_column("weight", Column::Float(vec![1.0; rows]))?;
    }

    let missing: Vec<String> = formula
        .required_columns()
        .into_iter()
        .filter(|column| working.float_column(column).is_none())
        .collect();
    if !missing.is_empty() {
        warnings.push(QualityWarning::new(
            "caltrack_hourly.missing_features",
            "Data is missing features specified in formula.",
            json!({
                "formula": formula.source(),
                "dataframe_columns": working.column_names(),
            }),
        ));
        return Ok(ModelFit::degenerate(ModelStatus::MissingFeatures, warnings));
    }

    let model_ids = working
        .model_id_column()
        .map(<[ModelId]>::to_vec)
        .unwrap_or_default();
    let mut groups: IndexMap<ModelId, Vec<usize>> = IndexMap::new();
    for (row, id) in model_ids.iter().enumerate() {
        groups.entry(id.clone()).or_default().push(row);
    }
    let groups: Vec<(ModelId, Vec<usize>)> = groups.into_iter().collect();
    let weights = working
        .float_column("weight")
        .map(<[f64]>::to_vec)
        .unwrap_or_default();

    tracing::info!(
        models = groups.len(),
        rows,
        formula = formula.source(),
        "fitting hourly consumption models"
    );
    let fits: Vec<(ModelId, Result<WlsModel, CaltrackError>)> = groups
        .par_iter()
        .map(|(id, member_rows)| {
            let fitted = formula.realize(&working, member_rows).and_then(|design| {
                let w = DVector::from_iterator(
                    member_rows.len(),
                    member_rows.iter().map(|&r| weights[r]),
                );
                wls::fit(&design.names, &design.x, &design.y, &w)
            });
            (id.clone(), fitted)
        })
        .collect();

    let mut model_object = IndexMap::new();
    let mut any_failed = false;
    for (id, fitted) in fits {
        match fitted {
            Ok(model) => {
                model_object.insert(id, model);
            }
            Err(err) => {
                any_failed = true;
                warnings.push(QualityWarning::new(
                    "caltrack_hourly.failed_consumption_model",
                    format!("Error encountered in weighted least squares fit for model id: {id}"),
                    json!({
                        "model_id": id.months(),
                        "traceback": err.to_string(),
                    }),
                ));
            }
        }
    }

    let status = if any_failed {
        ModelStatus::FailedModels
    } else {
        ModelStatus::Success
    };
    let model_params = CoefficientTable::from_models(&model_object);
    Ok(ModelFit {
        status,
        method_name: METHOD_NAME,
        model: Some(HourlyModel {
            formula,
            model_object,
            model_params,
        }),
        warnings,
    })
}
