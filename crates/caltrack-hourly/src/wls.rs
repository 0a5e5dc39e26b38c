// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Weighted least squares on dense design matrices.
//!
//! Solves the normal equations of the root-weight-scaled system with a
//! Cholesky factorization. Collinear designs fail the factorization and
//! surface as [`CaltrackError::FailedFit`]; malformed inputs are rejected
//! up front as [`CaltrackError::InvalidInput`].

use caltrack_core::CaltrackError;
use nalgebra::{Cholesky, DMatrix, DVector};

/// A fitted weighted regression.
#[derive(Clone, Debug)]
pub struct WlsModel {
    /// Column names, aligned with `coefficients`.
    pub names: Vec<String>,
    pub coefficients: Vec<f64>,
    /// Weighted residual sum of squares.
    pub rss: f64,
    /// Weighted total sum of squares about the weighted mean.
    pub tss: f64,
    /// `1 - rss / tss`; defined as 0 for a constant response.
    pub r_squared: f64,
    pub observations: usize,
}

impl WlsModel {
    /// Coefficient for a named column, if the column was in the design.
    pub fn coefficient(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|at| self.coefficients[at])
    }
}

/// Fits `y ~ x` under observation weights `weights`.
pub fn fit(
    names: &[String],
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    weights: &DVector<f64>,
) -> Result<WlsModel, CaltrackError> {
    let (rows, cols) = x.shape();
    if rows == 0 || cols == 0 {
        return Err(CaltrackError::invalid_input(
            "Design matrix must have at least one row and one column.",
        ));
    }
    if y.len() != rows || weights.len() != rows {
        return Err(CaltrackError::invalid_input(format!(
            "Shape mismatch: design has {rows} rows, response has {}, weights have {}.",
            y.len(),
            weights.len()
        )));
    }
    if names.len() != cols {
        return Err(CaltrackError::invalid_input(format!(
            "Design has {cols} columns but {} names were given.",
            names.len()
        )));
    }
    if x.iter().any(|v| !v.is_finite()) || y.iter().any(|v| !v.is_finite()) {
        return Err(CaltrackError::invalid_input(
            "Design matrix and response must be finite.",
        ));
    }
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(CaltrackError::invalid_input(
            "Weights must be finite and non-negative.",
        ));
    }

    // Scale rows by sqrt(w) so ordinary normal equations solve the
    // weighted problem.
    let root_w = weights.map(f64::sqrt);
    let mut xs = x.clone();
    for (row, rw) in root_w.iter().enumerate() {
        xs.row_mut(row).scale_mut(*rw);
    }
    let ys = y.component_mul(&root_w);

    let xtx = xs.transpose() * &xs;
    let xty = xs.transpose() * &ys;
    let cholesky = Cholesky::new(xtx).ok_or_else(|| {
        CaltrackError::failed_fit(
            "Normal equations are singular; the design matrix is rank deficient.",
        )
    })?;
    let beta = cholesky.solve(&xty);

    let residuals = &ys - &xs * &beta;
    let rss = residuals.norm_squared();

    let weight_total: f64 = weights.iter().sum();
    if weight_total <= 0.0 {
        return Err(CaltrackError::invalid_input(
            "At least one observation must carry positive weight.",
        ));
    }
    let y_bar = weights.dot(y) / weight_total;
    let tss: f64 = weights
        .iter()
        .zip(y.iter())
        .map(|(w, v)| w * (v - y_bar).powi(2))
        .sum();
    let r_squared = if tss <= f64::EPSILON {
        0.0
    } else {
        1.0 - rss / tss
    };

    Ok(WlsModel {
        names: names.to_vec(),
        coefficients: beta.iter().copied().collect(),
        rss,
        tss,
        r_squared,
        observations: rows,
    })
}
