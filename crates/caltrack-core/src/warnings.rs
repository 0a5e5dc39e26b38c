// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Structured, immutable record of a recoverable data-quality condition.
///
/// Warnings are collected alongside every stage's output and concatenated
/// end-to-end by the caller; the pipeline never aborts on one.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QualityWarning {
    /// Dotted name, e.g. `caltrack_hourly.missing_hours_of_week`.
    pub qualified_name: String,
    /// Human-readable description of the condition.
    pub description: String,
    /// Machine-readable payload (always a JSON map).
    pub data: serde_json::Value,
}

impl QualityWarning {
    pub fn new(
        qualified_name: impl Into<String>,
        description: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            description: description.into(),
            data,
        }
    }
}
