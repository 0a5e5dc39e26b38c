// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::CaltrackError;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use indexmap::IndexMap;
use std::fmt;

/// Identifier of one regression model: the ordered tuple of calendar months
/// the model is responsible for.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct ModelId(Vec<u32>);

impl ModelId {
    /// Builds a model id from calendar months (each 1..=12, at least one).
    pub fn new(months: impl IntoIterator<Item = u32>) -> Result<Self, CaltrackError> {
        let months: Vec<u32> = months.into_iter().collect();
        if months.is_empty() {
            return Err(CaltrackError::invalid_input(
                "model id requires at least one month",
            ));
        }
        if let Some(bad) = months.iter().find(|m| !(1..=12).contains(*m)) {
            return Err(CaltrackError::invalid_input(format!(
                "model id months must be in 1..=12; got {bad}"
            )));
        }
        Ok(Self(months))
    }

    /// Single-month model id.
    pub fn single(month: u32) -> Result<Self, CaltrackError> {
        Self::new([month])
    }

    /// The full-calendar-year model id `(1, ..., 12)`.
    pub fn all_months() -> Self {
        Self((1..=12).collect())
    }

    pub fn months(&self) -> &[u32] {
        &self.0
    }

    pub fn contains(&self, month: u32) -> bool {
        self.0.contains(&month)
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, month) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{month}")?;
        }
        write!(f, ")")
    }
}

/// One named column of a [`TimeSeriesFrame`].
#[derive(Clone, Debug, PartialEq)]
pub enum Column {
    Float(Vec<f64>),
    ModelId(Vec<ModelId>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Float(values) => values.len(),
            Column::ModelId(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take(&self, rows: &[usize]) -> Column {
        match self {
            Column::Float(values) => Column::Float(rows.iter().map(|&r| values[r]).collect()),
            Column::ModelId(values) => {
                Column::ModelId(rows.iter().map(|&r| values[r].clone()).collect())
            }
        }
    }
}

/// Timestamp-indexed tabular frame with insertion-ordered named columns.
///
/// Before segmentation the index is a strictly increasing hourly sequence;
/// after segmentation the same hour may appear once per model it was
/// replicated into. Stages never mutate their input: each produces a new
/// frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeSeriesFrame {
    index: Vec<DateTime<Utc>>,
    columns: IndexMap<String, Column>,
}

impl TimeSeriesFrame {
    pub fn new(index: Vec<DateTime<Utc>>) -> Self {
        Self {
            index,
            columns: IndexMap::new(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.index.len(), self.columns.len())
    }

    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Adds a column; its length must match the index.
    pub fn push_column(
        &mut self,
        name: impl Into<String>,
        column: Column,
    ) -> Result<(), CaltrackError> {
        let name = name.into();
        if column.len() != self.index.len() {
            return Err(CaltrackError::invalid_input(format!(
                "column '{name}' length mismatch: got {}, expected {}",
                column.len(),
                self.index.len()
            )));
        }
        self.columns.insert(name, column);
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn float_column(&self, name: &str) -> Option<&[f64]> {
        match self.columns.get(name) {
            Some(Column::Float(values)) => Some(values),
            _ => None,
        }
    }

    /// The `model_id` column, when present and of model-id type.
    pub fn model_id_column(&self) -> Option<&[ModelId]> {
        match self.columns.get("model_id") {
            Some(Column::ModelId(values)) => Some(values),
            _ => None,
        }
    }

    /// New frame holding the given rows (duplicates allowed), all columns.
    pub fn take(&self, rows: &[usize]) -> TimeSeriesFrame {
        let index = rows.iter().map(|&r| self.index[r]).collect();
        let columns = self
            .columns
            .iter()
            .map(|(name, column)| (name.clone(), column.take(rows)))
            .collect();
        TimeSeriesFrame { index, columns }
    }

    /// Consumes the frame, yielding `(name, column)` in insertion order.
    pub fn into_columns(self) -> impl Iterator<Item = (String, Column)> {
        self.columns.into_iter()
    }

    /// True when the index is strictly increasing (pre-segmentation shape).
    pub fn has_strictly_increasing_index(&self) -> bool {
        self.index.windows(2).all(|pair| pair[0] < pair[1])
    }

    /// Distinct calendar months present in the index, ascending.
    pub fn months_present(&self) -> Vec<u32> {
        let mut seen = [false; 13];
        for ts in &self.index {
            seen[ts.month() as usize] = true;
        }
        (1..=12).filter(|&m| seen[m as usize]).collect()
    }
}

/// Number of days in a calendar month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let first = NaiveDate::from_ymd_opt(year, month, 1);
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    match (first, next) {
        (Some(first), Some(next)) => (next - first).num_days() as u32,
        _ => 0,
    }
}
