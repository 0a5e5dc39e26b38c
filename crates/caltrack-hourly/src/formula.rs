// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Minimal model-formula language.
//!
//! Grammar: `response ~ term (+ term)* (- 1)?` where a term is a column
//! name or `C(column)` for categorical expansion, and `- 1` removes the
//! intercept. This is the subset the CalTRACK hourly method needs; the
//! default consumption formula is `meter_value ~ C(hour_of_week) - 1`.

use caltrack_core::{CaltrackError, TimeSeriesFrame};
use nalgebra::{DMatrix, DVector};
use std::fmt;

/// One right-hand-side term.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Term {
    /// A numeric column used as-is.
    Column(String),
    /// `C(column)`: one indicator column per observed level.
    Categorical(String),
}

impl Term {
    pub fn column(&self) -> &str {
        match self {
            Term::Column(name) | Term::Categorical(name) => name,
        }
    }
}

/// A parsed model formula.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Formula {
    source: String,
    response: String,
    terms: Vec<Term>,
    intercept: bool,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Self, CaltrackError> {
        let (lhs, rhs) = source.split_once('~').ok_or_else(|| {
            CaltrackError::invalid_input(format!("Formula must contain '~': '{source}'"))
        })?;
        if rhs.contains('~') {
            return Err(CaltrackError::invalid_input(format!(
                "Formula must contain exactly one '~': '{source}'"
            )));
        }
        let response = parse_identifier(lhs, source)?;

        let mut terms = Vec::new();
        let mut intercept = true;
        for chunk in rhs.split('+') {
            let mut pieces = chunk.split('-');
            let head = pieces.next().unwrap_or("").trim();
            if !head.is_empty() {
                if head == "1" {
                    intercept = true;
                } else {
                    terms.push(parse_term(head, source)?);
                }
            }
            for removed in pieces {
                if removed.trim() != "1" {
                    return Err(CaltrackError::invalid_input(format!(
                        "Only '- 1' may be subtracted in a formula: '{source}'"
                    )));
                }
                intercept = false;
            }
        }
        if terms.is_empty() && !intercept {
            return Err(CaltrackError::invalid_input(format!(
                "Formula has no terms and no intercept: '{source}'"
            )));
        }

        Ok(Self {
            source: source.trim().to_string(),
            response,
            terms,
            intercept,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn has_intercept(&self) -> bool {
        self.intercept
    }

    /// Frame columns the formula reads: the response plus every term
    /// column, categorical wrappers unwrapped, in first-use order.
    pub fn required_columns(&self) -> Vec<String> {
        let mut columns = vec![self.response.clone()];
        for term in &self.terms {
            let name = term.column();
            if !columns.iter().any(|c| c == name) {
                columns.push(name.to_string());
            }
        }
        columns
    }

    /// Materializes the design matrix and response over a row subset.
    ///
    /// Categorical levels are the distinct values observed in `rows`,
    /// ascending; with an intercept the first level is dropped and the
    /// indicators are named `C(col)[T.level]`, without one every level is
    /// kept as `C(col)[level]`.
    pub fn realize(
        &self,
        frame: &TimeSeriesFrame,
        rows: &[usize],
    ) -> Result<RealizedDesign, CaltrackError> {
        if rows.is_empty() {
            return Err(CaltrackError::invalid_input(
                "Cannot realize a formula over zero rows.",
            ));
        }
        let response_values = float_column(frame, &self.response)?;
        let y = DVector::from_iterator(rows.len(), rows.iter().map(|&r| response_values[r]));

        let mut names = Vec::new();
        let mut columns: Vec<Vec<f64>> = Vec::new();
        if self.intercept {
            names.push("Intercept".to_string());
            columns.push(vec![1.0; rows.len()]);
        }
        for term in &self.terms {
            match term {
                Term::Column(name) => {
                    let values = float_column(frame, name)?;
                    names.push(name.clone());
                    columns.push(rows.iter().map(|&r| values[r]).collect());
                }
                Term::Categorical(name) => {
                    let values = float_column(frame, name)?;
                    let mut levels: Vec<f64> = rows.iter().map(|&r| values[r]).collect();
                    levels.sort_by(f64::total_cmp);
                    levels.dedup();
                    let kept = if self.intercept { &levels[1..] } else { &levels[..] };
                    for &level in kept {
                        let label = format_level(level);
                        names.push(if self.intercept {
                            format!("C({name})[T.{label}]")
                        } else {
                            format!("C({name})[{label}]")
                        });
                        columns.push(
                            rows.iter()
                                .map(|&r| if values[r] == level { 1.0 } else { 0.0 })
                                .collect(),
                        );
                    }
                }
            }
        }

        let x = DMatrix::from_fn(rows.len(), columns.len(), |r, c| columns[c][r]);
        Ok(RealizedDesign { names, x, y })
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// A formula applied to concrete rows: named design columns and response.
#[derive(Clone, Debug)]
pub struct RealizedDesign {
    pub names: Vec<String>,
    pub x: DMatrix<f64>,
    pub y: DVector<f64>,
}

fn float_column<'a>(frame: &'a TimeSeriesFrame, name: &str) -> Result<&'a [f64], CaltrackError> {
    frame.float_column(name).ok_or_else(|| {
        CaltrackError::invalid_input(format!("Data does not include a numeric '{name}' column."))
    })
}

fn parse_term(text: &str, source: &str) -> Result<Term, CaltrackError> {
    if let Some(inner) = text.strip_prefix("C(").and_then(|rest| rest.strip_suffix(')')) {
        Ok(Term::Categorical(parse_identifier(inner, source)?))
    } else {
        Ok(Term::Column(parse_identifier(text, source)?))
    }
}

fn parse_identifier(text: &str, source: &str) -> Result<String, CaltrackError> {
    let text = text.trim();
    let valid = !text.is_empty()
        && !text.starts_with(|c: char| c.is_ascii_digit())
        && text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(text.to_string())
    } else {
        Err(CaltrackError::invalid_input(format!(
            "Invalid column name '{text}' in formula '{source}'"
        )))
    }
}

/// Integral levels render without a trailing `.0`.
fn format_level(level: f64) -> String {
    if level.fract() == 0.0 && level.abs() < 1e15 {
        format!("{}", level as i64)
    } else {
        format!("{level}")
    }
}

#[cfg(test)]
mod tests {
    use super::{Formula, Term};
    use caltrack_core::{CaltrackError, Column, TimeSeriesFrame};
    use chrono::{DateTime, Duration, Utc};

    fn frame(hours: usize) -> TimeSeriesFrame {
        let start: DateTime<Utc> = "2017-01-02T00:00:00Z".parse().expect("timestamp");
        let index = (0..hours)
            .map(|h| start + Duration::hours(h as i64))
            .collect();
        let mut frame = TimeSeriesFrame::new(index);
        frame
            .push_column(
                "meter_value",
                Column::Float((0..hours).map(|h| h as f64).collect()),
            )
            .expect("column push should succeed");
        frame
            .push_column(
                "hour_of_week",
                Column::Float((0..hours).map(|h| (h % 3 + 1) as f64).collect()),
            )
            .expect("column push should succeed");
        frame
            .push_column(
                "temperature_mean",
                Column::Float((0..hours).map(|h| 40.0 + h as f64).collect()),
            )
            .expect("column push should succeed");
        frame
    }

    #[test]
    fn default_consumption_formula_parses() {
        let formula =
            Formula::parse("meter_value ~ C(hour_of_week) - 1").expect("formula should parse");
        assert_eq!(formula.response(), "meter_value");
        assert_eq!(
            formula.terms(),
            &[Term::Categorical("hour_of_week".to_string())]
        );
        assert!(!formula.has_intercept());
        assert_eq!(
            formula.required_columns(),
            vec!["meter_value".to_string(), "hour_of_week".to_string()]
        );
        assert_eq!(formula.to_string(), "meter_value ~ C(hour_of_week) - 1");
    }

    #[test]
    fn mixed_terms_keep_the_intercept_by_default() {
        let formula = Formula::parse("meter_value ~ C(hour_of_week) + temperature_mean")
            .expect("formula should parse");
        assert!(formula.has_intercept());
        assert_eq!(formula.terms().len(), 2);
        assert_eq!(formula.terms()[1].column(), "temperature_mean");
    }

    #[test]
    fn malformed_formulas_are_rejected() {
        for bad in [
            "meter_value C(hour_of_week)",
            "meter_value ~ hour ~ week",
            "meter_value ~ C(hour_of_week) - 2",
            "meter_value ~ - 1",
            "2fast ~ hour_of_week",
            "meter_value ~ C(hour_of_week",
        ] {
            let err = Formula::parse(bad).expect_err("parse should fail");
            assert!(matches!(err, CaltrackError::InvalidInput(_)), "{bad}");
        }
    }

    #[test]
    fn categorical_expansion_without_intercept_keeps_every_level() {
        let frame = frame(9);
        let formula =
            Formula::parse("meter_value ~ C(hour_of_week) - 1").expect("formula should parse");
        let rows: Vec<usize> = (0..9).collect();
        let design = formula.realize(&frame, &rows).expect("realize should succeed");

        assert_eq!(
            design.names,
            vec![
                "C(hour_of_week)[1]".to_string(),
                "C(hour_of_week)[2]".to_string(),
                "C(hour_of_week)[3]".to_string(),
            ]
        );
        assert_eq!(design.x.shape(), (9, 3));
        // Each row is a one-hot encoding of its label.
        for row in 0..9 {
            let hot: Vec<usize> = (0..3).filter(|&c| design.x[(row, c)] == 1.0).collect();
            assert_eq!(hot, vec![row % 3]);
        }
        assert_eq!(design.y[4], 4.0);
    }

    #[test]
    fn categorical_expansion_with_intercept_drops_the_first_level() {
        let frame = frame(9);
        let formula =
            Formula::parse("meter_value ~ C(hour_of_week)").expect("formula should parse");
        let rows: Vec<usize> = (0..9).collect();
        let design = formula.realize(&frame, &rows).expect("realize should succeed");

        assert_eq!(
            design.names,
            vec![
                "Intercept".to_string(),
                "C(hour_of_week)[T.2]".to_string(),
                "C(hour_of_week)[T.3]".to_string(),
            ]
        );
        assert!(design.x.column(0).iter().all(|&v| v == 1.0));
    }

    #[test]
    fn levels_come_from_the_selected_rows_only() {
        let frame = frame(9);
        let formula =
            Formula::parse("meter_value ~ C(hour_of_week) - 1").expect("formula should parse");
        // Rows 0, 3, 6 all carry label 1.
        let design = formula
            .realize(&frame, &[0, 3, 6])
            .expect("realize should succeed");
        assert_eq!(design.names, vec!["C(hour_of_week)[1]".to_string()]);
        assert_eq!(design.x.shape(), (3, 1));
    }

    #[test]
    fn missing_column_is_an_invalid_input() {
        let frame = frame(3);
        let formula = Formula::parse("meter_value ~ pressure").expect("formula should parse");
        let err = formula.realize(&frame, &[0, 1, 2]).expect_err("should fail");
        assert!(matches!(err, CaltrackError::InvalidInput(_)));
    }
}
