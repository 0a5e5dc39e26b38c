// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use thiserror::Error;

/// Hard-failure channel for the CalTRACK hourly pipeline.
///
/// Only caller errors (bad arguments, violated preconditions) and numerical
/// fit failures are raised as errors; every data-quality condition travels
/// through [`crate::QualityWarning`] instead.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CaltrackError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    FailedFit(String),
}

impl CaltrackError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn failed_fit(message: impl Into<String>) -> Self {
        Self::FailedFit(message.into())
    }
}
