// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Shared leaf types for the CalTRACK hourly method: the hourly time-series
//! frame, model identifiers, structured data-quality warnings, and the
//! baseline window selector.

mod baseline;
mod error;
mod frame;
mod warnings;

pub use baseline::get_baseline_data;
pub use error::CaltrackError;
pub use frame::{days_in_month, Column, ModelId, TimeSeriesFrame};
pub use warnings::QualityWarning;
