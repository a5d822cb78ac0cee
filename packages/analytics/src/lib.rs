#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Saturation index calculator.
//!
//! Turns per-area demand and supply into raw ratios, ratios normalized
//! against the scope mean, and discrete [`SaturationLevel`]s. Pure and
//! synchronous; the merge pipeline feeds it one table per specialty.

pub mod saturation;

pub use clinic_map_analytics_models::{
    SaturationInput, SaturationLevel, SaturationRecord, SaturationSummary, SupplyMeasure,
};
pub use saturation::{classify, compute, mean_ratio, normalized_ratio, raw_ratio, summarize};
