#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Merge pipeline: population aggregation, clinic geocoding, key
//! reconciliation and the saturation join.
//!
//! [`Merger::run`] sequences one analysis request end to end and returns an
//! immutable [`ResultBundle`]. Every step is also usable on its own.

pub mod geocode;
pub mod orchestrator;
pub mod population;
pub mod reconcile;

#[cfg(test)]
mod fakes;

use clinic_map_source::SourceError;

pub use orchestrator::{
    AnalysisRequest, JoinedArea, Merger, ResultBundle, SpecialtyAnalysis, join, saturation_inputs,
};
pub use population::{AreaPopulation, PopulationOutcome, PopulationPeriod};
pub use reconcile::{ClinicSummary, Reconciliation};

/// Errors that can occur while running an analysis.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// A provider call failed outside a skip-on-failure loop.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// The scope code does not identify a known area.
    #[error("Unknown scope '{code}': {message}")]
    UnknownScope {
        /// The offending code.
        code: String,
        /// Why it was rejected.
        message: String,
    },
}
