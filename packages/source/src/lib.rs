#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Population and clinic registry providers.
//!
//! The merge pipeline talks to the registries only through the
//! [`PopulationProvider`] and [`ClinicProvider`] traits. [`population`] and
//! [`hira`] are the HTTP implementations; their endpoints come from the
//! embedded [`registry`].

pub mod hira;
pub mod html;
pub mod population;
pub mod progress;
pub mod registry;
pub mod retry;

#[cfg(test)]
mod test_server;

use async_trait::async_trait;
use clinic_map_geography_models::AreaLevel;
use clinic_map_source_models::{ClinicQuery, ClinicRecord, PopulationRecord, SubArea, YearMonth};

/// Errors that can occur during provider operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The provider answered but reported a failure.
    #[error("Provider error [{code}]: {message}")]
    Provider {
        /// Provider result code or HTTP status.
        code: String,
        /// Provider message.
        message: String,
    },

    /// A response could not be interpreted.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of what went wrong.
        message: String,
    },

    /// Provider configuration is missing or invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },
}

/// Source of population statistics.
///
/// An empty result means the registry has no data for that period; it is
/// not an error.
#[async_trait]
pub trait PopulationProvider: Send + Sync {
    /// Lists the sub-areas (cities, counties, districts) of a province.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the registry rejects the request or the
    /// response cannot be parsed.
    async fn sub_areas(&self, province_code: &str) -> Result<Vec<SubArea>, SourceError>;

    /// Fetches the rows at `level` under `area_code` for `period`.
    ///
    /// At [`AreaLevel::City`] `area_code` is a province code and one row is
    /// returned per city/district; at [`AreaLevel::Neighborhood`] it is a
    /// sub-area code and one row is returned per neighborhood.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the registry rejects the request or the
    /// response cannot be parsed.
    async fn population(
        &self,
        area_code: &str,
        period: YearMonth,
        level: AreaLevel,
    ) -> Result<Vec<PopulationRecord>, SourceError>;
}

/// Source of clinic registry rows.
#[async_trait]
pub trait ClinicProvider: Send + Sync {
    /// Fetches one row per (facility, specialty) matching the query.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the registry reports a failure or the
    /// response cannot be parsed.
    async fn clinics(&self, query: &ClinicQuery) -> Result<Vec<ClinicRecord>, SourceError>;
}
