//! Wiring of the live providers into a [`Merger`].

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Datelike as _;
use clinic_map_cli_utils::{IndicatifProgress, MultiProgress};
use clinic_map_merge::Merger;
use clinic_map_source::hira::HiraClient;
use clinic_map_source::population::ResidentRegistryClient;
use clinic_map_source_models::YearMonth;
use clinic_map_spatial::BoundaryIndex;

/// Builds a merger over the resident registry, the clinic registry and the
/// boundary file at `boundaries`.
///
/// # Errors
///
/// Returns an error if the boundary file cannot be loaded or a provider
/// cannot be configured (e.g. the clinic registry API key is unset).
pub fn merger(
    boundaries: &Path,
    multi: &MultiProgress,
) -> Result<Merger, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let index = BoundaryIndex::load(boundaries)?;
    log::info!(
        "Loaded {} boundaries from {} in {:.1}s",
        index.len(),
        boundaries.display(),
        start.elapsed().as_secs_f64()
    );

    let population = ResidentRegistryClient::new()?;
    let clinics = HiraClient::new()?;

    Ok(Merger::new(Arc::new(population), Arc::new(clinics), Arc::new(index))
        .with_progress(IndicatifProgress::areas_bar(multi, "Fetching")))
}

/// The month before the current one; the registry publishes with a lag.
///
/// # Errors
///
/// Returns an error if the local date cannot be expressed as a period.
pub fn default_period() -> Result<YearMonth, Box<dyn std::error::Error>> {
    let today = chrono::Local::now().date_naive();
    Ok(YearMonth::new(today.year(), today.month())?.previous())
}
