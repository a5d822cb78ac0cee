//! Population aggregation at the requested granularity, with fallback to
//! the previous month when the requested one has no data.

use std::collections::BTreeMap;

use clinic_map_geography_models::codes::PROVINCES;
use clinic_map_geography_models::{
    AreaLevel, Granularity, MatchKey, ObservedSubAreas, match_key, normalize_code,
};
use clinic_map_source::progress::ProgressCallback;
use clinic_map_source::{PopulationProvider, SourceError};
use clinic_map_source_models::{PopulationCounts, PopulationRecord, SubArea, YearMonth};
use serde::{Deserialize, Serialize};

use crate::MergeError;

/// Population of one area at the analysis granularity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaPopulation {
    /// Join key.
    pub match_key: MatchKey,
    /// Display name.
    pub name: String,
    /// Registry code of the first area folded into this row.
    pub area_code: String,
    /// Summed counts.
    pub counts: PopulationCounts,
}

/// Which period the population figures actually come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "period", rename_all = "kebab-case")]
pub enum PopulationPeriod {
    /// The requested month had data.
    Requested(YearMonth),
    /// The requested month was empty; the month before it was used.
    PreviousMonth(YearMonth),
    /// Neither month had data.
    Empty,
}

impl PopulationPeriod {
    /// The month used, if any.
    #[must_use]
    pub const fn period(self) -> Option<YearMonth> {
        match self {
            Self::Requested(p) | Self::PreviousMonth(p) => Some(p),
            Self::Empty => None,
        }
    }
}

/// Aggregated population plus the period it was taken from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationOutcome {
    /// Period actually used.
    pub period: PopulationPeriod,
    /// One row per match key.
    pub areas: Vec<AreaPopulation>,
}

/// What to aggregate.
#[derive(Debug, Clone, Copy)]
pub enum PopulationTarget<'a> {
    /// All provinces, one row each.
    National,
    /// One province, one row per city or district after uplift.
    Province {
        /// Sub-areas listed for the province.
        sub_areas: &'a [SubArea],
        /// The same listing as an uplift lookup.
        observed: &'a ObservedSubAreas,
    },
    /// One city or district, one row per neighborhood.
    City {
        /// 10-digit code of the city or district.
        code: &'a str,
    },
}

impl PopulationTarget<'_> {
    /// The granularity this target aggregates to.
    #[must_use]
    pub const fn granularity(&self) -> Granularity {
        match self {
            Self::National => Granularity::National,
            Self::Province { .. } => Granularity::Province,
            Self::City { .. } => Granularity::City,
        }
    }
}

/// Fetches population rows and folds them into one row per match key.
pub struct PopulationAggregator<'a> {
    provider: &'a dyn PopulationProvider,
    progress: &'a dyn ProgressCallback,
}

impl<'a> PopulationAggregator<'a> {
    /// Creates an aggregator over `provider`.
    #[must_use]
    pub fn new(provider: &'a dyn PopulationProvider, progress: &'a dyn ProgressCallback) -> Self {
        Self { provider, progress }
    }

    /// Aggregates `target` for `period`, retrying once with the previous
    /// month if `period` yields nothing.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::Source`] if a single-city fetch fails. Failures
    /// inside the per-province and per-sub-area loops are logged and
    /// skipped.
    pub async fn aggregate(
        &self,
        target: PopulationTarget<'_>,
        period: YearMonth,
    ) -> Result<PopulationOutcome, MergeError> {
        let areas = self.fetch(target, period).await?;
        if !areas.is_empty() {
            return Ok(PopulationOutcome {
                period: PopulationPeriod::Requested(period),
                areas,
            });
        }

        let previous = period.previous();
        log::warn!("No population data for {period}, falling back to {previous}");
        let areas = self.fetch(target, previous).await?;
        if areas.is_empty() {
            log::warn!("No population data for {previous} either");
            return Ok(PopulationOutcome {
                period: PopulationPeriod::Empty,
                areas,
            });
        }

        Ok(PopulationOutcome {
            period: PopulationPeriod::PreviousMonth(previous),
            areas,
        })
    }

    async fn fetch(
        &self,
        target: PopulationTarget<'_>,
        period: YearMonth,
    ) -> Result<Vec<AreaPopulation>, MergeError> {
        match target {
            PopulationTarget::National => Ok(self.national(period).await),
            PopulationTarget::Province {
                sub_areas,
                observed,
            } => Ok(self.province(sub_areas, observed, period).await),
            PopulationTarget::City { code } => self.city(code, period).await,
        }
    }

    async fn national(&self, period: YearMonth) -> Vec<AreaPopulation> {
        self.progress.set_total(PROVINCES.len() as u64);
        let mut areas = Vec::new();

        for province in PROVINCES {
            self.progress.set_message(province.name.to_string());
            let rows = skip_on_failure(
                province.name,
                self.provider
                    .population(province.population_code, period, AreaLevel::City)
                    .await,
            );
            self.progress.inc(1);

            if rows.is_empty() {
                continue;
            }
            areas.push(AreaPopulation {
                match_key: MatchKey::new(province.prefix()),
                name: province.name.to_string(),
                area_code: province.population_code.to_string(),
                counts: rows.iter().map(|r| r.counts).sum(),
            });
        }

        self.progress
            .set_message(format!("{} provinces with population data", areas.len()));
        areas
    }

    async fn province(
        &self,
        sub_areas: &[SubArea],
        observed: &ObservedSubAreas,
        period: YearMonth,
    ) -> Vec<AreaPopulation> {
        self.progress.set_total(sub_areas.len() as u64);
        let mut summed = Vec::new();

        for sub_area in sub_areas {
            self.progress.set_message(sub_area.name.clone());
            let rows = skip_on_failure(
                &sub_area.name,
                self.provider
                    .population(&sub_area.code, period, AreaLevel::Neighborhood)
                    .await,
            );
            self.progress.inc(1);

            if rows.is_empty() {
                continue;
            }

            let code = normalize_code(&sub_area.code);
            let Some(key) = observed.district_key(&code) else {
                log::debug!("Sub-area code {} too short for a district key", sub_area.code);
                continue;
            };
            let name = observed
                .city_name(key.as_str())
                .filter(|_| observed.is_uplifted(&code))
                .map_or_else(|| label(sub_area, &rows), ToString::to_string);

            summed.push(AreaPopulation {
                match_key: key,
                name,
                area_code: sub_area.code.clone(),
                counts: rows.iter().map(|r| r.counts).sum(),
            });
        }

        self.progress
            .set_message(format!("{} sub-areas with population data", summed.len()));
        merge_by_key(summed)
    }

    async fn city(&self, code: &str, period: YearMonth) -> Result<Vec<AreaPopulation>, MergeError> {
        let rows = self
            .provider
            .population(code, period, AreaLevel::Neighborhood)
            .await?;
        let observed = ObservedSubAreas::new();

        Ok(merge_by_key(
            rows.into_iter()
                .filter_map(|row| {
                    let key = match_key(&row.area_code, Granularity::City, &observed)?;
                    Some(AreaPopulation {
                        match_key: key,
                        name: row.name,
                        area_code: row.area_code,
                        counts: row.counts,
                    })
                })
                .collect(),
        ))
    }
}

/// Logs a failed fetch and treats it as an empty result.
fn skip_on_failure(
    area: &str,
    result: Result<Vec<PopulationRecord>, SourceError>,
) -> Vec<PopulationRecord> {
    result.unwrap_or_else(|e| {
        log::warn!("Skipping {area}: {e}");
        Vec::new()
    })
}

/// Label for a sub-area row: its own name, else the reported province name.
fn label(sub_area: &SubArea, rows: &[PopulationRecord]) -> String {
    if !sub_area.name.is_empty() {
        return sub_area.name.clone();
    }
    rows.first()
        .map(|r| r.province_name.clone())
        .unwrap_or_default()
}

/// Re-sums rows that share a match key, keeping the first-seen name and
/// code and the first-seen order.
#[must_use]
pub fn merge_by_key(rows: Vec<AreaPopulation>) -> Vec<AreaPopulation> {
    let mut positions: BTreeMap<MatchKey, usize> = BTreeMap::new();
    let mut merged: Vec<AreaPopulation> = Vec::with_capacity(rows.len());

    for row in rows {
        if let Some(&i) = positions.get(&row.match_key) {
            merged[i].counts += row.counts;
        } else {
            positions.insert(row.match_key.clone(), merged.len());
            merged.push(row);
        }
    }

    merged
}
