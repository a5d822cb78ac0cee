//! One analysis request, end to end.

use std::collections::BTreeMap;
use std::sync::Arc;

use clinic_map_analytics::saturation;
use clinic_map_analytics_models::{
    SaturationInput, SaturationRecord, SaturationSummary, SupplyMeasure,
};
use clinic_map_geography_models::codes::{
    PROVINCES, Province, province_by_clinic_code, province_by_code, province_by_name,
};
use clinic_map_geography_models::{
    DISTRICT_PREFIX_LEN, Granularity, MatchKey, ObservedSubAreas, normalize_code,
};
use clinic_map_source::progress::{ProgressCallback, null_progress};
use clinic_map_source::{ClinicProvider, PopulationProvider};
use clinic_map_source_models::specialty::{
    DEFAULT_FACILITY_CLASSES, DEFAULT_SPECIALTIES, specialty_name,
};
use clinic_map_source_models::{
    ClinicQuery, ClinicRecord, Demographic, PopulationCounts, SubArea, YearMonth,
};
use clinic_map_spatial::BoundaryIndex;
use serde::Serialize;

use crate::MergeError;
use crate::geocode::geocode;
use crate::population::{AreaPopulation, PopulationAggregator, PopulationPeriod, PopulationTarget};
use crate::reconcile::{ClinicSummary, reconcile};

/// Parameters of one analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    /// Granularity of the result areas.
    pub granularity: Granularity,
    /// Province code for [`Granularity::Province`], city or district code
    /// for [`Granularity::City`]. Ignored nationally.
    pub scope_code: Option<String>,
    /// Requested population period.
    pub period: YearMonth,
    /// Specialties to analyze, one saturation table each.
    pub specialty_codes: Vec<String>,
    /// Facility classes to count. Empty counts every class.
    pub facility_classes: Vec<String>,
    /// Demand column.
    pub demographic: Demographic,
    /// Supply column.
    pub supply: SupplyMeasure,
}

impl AnalysisRequest {
    /// A request with the default specialties, facility classes and
    /// columns.
    #[must_use]
    pub fn new(granularity: Granularity, scope_code: Option<String>, period: YearMonth) -> Self {
        Self {
            granularity,
            scope_code,
            period,
            specialty_codes: DEFAULT_SPECIALTIES.iter().map(ToString::to_string).collect(),
            facility_classes: DEFAULT_FACILITY_CLASSES
                .iter()
                .map(ToString::to_string)
                .collect(),
            demographic: Demographic::default(),
            supply: SupplyMeasure::default(),
        }
    }
}

/// A population row with its supply for one specialty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedArea {
    /// Area key.
    pub match_key: MatchKey,
    /// Display name.
    pub name: String,
    /// Population counts.
    pub counts: PopulationCounts,
    /// Clinics of the specialty in the area; zero when none matched.
    pub clinic_count: u64,
    /// Specialists of the specialty in the area; zero when none matched.
    pub specialist_count: u64,
}

/// Saturation table and headline figures for one specialty.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialtyAnalysis {
    /// Specialty code.
    pub specialty_code: String,
    /// Specialty name.
    pub specialty_name: String,
    /// One record per population area.
    pub records: Vec<SaturationRecord>,
    /// Summary of `records`.
    pub summary: SaturationSummary,
}

/// Everything one analysis produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultBundle {
    /// Granularity of the areas.
    pub granularity: Granularity,
    /// Scope the request resolved to, if any.
    pub scope_code: Option<String>,
    /// Population per match key.
    pub population: Vec<AreaPopulation>,
    /// Period the population figures come from.
    pub period: PopulationPeriod,
    /// Geocoded clinic rows.
    pub clinics: Vec<ClinicRecord>,
    /// Supply per match key and specialty.
    pub clinic_summary: Vec<ClinicSummary>,
    /// Saturation per specialty code.
    pub saturation: BTreeMap<String, SpecialtyAnalysis>,
    /// Sub-areas listed for the province scope; empty otherwise.
    pub observed: ObservedSubAreas,
    /// Clinic rows that could not be placed on any key.
    pub dropped_clinics: usize,
}

/// Resolved geographic scope of a request.
#[derive(Debug, Clone)]
enum Scope {
    National,
    Province(&'static Province),
    City {
        province: &'static Province,
        code: String,
    },
}

/// Runs analyses against a pair of providers and a boundary index.
pub struct Merger {
    population: Arc<dyn PopulationProvider>,
    clinics: Arc<dyn ClinicProvider>,
    boundaries: Arc<BoundaryIndex>,
    progress: Arc<dyn ProgressCallback>,
}

impl Merger {
    /// Creates a merger over the two registries and a loaded boundary
    /// index. Progress is discarded until [`Self::with_progress`] is set.
    #[must_use]
    pub fn new(
        population: Arc<dyn PopulationProvider>,
        clinics: Arc<dyn ClinicProvider>,
        boundaries: Arc<BoundaryIndex>,
    ) -> Self {
        Self {
            population,
            clinics,
            boundaries,
            progress: null_progress(),
        }
    }

    /// Reports the per-area fetch loops to `progress`. The loops share one
    /// indicator; it is finished once, when [`Self::run`] or
    /// [`Self::dissolve_keys`] returns.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Lists the sub-areas of a province and builds the uplift lookup from
    /// them.
    ///
    /// # Errors
    ///
    /// * [`MergeError::UnknownScope`] if `province_code` is not a province
    /// * [`MergeError::Source`] if the listing fails
    pub async fn observed_sub_areas(
        &self,
        province_code: &str,
    ) -> Result<(Vec<SubArea>, ObservedSubAreas), MergeError> {
        let province = province_scope(province_code)?;
        self.list_sub_areas(province).await
    }

    async fn list_sub_areas(
        &self,
        province: &Province,
    ) -> Result<(Vec<SubArea>, ObservedSubAreas), MergeError> {
        let sub_areas = self.population.sub_areas(province.population_code).await?;
        let observed = ObservedSubAreas::from_sub_areas(
            sub_areas.iter().map(|s| (s.code.as_str(), s.name.as_str())),
        );
        log::info!(
            "{} lists {} sub-areas ({} distinct district codes)",
            province.name,
            sub_areas.len(),
            observed.len()
        );
        log::debug!(
            "{} district codes: {}",
            province.name,
            observed.codes().collect::<Vec<_>>().join(" ")
        );
        Ok((sub_areas, observed))
    }

    /// Maps boundary codes within the scope to their match keys, using the
    /// same uplift rules as the analysis.
    ///
    /// # Errors
    ///
    /// * [`MergeError::UnknownScope`] if the scope code is invalid for the
    ///   granularity
    /// * [`MergeError::Source`] if the province sub-area listing fails
    pub async fn dissolve_keys(
        &self,
        granularity: Granularity,
        scope_code: Option<&str>,
    ) -> Result<BTreeMap<String, MatchKey>, MergeError> {
        let result = self.scoped_dissolve_keys(granularity, scope_code).await;
        self.progress.finish(match &result {
            Ok(keys) => format!("{} boundary codes", keys.len()),
            Err(e) => format!("failed: {e}"),
        });
        result
    }

    async fn scoped_dissolve_keys(
        &self,
        granularity: Granularity,
        scope_code: Option<&str>,
    ) -> Result<BTreeMap<String, MatchKey>, MergeError> {
        let scope = resolve_scope(granularity, scope_code)?;
        let (observed, prefix) = match &scope {
            Scope::National => (ObservedSubAreas::new(), None),
            Scope::Province(province) => {
                let (_, observed) = self.list_sub_areas(province).await?;
                (observed, Some(province.prefix().to_string()))
            }
            Scope::City { code, .. } => (ObservedSubAreas::new(), Some(city_prefix(code))),
        };

        Ok(self
            .boundaries
            .dissolve_keys(granularity, &observed, prefix.as_deref()))
    }

    /// Runs one analysis.
    ///
    /// # Errors
    ///
    /// * [`MergeError::UnknownScope`] if the scope code is invalid for the
    ///   granularity
    /// * [`MergeError::Source`] if a fetch outside the per-area loops fails
    pub async fn run(&self, request: &AnalysisRequest) -> Result<ResultBundle, MergeError> {
        let result = self.analyze(request).await;
        self.progress.finish(match &result {
            Ok(bundle) => format!(
                "{} areas, {} clinic rows",
                bundle.population.len(),
                bundle.clinics.len()
            ),
            Err(e) => format!("failed: {e}"),
        });
        result
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<ResultBundle, MergeError> {
        let scope = resolve_scope(request.granularity, request.scope_code.as_deref())?;
        log::info!(
            "Analyzing {} scope {} for {}",
            request.granularity,
            request.scope_code.as_deref().unwrap_or("-"),
            request.period
        );

        let (sub_areas, observed) = match &scope {
            Scope::Province(province) => self.list_sub_areas(province).await?,
            Scope::National | Scope::City { .. } => (Vec::new(), ObservedSubAreas::new()),
        };

        let target = match &scope {
            Scope::National => PopulationTarget::National,
            Scope::Province(_) => PopulationTarget::Province {
                sub_areas: &sub_areas,
                observed: &observed,
            },
            Scope::City { code, .. } => PopulationTarget::City {
                code: code.as_str(),
            },
        };
        let population = PopulationAggregator::new(self.population.as_ref(), self.progress.as_ref())
            .aggregate(target, request.period)
            .await?;
        log::info!(
            "Population: {} areas ({:?})",
            population.areas.len(),
            population.period
        );

        let clinics = geocode(self.fetch_clinics(&scope, request).await?, &self.boundaries);
        let reconciliation = reconcile(&clinics, request.granularity, &observed);
        log::info!(
            "Clinics: {} rows, {} summary groups, {} dropped",
            clinics.len(),
            reconciliation.summaries.len(),
            reconciliation.dropped
        );

        let saturation = request
            .specialty_codes
            .iter()
            .map(|code| {
                let joined = join(&population.areas, &reconciliation.summaries, code);
                let inputs = saturation_inputs(&joined, request.demographic, request.supply);
                let records = saturation::compute(&inputs, code);
                let summary = saturation::summarize(&records);
                let analysis = SpecialtyAnalysis {
                    specialty_code: code.clone(),
                    specialty_name: specialty_name(code).to_string(),
                    records,
                    summary,
                };
                (code.clone(), analysis)
            })
            .collect();

        Ok(ResultBundle {
            granularity: request.granularity,
            scope_code: match &scope {
                Scope::National => None,
                Scope::Province(province) => Some(province.population_code.to_string()),
                Scope::City { code, .. } => Some(code.clone()),
            },
            population: population.areas,
            period: population.period,
            clinics,
            clinic_summary: reconciliation.summaries,
            saturation,
            observed,
            dropped_clinics: reconciliation.dropped,
        })
    }

    async fn fetch_clinics(
        &self,
        scope: &Scope,
        request: &AnalysisRequest,
    ) -> Result<Vec<ClinicRecord>, MergeError> {
        let query = |province: &Province| ClinicQuery {
            province_code: province.clinic_code.to_string(),
            district_code: None,
            specialty_codes: request.specialty_codes.clone(),
            facility_classes: request.facility_classes.clone(),
        };

        match scope {
            Scope::National => {
                self.progress.set_total(PROVINCES.len() as u64);
                let mut rows = Vec::new();
                for province in PROVINCES {
                    self.progress.set_message(province.name.to_string());
                    match self.clinics.clinics(&query(province)).await {
                        Ok(found) => rows.extend(found),
                        Err(e) => log::warn!("Skipping clinics in {}: {e}", province.name),
                    }
                    self.progress.inc(1);
                }
                self.progress
                    .set_message(format!("{} clinic rows fetched", rows.len()));
                Ok(rows)
            }
            Scope::Province(province) | Scope::City { province, .. } => {
                Ok(self.clinics.clinics(&query(*province)).await?)
            }
        }
    }
}

/// Left-joins population areas with the supply of one specialty. Areas
/// without supply get zero counts.
#[must_use]
pub fn join(
    population: &[AreaPopulation],
    summaries: &[ClinicSummary],
    specialty_code: &str,
) -> Vec<JoinedArea> {
    let supply: BTreeMap<&MatchKey, &ClinicSummary> = summaries
        .iter()
        .filter(|s| s.specialty_code == specialty_code)
        .map(|s| (&s.match_key, s))
        .collect();

    population
        .iter()
        .map(|area| {
            let summary = supply.get(&area.match_key);
            JoinedArea {
                match_key: area.match_key.clone(),
                name: area.name.clone(),
                counts: area.counts,
                clinic_count: summary.map_or(0, |s| s.clinic_count),
                specialist_count: summary.map_or(0, |s| s.specialist_count),
            }
        })
        .collect()
}

/// Picks the demand and supply columns of a joined table.
///
/// Age-bracket demand is treated as absent (`None`) for every area when no
/// area in the table reported age brackets.
#[must_use]
pub fn saturation_inputs(
    joined: &[JoinedArea],
    demographic: Demographic,
    supply: SupplyMeasure,
) -> Vec<SaturationInput> {
    let demand_present =
        !demographic.is_age_bracket() || joined.iter().any(|a| a.counts.has_age_brackets());
    if !demand_present {
        log::warn!("No age brackets reported; {demographic} demand is unavailable");
    }

    joined
        .iter()
        .map(|area| SaturationInput {
            match_key: area.match_key.clone(),
            name: area.name.clone(),
            numerator: demand_present.then(|| area.counts.get(demographic)),
            denominator: match supply {
                SupplyMeasure::ClinicCount => area.clinic_count,
                SupplyMeasure::SpecialistCount => area.specialist_count,
            },
        })
        .collect()
}

/// Resolves a province argument: its official or romanized name, its
/// 6-digit clinic registry code, or any population registry code within
/// it. A 6-digit input that is a clinic code is read as one, so `310000`
/// is Gyeonggi rather than Ulsan (`31`).
fn province_scope(code: &str) -> Result<&'static Province, MergeError> {
    let code = code.trim();
    province_by_name(code)
        .or_else(|| province_by_clinic_code(code))
        .or_else(|| {
            code.bytes()
                .all(|b| b.is_ascii_digit())
                .then(|| province_by_code(code))
                .flatten()
        })
        .ok_or_else(|| MergeError::UnknownScope {
            code: code.to_string(),
            message: "not a province name or code".to_string(),
        })
}

fn resolve_scope(granularity: Granularity, scope_code: Option<&str>) -> Result<Scope, MergeError> {
    let missing = || MergeError::UnknownScope {
        code: String::new(),
        message: format!("{granularity} analysis needs a scope code"),
    };

    match granularity {
        Granularity::National => Ok(Scope::National),
        Granularity::Province => Ok(Scope::Province(province_scope(
            scope_code.ok_or_else(missing)?,
        )?)),
        Granularity::City => {
            let raw = scope_code.ok_or_else(missing)?.trim();
            let code = normalize_code(raw);
            if code.len() < DISTRICT_PREFIX_LEN || !code.bytes().all(|b| b.is_ascii_digit()) {
                return Err(MergeError::UnknownScope {
                    code: raw.to_string(),
                    message: "a city code needs at least five digits".to_string(),
                });
            }
            let province = province_by_code(&code).ok_or_else(|| MergeError::UnknownScope {
                code: raw.to_string(),
                message: "not within a known province".to_string(),
            })?;
            Ok(Scope::City {
                province,
                code: format!("{code:0<10}"),
            })
        }
    }
}

/// Boundary code prefix of a city scope. A city made of wards (fifth digit
/// `0`) covers every code sharing its first four digits.
fn city_prefix(code: &str) -> String {
    let district = &code[..DISTRICT_PREFIX_LEN];
    if district.ends_with('0') {
        district[..DISTRICT_PREFIX_LEN - 1].to_string()
    } else {
        district.to_string()
    }
}
