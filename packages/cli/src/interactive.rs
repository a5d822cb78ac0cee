//! Menu-driven front end for operators who don't want to remember flags.

use std::path::PathBuf;

use clinic_map_analytics_models::SupplyMeasure;
use clinic_map_cli_utils::MultiProgress;
use clinic_map_geography_models::Granularity;
use clinic_map_geography_models::codes::PROVINCES;
use clinic_map_merge::AnalysisRequest;
use clinic_map_source_models::specialty::{DEFAULT_SPECIALTIES, SPECIALTIES};
use clinic_map_source_models::{Demographic, YearMonth};
use dialoguer::{Input, MultiSelect, Select};
use strum::IntoEnumIterator as _;

use crate::{analysis, output};

enum Action {
    Analyze,
    DissolveKeys,
    ListSpecialties,
    ListProvinces,
}

impl Action {
    const ALL: &[Self] = &[
        Self::Analyze,
        Self::DissolveKeys,
        Self::ListSpecialties,
        Self::ListProvinces,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Analyze => "Run a saturation analysis",
            Self::DissolveKeys => "Print dissolve keys",
            Self::ListSpecialties => "List specialties",
            Self::ListProvinces => "List provinces",
        }
    }
}

const GRANULARITIES: &[Granularity] =
    &[Granularity::National, Granularity::Province, Granularity::City];

/// Prompts for an action and its parameters, then runs it.
///
/// # Errors
///
/// Returns an error if a prompt fails or the selected action fails.
pub async fn run(multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    println!("Clinic Map");
    println!();

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();
    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Action::ALL[idx] {
        Action::Analyze => {
            let (granularity, scope) = prompt_scope()?;
            let period: YearMonth = Input::new()
                .with_prompt("Population period (YYYYMM)")
                .default(analysis::default_period()?)
                .interact_text()?;

            let mut request = AnalysisRequest::new(granularity, scope, period);
            request.specialty_codes = prompt_specialties()?;
            if request.specialty_codes.is_empty() {
                println!("No specialties selected.");
                return Ok(());
            }
            let demographics: Vec<Demographic> = Demographic::iter().collect();
            request.demographic = prompt_choice("Demand column", &demographics)?;
            let supplies: Vec<SupplyMeasure> = SupplyMeasure::iter().collect();
            request.supply = prompt_choice("Supply column", &supplies)?;

            let merger = analysis::merger(&prompt_boundaries()?, multi)?;
            let bundle = merger.run(&request).await?;
            output::print_bundle(&bundle, request.demographic, request.supply);
        }
        Action::DissolveKeys => {
            let (granularity, scope) = prompt_scope()?;
            let merger = analysis::merger(&prompt_boundaries()?, multi)?;
            let keys = merger.dissolve_keys(granularity, scope.as_deref()).await?;
            output::print_dissolve_keys(&keys);
        }
        Action::ListSpecialties => output::print_specialties(),
        Action::ListProvinces => output::print_provinces(),
    }

    Ok(())
}

fn prompt_scope() -> Result<(Granularity, Option<String>), Box<dyn std::error::Error>> {
    let granularity = prompt_choice("Granularity", GRANULARITIES)?;

    let scope = match granularity {
        Granularity::National => None,
        Granularity::Province => {
            let labels: Vec<String> = PROVINCES
                .iter()
                .map(|p| format!("{} ({})", p.name, p.english_name))
                .collect();
            let idx = Select::new()
                .with_prompt("Province")
                .items(&labels)
                .default(0)
                .max_length(17)
                .interact()?;
            Some(PROVINCES[idx].population_code.to_string())
        }
        Granularity::City => Some(
            Input::<String>::new()
                .with_prompt("City or district code (e.g. 1111000000)")
                .interact_text()?,
        ),
    };

    Ok((granularity, scope))
}

fn prompt_specialties() -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let labels: Vec<String> = SPECIALTIES
        .iter()
        .map(|s| format!("{} {} ({})", s.code, s.name, s.english_name))
        .collect();
    let defaults: Vec<bool> = SPECIALTIES
        .iter()
        .map(|s| DEFAULT_SPECIALTIES.contains(&s.code))
        .collect();

    let selected = MultiSelect::new()
        .with_prompt("Specialties (space=toggle, enter=confirm)")
        .items(&labels)
        .defaults(&defaults)
        .max_length(20)
        .interact()?;

    Ok(selected
        .into_iter()
        .map(|i| SPECIALTIES[i].code.to_string())
        .collect())
}

fn prompt_choice<T: Copy + std::fmt::Display>(
    prompt: &str,
    choices: &[T],
) -> Result<T, Box<dyn std::error::Error>> {
    let labels: Vec<String> = choices.iter().map(ToString::to_string).collect();
    let idx = Select::new()
        .with_prompt(prompt)
        .items(&labels)
        .default(0)
        .interact()?;
    Ok(choices[idx])
}

fn prompt_boundaries() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let path: String = Input::new()
        .with_prompt("Neighborhood boundary GeoJSON file")
        .interact_text()?;
    Ok(PathBuf::from(path))
}
