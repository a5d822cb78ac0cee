//! Plain-text rendering of results and code tables.

use std::collections::BTreeMap;

use clinic_map_analytics_models::{SaturationSummary, SupplyMeasure};
use clinic_map_geography_models::MatchKey;
use clinic_map_geography_models::codes::PROVINCES;
use clinic_map_merge::{PopulationPeriod, ResultBundle};
use clinic_map_source_models::Demographic;
use clinic_map_source_models::specialty::{FACILITY_CLASSES, SPECIALTIES};

pub fn print_bundle(bundle: &ResultBundle, demographic: Demographic, supply: SupplyMeasure) {
    match bundle.period {
        PopulationPeriod::Requested(period) => println!("Period: {period}"),
        PopulationPeriod::PreviousMonth(period) => {
            println!("Period: {period} (requested month had no data)");
        }
        PopulationPeriod::Empty => {
            println!("No population data for the requested month or the month before it.");
            return;
        }
    }
    println!(
        "{} areas, {} clinic rows ({} unplaceable)",
        bundle.population.len(),
        bundle.clinics.len(),
        bundle.dropped_clinics
    );

    for analysis in bundle.saturation.values() {
        println!();
        println!("{} ({})", analysis.specialty_name, analysis.specialty_code);
        println!(
            "{:<12} {:<20} {:>12} {:>8} {:>10} {:>8}  LEVEL",
            "KEY", "NAME", demographic, supply, "RATIO", "INDEX"
        );
        println!("{}", "-".repeat(84));
        for record in &analysis.records {
            println!(
                "{:<12} {:<20} {:>12} {:>8} {:>10} {:>8}  {}",
                record.match_key,
                record.name,
                record
                    .numerator
                    .map_or_else(|| "-".to_string(), |n| n.to_string()),
                record.denominator,
                ratio(record.raw_ratio),
                ratio(record.normalized_ratio),
                record.level.label()
            );
        }
        print_summary(&analysis.summary);
    }
}

fn print_summary(summary: &SaturationSummary) {
    let levels: Vec<String> = summary
        .level_counts
        .iter()
        .map(|(level, count)| format!("{}={count}", level.label()))
        .collect();
    println!(
        "demand {}, supply {}, {} areas without supply, mean ratio {}; {}",
        summary.total_demand,
        summary.total_supply,
        summary.zero_supply_areas,
        ratio(Some(summary.mean_ratio)),
        levels.join(" ")
    );
}

fn ratio(value: Option<f64>) -> String {
    match value {
        None => "-".to_string(),
        Some(v) if v.is_infinite() => "inf".to_string(),
        Some(v) => format!("{v:.2}"),
    }
}

pub fn print_dissolve_keys(keys: &BTreeMap<String, MatchKey>) {
    println!("{:<12} KEY", "CODE");
    for (code, key) in keys {
        println!("{code:<12} {key}");
    }
}

pub fn print_specialties() {
    println!("{:<6} {:<14} NAME", "CODE", "KOREAN");
    println!("{}", "-".repeat(50));
    for specialty in SPECIALTIES {
        println!(
            "{:<6} {:<14} {}",
            specialty.code, specialty.name, specialty.english_name
        );
    }
    println!();
    println!("Facility classes:");
    for class in FACILITY_CLASSES {
        println!("{:<6} {:<14} {}", class.code, class.name, class.english_name);
    }
}

pub fn print_provinces() {
    println!("{:<12} {:<8} {:<16} NAME", "POPULATION", "CLINIC", "ENGLISH");
    println!("{}", "-".repeat(56));
    for province in PROVINCES {
        println!(
            "{:<12} {:<8} {:<16} {}",
            province.population_code, province.clinic_code, province.english_name, province.name
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_formatting() {
        assert_eq!(ratio(None), "-");
        assert_eq!(ratio(Some(f64::INFINITY)), "inf");
        assert_eq!(ratio(Some(1.0 / 3.0)), "0.33");
    }
}
