//! Ratio, normalization and classification rules.

use std::collections::BTreeMap;

use clinic_map_analytics_models::{
    BALANCED_LOWER, SaturationInput, SaturationLevel, SaturationRecord, SaturationSummary,
    UNDER_SERVED_LOWER, UNSERVED_NORMALIZED_RATIO,
};

/// Demand per unit of supply.
///
/// Zero demand gives `0.0`; positive demand with zero supply gives
/// `f64::INFINITY`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn raw_ratio(numerator: u64, denominator: u64) -> f64 {
    if numerator == 0 {
        0.0
    } else if denominator == 0 {
        f64::INFINITY
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Arithmetic mean of the finite ratios, or `1.0` if there are none.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_ratio(ratios: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = ratios
        .into_iter()
        .filter(|r| r.is_finite())
        .fold((0.0, 0usize), |(sum, count), r| (sum + r, count + 1));
    if count == 0 { 1.0 } else { sum / count as f64 }
}

/// Scales a raw ratio by the scope mean. The infinite sentinel maps to
/// [`UNSERVED_NORMALIZED_RATIO`]; a non-positive mean maps everything else
/// to `1.0`.
#[must_use]
pub fn normalized_ratio(raw: f64, mean: f64) -> f64 {
    if raw.is_infinite() && raw.is_sign_positive() {
        UNSERVED_NORMALIZED_RATIO
    } else if mean > 0.0 {
        raw / mean
    } else {
        1.0
    }
}

/// Classifies one area. The first matching rule wins:
///
/// 1. no demand: [`SaturationLevel::NoData`]
/// 2. no supply: [`SaturationLevel::UnderServed`]
/// 3. normalized in `[0.0, 0.8)`: [`SaturationLevel::Saturated`]
/// 4. normalized in `[0.8, 1.2)`: [`SaturationLevel::Balanced`]
/// 5. normalized `>= 1.2`: [`SaturationLevel::UnderServed`]
/// 6. anything else: [`SaturationLevel::Saturated`]
#[must_use]
pub fn classify(numerator: u64, denominator: u64, normalized: f64) -> SaturationLevel {
    if numerator == 0 {
        SaturationLevel::NoData
    } else if denominator == 0 {
        SaturationLevel::UnderServed
    } else if (0.0..BALANCED_LOWER).contains(&normalized) {
        SaturationLevel::Saturated
    } else if (BALANCED_LOWER..UNDER_SERVED_LOWER).contains(&normalized) {
        SaturationLevel::Balanced
    } else if normalized >= UNDER_SERVED_LOWER {
        SaturationLevel::UnderServed
    } else {
        SaturationLevel::Saturated
    }
}

/// Computes the saturation table for one specialty.
///
/// Records keep the input order. The mean used for normalization is taken
/// over every finite raw ratio in `inputs`, zeros included.
#[must_use]
pub fn compute(inputs: &[SaturationInput], specialty_code: &str) -> Vec<SaturationRecord> {
    let raws: Vec<Option<f64>> = inputs
        .iter()
        .map(|input| input.numerator.map(|n| raw_ratio(n, input.denominator)))
        .collect();
    let mean = mean_ratio(raws.iter().flatten().copied());
    log::debug!(
        "specialty {specialty_code}: {} areas, mean ratio {mean:.3}",
        inputs.len()
    );

    inputs
        .iter()
        .zip(raws)
        .map(|(input, raw)| {
            let normalized = raw.map(|r| normalized_ratio(r, mean));
            let level = match (input.numerator, normalized) {
                (Some(n), Some(norm)) => classify(n, input.denominator, norm),
                _ => SaturationLevel::NoData,
            };
            SaturationRecord {
                match_key: input.match_key.clone(),
                name: input.name.clone(),
                specialty_code: specialty_code.to_string(),
                numerator: input.numerator,
                denominator: input.denominator,
                raw_ratio: raw,
                normalized_ratio: normalized,
                level,
            }
        })
        .collect()
}

/// Headline figures of a saturation table.
#[must_use]
pub fn summarize(records: &[SaturationRecord]) -> SaturationSummary {
    let mut level_counts = BTreeMap::new();
    for record in records {
        *level_counts.entry(record.level).or_insert(0) += 1;
    }

    SaturationSummary {
        area_count: records.len(),
        total_demand: records.iter().filter_map(|r| r.numerator).sum(),
        total_supply: records.iter().map(|r| r.denominator).sum(),
        zero_supply_areas: records.iter().filter(|r| r.denominator == 0).count(),
        mean_ratio: mean_ratio(records.iter().filter_map(|r| r.raw_ratio)),
        level_counts,
    }
}
