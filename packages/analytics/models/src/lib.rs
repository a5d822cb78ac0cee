#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Saturation index types.
//!
//! A saturation record compares demand (a population count) with supply
//! (clinics or specialists) in one area for one specialty. The calculator
//! lives in `clinic_map_analytics`; these are the shapes it reads and
//! writes.

use std::collections::BTreeMap;

use clinic_map_geography_models::MatchKey;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Normalized ratio assigned to areas with demand but no supply.
pub const UNSERVED_NORMALIZED_RATIO: f64 = 3.0;

/// Lower bound of the balanced band.
pub const BALANCED_LOWER: f64 = 0.8;

/// Lower bound of the under-served band.
pub const UNDER_SERVED_LOWER: f64 = 1.2;

/// Discrete saturation class of an area.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SaturationLevel {
    /// More supply than the scope average for the demand (normalized
    /// ratio below 0.8).
    Saturated,
    /// Close to the scope average.
    Balanced,
    /// Less supply than the scope average, or none at all.
    UnderServed,
    /// No demand recorded.
    NoData,
}

impl SaturationLevel {
    /// Korean label shown in reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Saturated => "포화",
            Self::Balanced => "보통",
            Self::UnderServed => "여유",
            Self::NoData => "데이터없음",
        }
    }
}

/// Which supply count is the denominator of the index.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SupplyMeasure {
    /// Number of facilities.
    #[default]
    ClinicCount,
    /// Number of board-certified specialists.
    SpecialistCount,
}

/// One area's demand and supply, ready for the calculator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaturationInput {
    /// Area key.
    pub match_key: MatchKey,
    /// Area display name.
    pub name: String,
    /// Demand. `None` when the demand column is absent altogether.
    pub numerator: Option<u64>,
    /// Supply. Missing supply is zero.
    pub denominator: u64,
}

/// Index result for one area and one specialty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaturationRecord {
    /// Area key.
    pub match_key: MatchKey,
    /// Area display name.
    pub name: String,
    /// Specialty code.
    pub specialty_code: String,
    /// Demand.
    pub numerator: Option<u64>,
    /// Supply.
    pub denominator: u64,
    /// Demand per unit of supply; `f64::INFINITY` when supply is zero and
    /// demand positive. `None` when demand is absent.
    #[serde(default, with = "ratio_format")]
    pub raw_ratio: Option<f64>,
    /// `raw_ratio` relative to the scope mean. `None` when demand is
    /// absent.
    #[serde(default, with = "ratio_format")]
    pub normalized_ratio: Option<f64>,
    /// Discrete class.
    pub level: SaturationLevel,
}

/// Serde adapter for ratios that may be `+inf`.
///
/// JSON has no infinity and `serde_json` would write it as `null`, which
/// already means "demand absent". The zero-supply sentinel is written as
/// the string `"inf"` instead. Finite values stay numbers.
pub mod ratio_format {
    use serde::{Deserialize, Deserializer, Serializer, de};

    /// Wire form of `f64::INFINITY`.
    pub const INFINITY: &str = "inf";

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    /// Writes `+inf` as `"inf"`.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    #[allow(clippy::ref_option, clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) if v.is_infinite() && v.is_sign_positive() => {
                serializer.serialize_some(INFINITY)
            }
            Some(v) => serializer.serialize_some(v),
            None => serializer.serialize_none(),
        }
    }

    /// Reads a number, `"inf"` or `null`.
    ///
    /// # Errors
    ///
    /// Fails on strings other than `"inf"` and on non-numeric values.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<f64>, D::Error> {
        match Option::<Repr>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Repr::Number(v)) => Ok(Some(v)),
            Some(Repr::Text(text)) if text == INFINITY => Ok(Some(f64::INFINITY)),
            Some(Repr::Text(text)) => Err(de::Error::invalid_value(
                de::Unexpected::Str(&text),
                &"a number, \"inf\" or null",
            )),
        }
    }
}

/// Headline figures for one saturation table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaturationSummary {
    /// Number of areas.
    pub area_count: usize,
    /// Sum of demand over all areas.
    pub total_demand: u64,
    /// Sum of supply over all areas.
    pub total_supply: u64,
    /// Areas with no supply.
    pub zero_supply_areas: usize,
    /// Mean of the finite raw ratios (1.0 when there are none).
    pub mean_ratio: f64,
    /// Area count per level.
    pub level_counts: BTreeMap<SaturationLevel, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names() {
        assert_eq!(SaturationLevel::NoData.to_string(), "no-data");
        assert_eq!(
            "under-served".parse::<SaturationLevel>().unwrap(),
            SaturationLevel::UnderServed
        );
        assert_eq!(
            serde_json::to_string(&SaturationLevel::Balanced).unwrap(),
            "\"balanced\""
        );
        assert_eq!(SaturationLevel::Saturated.label(), "포화");
    }

    fn record(numerator: Option<u64>, denominator: u64, raw: Option<f64>) -> SaturationRecord {
        SaturationRecord {
            match_key: MatchKey::new("1111000000"),
            name: "종로구".to_string(),
            specialty_code: "01".to_string(),
            numerator,
            denominator,
            raw_ratio: raw,
            normalized_ratio: raw.map(|r| {
                if r.is_infinite() {
                    UNSERVED_NORMALIZED_RATIO
                } else {
                    1.0
                }
            }),
            level: SaturationLevel::UnderServed,
        }
    }

    #[test]
    fn zero_supply_sentinel_survives_json() {
        let unserved = record(Some(10), 0, Some(f64::INFINITY));
        let json = serde_json::to_string(&unserved).unwrap();
        assert!(json.contains("\"rawRatio\":\"inf\""), "{json}");
        assert!(json.contains("\"normalizedRatio\":3.0"), "{json}");

        let back: SaturationRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.raw_ratio, Some(f64::INFINITY));
        assert_eq!(back, unserved);
    }

    #[test]
    fn absent_demand_and_finite_ratios_keep_their_json_shape() {
        let no_data = record(None, 2, None);
        let json = serde_json::to_string(&no_data).unwrap();
        assert!(json.contains("\"rawRatio\":null"), "{json}");
        assert_eq!(serde_json::from_str::<SaturationRecord>(&json).unwrap(), no_data);

        let finite = record(Some(9), 2, Some(4.5));
        let json = serde_json::to_string(&finite).unwrap();
        assert!(json.contains("\"rawRatio\":4.5"), "{json}");
        assert_eq!(serde_json::from_str::<SaturationRecord>(&json).unwrap(), finite);
    }

    #[test]
    fn unknown_ratio_strings_are_rejected() {
        let json = serde_json::to_string(&record(Some(1), 1, Some(1.0)))
            .unwrap()
            .replace("\"rawRatio\":1.0", "\"rawRatio\":\"nan\"");
        assert!(serde_json::from_str::<SaturationRecord>(&json).is_err());
    }

    #[test]
    fn supply_measure_names() {
        assert_eq!(
            "specialist-count".parse::<SupplyMeasure>().unwrap(),
            SupplyMeasure::SpecialistCount
        );
        assert_eq!(SupplyMeasure::default(), SupplyMeasure::ClinicCount);
    }
}
