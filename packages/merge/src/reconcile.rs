//! Key reconciliation: puts geocoded clinic rows on the population match
//! keys and counts supply per key and specialty.

use std::collections::BTreeMap;

use clinic_map_geography_models::{
    Granularity, MatchKey, ObservedSubAreas, crosswalk, match_key, normalize_code,
};
use clinic_map_source_models::ClinicRecord;
use serde::{Deserialize, Serialize};

/// Supply of one specialty in one area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicSummary {
    /// Area key.
    pub match_key: MatchKey,
    /// Specialty code.
    pub specialty_code: String,
    /// Number of clinic rows.
    pub clinic_count: u64,
    /// Sum of specialist counts.
    pub specialist_count: u64,
}

/// Output of [`reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    /// One row per `(match_key, specialty_code)`, in key order.
    pub summaries: Vec<ClinicSummary>,
    /// Rows that could not be placed on any key.
    pub dropped: usize,
}

/// Match key of one geocoded clinic row, or `None` if it cannot be placed.
///
/// Geocoded rows use their neighborhood code. Other rows fall back to the
/// crosswalk from the clinic registry's district code, which is too coarse
/// for [`Granularity::City`].
#[must_use]
pub fn clinic_match_key(
    clinic: &ClinicRecord,
    granularity: Granularity,
    observed: &ObservedSubAreas,
) -> Option<MatchKey> {
    if let Some(code) = &clinic.area_code {
        return match_key(code, granularity, observed);
    }
    if granularity == Granularity::City {
        return None;
    }

    let district = crosswalk::clinic_to_population(&clinic.district_code)?;
    match_key(&normalize_code(district), granularity, observed)
}

/// Groups clinic rows by `(match_key, specialty_code)`.
#[must_use]
pub fn reconcile(
    clinics: &[ClinicRecord],
    granularity: Granularity,
    observed: &ObservedSubAreas,
) -> Reconciliation {
    let mut groups: BTreeMap<(MatchKey, String), (u64, u64)> = BTreeMap::new();
    let mut dropped = 0;

    for clinic in clinics {
        let Some(key) = clinic_match_key(clinic, granularity, observed) else {
            log::debug!(
                "Dropping clinic {} ({}): no area code or crosswalk entry for district {}",
                clinic.facility_id,
                clinic.name,
                clinic.district_code
            );
            dropped += 1;
            continue;
        };
        let entry = groups
            .entry((key, clinic.specialty_code.clone()))
            .or_default();
        entry.0 += 1;
        entry.1 += u64::from(clinic.specialist_count);
    }

    if dropped > 0 {
        log::info!("Dropped {dropped}/{} unplaceable clinic rows", clinics.len());
    }

    Reconciliation {
        summaries: groups
            .into_iter()
            .map(
                |((match_key, specialty_code), (clinic_count, specialist_count))| ClinicSummary {
                    match_key,
                    specialty_code,
                    clinic_count,
                    specialist_count,
                },
            )
            .collect(),
        dropped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::clinic;

    fn placed(id: &str, specialty: &str, area_code: &str, specialists: u32) -> ClinicRecord {
        let mut row = clinic(id, specialty, 127.0, 37.0, "");
        row.area_code = Some(area_code.to_string());
        row.specialist_count = specialists;
        row
    }

    #[test]
    fn geocoded_neighborhood_at_each_granularity() {
        let row = placed("a", "01", "1111051500", 1);
        let observed = ObservedSubAreas::new();
        assert_eq!(
            clinic_match_key(&row, Granularity::National, &observed),
            Some(MatchKey::new("11"))
        );
        assert_eq!(
            clinic_match_key(&row, Granularity::Province, &observed),
            Some(MatchKey::new("11110"))
        );
        assert_eq!(
            clinic_match_key(&row, Granularity::City, &observed),
            Some(MatchKey::new("1111051500"))
        );
    }

    #[test]
    fn ward_clinics_uplift_with_observed_city() {
        let row = placed("a", "01", "4111151000", 1);
        let with_city =
            ObservedSubAreas::from_sub_areas([("4111000000", "수원시"), ("4111100000", "장안구")]);
        let without_city = ObservedSubAreas::from_sub_areas([("4111100000", "장안구")]);
        assert_eq!(
            clinic_match_key(&row, Granularity::Province, &with_city),
            Some(MatchKey::new("41110"))
        );
        assert_eq!(
            clinic_match_key(&row, Granularity::Province, &without_city),
            Some(MatchKey::new("41111"))
        );
    }

    #[test]
    fn crosswalk_places_rows_without_coordinates() {
        let row = clinic("a", "01", 0.0, 0.0, "110016");
        let observed = ObservedSubAreas::new();
        assert_eq!(
            clinic_match_key(&row, Granularity::Province, &observed),
            Some(MatchKey::new("11110"))
        );
        assert_eq!(
            clinic_match_key(&row, Granularity::National, &observed),
            Some(MatchKey::new("11"))
        );
        assert_eq!(clinic_match_key(&row, Granularity::City, &observed), None);
    }

    #[test]
    fn crosswalk_result_is_normalized() {
        // Chuncheon is listed under the pre-2023 Gangwon prefix
        let row = clinic("a", "01", 0.0, 0.0, "320001");
        assert_eq!(
            clinic_match_key(&row, Granularity::National, &ObservedSubAreas::new()),
            Some(MatchKey::new("51"))
        );
    }

    #[test]
    fn groups_by_key_and_specialty_and_counts_drops() {
        let clinics = vec![
            placed("a", "01", "1111051500", 2),
            placed("b", "01", "1111053000", 1),
            placed("c", "05", "1111051500", 0),
            clinic("d", "01", 0.0, 0.0, "110016"),
            clinic("e", "01", 0.0, 0.0, "999999"),
        ];

        let result = reconcile(&clinics, Granularity::Province, &ObservedSubAreas::new());

        assert_eq!(result.dropped, 1);
        assert_eq!(
            result.summaries,
            vec![
                ClinicSummary {
                    match_key: MatchKey::new("11110"),
                    specialty_code: "01".to_string(),
                    clinic_count: 3,
                    specialist_count: 4,
                },
                ClinicSummary {
                    match_key: MatchKey::new("11110"),
                    specialty_code: "05".to_string(),
                    clinic_count: 1,
                    specialist_count: 0,
                },
            ]
        );
    }
}
