//! Assigns neighborhood codes to clinic rows by point-in-polygon lookup.

use clinic_map_source_models::ClinicRecord;
use clinic_map_spatial::BoundaryIndex;

/// Geocodes `clinics` against `index`.
///
/// Rows with usable coordinates come first, each carrying the code of the
/// first boundary that contains it (or `None` if none does). Rows without
/// coordinates follow with `area_code` cleared; the reconciler resolves
/// them through the district crosswalk. The row count is unchanged.
#[must_use]
pub fn geocode(clinics: Vec<ClinicRecord>, index: &BoundaryIndex) -> Vec<ClinicRecord> {
    let (valid, invalid): (Vec<_>, Vec<_>) =
        clinics.into_iter().partition(ClinicRecord::has_coordinates);

    let mut matched = 0usize;
    let mut geocoded: Vec<ClinicRecord> = valid
        .into_iter()
        .map(|mut clinic| {
            clinic.area_code = index
                .lookup(clinic.longitude, clinic.latitude)
                .map(|unit| unit.code.clone());
            if clinic.area_code.is_some() {
                matched += 1;
            }
            clinic
        })
        .collect();

    log::info!(
        "Geocoded {matched}/{} clinics with coordinates, {} without",
        geocoded.len(),
        invalid.len()
    );

    geocoded.extend(invalid.into_iter().map(|mut clinic| {
        clinic.area_code = None;
        clinic
    }));
    geocoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{boundaries, clinic};

    #[test]
    fn valid_rows_first_and_count_conserved() {
        let index = boundaries();
        let clinics = vec![
            clinic("a", "01", 0.0, 0.0, "110001"),
            clinic("b", "01", 126.2, 37.2, "110001"),
            clinic("c", "01", 140.0, 10.0, "110001"),
            clinic("d", "01", f64::NAN, 37.2, "110001"),
        ];

        let geocoded = geocode(clinics, &index);

        let ids: Vec<&str> = geocoded.iter().map(|c| c.facility_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a", "d"]);
        assert_eq!(geocoded[0].area_code.as_deref(), Some("1111051500"));
        assert_eq!(geocoded[1].area_code, None);
        assert_eq!(geocoded[2].area_code, None);
        assert_eq!(geocoded[3].area_code, None);
    }

    #[test]
    fn overlap_keeps_first_boundary() {
        let index = boundaries();
        let geocoded = geocode(vec![clinic("x", "01", 126.7, 37.7, "110001")], &index);
        assert_eq!(geocoded[0].area_code.as_deref(), Some("1111051500"));
    }

    #[test]
    fn stale_area_codes_on_invalid_rows_are_cleared() {
        let index = boundaries();
        let mut row = clinic("x", "01", 0.0, 0.0, "110001");
        row.area_code = Some("9999999999".to_string());
        let geocoded = geocode(vec![row], &index);
        assert_eq!(geocoded[0].area_code, None);
    }
}
