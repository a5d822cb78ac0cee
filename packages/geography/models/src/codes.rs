//! Province code tables and the administrative-code normalizer.
//!
//! The population registry identifies provinces by 10-digit codes whose
//! first two digits are the province prefix. The clinic registry uses its
//! own 6-digit province codes. The boundary dataset predates two province
//! reorganisations and the creation of Sejong, so some of its codes still
//! carry legacy prefixes that [`normalize_code`] rewrites.

/// A top-level province (시·도) as coded by both registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Province {
    /// Official name as used by both registries.
    pub name: &'static str,
    /// Romanized name.
    pub english_name: &'static str,
    /// 10-digit population registry code (e.g. `"1100000000"`).
    pub population_code: &'static str,
    /// 6-digit clinic registry code (e.g. `"110000"`).
    pub clinic_code: &'static str,
}

impl Province {
    /// Two-digit province prefix of the population registry code.
    #[must_use]
    pub fn prefix(&self) -> &'static str {
        &self.population_code[..2]
    }
}

/// The 17 provinces, in the population registry's listing order.
pub const PROVINCES: &[Province] = &[
    province("서울특별시", "Seoul", "1100000000", "110000"),
    province("부산광역시", "Busan", "2600000000", "210000"),
    province("대구광역시", "Daegu", "2700000000", "230000"),
    province("인천광역시", "Incheon", "2800000000", "220000"),
    province("광주광역시", "Gwangju", "2900000000", "240000"),
    province("대전광역시", "Daejeon", "3000000000", "250000"),
    province("울산광역시", "Ulsan", "3100000000", "260000"),
    province("세종특별자치시", "Sejong", "3600000000", "410000"),
    province("경기도", "Gyeonggi", "4100000000", "310000"),
    province("강원특별자치도", "Gangwon", "5100000000", "320000"),
    province("충청북도", "Chungbuk", "4300000000", "330000"),
    province("충청남도", "Chungnam", "4400000000", "340000"),
    province("전북특별자치도", "Jeonbuk", "5200000000", "350000"),
    province("전라남도", "Jeonnam", "4600000000", "360000"),
    province("경상북도", "Gyeongbuk", "4700000000", "370000"),
    province("경상남도", "Gyeongnam", "4800000000", "380000"),
    province("제주특별자치도", "Jeju", "5000000000", "390000"),
];

const fn province(
    name: &'static str,
    english_name: &'static str,
    population_code: &'static str,
    clinic_code: &'static str,
) -> Province {
    Province {
        name,
        english_name,
        population_code,
        clinic_code,
    }
}

/// Legacy prefixes still present in the boundary dataset and their
/// current equivalents. Checked in order; the rest of the code is kept.
const LEGACY_PREFIXES: &[(&str, &str)] = &[
    // Sejong was carved out of a Chungnam county coded under 41000.
    ("41000", "36"),
    // Gangwon became a special self-governing province.
    ("42", "51"),
    // Jeonbuk became a special self-governing province.
    ("45", "52"),
];

/// Rewrites a legacy administrative code to the current scheme.
///
/// Ordinary codes pass through unchanged. Total over all strings and
/// idempotent: `normalize_code(&normalize_code(x)) == normalize_code(x)`.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    for (legacy, current) in LEGACY_PREFIXES {
        if let Some(rest) = code.strip_prefix(legacy) {
            return format!("{current}{rest}");
        }
    }
    code.to_string()
}

/// Looks up a province by any population registry code within it.
///
/// The code is normalized first, so legacy prefixes resolve too.
#[must_use]
pub fn province_by_code(code: &str) -> Option<&'static Province> {
    let code = normalize_code(code);
    let prefix = code.get(..2)?;
    PROVINCES.iter().find(|p| p.prefix() == prefix)
}

/// Looks up a province by its 6-digit clinic registry code.
#[must_use]
pub fn province_by_clinic_code(clinic_code: &str) -> Option<&'static Province> {
    PROVINCES.iter().find(|p| p.clinic_code == clinic_code)
}

/// Looks up a province by official or romanized name (case-insensitive
/// for the romanized form).
#[must_use]
pub fn province_by_name(name: &str) -> Option<&'static Province> {
    let name = name.trim();
    PROVINCES
        .iter()
        .find(|p| p.name == name || p.english_name.eq_ignore_ascii_case(name))
}

/// Maps a population registry prefix to the province's official name.
///
/// Returns `"Unknown"` for unrecognized codes.
#[must_use]
pub fn province_name(code: &str) -> &'static str {
    province_by_code(code).map_or("Unknown", |p| p.name)
}
