//! Specialty and facility-class code tables of the clinic registry.

/// A medical specialty (`dgsbjtCd`) as coded by the clinic registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Specialty {
    /// Two-digit specialty code.
    pub code: &'static str,
    /// Korean name.
    pub name: &'static str,
    /// English name.
    pub english_name: &'static str,
}

/// A facility class (`clCd`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacilityClass {
    /// Two-digit class code.
    pub code: &'static str,
    /// Korean name.
    pub name: &'static str,
    /// English name.
    pub english_name: &'static str,
}

const fn specialty(
    code: &'static str,
    name: &'static str,
    english_name: &'static str,
) -> Specialty {
    Specialty {
        code,
        name,
        english_name,
    }
}

/// All specialties the clinic registry can be queried for.
pub const SPECIALTIES: &[Specialty] = &[
    // Medicine
    specialty("01", "내과", "Internal Medicine"),
    specialty("02", "신경과", "Neurology"),
    specialty("03", "정신건강의학과", "Psychiatry"),
    specialty("04", "외과", "General Surgery"),
    specialty("05", "정형외과", "Orthopedics"),
    specialty("06", "신경외과", "Neurosurgery"),
    specialty("07", "흉부외과", "Thoracic Surgery"),
    specialty("08", "성형외과", "Plastic Surgery"),
    specialty("09", "마취통증의학과", "Anesthesiology and Pain Medicine"),
    specialty("10", "산부인과", "Obstetrics and Gynecology"),
    specialty("11", "소아청소년과", "Pediatrics"),
    specialty("12", "안과", "Ophthalmology"),
    specialty("13", "이비인후과", "Otorhinolaryngology"),
    specialty("14", "피부과", "Dermatology"),
    specialty("15", "비뇨의학과", "Urology"),
    specialty("16", "영상의학과", "Radiology"),
    specialty("17", "방사선종양학과", "Radiation Oncology"),
    specialty("18", "병리과", "Pathology"),
    specialty("19", "진단검사의학과", "Laboratory Medicine"),
    specialty("20", "결핵과", "Tuberculosis"),
    specialty("21", "재활의학과", "Rehabilitation Medicine"),
    specialty("22", "핵의학과", "Nuclear Medicine"),
    specialty("23", "가정의학과", "Family Medicine"),
    specialty("24", "응급의학과", "Emergency Medicine"),
    specialty("25", "직업환경의학과", "Occupational and Environmental Medicine"),
    specialty("26", "예방의학과", "Preventive Medicine"),
    // Dentistry
    specialty("49", "치과", "Dentistry"),
    specialty("52", "치과교정과", "Orthodontics"),
    specialty("53", "소아치과", "Pediatric Dentistry"),
    specialty("54", "치주과", "Periodontics"),
    specialty("55", "치과보존과", "Conservative Dentistry"),
    specialty("61", "통합치의학과", "Advanced General Dentistry"),
    // Korean medicine
    specialty("80", "한방내과", "Korean Internal Medicine"),
    specialty("81", "한방부인과", "Korean Gynecology"),
    specialty("82", "한방소아과", "Korean Pediatrics"),
    specialty("83", "한방안이비인후피부과", "Korean Ophthalmology, ENT and Dermatology"),
    specialty("84", "한방신경정신과", "Korean Neuropsychiatry"),
    specialty("85", "침구과", "Acupuncture and Moxibustion"),
    specialty("86", "한방재활의학과", "Korean Rehabilitation Medicine"),
    specialty("87", "사상체질과", "Sasang Constitutional Medicine"),
];

/// Facility classes of the clinic registry.
pub const FACILITY_CLASSES: &[FacilityClass] = &[
    FacilityClass {
        code: "01",
        name: "상급종합병원",
        english_name: "Tertiary hospital",
    },
    FacilityClass {
        code: "11",
        name: "종합병원",
        english_name: "General hospital",
    },
    FacilityClass {
        code: "21",
        name: "병원",
        english_name: "Hospital",
    },
    FacilityClass {
        code: "28",
        name: "요양병원",
        english_name: "Long-term care hospital",
    },
    FacilityClass {
        code: "29",
        name: "정신병원",
        english_name: "Psychiatric hospital",
    },
    FacilityClass {
        code: "31",
        name: "의원",
        english_name: "Clinic",
    },
    FacilityClass {
        code: "41",
        name: "치과병원",
        english_name: "Dental hospital",
    },
    FacilityClass {
        code: "51",
        name: "치과의원",
        english_name: "Dental clinic",
    },
    FacilityClass {
        code: "92",
        name: "한방병원",
        english_name: "Korean medicine hospital",
    },
    FacilityClass {
        code: "93",
        name: "한의원",
        english_name: "Korean medicine clinic",
    },
];

/// Specialties fetched when none are requested.
pub const DEFAULT_SPECIALTIES: &[&str] = &["01", "05", "11", "12", "14"];

/// Facility classes kept when none are requested: clinics, hospitals and
/// general hospitals.
pub const DEFAULT_FACILITY_CLASSES: &[&str] = &["31", "21", "11"];

/// Looks up a specialty by its two-digit code.
#[must_use]
pub fn specialty_by_code(code: &str) -> Option<&'static Specialty> {
    SPECIALTIES.iter().find(|s| s.code == code)
}

/// Returns the Korean specialty name, or the code itself when unknown.
#[must_use]
pub fn specialty_name(code: &str) -> &str {
    specialty_by_code(code).map_or(code, |s| s.name)
}

/// Looks up a facility class by its two-digit code.
#[must_use]
pub fn facility_class_by_code(code: &str) -> Option<&'static FacilityClass> {
    FACILITY_CLASSES.iter().find(|c| c.code == code)
}
