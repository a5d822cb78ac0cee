//! Static crosswalk between the two registries' district codes.
//!
//! The population registry codes a district by the first five digits of its
//! administrative code (e.g. `"11110"` for Jongno-gu). The clinic registry
//! uses an unrelated 6-digit scheme (`"110016"` for the same district).
//! Clinics without usable coordinates can only be placed through this table.

/// `(population registry 5-digit code, clinic registry 6-digit code)` pairs.
///
/// Gangwon and Jeonbuk entries use the pre-reorganisation `42`/`45`
/// prefixes; callers normalize the translated code before deriving keys.
pub const DISTRICT_CROSSWALK: &[(&str, &str)] = &[
    // Seoul
    ("11110", "110016"), ("11140", "110017"), ("11170", "110014"),
    ("11200", "110011"), ("11215", "110023"), ("11230", "110007"),
    ("11260", "110019"), ("11290", "110012"), ("11305", "110024"),
    ("11320", "110006"), ("11350", "110022"), ("11380", "110015"),
    ("11410", "110010"), ("11440", "110009"), ("11470", "110020"),
    ("11500", "110003"), ("11530", "110005"), ("11545", "110025"),
    ("11560", "110013"), ("11590", "110008"), ("11620", "110004"),
    ("11650", "110021"), ("11680", "110001"), ("11710", "110018"),
    ("11740", "110002"),
    // Busan
    ("26110", "210012"), ("26140", "210008"), ("26170", "210002"),
    ("26200", "210011"), ("26230", "210004"), ("26260", "210003"),
    ("26290", "210001"), ("26320", "210005"), ("26350", "210013"),
    ("26380", "210007"), ("26410", "210015"), ("26440", "210014"),
    ("26470", "210010"), ("26500", "210009"), ("26530", "210006"),
    ("26710", "210100"),
    // Daegu
    ("27110", "230006"), ("27140", "230002"), ("27170", "230003"),
    ("27200", "230004"), ("27230", "230001"), ("27260", "230005"),
    ("27290", "230007"), ("27710", "230100"), ("27720", "230100"),
    // Incheon
    ("28110", "220004"), ("28140", "220002"), ("28177", "220001"),
    ("28185", "220007"), ("28200", "220006"), ("28237", "220003"),
    ("28245", "220008"), ("28260", "220005"), ("28710", "220100"),
    ("28720", "220200"),
    // Gwangju
    ("29110", "240001"), ("29140", "240002"), ("29155", "240003"),
    ("29170", "240004"), ("29200", "240005"),
    // Daejeon
    ("30110", "250001"), ("30140", "250002"), ("30170", "250003"),
    ("30200", "250004"), ("30230", "250005"),
    // Ulsan
    ("31110", "260001"), ("31140", "260002"), ("31170", "260003"),
    ("31200", "260004"), ("31710", "260005"),
    // Sejong
    ("36110", "410000"),
    // Gyeonggi
    ("41110", "310001"), ("41113", "310002"), ("41115", "310003"),
    ("41117", "310004"), ("41130", "310005"), ("41131", "310006"),
    ("41133", "310007"), ("41150", "310008"), ("41170", "310009"),
    ("41171", "310100"), ("41190", "310011"), ("41210", "310012"),
    ("41220", "310013"), ("41250", "310014"), ("41270", "310015"),
    ("41271", "310160"), ("41280", "310017"), ("41285", "310180"),
    ("41287", "310190"), ("41290", "310020"), ("41310", "310021"),
    ("41360", "310022"), ("41370", "310023"), ("41390", "310024"),
    ("41410", "310025"), ("41430", "310026"), ("41450", "310027"),
    ("41460", "310028"), ("41461", "310290"), ("41463", "310300"),
    ("41480", "310031"), ("41500", "310032"), ("41550", "310033"),
    ("41570", "310034"), ("41590", "310035"), ("41610", "310036"),
    ("41630", "310037"), ("41650", "310038"), ("41670", "310039"),
    ("41800", "310400"), ("41820", "310410"), ("41830", "310420"),
    // Gangwon
    ("42110", "320001"), ("42130", "320002"), ("42150", "320003"),
    ("42170", "320004"), ("42190", "320005"), ("42210", "320006"),
    ("42230", "320007"), ("42720", "320008"), ("42730", "320009"),
    ("42740", "320010"), ("42750", "320011"), ("42760", "320012"),
    ("42770", "320013"), ("42780", "320014"), ("42790", "320015"),
    ("42800", "320016"), ("42810", "320017"), ("42820", "320018"),
    // Chungbuk
    ("43110", "330001"), ("43130", "330005"), ("43150", "330006"),
    ("43720", "330007"), ("43730", "330008"), ("43740", "330009"),
    ("43745", "330010"), ("43750", "330011"), ("43760", "330012"),
    ("43770", "330013"), ("43800", "330140"),
    // Chungnam
    ("44130", "340001"), ("44150", "340003"), ("44180", "340004"),
    ("44200", "340005"), ("44210", "340006"), ("44230", "340007"),
    ("44250", "340008"), ("44270", "340009"), ("44710", "340010"),
    ("44760", "340011"), ("44770", "340012"), ("44790", "340013"),
    ("44800", "340014"), ("44810", "340015"), ("44825", "340016"),
    // Jeonbuk
    ("45110", "350001"), ("45130", "350003"), ("45140", "350004"),
    ("45180", "350005"), ("45190", "350006"), ("45210", "350007"),
    ("45710", "350008"), ("45720", "350009"), ("45730", "350010"),
    ("45740", "350011"), ("45750", "350012"), ("45770", "350013"),
    ("45790", "350014"), ("45800", "350015"),
    // Jeonnam
    ("46110", "360001"), ("46130", "360002"), ("46150", "360003"),
    ("46170", "360004"), ("46230", "360005"), ("46710", "360006"),
    ("46720", "360007"), ("46730", "360008"), ("46770", "360009"),
    ("46780", "360010"), ("46790", "360011"), ("46800", "360012"),
    ("46810", "360013"), ("46820", "360014"), ("46830", "360015"),
    ("46840", "360016"), ("46860", "360017"), ("46870", "360018"),
    ("46880", "360019"), ("46900", "360020"), ("46910", "360021"),
    ("46920", "360022"),
    // Gyeongbuk
    ("47110", "370001"), ("47130", "370003"), ("47150", "370004"),
    ("47170", "370005"), ("47190", "370006"), ("47210", "370007"),
    ("47230", "370008"), ("47250", "370009"), ("47280", "370100"),
    ("47290", "370011"), ("47730", "370012"), ("47750", "370013"),
    ("47760", "370014"), ("47770", "370015"), ("47820", "370016"),
    ("47830", "370017"), ("47840", "370018"), ("47850", "370019"),
    ("47900", "370020"), ("47920", "370021"), ("47930", "370022"),
    ("47940", "370023"),
    // Gyeongnam
    ("48120", "380001"), ("48170", "380006"), ("48220", "380007"),
    ("48240", "380008"), ("48250", "380009"), ("48270", "380100"),
    ("48310", "380011"), ("48330", "380012"), ("48720", "380013"),
    ("48730", "380014"), ("48740", "380150"), ("48820", "380016"),
    ("48840", "380017"), ("48850", "380018"), ("48860", "380019"),
    ("48870", "380020"), ("48880", "380021"), ("48890", "380022"),
    // Jeju
    ("50110", "390001"), ("50130", "390002"),];

/// Translates a clinic registry district code to the population registry's
/// 5-digit district code.
///
/// Two population districts share clinic code `230100`; the later table
/// entry wins, as in the registry export this table was built from.
#[must_use]
pub fn clinic_to_population(clinic_code: &str) -> Option<&'static str> {
    let clinic_code = clinic_code.trim();
    DISTRICT_CROSSWALK
        .iter()
        .rev()
        .find(|(_, clinic)| *clinic == clinic_code)
        .map(|(population, _)| *population)
}

/// Translates a population registry district code (at least five digits)
/// to the clinic registry's 6-digit district code.
#[must_use]
pub fn population_to_clinic(population_code: &str) -> Option<&'static str> {
    let district = population_code.trim().get(..crate::DISTRICT_PREFIX_LEN)?;
    DISTRICT_CROSSWALK
        .iter()
        .find(|(population, _)| *population == district)
        .map(|(_, clinic)| *clinic)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn population_codes_are_unique() {
        let mut seen = BTreeSet::new();
        for (population, _) in DISTRICT_CROSSWALK {
            assert!(seen.insert(population), "duplicate population code {population}");
        }
    }

    #[test]
    fn codes_have_expected_widths() {
        for (population, clinic) in DISTRICT_CROSSWALK {
            assert_eq!(population.len(), 5, "{population}");
            assert_eq!(clinic.len(), 6, "{clinic}");
            assert!(population.bytes().all(|b| b.is_ascii_digit()));
            assert!(clinic.bytes().all(|b| b.is_ascii_digit()));
        }
    }

    #[test]
    fn translates_both_ways() {
        assert_eq!(clinic_to_population("110016"), Some("11110"));
        assert_eq!(population_to_clinic("11110"), Some("110016"));
        assert_eq!(population_to_clinic("1111051500"), Some("110016"));
    }

    #[test]
    fn shared_clinic_code_resolves_to_later_entry() {
        assert_eq!(population_to_clinic("27710"), Some("230100"));
        assert_eq!(population_to_clinic("27720"), Some("230100"));
        assert_eq!(clinic_to_population("230100"), Some("27720"));
    }

    #[test]
    fn unknown_codes() {
        assert_eq!(clinic_to_population("999999"), None);
        assert_eq!(population_to_clinic("99999"), None);
        assert_eq!(population_to_clinic("11"), None);
    }
}
