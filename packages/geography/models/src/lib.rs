#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Administrative area codes and match keys.
//!
//! Three independently coded geographies meet in this workspace: the
//! population registry (10-digit administrative codes), the clinic registry
//! (6-digit province and district codes), and the neighborhood boundary
//! dataset (10-digit codes, some still in a legacy scheme). The types here
//! turn any of those codes into a [`MatchKey`] for a given [`Granularity`]
//! so that population and clinic aggregates can be joined.

pub mod codes;
pub mod crosswalk;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use codes::normalize_code;

/// Length of a province prefix in population registry codes.
pub const PROVINCE_PREFIX_LEN: usize = 2;

/// Length of a city/district prefix in population registry codes.
pub const DISTRICT_PREFIX_LEN: usize = 5;

/// The geographic granularity of an analysis.
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
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Granularity {
    /// Whole country, one area per province.
    National,
    /// One province, one area per city or district.
    Province,
    /// One city or district, one area per administrative neighborhood.
    City,
}

/// Level of an administrative unit in the population registry hierarchy.
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
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AreaLevel {
    /// The whole country.
    National,
    /// A province-level sub-area: city, county or district.
    City,
    /// An administrative neighborhood.
    Neighborhood,
}

/// Canonical identifier of one area at one granularity.
///
/// The population path and the clinic path must produce the same key for
/// the same physical area; both go through [`match_key`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchKey(String);

impl MatchKey {
    /// Wraps an already-canonical key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MatchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MatchKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The sub-area codes the population registry reported for one province.
///
/// Drives the district to city uplift rule: a district whose parent city
/// code (`code[..4] + "0"`) was itself listed is reported under the city.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedSubAreas {
    codes: BTreeSet<String>,
    /// 5-digit city code -> city name, for listed entries that are
    /// themselves cities (fifth digit `0`).
    city_names: BTreeMap<String, String>,
}

impl ObservedSubAreas {
    /// Creates an empty set. Province-scoped uplift never fires against it.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the set from `(code, name)` pairs as returned by the
    /// population registry's sub-area listing.
    #[must_use]
    pub fn from_sub_areas<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut observed = Self::new();
        for (code, name) in entries {
            observed.insert(code, name);
        }
        observed
    }

    /// Records one listed sub-area. Codes shorter than five digits are
    /// ignored.
    pub fn insert(&mut self, code: &str, name: &str) {
        let code = normalize_code(code);
        let Some(district) = code.get(..DISTRICT_PREFIX_LEN) else {
            return;
        };
        if parent_city_code(district).as_deref() == Some(district) {
            self.city_names
                .insert(district.to_string(), name.to_string());
        }
        self.codes.insert(district.to_string());
    }

    /// Returns `true` if the 5-digit code was listed.
    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(code)
    }

    /// Iterates the listed 5-digit codes in ascending order.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }

    /// Number of distinct 5-digit codes listed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Returns `true` if nothing was listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Name of a listed city, by its 5-digit code.
    #[must_use]
    pub fn city_name(&self, code: &str) -> Option<&str> {
        self.city_names.get(code).map(String::as_str)
    }

    /// Applies the uplift rule to an already normalized code.
    ///
    /// Returns the parent city code when it was listed, otherwise the
    /// district's own 5-digit code. `None` for codes shorter than five
    /// digits.
    #[must_use]
    pub fn district_key(&self, code: &str) -> Option<MatchKey> {
        let district = code.get(..DISTRICT_PREFIX_LEN)?;
        match parent_city_code(district) {
            Some(city) if self.contains(&city) => Some(MatchKey(city)),
            _ => Some(MatchKey::new(district)),
        }
    }

    /// Returns `true` if the district key of `code` is an uplifted city
    /// rather than the district itself.
    #[must_use]
    pub fn is_uplifted(&self, code: &str) -> bool {
        self.district_key(code)
            .is_some_and(|key| code.get(..DISTRICT_PREFIX_LEN) != Some(key.as_str()))
    }
}

/// Candidate parent city of a district: the first four digits followed by
/// `0`.
fn parent_city_code(code: &str) -> Option<String> {
    code.get(..DISTRICT_PREFIX_LEN - 1).map(|head| format!("{head}0"))
}

/// Derives the match key of an administrative code at a granularity.
///
/// The code is normalized first, so legacy boundary codes and current
/// registry codes land on the same key. Returns `None` when the code is too
/// short for the requested granularity.
#[must_use]
pub fn match_key(
    code: &str,
    granularity: Granularity,
    observed: &ObservedSubAreas,
) -> Option<MatchKey> {
    let code = normalize_code(code.trim());
    match granularity {
        Granularity::National => code.get(..PROVINCE_PREFIX_LEN).map(MatchKey::new),
        Granularity::Province => observed.district_key(&code),
        Granularity::City => (!code.is_empty()).then(|| MatchKey(code)),
    }
}
