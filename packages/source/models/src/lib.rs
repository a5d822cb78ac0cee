#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Record types produced by the population and clinic registry providers.
//!
//! Providers return these already parsed and typed; every count lives in a
//! named field, so downstream code never checks for duplicated columns.

pub mod specialty;

use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use chrono::{Datelike as _, NaiveDate};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// A calendar month, the reporting period of the population registry.
///
/// Parses from and prints as `YYYYMM` (e.g. `"202412"`). `YYYY-MM` is
/// accepted on input as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

/// Error returned when a period string is not a valid `YYYYMM`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid period '{input}': expected YYYYMM")]
pub struct YearMonthError {
    input: String,
}

impl YearMonth {
    /// Creates a period, validating the month.
    ///
    /// # Errors
    ///
    /// Returns [`YearMonthError`] if `month` is not within `1..=12` or the
    /// year is outside chrono's supported range.
    pub fn new(year: i32, month: u32) -> Result<Self, YearMonthError> {
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(YearMonthError {
                input: format!("{year}{month:02}"),
            });
        }
        Ok(Self { year, month })
    }

    /// The four-digit year.
    #[must_use]
    pub const fn year(self) -> i32 {
        self.year
    }

    /// The month, `1..=12`.
    #[must_use]
    pub const fn month(self) -> u32 {
        self.month
    }

    /// The immediately preceding calendar month.
    #[must_use]
    pub const fn previous(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Number of the last day of this month.
    #[must_use]
    pub fn last_day(self) -> u32 {
        let next = if self.month == 12 {
            NaiveDate::from_ymd_opt(self.year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(self.year, self.month + 1, 1)
        };
        next.and_then(|d| d.pred_opt()).map_or(31, |d| d.day())
    }
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = YearMonthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || YearMonthError {
            input: s.to_string(),
        };
        let digits: String = s.trim().chars().filter(|c| *c != '-' && *c != '.').collect();
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let year = digits[..4].parse().map_err(|_| err())?;
        let month = digits[4..].parse().map_err(|_| err())?;
        Self::new(year, month).map_err(|_| err())
    }
}

impl TryFrom<String> for YearMonth {
    type Error = YearMonthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

/// A city, county or district listed under a province by the population
/// registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubArea {
    /// 10-digit administrative code.
    pub code: String,
    /// Province name.
    pub province_name: String,
    /// Sub-area name (e.g. "수원시 장안구").
    pub name: String,
}

/// Demographic counts for one area. Summable across areas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationCounts {
    /// Registered residents.
    pub total_population: u64,
    /// Registered households.
    pub households: u64,
    /// Male residents.
    pub male: u64,
    /// Female residents.
    pub female: u64,
    /// Residents aged 0-19.
    pub age_0_19: u64,
    /// Residents aged 20-39.
    pub age_20_39: u64,
    /// Residents aged 40-59.
    pub age_40_59: u64,
    /// Residents aged 60-79.
    pub age_60_79: u64,
    /// Residents aged 80 and over.
    pub age_80_plus: u64,
}

impl PopulationCounts {
    /// Returns the count selected by a [`Demographic`].
    #[must_use]
    pub const fn get(&self, demographic: Demographic) -> u64 {
        match demographic {
            Demographic::TotalPopulation => self.total_population,
            Demographic::Households => self.households,
            Demographic::Male => self.male,
            Demographic::Female => self.female,
            Demographic::Under20 => self.age_0_19,
            Demographic::Age20To39 => self.age_20_39,
            Demographic::Age40To59 => self.age_40_59,
            Demographic::Age60Plus => self.age_60_79 + self.age_80_plus,
        }
    }

    /// Returns `true` if age brackets were reported for this area.
    #[must_use]
    pub const fn has_age_brackets(&self) -> bool {
        self.age_0_19 + self.age_20_39 + self.age_40_59 + self.age_60_79 + self.age_80_plus > 0
    }
}

impl AddAssign for PopulationCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.total_population += rhs.total_population;
        self.households += rhs.households;
        self.male += rhs.male;
        self.female += rhs.female;
        self.age_0_19 += rhs.age_0_19;
        self.age_20_39 += rhs.age_20_39;
        self.age_40_59 += rhs.age_40_59;
        self.age_60_79 += rhs.age_60_79;
        self.age_80_plus += rhs.age_80_plus;
    }
}

impl Add for PopulationCounts {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl Sum for PopulationCounts {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl<'a> Sum<&'a Self> for PopulationCounts {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// Which population count is used as the demand side of the index.
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
pub enum Demographic {
    /// All registered residents.
    #[default]
    TotalPopulation,
    /// Registered households.
    Households,
    /// Male residents.
    Male,
    /// Female residents.
    Female,
    /// Residents under 20.
    Under20,
    /// Residents aged 20-39.
    #[strum(serialize = "age-20-39")]
    #[serde(rename = "age-20-39")]
    Age20To39,
    /// Residents aged 40-59.
    #[strum(serialize = "age-40-59")]
    #[serde(rename = "age-40-59")]
    Age40To59,
    /// Residents aged 60 and over.
    #[strum(serialize = "age-60-plus")]
    #[serde(rename = "age-60-plus")]
    Age60Plus,
}

impl Demographic {
    /// Returns `true` for the age brackets, which come from a separate
    /// registry page and may be missing.
    #[must_use]
    pub const fn is_age_bracket(self) -> bool {
        matches!(
            self,
            Self::Under20 | Self::Age20To39 | Self::Age40To59 | Self::Age60Plus
        )
    }
}

/// One row from the population registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationRecord {
    /// 10-digit administrative code of the area.
    pub area_code: String,
    /// Area name as reported.
    pub name: String,
    /// Province name.
    pub province_name: String,
    /// City/district name (empty for province-level rows).
    pub district_name: String,
    /// Reporting period.
    pub period: YearMonth,
    /// Demographic counts.
    pub counts: PopulationCounts,
}

/// One clinic/specialty row from the clinic registry.
///
/// The same facility appears once per requested specialty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicRecord {
    /// Registry facility identifier.
    pub facility_id: String,
    /// Facility name.
    pub name: String,
    /// Street address.
    pub address: String,
    /// Neighborhood name as reported by the clinic registry.
    pub neighborhood_name: String,
    /// 6-digit clinic registry province code.
    pub province_code: String,
    /// 6-digit clinic registry district code.
    pub district_code: String,
    /// District name.
    pub district_name: String,
    /// Facility class code (e.g. `"31"` for a clinic).
    pub facility_class_code: String,
    /// Facility class name.
    pub facility_class_name: String,
    /// Specialty code this row was fetched for.
    pub specialty_code: String,
    /// Specialty name.
    pub specialty_name: String,
    /// Board-certified specialists in this specialty.
    pub specialist_count: u32,
    /// All doctors at the facility.
    pub doctor_count: u32,
    /// Longitude (WGS84). `0.0` when the registry has none.
    pub longitude: f64,
    /// Latitude (WGS84). `0.0` when the registry has none.
    pub latitude: f64,
    /// Establishment date as reported (`YYYYMMDD`).
    pub established_on: Option<String>,
    /// 10-digit neighborhood code. `None` until geocoded.
    pub area_code: Option<String>,
}

impl ClinicRecord {
    /// Returns `true` if both coordinates are present (non-zero and finite).
    #[must_use]
    pub fn has_coordinates(&self) -> bool {
        self.longitude != 0.0
            && self.latitude != 0.0
            && self.longitude.is_finite()
            && self.latitude.is_finite()
    }
}

/// Query parameters for a clinic provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicQuery {
    /// 6-digit clinic registry province code.
    pub province_code: String,
    /// Optional 6-digit clinic registry district code.
    pub district_code: Option<String>,
    /// Specialty codes to fetch; one request series per code.
    pub specialty_codes: Vec<String>,
    /// Facility class codes to keep. Empty keeps every class.
    pub facility_classes: Vec<String>,
}
