//! In-memory providers and fixtures for the pipeline tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use clinic_map_geography_models::AreaLevel;
use clinic_map_source::progress::ProgressCallback;
use clinic_map_source::{ClinicProvider, PopulationProvider, SourceError};
use clinic_map_source_models::{
    ClinicQuery, ClinicRecord, PopulationCounts, PopulationRecord, SubArea, YearMonth,
};
use clinic_map_spatial::BoundaryIndex;

fn failure(code: &str) -> SourceError {
    SourceError::Provider {
        code: "99".to_string(),
        message: format!("fake failure for {code}"),
    }
}

/// Population rows keyed by `(area code, period)`.
#[derive(Default)]
pub struct FakePopulation {
    rows: BTreeMap<(String, String), Vec<PopulationRecord>>,
    sub_areas: BTreeMap<String, Vec<SubArea>>,
    failing: BTreeSet<String>,
}

impl FakePopulation {
    pub fn with_rows(mut self, area_code: &str, period: &str, rows: Vec<PopulationRecord>) -> Self {
        self.rows
            .insert((area_code.to_string(), period.to_string()), rows);
        self
    }

    pub fn with_sub_areas(mut self, province_code: &str, sub_areas: Vec<SubArea>) -> Self {
        self.sub_areas.insert(province_code.to_string(), sub_areas);
        self
    }

    pub fn failing(mut self, area_code: &str) -> Self {
        self.failing.insert(area_code.to_string());
        self
    }
}

#[async_trait]
impl PopulationProvider for FakePopulation {
    async fn sub_areas(&self, province_code: &str) -> Result<Vec<SubArea>, SourceError> {
        if self.failing.contains(province_code) {
            return Err(failure(province_code));
        }
        Ok(self
            .sub_areas
            .get(province_code)
            .cloned()
            .unwrap_or_default())
    }

    async fn population(
        &self,
        area_code: &str,
        period: YearMonth,
        _level: AreaLevel,
    ) -> Result<Vec<PopulationRecord>, SourceError> {
        if self.failing.contains(area_code) {
            return Err(failure(area_code));
        }
        Ok(self
            .rows
            .get(&(area_code.to_string(), period.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

/// Clinic rows keyed by clinic registry province code.
#[derive(Default)]
pub struct FakeClinics {
    rows: BTreeMap<String, Vec<ClinicRecord>>,
    failing: BTreeSet<String>,
}

impl FakeClinics {
    pub fn with_rows(mut self, province_code: &str, rows: Vec<ClinicRecord>) -> Self {
        self.rows.insert(province_code.to_string(), rows);
        self
    }

    pub fn failing(mut self, province_code: &str) -> Self {
        self.failing.insert(province_code.to_string());
        self
    }
}

#[async_trait]
impl ClinicProvider for FakeClinics {
    async fn clinics(&self, query: &ClinicQuery) -> Result<Vec<ClinicRecord>, SourceError> {
        if self.failing.contains(&query.province_code) {
            return Err(failure(&query.province_code));
        }
        Ok(self
            .rows
            .get(&query.province_code)
            .into_iter()
            .flatten()
            .filter(|c| query.specialty_codes.contains(&c.specialty_code))
            .cloned()
            .collect())
    }
}

/// Records progress updates as strings. Per-area messages are dropped.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<String>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl ProgressCallback for RecordingProgress {
    fn set_total(&self, total: u64) {
        self.push(format!("total {total}"));
    }

    fn inc(&self, _delta: u64) {
        self.push("inc".to_string());
    }

    fn set_message(&self, _msg: String) {}

    fn finish(&self, msg: String) {
        self.push(format!("finish {msg}"));
    }
}

pub fn record(area_code: &str, name: &str, total_population: u64) -> PopulationRecord {
    PopulationRecord {
        area_code: area_code.to_string(),
        name: name.to_string(),
        province_name: String::new(),
        district_name: String::new(),
        period: YearMonth::new(2024, 12).unwrap(),
        counts: PopulationCounts {
            total_population,
            ..PopulationCounts::default()
        },
    }
}

pub fn sub_area(code: &str, name: &str) -> SubArea {
    SubArea {
        code: code.to_string(),
        province_name: String::new(),
        name: name.to_string(),
    }
}

pub fn clinic(
    facility_id: &str,
    specialty_code: &str,
    longitude: f64,
    latitude: f64,
    district_code: &str,
) -> ClinicRecord {
    ClinicRecord {
        facility_id: facility_id.to_string(),
        name: format!("clinic {facility_id}"),
        address: String::new(),
        neighborhood_name: String::new(),
        province_code: String::new(),
        district_code: district_code.to_string(),
        district_name: String::new(),
        facility_class_code: "31".to_string(),
        facility_class_name: "의원".to_string(),
        specialty_code: specialty_code.to_string(),
        specialty_name: String::new(),
        specialist_count: 1,
        doctor_count: 1,
        longitude,
        latitude,
        established_on: None,
        area_code: None,
    }
}

fn square(x0: f64, y0: f64) -> String {
    let (x1, y1) = (x0 + 1.0, y0 + 1.0);
    format!(
        r#"{{"type":"Polygon","coordinates":[[[{x0},{y0}],[{x1},{y0}],[{x1},{y1}],[{x0},{y1}],[{x0},{y0}]]]}}"#
    )
}

/// Two overlapping Jongno squares and one Suwon ward square.
pub fn boundaries() -> BoundaryIndex {
    let text = format!(
        r#"{{"type":"FeatureCollection","features":[
            {{"type":"Feature","properties":{{"adm_cd2":"1111051500","adm_nm":"청운효자동"}},"geometry":{a}}},
            {{"type":"Feature","properties":{{"adm_cd2":"1111053000","adm_nm":"사직동"}},"geometry":{b}}},
            {{"type":"Feature","properties":{{"adm_cd2":"4111151000","adm_nm":"파장동"}},"geometry":{c}}}
        ]}}"#,
        a = square(126.0, 37.0),
        b = square(126.5, 37.5),
        c = square(128.0, 37.0),
    );
    BoundaryIndex::from_geojson_str(&text).unwrap()
}
