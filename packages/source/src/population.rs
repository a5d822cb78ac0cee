//! Resident registration population statistics client.
//!
//! Two sites are involved. The household/population statistics pages
//! (`rdoa`) need a `jsessionid` path parameter scraped from the landing
//! page; the monthly age statistics form (`jumin`) needs a cookie session.
//! Both answer with HTML tables which are parsed with [`crate::html`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use async_trait::async_trait;
use clinic_map_geography_models::AreaLevel;
use clinic_map_source_models::{PopulationCounts, PopulationRecord, SubArea, YearMonth};
use regex::Regex;
use tokio::sync::Mutex;

use crate::registry::{self, POPULATION_PROVIDER, ProviderDefinition};
use crate::{PopulationProvider, SourceError, html, retry};

/// Minimum cells in a household/population row.
const MIN_POPULATION_CELLS: usize = 8;

/// Minimum cells in an age row (code, name, total, one filler column and
/// at least nine decade columns).
const MIN_AGE_CELLS: usize = 13;

const NATIONWIDE_CODE: &str = "0000000000";

static SESSION_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"jsessionid=([A-Za-z0-9+._-]+)").unwrap_or_else(|_| unreachable!())
});

/// HTTP client for the resident registration statistics sites.
pub struct ResidentRegistryClient {
    definition: ProviderDefinition,
    stats: reqwest::Client,
    session_id: Mutex<Option<String>>,
    age_session: Mutex<Option<reqwest::Client>>,
}

impl ResidentRegistryClient {
    /// Creates a client from the embedded `population` provider definition.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the definition is missing or the HTTP
    /// client cannot be built.
    pub fn new() -> Result<Self, SourceError> {
        Self::with_definition(registry::provider(POPULATION_PROVIDER)?)
    }

    /// Creates a client from an explicit provider definition.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the HTTP client cannot be built.
    pub fn with_definition(definition: ProviderDefinition) -> Result<Self, SourceError> {
        let stats = definition.client_builder()?.cookie_store(true).build()?;
        Ok(Self {
            definition,
            stats,
            session_id: Mutex::new(None),
            age_session: Mutex::new(None),
        })
    }

    async fn session_id(&self) -> Result<String, SourceError> {
        let mut guard = self.session_id.lock().await;
        if let Some(id) = guard.as_ref() {
            return Ok(id.clone());
        }

        let landing = self.definition.endpoint("landing")?;
        let page = retry::send_text(|| self.stats.get(landing))
            .await?
            .unwrap_or_default();
        let id = extract_session_id(&page).unwrap_or_default();
        if id.is_empty() {
            log::warn!("No jsessionid found on {landing}, continuing without one");
        } else {
            log::debug!("Statistics session established");
        }
        *guard = Some(id.clone());
        Ok(id)
    }

    /// Fetches the household/population table, page by page.
    async fn fetch_population_rows(
        &self,
        area_code: &str,
        period: YearMonth,
        level: AreaLevel,
    ) -> Result<Vec<PopulationRecord>, SourceError> {
        let session = self.session_id().await?;
        let url = with_session(self.definition.endpoint("population")?, &session);
        let page_size = self.definition.page_size as usize;

        let mut records = Vec::new();
        let mut seen = BTreeSet::new();
        let mut page = 1u32;

        loop {
            let form = population_form(area_code, period, level, page);
            let Some(body) = retry::send_text(|| self.stats.post(&url).form(&form)).await? else {
                break;
            };

            let rows = html::table_rows(&body, 2);
            if rows.is_empty() {
                break;
            }

            let mut fresh = 0usize;
            for record in parse_population_rows(&rows, level, period) {
                if seen.insert(record.area_code.clone()) {
                    records.push(record);
                    fresh += 1;
                }
            }

            if rows.len() < page_size || fresh == 0 {
                break;
            }
            page += 1;
            tokio::time::sleep(self.definition.request_delay()).await;
        }

        log::debug!(
            "Fetched {} population rows for {area_code} ({period}, {level:?})",
            records.len()
        );
        Ok(records)
    }

    async fn age_client(&self) -> Result<reqwest::Client, SourceError> {
        let mut guard = self.age_session.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let client = self.definition.client_builder()?.cookie_store(true).build()?;
        client
            .get(self.definition.endpoint("age")?)
            .send()
            .await?;
        *guard = Some(client.clone());
        Ok(client)
    }

    async fn reset_age_session(&self) {
        *self.age_session.lock().await = None;
    }

    /// Fetches the monthly age table. Follows the shared retry schedule,
    /// except that every failed attempt also drops the cookie session so the
    /// next one starts from a fresh landing page. After
    /// [`retry::MAX_RETRIES`] retries the table is treated as empty.
    async fn fetch_age_rows(
        &self,
        area_code: &str,
        period: YearMonth,
        level: AreaLevel,
    ) -> Result<Vec<AgeRow>, SourceError> {
        let url = self.definition.endpoint("age")?;
        let form = age_form(area_code, period, level);

        for attempt in 0..=retry::MAX_RETRIES {
            if attempt > 0 {
                let delay = retry::backoff(attempt);
                log::warn!(
                    "  age statistics retry {attempt}/{} in {delay:?}...",
                    retry::MAX_RETRIES
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self.age_client().await {
                Ok(client) => retry::attempt(client.post(url).form(&form)).await?,
                Err(SourceError::Http(e)) if retry::is_transient(&e) => {
                    log::warn!("  age statistics session failed: {e}");
                    None
                }
                Err(e) => return Err(e),
            };

            match response {
                Some(response) => {
                    let body = response.text().await?;
                    return Ok(parse_age_rows(&html::table_rows(&body, 2)));
                }
                None => self.reset_age_session().await,
            }
        }

        log::warn!(
            "Age statistics for {area_code} unavailable after {} retries",
            retry::MAX_RETRIES
        );
        Ok(Vec::new())
    }
}

#[async_trait]
impl PopulationProvider for ResidentRegistryClient {
    async fn sub_areas(&self, province_code: &str) -> Result<Vec<SubArea>, SourceError> {
        let session = self.session_id().await?;
        let url = with_session(self.definition.endpoint("sub_areas")?, &session);
        let prefix: String = province_code.chars().take(2).collect();

        let Some(body) =
            retry::send_text(|| self.stats.get(&url).query(&[("admmCd", prefix.as_str())])).await?
        else {
            return Ok(Vec::new());
        };

        parse_sub_areas(&body)
    }

    async fn population(
        &self,
        area_code: &str,
        period: YearMonth,
        level: AreaLevel,
    ) -> Result<Vec<PopulationRecord>, SourceError> {
        let records = self.fetch_population_rows(area_code, period, level).await?;
        tokio::time::sleep(self.definition.request_delay()).await;
        let ages = self.fetch_age_rows(area_code, period, level).await?;

        Ok(merge_age_rows(records, ages, period))
    }
}

/// One row of the monthly age table.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AgeRow {
    code: String,
    name: String,
    total: u64,
    brackets: PopulationCounts,
}

/// Extracts the `jsessionid` embedded in a page's links.
#[must_use]
pub fn extract_session_id(page: &str) -> Option<String> {
    SESSION_ID_RE
        .captures(page)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn with_session(endpoint: &str, session: &str) -> String {
    if session.is_empty() {
        endpoint.to_string()
    } else {
        format!("{endpoint};jsessionid={session}")
    }
}

/// Registry level code: `1` national, `2` city/district, `3` neighborhood.
const fn level_code(level: AreaLevel) -> &'static str {
    match level {
        AreaLevel::National => "1",
        AreaLevel::City => "2",
        AreaLevel::Neighborhood => "3",
    }
}

fn province_prefix(area_code: &str) -> String {
    area_code.chars().take(2).collect()
}

fn province_root(area_code: &str) -> String {
    format!("{}00000000", province_prefix(area_code))
}

fn target_code(area_code: &str, level: AreaLevel) -> String {
    match level {
        AreaLevel::National => NATIONWIDE_CODE.to_string(),
        AreaLevel::City => province_root(area_code),
        AreaLevel::Neighborhood => area_code.to_string(),
    }
}

fn population_form(
    area_code: &str,
    period: YearMonth,
    level: AreaLevel,
    page: u32,
) -> Vec<(&'static str, String)> {
    let year = format!("{:04}", period.year());
    let month = format!("{:02}", period.month());
    let lv = level_code(level);
    let province = if level == AreaLevel::National {
        String::new()
    } else {
        province_prefix(area_code)
    };
    let district = if level == AreaLevel::Neighborhood {
        area_code.to_string()
    } else {
        String::new()
    };

    vec![
        ("ctpvCd", province),
        ("sggCd", district),
        ("dongCd", String::new()),
        ("lv", lv.to_string()),
        ("regSeCd", "1".to_string()),
        ("srchFrYear", year.clone()),
        ("srchFrMon", month.clone()),
        ("srchToYear", year),
        ("srchToMon", month),
        ("curPage", page.to_string()),
        (
            "paramUrl",
            format!(
                "admmCd={}&lv={lv}&regSeCd=1&srchFrYm={period}&srchToYm={period}",
                target_code(area_code, level)
            ),
        ),
    ]
}

fn age_form(area_code: &str, period: YearMonth, level: AreaLevel) -> Vec<(&'static str, String)> {
    let year = format!("{:04}", period.year());
    let month = format!("{:02}", period.month());
    let first_level = if level == AreaLevel::National {
        NATIONWIDE_CODE.to_string()
    } else {
        province_root(area_code)
    };

    vec![
        ("tableChart", "T".to_string()),
        ("sltOrgType", level_code(level).to_string()),
        ("nowYear", year.clone()),
        ("sltOrgLvl1", first_level),
        ("sltOrgLvl2", target_code(area_code, level)),
        ("gender", "gender".to_string()),
        ("sum", "sum".to_string()),
        ("searchYearStart", year.clone()),
        ("searchMonthStart", month.clone()),
        ("searchYearEnd", year.clone()),
        ("searchMonthEnd", month.clone()),
        ("sltOrderType", "1".to_string()),
        ("sltOrderValue", "ASC".to_string()),
        ("sltArgTypes", "10".to_string()),
        ("category", "month".to_string()),
        ("startOrtnDe", format!("{year}{month}01")),
        ("endOrtnDe", format!("{year}{month}{:02}", period.last_day())),
        ("searchYearMonth", "month".to_string()),
    ]
}

fn is_code(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

fn json_string(value: Option<&serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Parses the sub-area list. Anything other than a JSON array means the
/// registry has nothing for that province.
///
/// # Errors
///
/// Returns [`SourceError::Json`] if the body looks like an array but is
/// not valid JSON.
pub fn parse_sub_areas(body: &str) -> Result<Vec<SubArea>, SourceError> {
    if !body.trim_start().starts_with('[') {
        return Ok(Vec::new());
    }

    let items: Vec<serde_json::Value> = serde_json::from_str(body)?;
    Ok(items
        .iter()
        .map(|item| SubArea {
            code: json_string(item.get("admmCd")),
            province_name: json_string(item.get("ctpvNm")),
            name: json_string(item.get("sggNm")),
        })
        .filter(|area| is_code(&area.code))
        .collect())
}

/// Interprets household/population table rows.
///
/// Row layout: period, code, province, district, [neighborhood], ...,
/// total, households, average household size, male, female, sex ratio.
/// Nationwide and subtotal rows are skipped, as are rows whose code column
/// is not numeric (headers). The first row per code wins.
fn parse_population_rows(
    rows: &[Vec<String>],
    level: AreaLevel,
    requested: YearMonth,
) -> Vec<PopulationRecord> {
    let mut seen = BTreeSet::new();
    let mut records = Vec::new();

    for row in rows {
        let n = row.len();
        if n < MIN_POPULATION_CELLS {
            continue;
        }
        let joined = row.concat();
        if row[0].contains("전국") || joined.contains("소계") || joined.contains("합계") {
            continue;
        }
        let code = row[1].trim();
        if !is_code(code) || !seen.insert(code.to_string()) {
            continue;
        }

        let period = row[0].replace('.', "").parse().unwrap_or(requested);
        let name = match level {
            AreaLevel::Neighborhood => &row[4],
            AreaLevel::City => &row[3],
            AreaLevel::National => &row[2],
        };

        records.push(PopulationRecord {
            area_code: code.to_string(),
            name: name.clone(),
            province_name: row[2].clone(),
            district_name: row[3].clone(),
            period,
            counts: PopulationCounts {
                total_population: html::parse_count(&row[n - 6]),
                households: html::parse_count(&row[n - 5]),
                male: html::parse_count(&row[n - 3]),
                female: html::parse_count(&row[n - 2]),
                ..PopulationCounts::default()
            },
        });
    }

    records
}

/// Interprets monthly age table rows: code, name, total, one filler
/// column, then decades 0-9, 10-19, ..., 90-99 and 100+.
fn parse_age_rows(rows: &[Vec<String>]) -> Vec<AgeRow> {
    rows.iter()
        .filter(|row| row.len() >= MIN_AGE_CELLS)
        .filter(|row| is_code(&row[0]) && row[0] != NATIONWIDE_CODE)
        .map(|row| {
            let decade = |i: usize| row.get(4 + i).map_or(0, |v| html::parse_count(v));
            AgeRow {
                code: row[0].clone(),
                name: row[1].clone(),
                total: html::parse_count(&row[2]),
                brackets: PopulationCounts {
                    age_0_19: decade(0) + decade(1),
                    age_20_39: decade(2) + decade(3),
                    age_40_59: decade(4) + decade(5),
                    age_60_79: decade(6) + decade(7),
                    age_80_plus: decade(8) + decade(9) + decade(10),
                    ..PopulationCounts::default()
                },
            }
        })
        .collect()
}

/// Attaches age brackets to population rows by area code.
///
/// With no population rows the age table alone is returned, its total
/// standing in for the population total.
fn merge_age_rows(
    records: Vec<PopulationRecord>,
    ages: Vec<AgeRow>,
    period: YearMonth,
) -> Vec<PopulationRecord> {
    if records.is_empty() {
        return ages
            .into_iter()
            .map(|age| PopulationRecord {
                area_code: age.code,
                name: age.name,
                province_name: String::new(),
                district_name: String::new(),
                period,
                counts: PopulationCounts {
                    total_population: age.total,
                    ..age.brackets
                },
            })
            .collect();
    }

    let by_code: BTreeMap<String, PopulationCounts> = ages
        .into_iter()
        .map(|age| (age.code, age.brackets))
        .collect();

    records
        .into_iter()
        .map(|mut record| {
            if let Some(brackets) = by_code.get(&record.area_code) {
                record.counts.age_0_19 = brackets.age_0_19;
                record.counts.age_20_39 = brackets.age_20_39;
                record.counts.age_40_59 = brackets.age_40_59;
                record.counts.age_60_79 = brackets.age_60_79;
                record.counts.age_80_plus = brackets.age_80_plus;
            }
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::test_server::TestServer;

    use super::*;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    fn period() -> YearMonth {
        "202412".parse().unwrap()
    }

    #[test]
    fn extracts_session_id_from_links() {
        let page = r#"<a href="/openStats/selectSggList;jsessionid=AbC.12_x-9+Z?x=1">"#;
        assert_eq!(extract_session_id(page).as_deref(), Some("AbC.12_x-9+Z"));
        assert_eq!(extract_session_id("<html></html>"), None);
        assert_eq!(with_session("https://h/p", ""), "https://h/p");
        assert_eq!(with_session("https://h/p", "abc"), "https://h/p;jsessionid=abc");
    }

    #[test]
    fn parses_sub_area_list() {
        let body = r#"[
            {"admmCd": "4111000000", "ctpvNm": "경기도", "sggNm": "수원시"},
            {"admmCd": "4111100000", "ctpvNm": "경기도", "sggNm": "수원시 장안구"},
            {"admmCd": "", "ctpvNm": "경기도", "sggNm": "?"}
        ]"#;
        let areas = parse_sub_areas(body).unwrap();
        assert_eq!(areas.len(), 2);
        assert_eq!(areas[1].code, "4111100000");
        assert_eq!(areas[1].name, "수원시 장안구");
        assert_eq!(areas[0].province_name, "경기도");
    }

    #[test]
    fn non_array_sub_area_body_is_empty() {
        assert!(parse_sub_areas("<html>error</html>").unwrap().is_empty());
        assert!(parse_sub_areas("[not json").is_err());
    }

    #[test]
    fn parses_neighborhood_rows() {
        let rows = vec![
            cells(&[
                "통계년월", "행정기관코드", "시도명", "시군구명", "읍면동명", "총인구수", "세대수",
                "세대당", "남자", "여자", "남여비율",
            ]),
            cells(&[
                "2024.12", "1111000000", "서울특별시", "종로구", "소계", "139,417", "72,000",
                "1.94", "67,000", "72,417", "0.93",
            ]),
            cells(&[
                "2024.12", "1111051500", "서울특별시", "종로구", "청운효자동", "11,234", "5,000",
                "2.25", "5,300", "5,934", "0.89",
            ]),
            cells(&["2024.12", "1111053000", "서울특별시"]),
        ];
        let records = parse_population_rows(&rows, AreaLevel::Neighborhood, period());
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.area_code, "1111051500");
        assert_eq!(r.name, "청운효자동");
        assert_eq!(r.district_name, "종로구");
        assert_eq!(r.period, period());
        assert_eq!(r.counts.total_population, 11_234);
        assert_eq!(r.counts.households, 5_000);
        assert_eq!(r.counts.male, 5_300);
        assert_eq!(r.counts.female, 5_934);
    }

    #[test]
    fn city_rows_take_name_from_district_column() {
        let rows = vec![
            cells(&[
                "2024.12", "전국", "", "", "51,217,221", "24,000,000", "2.1", "25,000,000",
                "26,217,221", "0.98",
            ]),
            cells(&[
                "2024.12", "4111000000", "경기도", "수원시", "1,190,000", "520,000", "2.29",
                "595,000", "595,000", "1.00",
            ]),
            cells(&[
                "2024.12", "4111000000", "경기도", "수원시", "1", "1", "1", "1", "1", "1",
            ]),
        ];
        let records = parse_population_rows(&rows, AreaLevel::City, period());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "수원시");
        assert_eq!(records[0].counts.total_population, 1_190_000);
    }

    #[test]
    fn folds_decades_into_brackets() {
        let rows = vec![
            cells(&[
                "1111051500", "청운효자동", "1,100", "x", "10", "20", "30", "40", "50", "60",
                "70", "80", "90", "100", "5",
            ]),
            cells(&[
                "0000000000", "전국", "1", "x", "1", "1", "1", "1", "1", "1", "1", "1", "1", "1",
                "1",
            ]),
            cells(&["1111053000", "사직동", "10", "x", "1", "1"]),
        ];
        let ages = parse_age_rows(&rows);
        assert_eq!(ages.len(), 1);
        let b = &ages[0].brackets;
        assert_eq!(ages[0].total, 1_100);
        assert_eq!(b.age_0_19, 30);
        assert_eq!(b.age_20_39, 70);
        assert_eq!(b.age_40_59, 110);
        assert_eq!(b.age_60_79, 150);
        assert_eq!(b.age_80_plus, 195);
    }

    #[test]
    fn short_age_rows_default_missing_decades() {
        let rows = vec![cells(&[
            "1111051500", "청운효자동", "100", "x", "1", "2", "3", "4", "5", "6", "7", "8", "9",
        ])];
        let ages = parse_age_rows(&rows);
        assert_eq!(ages[0].brackets.age_80_plus, 9);
    }

    #[test]
    fn merges_ages_by_code() {
        let record = PopulationRecord {
            area_code: "1111051500".to_string(),
            name: "청운효자동".to_string(),
            province_name: "서울특별시".to_string(),
            district_name: "종로구".to_string(),
            period: period(),
            counts: PopulationCounts {
                total_population: 100,
                ..PopulationCounts::default()
            },
        };
        let age = AgeRow {
            code: "1111051500".to_string(),
            name: "청운효자동".to_string(),
            total: 999,
            brackets: PopulationCounts {
                age_0_19: 20,
                age_80_plus: 5,
                ..PopulationCounts::default()
            },
        };
        let merged = merge_age_rows(vec![record], vec![age.clone()], period());
        assert_eq!(merged[0].counts.total_population, 100);
        assert_eq!(merged[0].counts.age_0_19, 20);
        assert_eq!(merged[0].counts.age_80_plus, 5);

        let age_only = merge_age_rows(Vec::new(), vec![age], period());
        assert_eq!(age_only[0].counts.total_population, 999);
        assert_eq!(age_only[0].counts.age_0_19, 20);
    }

    #[test]
    fn forms_target_the_requested_level() {
        let form = population_form("4111100000", period(), AreaLevel::Neighborhood, 2);
        let get = |k: &str| form.iter().find(|(key, _)| *key == k).map(|(_, v)| v.clone());
        assert_eq!(get("ctpvCd").as_deref(), Some("41"));
        assert_eq!(get("sggCd").as_deref(), Some("4111100000"));
        assert_eq!(get("lv").as_deref(), Some("3"));
        assert_eq!(get("curPage").as_deref(), Some("2"));
        assert_eq!(
            get("paramUrl").as_deref(),
            Some("admmCd=4111100000&lv=3&regSeCd=1&srchFrYm=202412&srchToYm=202412")
        );

        let form = age_form("4100000000", period(), AreaLevel::City);
        let get = |k: &str| form.iter().find(|(key, _)| *key == k).map(|(_, v)| v.clone());
        assert_eq!(get("sltOrgLvl1").as_deref(), Some("4100000000"));
        assert_eq!(get("sltOrgLvl2").as_deref(), Some("4100000000"));
        assert_eq!(get("endOrtnDe").as_deref(), Some("20241231"));
    }

    fn local_definition(url: &str) -> ProviderDefinition {
        registry::parse_provider_toml(&format!(
            "id = \"population\"\nname = \"local\"\npage_size = 10\n\
             request_delay_ms = 0\ntimeout_secs = 3600\n\n[endpoints]\nage = \"{url}\"\n"
        ))
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn age_table_follows_shared_retry_schedule() {
        let server = TestServer::start(&["503 Service Unavailable"]).await;
        let client = ResidentRegistryClient::with_definition(local_definition(&server.url)).unwrap();
        let started = tokio::time::Instant::now();

        let rows = client
            .fetch_age_rows("1100000000", period(), AreaLevel::City)
            .await
            .unwrap();

        assert!(rows.is_empty());
        let attempts = 1 + retry::MAX_RETRIES as usize;
        assert_eq!(server.count("POST"), attempts);
        // every attempt re-opens the cookie session
        assert_eq!(server.count("GET"), attempts);
        assert!(started.elapsed() >= Duration::from_secs(1 + 2 + 4));
    }

    #[tokio::test(start_paused = true)]
    async fn age_form_client_error_is_not_retried() {
        let server = TestServer::start(&["200 OK", "404 Not Found"]).await;
        let client = ResidentRegistryClient::with_definition(local_definition(&server.url)).unwrap();

        let result = client
            .fetch_age_rows("1100000000", period(), AreaLevel::City)
            .await;

        assert!(matches!(result, Err(SourceError::Provider { ref code, .. }) if code == "404"));
        assert_eq!(server.count("POST"), 1);
    }
}
