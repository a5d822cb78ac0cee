//! Clinic registry client (HIRA hospital basis list).
//!
//! One request series is made per specialty, paging with `pageNo` /
//! `numOfRows` until `totalCount` rows have been collected. The registry
//! accepts a single `clCd` only, so multi-class filters are applied locally.

use std::sync::LazyLock;

use async_trait::async_trait;
use clinic_map_source_models::specialty::specialty_name;
use clinic_map_source_models::{ClinicQuery, ClinicRecord};
use regex::Regex;
use serde_json::Value;

use crate::registry::{self, CLINIC_PROVIDER, ProviderDefinition};
use crate::{ClinicProvider, SourceError, retry};

/// Result code of a successful response.
const RESULT_OK: &str = "00";

static AUTH_REASON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<returnReasonCode>\s*([^<]*?)\s*</returnReasonCode>")
        .unwrap_or_else(|_| unreachable!())
});

static AUTH_MESSAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<returnAuthMsg>\s*([^<]*?)\s*</returnAuthMsg>").unwrap_or_else(|_| unreachable!())
});

/// One decoded response page.
#[derive(Debug, Clone, PartialEq)]
pub struct HiraPage {
    /// `totalCount` reported by the registry.
    pub total: u64,
    /// Raw `item` objects.
    pub items: Vec<Value>,
}

/// HTTP client for the clinic registry.
pub struct HiraClient {
    definition: ProviderDefinition,
    client: reqwest::Client,
    api_key: String,
}

impl HiraClient {
    /// Creates a client from the embedded `clinic` provider definition,
    /// reading the API key from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if the API key variable is unset, or
    /// [`SourceError`] if the client cannot be built.
    pub fn new() -> Result<Self, SourceError> {
        let definition = registry::provider(CLINIC_PROVIDER)?;
        let api_key = definition.api_key()?;
        Self::with_api_key(definition, api_key)
    }

    /// Creates a client with an explicit definition and key.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the HTTP client cannot be built.
    pub fn with_api_key(
        definition: ProviderDefinition,
        api_key: impl Into<String>,
    ) -> Result<Self, SourceError> {
        let client = definition.client_builder()?.build()?;
        Ok(Self {
            definition,
            client,
            api_key: api_key.into(),
        })
    }

    async fn fetch_page(
        &self,
        query: &ClinicQuery,
        specialty: &str,
        page: u32,
    ) -> Result<Option<HiraPage>, SourceError> {
        let url = self.definition.endpoint("hospitals")?;
        let params = page_params(&self.api_key, query, specialty, page, self.definition.page_size);

        let Some(body) = retry::send_text(|| self.client.get(url).query(&params)).await? else {
            return Ok(None);
        };
        parse_page(&body).map(Some)
    }

    async fn fetch_specialty(
        &self,
        query: &ClinicQuery,
        specialty: &str,
    ) -> Result<Vec<ClinicRecord>, SourceError> {
        let mut items = Vec::new();
        let mut page = 1;

        let Some(first) = self.fetch_page(query, specialty, page).await? else {
            return Ok(Vec::new());
        };
        let total = first.total;
        let mut more = !first.items.is_empty();
        items.extend(first.items);

        while more && (items.len() as u64) < total {
            page += 1;
            tokio::time::sleep(self.definition.request_delay()).await;
            let Some(next) = self.fetch_page(query, specialty, page).await? else {
                log::warn!(
                    "[{}] page {page} of specialty {specialty} in {} exhausted retries; \
                     keeping {} of {total} rows",
                    self.definition.id,
                    query.province_code,
                    items.len()
                );
                break;
            };
            more = !next.items.is_empty();
            items.extend(next.items);
        }

        let records: Vec<ClinicRecord> = items
            .iter()
            .map(|item| clinic_from_item(item, specialty))
            .filter(|record| keeps_class(record, &query.facility_classes))
            .collect();

        log::info!(
            "[{}] specialty {specialty} in {}: {} of {total} rows kept",
            self.definition.id,
            query.province_code,
            records.len()
        );
        Ok(records)
    }
}

#[async_trait]
impl ClinicProvider for HiraClient {
    async fn clinics(&self, query: &ClinicQuery) -> Result<Vec<ClinicRecord>, SourceError> {
        let mut records = Vec::new();
        for (i, specialty) in query.specialty_codes.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.definition.request_delay()).await;
            }
            records.extend(self.fetch_specialty(query, specialty).await?);
        }
        Ok(records)
    }
}

/// Query string for one page of one specialty.
fn page_params(
    api_key: &str,
    query: &ClinicQuery,
    specialty: &str,
    page: u32,
    page_size: u32,
) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("serviceKey", api_key.to_string()),
        ("pageNo", page.to_string()),
        ("numOfRows", page_size.to_string()),
        ("dgsbjtCd", specialty.to_string()),
        ("_type", "json".to_string()),
    ];
    if !query.province_code.is_empty() {
        params.push(("sidoCd", query.province_code.clone()));
    }
    if let Some(district) = &query.district_code {
        params.push(("sgguCd", district.clone()));
    }
    if let [class] = query.facility_classes.as_slice() {
        params.push(("clCd", class.clone()));
    }
    params
}

fn keeps_class(record: &ClinicRecord, classes: &[String]) -> bool {
    classes.is_empty() || classes.iter().any(|c| *c == record.facility_class_code)
}

/// Decodes one response body.
///
/// # Errors
///
/// Returns [`SourceError::Provider`] if the registry reports a result code
/// other than `00` (or an authorization failure), and
/// [`SourceError::Parse`] if the body has no recognizable structure.
pub fn parse_page(body: &str) -> Result<HiraPage, SourceError> {
    let trimmed = body.trim_start();
    if !trimmed.starts_with('{') {
        return Err(auth_failure(trimmed).unwrap_or_else(|| SourceError::Parse {
            message: format!(
                "unexpected clinic registry response: {}",
                trimmed.chars().take(120).collect::<String>()
            ),
        }));
    }

    let root: Value = serde_json::from_str(trimmed)?;
    let response = root.get("response").unwrap_or(&root);

    let header = response.get("header");
    let code = header
        .and_then(|h| h.get("resultCode"))
        .map_or_else(|| RESULT_OK.to_string(), |v| scalar(Some(v)));
    if code != RESULT_OK {
        let message = header
            .and_then(|h| h.get("resultMsg"))
            .map_or_else(|| "Unknown error".to_string(), |v| scalar(Some(v)));
        return Err(SourceError::Provider { code, message });
    }

    let Some(body) = response.get("body") else {
        return Err(SourceError::Parse {
            message: "clinic registry response has no body".to_string(),
        });
    };

    let total = body
        .get("totalCount")
        .map_or(0, |v| scalar(Some(v)).parse().unwrap_or(0));

    let items = match body.get("items").and_then(|items| items.get("item")) {
        Some(Value::Array(items)) => items.clone(),
        Some(item @ Value::Object(_)) => vec![item.clone()],
        _ => Vec::new(),
    };

    Ok(HiraPage { total, items })
}

/// Recognizes the gateway's XML authorization error envelope.
fn auth_failure(body: &str) -> Option<SourceError> {
    let code = AUTH_REASON_RE.captures(body)?.get(1)?.as_str().to_string();
    let message = AUTH_MESSAGE_RE
        .captures(body)
        .and_then(|c| c.get(1))
        .map_or_else(|| "authorization failed".to_string(), |m| m.as_str().to_string());
    Some(SourceError::Provider { code, message })
}

/// Renders a JSON scalar as a trimmed string. Objects, arrays and nulls
/// become empty.
fn scalar(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Looks up a field ignoring ASCII case (`XPos` arrives as `xPos` from
/// some gateways).
fn field<'a>(item: &'a Value, name: &str) -> Option<&'a Value> {
    item.get(name).or_else(|| {
        item.as_object()?
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    })
}

fn text(item: &Value, name: &str) -> String {
    scalar(field(item, name))
}

fn count(item: &Value, name: &str) -> u32 {
    text(item, name).parse().unwrap_or(0)
}

fn coordinate(item: &Value, name: &str) -> f64 {
    text(item, name).parse().unwrap_or(0.0)
}

/// Converts one registry item into a [`ClinicRecord`] for `specialty`.
#[must_use]
pub fn clinic_from_item(item: &Value, specialty: &str) -> ClinicRecord {
    let established = text(item, "estbDd");
    ClinicRecord {
        facility_id: text(item, "ykiho"),
        name: text(item, "yadmNm"),
        address: text(item, "addr"),
        neighborhood_name: text(item, "emdongNm"),
        province_code: text(item, "sidoCd"),
        district_code: text(item, "sgguCd"),
        district_name: text(item, "sgguCdNm"),
        facility_class_code: text(item, "clCd"),
        facility_class_name: text(item, "clCdNm"),
        specialty_code: specialty.to_string(),
        specialty_name: specialty_name(specialty).to_string(),
        specialist_count: count(item, "mdeptSdrCnt"),
        doctor_count: count(item, "drTotCnt"),
        longitude: coordinate(item, "XPos"),
        latitude: coordinate(item, "YPos"),
        established_on: (!established.is_empty()).then_some(established),
        area_code: None,
    }
}

#[cfg(test)]
mod tests {
    use crate::test_server::TestServer;

    use super::*;

    fn query(classes: &[&str]) -> ClinicQuery {
        ClinicQuery {
            province_code: "110000".to_string(),
            district_code: None,
            specialty_codes: vec!["01".to_string()],
            facility_classes: classes.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn parses_item_array() {
        let body = r#"{"response":{"header":{"resultCode":"00","resultMsg":"NORMAL SERVICE."},
            "body":{"items":{"item":[
                {"yadmNm":"가내과의원","ykiho":"A1","clCd":"31","XPos":126.98,"YPos":37.57,"mdeptSdrCnt":2,"drTotCnt":"3"},
                {"yadmNm":"나병원","ykiho":"A2","clCd":"21","XPos":"127.01","YPos":"37.50","mdeptSdrCnt":"1"}
            ]},"numOfRows":100,"pageNo":1,"totalCount":2}}}"#;
        let page = parse_page(body).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 2);

        let first = clinic_from_item(&page.items[0], "01");
        assert_eq!(first.facility_id, "A1");
        assert_eq!(first.specialist_count, 2);
        assert_eq!(first.doctor_count, 3);
        assert!((first.longitude - 126.98).abs() < 1e-9);
        assert_eq!(first.specialty_name, "내과");
        assert!(first.established_on.is_none());

        let second = clinic_from_item(&page.items[1], "01");
        assert!((second.latitude - 37.50).abs() < 1e-9);
        assert_eq!(second.doctor_count, 0);
    }

    #[test]
    fn accepts_single_item_object_and_empty_items() {
        let single = r#"{"response":{"header":{"resultCode":"00"},
            "body":{"items":{"item":{"ykiho":"ONLY","xPos":"127.0","ypos":"37.0"}},"totalCount":"1"}}}"#;
        let page = parse_page(single).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items.len(), 1);
        let clinic = clinic_from_item(&page.items[0], "05");
        assert!(clinic.has_coordinates());

        let empty = r#"{"response":{"header":{"resultCode":"00"},"body":{"items":"","totalCount":0}}}"#;
        assert!(parse_page(empty).unwrap().items.is_empty());
    }

    #[test]
    fn non_zero_result_code_is_provider_error() {
        let body = r#"{"response":{"header":{"resultCode":"30","resultMsg":"SERVICE KEY IS NOT REGISTERED ERROR."}}}"#;
        match parse_page(body) {
            Err(SourceError::Provider { code, message }) => {
                assert_eq!(code, "30");
                assert!(message.contains("SERVICE KEY"));
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[test]
    fn xml_auth_envelope_is_provider_error() {
        let body = "<OpenAPI_ServiceResponse><cmmMsgHeader>\
            <returnAuthMsg>SERVICE_KEY_IS_NOT_REGISTERED_ERROR</returnAuthMsg>\
            <returnReasonCode>30</returnReasonCode></cmmMsgHeader></OpenAPI_ServiceResponse>";
        assert!(matches!(
            parse_page(body),
            Err(SourceError::Provider { ref code, .. }) if code == "30"
        ));
        assert!(matches!(parse_page("<html/>"), Err(SourceError::Parse { .. })));
    }

    #[test]
    fn class_code_sent_only_for_single_class() {
        let one = page_params("key", &query(&["31"]), "01", 1, 100);
        assert!(one.iter().any(|(k, v)| *k == "clCd" && v == "31"));
        assert!(one.iter().any(|(k, v)| *k == "sidoCd" && v == "110000"));
        assert!(!one.iter().any(|(k, _)| *k == "sgguCd"));

        let many = page_params("key", &query(&["31", "21"]), "01", 2, 100);
        assert!(!many.iter().any(|(k, _)| *k == "clCd"));
        assert!(many.iter().any(|(k, v)| *k == "pageNo" && v == "2"));
    }

    #[test]
    fn filters_classes_locally() {
        let item: Value = serde_json::json!({"clCd": "28"});
        let clinic = clinic_from_item(&item, "01");
        assert!(keeps_class(&clinic, &[]));
        assert!(!keeps_class(&clinic, &["31".to_string(), "21".to_string()]));
        assert!(keeps_class(&clinic, &["28".to_string()]));
    }

    #[tokio::test(start_paused = true)]
    async fn later_page_exhaustion_keeps_earlier_rows() {
        let server = TestServer::start(&[
            r#"200 OK|{"response":{"header":{"resultCode":"00"},"body":{"items":{"item":
                {"yadmNm":"가내과의원","ykiho":"A1","clCd":"31","XPos":126.98,"YPos":37.57}},
                "totalCount":3}}}"#,
            "503 Service Unavailable",
        ])
        .await;
        let definition = registry::parse_provider_toml(&format!(
            "id = \"clinic\"\nname = \"local\"\npage_size = 1\nrequest_delay_ms = 0\n\
             timeout_secs = 3600\n\n[endpoints]\nhospitals = \"{}\"\n",
            server.url
        ))
        .unwrap();
        let client = HiraClient::with_api_key(definition, "key").unwrap();

        let records = client.fetch_specialty(&query(&["31"]), "01").await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].facility_id, "A1");
        // page 1, then page 2 with every retry
        assert_eq!(server.hits(), 1 + 1 + retry::MAX_RETRIES as usize);
    }
}
