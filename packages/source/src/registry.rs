//! Provider registry: endpoint definitions loaded from embedded TOML.
//!
//! Each `.toml` file in `packages/source/providers/` is baked into the
//! binary at compile time via [`include_str!`].

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::SourceError;

/// Identifier of the population registry definition.
pub const POPULATION_PROVIDER: &str = "population";

/// Identifier of the clinic registry definition.
pub const CLINIC_PROVIDER: &str = "clinic";

/// TOML configs embedded at compile time.
const PROVIDER_TOMLS: &[(&str, &str)] = &[
    (POPULATION_PROVIDER, include_str!("../providers/population.toml")),
    (CLINIC_PROVIDER, include_str!("../providers/clinic.toml")),
];

/// Endpoints and request pacing for one registry.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderDefinition {
    /// Unique identifier (e.g. `"clinic"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Rows requested per page.
    pub page_size: u32,
    /// Pause between consecutive requests, in milliseconds.
    pub request_delay_ms: u64,
    /// Per-request timeout, in seconds.
    pub timeout_secs: u64,
    /// Environment variable holding the API key, if the registry needs one.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Named endpoint URLs.
    pub endpoints: BTreeMap<String, String>,
    /// Headers sent with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl ProviderDefinition {
    /// Returns the URL of a named endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if the endpoint is not defined.
    pub fn endpoint(&self, key: &str) -> Result<&str, SourceError> {
        self.endpoints
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| SourceError::Config {
                message: format!("provider '{}' has no '{key}' endpoint", self.id),
            })
    }

    /// Reads the API key from the environment variable named by
    /// `api_key_env`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if no variable is configured, or it
    /// is unset or empty.
    pub fn api_key(&self) -> Result<String, SourceError> {
        let var = self.api_key_env.as_deref().ok_or_else(|| SourceError::Config {
            message: format!("provider '{}' does not declare an API key", self.id),
        })?;
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            _ => Err(SourceError::Config {
                message: format!("{var} is not set"),
            }),
        }
    }

    /// Pause between consecutive requests.
    #[must_use]
    pub const fn request_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.request_delay_ms)
    }

    /// Builds a [`reqwest::Client`] with this definition's timeout and
    /// default headers.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if a header is invalid or the client cannot
    /// be built.
    pub fn client_builder(&self) -> Result<reqwest::ClientBuilder, SourceError> {
        let mut headers = reqwest::header::HeaderMap::new();
        for (key, value) in &self.headers {
            let name = reqwest::header::HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                SourceError::Config {
                    message: format!("invalid header name '{key}': {e}"),
                }
            })?;
            let value = reqwest::header::HeaderValue::from_str(value).map_err(|e| {
                SourceError::Config {
                    message: format!("invalid value for header '{key}': {e}"),
                }
            })?;
            headers.insert(name, value);
        }
        Ok(reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(self.timeout_secs)))
    }
}

/// Parses a provider definition from TOML.
///
/// # Errors
///
/// Returns [`toml::de::Error`] if the TOML is malformed.
pub fn parse_provider_toml(toml_str: &str) -> Result<ProviderDefinition, toml::de::Error> {
    toml::de::from_str(toml_str)
}

/// Returns all embedded provider definitions.
///
/// # Errors
///
/// Returns [`SourceError::Config`] if an embedded TOML file is malformed.
pub fn all_providers() -> Result<Vec<ProviderDefinition>, SourceError> {
    PROVIDER_TOMLS
        .iter()
        .map(|(name, toml)| {
            parse_provider_toml(toml).map_err(|e| SourceError::Config {
                message: format!("failed to parse {name}.toml: {e}"),
            })
        })
        .collect()
}

/// Returns the embedded provider definition with the given id.
///
/// # Errors
///
/// Returns [`SourceError::Config`] if no such provider exists or its TOML
/// is malformed.
pub fn provider(id: &str) -> Result<ProviderDefinition, SourceError> {
    all_providers()?
        .into_iter()
        .find(|p| p.id == id)
        .ok_or_else(|| SourceError::Config {
            message: format!("unknown provider '{id}'"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_all_providers() {
        let providers = all_providers().unwrap();
        assert_eq!(providers.len(), PROVIDER_TOMLS.len());
        for p in &providers {
            assert!(!p.name.is_empty(), "{}: empty name", p.id);
            assert!(p.page_size > 0, "{}: zero page size", p.id);
            assert!(p.timeout_secs > 0, "{}: zero timeout", p.id);
        }
    }

    #[test]
    fn population_endpoints_are_defined() {
        let p = provider(POPULATION_PROVIDER).unwrap();
        for key in ["landing", "population", "sub_areas", "age"] {
            assert!(p.endpoint(key).is_ok(), "missing {key}");
        }
        assert_eq!(p.page_size, 10);
    }

    #[test]
    fn clinic_definition_requires_key() {
        let p = provider(CLINIC_PROVIDER).unwrap();
        assert!(p.endpoint("hospitals").is_ok());
        assert_eq!(p.api_key_env.as_deref(), Some("PUBLIC_DATA_API_KEY"));
        assert!(p.endpoint("nope").is_err());
    }

    #[test]
    fn unknown_provider_is_config_error() {
        assert!(matches!(provider("nope"), Err(SourceError::Config { .. })));
    }

    #[test]
    fn missing_key_variable_is_config_error() {
        let p = parse_provider_toml(
            r#"
id = "x"
name = "X"
page_size = 1
request_delay_ms = 0
timeout_secs = 1
api_key_env = "CLINIC_MAP_TEST_KEY_THAT_IS_NEVER_SET"

[endpoints]
"#,
        )
        .unwrap();
        assert!(matches!(p.api_key(), Err(SourceError::Config { .. })));
    }
}
