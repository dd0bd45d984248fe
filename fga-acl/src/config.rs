//! Connection configuration for the OpenFGA backend.

use crate::error::AclError;
use serde::Deserialize;
use std::path::PathBuf;

/// Environment variable consulted when `endpoint` is unset.
pub const ENV_API_URL: &str = "OPENFGA_API_URL";
/// Environment variable consulted when `api_token` is unset.
pub const ENV_API_TOKEN: &str = "OPENFGA_API_TOKEN";
/// Environment variable consulted when `store_id` is unset.
pub const ENV_STORE_ID: &str = "OPENFGA_STORE_ID";
/// Environment variable consulted when `authorization_model_id` is unset.
pub const ENV_MODEL_ID: &str = "OPENFGA_AUTHORIZATION_MODEL_ID";
/// Environment variable consulted when `tls.enabled` is unset.
pub const ENV_USE_TLS: &str = "OPENFGA_USE_TLS";

fn default_connect_timeout() -> u64 { 10 }
fn default_request_timeout() -> u64 { 30 }

/// How a query without a bound `relation` column is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationPolicy {
    /// The query fails with [`AclError::MissingPredicate`] before any backend call.
    #[default]
    Required,
    /// The query becomes a tuple scan over every relation.
    Wildcard,
}

/// Optional TLS settings for the gRPC channel.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Force TLS on or off. When unset, TLS follows the endpoint scheme.
    pub enabled: Option<bool>,
    /// PEM file with the CA certificate used to verify the server.
    pub ca_cert_path: Option<PathBuf>,
    /// Override the domain name checked against the server certificate.
    pub domain_name: Option<String>,
}

/// Configuration for one named OpenFGA connection.
///
/// Every field is optional in the file; unset fields fall back to the
/// `OPENFGA_*` environment variables through [`with_env_fallback`](Self::with_env_fallback).
///
/// ```yaml
/// endpoint: "http://localhost:8081"   # or api_url
/// store_id: "01K9Y2QSETQJE22F1BNEJ3ZWTM"  # optional, latest active store otherwise
/// authorization_model_id: "..."       # optional, server evaluates the latest model otherwise
/// api_token: "secret"                 # optional
/// tls:
///   enabled: true
///   ca_cert_path: "/etc/ssl/openfga-ca.pem"
/// relation_policy: required           # or wildcard
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct FgaConfig {
    /// The OpenFGA gRPC endpoint (e.g., "http://localhost:8081").
    #[serde(alias = "api_url")]
    pub endpoint: Option<String>,
    /// Optional API token sent as a bearer token.
    pub api_token: Option<String>,
    /// Store to query. Discovered from the server when unset.
    pub store_id: Option<String>,
    /// Authorization model to evaluate with. The latest model when unset.
    #[serde(alias = "model_id")]
    pub authorization_model_id: Option<String>,
    #[serde(default)]
    pub tls: TlsConfig,
    /// Connection timeout in seconds. Default: 10.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Per-request timeout in seconds. Default: 30.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub relation_policy: RelationPolicy,
}

impl FgaConfig {
    /// Create a configuration pointing at the given endpoint.
    ///
    /// # Examples
    ///
    /// ```
    /// use fga_acl::FgaConfig;
    ///
    /// let config = FgaConfig::new("http://localhost:8081").with_store_id("store-id");
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Self::default()
        }
    }

    /// Parse a configuration from a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, AclError> {
        serde_yaml::from_str(yaml).map_err(|e| AclError::Configuration(e.to_string()))
    }

    /// Set the store ID.
    pub fn with_store_id(mut self, store_id: impl Into<String>) -> Self {
        self.store_id = Some(store_id.into());
        self
    }

    /// Set the authorization model ID.
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.authorization_model_id = Some(model_id.into());
        self
    }

    /// Set the API token for authentication.
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Enable or disable TLS explicitly.
    pub fn with_tls(mut self, enabled: bool) -> Self {
        self.tls.enabled = Some(enabled);
        self
    }

    /// Verify the server against the CA in this PEM file instead of the bundled web PKI roots.
    pub fn with_ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.tls.ca_cert_path = Some(path.into());
        self
    }

    /// Set the connection timeout in seconds.
    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    /// Set the request timeout in seconds.
    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Set how a missing `relation` predicate is handled.
    pub fn with_relation_policy(mut self, policy: RelationPolicy) -> Self {
        self.relation_policy = policy;
        self
    }

    /// Fill unset fields from the `OPENFGA_*` process environment variables.
    pub fn with_env_fallback(self) -> Self {
        self.with_fallback(|key| std::env::var(key).ok())
    }

    /// Fill unset fields from `lookup`, keyed by the `OPENFGA_*` variable names.
    ///
    /// Empty values are ignored.
    pub fn with_fallback(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        fill(&mut self.endpoint, || get(ENV_API_URL));
        fill(&mut self.api_token, || get(ENV_API_TOKEN));
        fill(&mut self.store_id, || get(ENV_STORE_ID));
        fill(&mut self.authorization_model_id, || get(ENV_MODEL_ID));
        if self.tls.enabled.is_none() {
            self.tls.enabled = get(ENV_USE_TLS).map(|v| {
                matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
            });
        }
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), AclError> {
        match self.endpoint.as_deref().map(str::trim) {
            None | Some("") => Err(AclError::Configuration(
                "endpoint is required in connection config".into(),
            )),
            Some(_) => Ok(()),
        }
    }

    /// Whether the channel should use TLS.
    pub fn tls_enabled(&self) -> bool {
        self.tls.enabled.unwrap_or_else(|| {
            self.endpoint
                .as_deref()
                .is_some_and(|e| e.trim().starts_with("https://"))
        })
    }

    /// The endpoint as a URI, with a scheme added when missing.
    pub fn endpoint_uri(&self) -> Result<String, AclError> {
        self.validate()?;
        let endpoint = self.endpoint.as_deref().unwrap_or_default().trim();
        if endpoint.contains("://") {
            return Ok(endpoint.to_string());
        }
        let scheme = if self.tls_enabled() { "https" } else { "http" };
        Ok(format!("{}://{}", scheme, endpoint))
    }

    /// The store ID, if one is configured and not blank.
    pub fn store_id(&self) -> Option<&str> {
        non_blank(self.store_id.as_deref())
    }

    /// The authorization model ID, if one is configured and not blank.
    pub fn model_id(&self) -> Option<&str> {
        non_blank(self.authorization_model_id.as_deref())
    }
}

impl Default for FgaConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_token: None,
            store_id: None,
            authorization_model_id: None,
            tls: TlsConfig::default(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            relation_policy: RelationPolicy::Required,
        }
    }
}

fn fill(slot: &mut Option<String>, fallback: impl FnOnce() -> Option<String>) {
    if non_blank(slot.as_deref()).is_none() {
        if let Some(value) = fallback() {
            *slot = Some(value);
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
