//! Provider traits and types

use crate::assets::CanonicalAsset;
use crate::search::{AssetRoute, SearchRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, warn};

/// Result of one provider invocation
///
/// Always produced, even when the provider failed; a failure is an empty
/// outcome carrying the reason.
#[derive(Debug, Clone)]
pub struct ProviderOutcome {
    /// Label of the provider that produced this outcome
    pub source: String,
    /// Assets returned
    pub assets: Vec<CanonicalAsset>,
    /// Why the call failed, if it did
    pub failure: Option<ProviderFailure>,
    /// Wall time of the call in milliseconds
    pub elapsed_ms: u64,
}

impl ProviderOutcome {
    /// Successful outcome
    pub fn success(source: impl Into<String>, assets: Vec<CanonicalAsset>) -> Self {
        Self {
            source: source.into(),
            assets,
            failure: None,
            elapsed_ms: 0,
        }
    }

    /// Empty outcome tagged with a failure
    pub fn failed(source: impl Into<String>, failure: ProviderFailure) -> Self {
        Self {
            source: source.into(),
            assets: vec![],
            failure: Some(failure),
            elapsed_ms: 0,
        }
    }

    /// Record how long the call took
    pub fn timed(mut self, start: Instant) -> Self {
        self.elapsed_ms = start.elapsed().as_millis() as u64;
        self
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Provider failure taxonomy
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderFailure {
    #[error("provider unavailable")]
    Unavailable,
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP error: {0}")]
    Http(u16),
    #[error("failed to parse response: {0}")]
    Parse(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("provider task panicked: {0}")]
    Panicked(String),
}

impl ProviderFailure {
    /// Classify an error raised inside provider plumbing
    pub fn classify(err: &anyhow::Error) -> Self {
        if let Some(failure) = err.downcast_ref::<ProviderFailure>() {
            return failure.clone();
        }

        if let Some(http) = err.downcast_ref::<reqwest::Error>() {
            if http.is_timeout() {
                return Self::Timeout;
            }
            if let Some(status) = http.status() {
                return Self::Http(status.as_u16());
            }
            if http.is_connect() || http.is_request() || http.is_body() {
                return Self::Network(http.to_string());
            }
        }

        Self::Parse(err.to_string())
    }
}

/// Convert the internal result of a provider call into an outcome, logging failures
pub fn outcome_from(
    source: &str,
    start: Instant,
    result: anyhow::Result<Vec<CanonicalAsset>>,
) -> ProviderOutcome {
    match result {
        Ok(assets) => {
            debug!("{} returned {} assets", source, assets.len());
            ProviderOutcome::success(source, assets).timed(start)
        }
        Err(e) => {
            let failure = ProviderFailure::classify(&e);
            warn!("{} search failed ({}): {:#}", source, failure, e);
            ProviderOutcome::failed(source, failure).timed(start)
        }
    }
}

/// Registry family a provider covers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Coverage {
    Patents,
    Trademarks,
}

impl Coverage {
    /// Whether a provider with this coverage serves the given route
    pub fn serves(self, route: AssetRoute) -> bool {
        matches!(
            (self, route),
            (Coverage::Patents, AssetRoute::Patents) | (Coverage::Trademarks, AssetRoute::Trademarks)
        )
    }
}

/// HTTP request issued by a provider
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    /// URL to request
    pub url: String,
    /// HTTP method
    pub method: HttpMethod,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Query parameters
    pub params: Vec<(String, String)>,
    /// Request body
    pub data: Option<RequestBody>,
    /// Bearer token
    pub bearer: Option<String>,
    /// Basic credentials
    pub basic_auth: Option<(String, String)>,
}

impl ProviderRequest {
    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::with_method(url, HttpMethod::Get)
    }

    /// Create a POST request
    pub fn post(url: impl Into<String>) -> Self {
        Self::with_method(url, HttpMethod::Post)
    }

    fn with_method(url: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            url: url.into(),
            method,
            headers: HashMap::new(),
            params: Vec::new(),
            data: None,
            bearer: None,
            basic_auth: None,
        }
    }

    /// Add a header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add a query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Add form data
    pub fn form(mut self, data: HashMap<String, String>) -> Self {
        self.data = Some(RequestBody::Form(data));
        self
    }

    /// Add JSON body
    pub fn json(mut self, data: serde_json::Value) -> Self {
        self.data = Some(RequestBody::Json(data));
        self
    }

    /// Authenticate with a bearer token
    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    /// Authenticate with basic credentials
    pub fn basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some((user.into(), password.into()));
        self
    }
}

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Request body types
#[derive(Debug, Clone)]
pub enum RequestBody {
    Form(HashMap<String, String>),
    Json(serde_json::Value),
}

/// HTTP response received by a provider
#[derive(Debug)]
pub struct ProviderResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HashMap<String, String>,
    /// Response body as text
    pub text: String,
}

impl ProviderResponse {
    /// Parse response as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> anyhow::Result<T> {
        serde_json::from_str(&self.text)
            .map_err(|e| ProviderFailure::Parse(format!("invalid JSON: {}", e)).into())
    }

    /// Check if response is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Fail with a classified error on non-2xx statuses
    pub fn ensure_success(self) -> anyhow::Result<Self> {
        match self.status {
            200..=299 => Ok(self),
            401 | 403 => Err(ProviderFailure::Auth(format!("HTTP {}", self.status)).into()),
            status => Err(ProviderFailure::Http(status).into()),
        }
    }
}

/// Provider metadata
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderAbout {
    /// Registry website
    pub website: Option<String>,
    /// Whether it uses an official API
    pub use_official_api: bool,
    /// Whether credentials are required
    pub require_credentials: bool,
    /// Result format (JSON, XML, HTML, SQL rows)
    pub results: String,
}

impl ProviderAbout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn website(mut self, url: impl Into<String>) -> Self {
        self.website = Some(url.into());
        self
    }

    pub fn official_api(mut self, uses: bool) -> Self {
        self.use_official_api = uses;
        self
    }

    pub fn credentials_required(mut self, required: bool) -> Self {
        self.require_credentials = required;
        self
    }

    pub fn results_format(mut self, format: impl Into<String>) -> Self {
        self.results = format.into();
        self
    }
}

/// Uniform capability surface over one external registry
///
/// Implementations never return errors from `search` or `get_details`: every
/// failure is absorbed and logged inside the provider.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Data-source label (e.g. "USPTO")
    fn name(&self) -> &str;

    /// Registry family served
    fn coverage(&self) -> Coverage {
        Coverage::Patents
    }

    /// Provider metadata
    fn about(&self) -> ProviderAbout {
        ProviderAbout::default()
    }

    /// Advisory request budget; not enforced by the aggregator
    fn rate_limit_per_minute(&self) -> u32;

    /// Run a search
    async fn search(&self, request: &SearchRequest) -> ProviderOutcome;

    /// Fetch one record by its registry identifier
    async fn get_details(&self, external_id: &str) -> Option<CanonicalAsset>;

    /// Cheap liveness and credential check
    async fn is_available(&self) -> bool;
}
