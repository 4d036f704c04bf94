//! WIPO PATENTSCOPE search provider

use super::traits::*;
use crate::assets::{parse_registry_date, AssetType, CanonicalAsset};
use crate::config::ProviderConfig;
use crate::network::HttpClient;
use crate::search::SearchRequest;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://patentscope.wipo.int/search/en/api";

/// PATENTSCOPE REST API
pub struct Wipo {
    client: HttpClient,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl Wipo {
    pub fn new(client: HttpClient, config: &ProviderConfig) -> Self {
        Self {
            timeout: client.timeout_for(config.timeout),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            client,
        }
    }

    fn authorize(&self, request: ProviderRequest) -> ProviderRequest {
        let request = request.header("Accept", "application/json");
        match self.api_key {
            Some(ref key) => request.bearer(key),
            None => request,
        }
    }

    fn search_request(&self, request: &SearchRequest) -> ProviderRequest {
        let mut req = ProviderRequest::get(format!("{}/search", self.base_url))
            .param("start", request.offset().to_string())
            .param("rows", request.size.to_string());

        let text_params = [
            ("q", &request.query),
            ("inventor", &request.inventor),
            ("applicant", &request.assignee),
            ("country", &request.jurisdiction),
        ];
        for (key, value) in text_params {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                req = req.param(key, value);
            }
        }

        if let Some(from) = request.from_date {
            req = req.param("dateFrom", from.format("%Y-%m-%d").to_string());
        }
        if let Some(to) = request.to_date {
            req = req.param("dateTo", to.format("%Y-%m-%d").to_string());
        }

        self.authorize(req)
    }

    async fn run_search(&self, request: &SearchRequest) -> Result<Vec<CanonicalAsset>> {
        let response = self
            .client
            .execute_with_timeout(self.search_request(request), self.timeout)
            .await?
            .ensure_success()?;

        let json: Value = response.json()?;
        if let Some(total) = json.get("totalResults").and_then(|t| t.as_u64()) {
            debug!("WIPO reports {} total results", total);
        }

        Ok(json
            .get("results")
            .and_then(|r| r.as_array())
            .map(|results| results.iter().filter_map(|r| self.parse_record(r)).collect())
            .unwrap_or_default())
    }

    fn parse_record(&self, record: &Value) -> Option<CanonicalAsset> {
        if !record.is_object() {
            return None;
        }

        let text = |key: &str| {
            record
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let application_number = text("applicationNumber");
        let mut asset = CanonicalAsset::new(
            application_number.clone().unwrap_or_default(),
            "WIPO",
            self.name(),
        )
        .with_type(AssetType::Patent)
        .with_title(text("title").unwrap_or_default());

        // PATENTSCOPE lists applicants only; they stand in for both parties
        let applicants = party_names(record.get("applicants"));

        asset.description = text("abstract");
        asset.application_number = application_number;
        asset.publication_number = text("publicationNumber");
        asset.jurisdiction = text("country");
        asset.status = text("status");
        asset.ipc_classification = text("ipcClass");
        asset.inventor = applicants.clone();
        asset.assignee = applicants;
        asset.application_date = text("applicationDate").and_then(|d| parse_registry_date(&d));
        asset.publication_date = text("publicationDate").and_then(|d| parse_registry_date(&d));

        Some(asset)
    }
}

/// Applicants arrive either as one string or as a list of names
fn party_names(value: Option<&Value>) -> Option<String> {
    let joined = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.as_str()),
                other => other.get("name").and_then(|n| n.as_str()),
            })
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        _ => return None,
    };

    (!joined.is_empty()).then_some(joined)
}

#[async_trait]
impl ProviderClient for Wipo {
    fn name(&self) -> &str {
        "WIPO"
    }

    fn about(&self) -> ProviderAbout {
        ProviderAbout::new()
            .website("https://patentscope.wipo.int")
            .official_api(true)
            .results_format("JSON")
    }

    fn rate_limit_per_minute(&self) -> u32 {
        30
    }

    async fn search(&self, request: &SearchRequest) -> ProviderOutcome {
        let start = Instant::now();
        outcome_from(self.name(), start, self.run_search(request).await)
    }

    async fn get_details(&self, external_id: &str) -> Option<CanonicalAsset> {
        let request = self.authorize(ProviderRequest::get(format!(
            "{}/patent/{}",
            self.base_url,
            urlencoding::encode(external_id)
        )));

        let result: Result<Option<CanonicalAsset>> = async {
            let response = self
                .client
                .execute_with_timeout(request, self.timeout)
                .await?
                .ensure_success()?;
            let json: Value = response.json()?;
            Ok(self.parse_record(&json))
        }
        .await;

        result.unwrap_or_else(|e| {
            warn!("WIPO details for {} failed: {:#}", external_id, e);
            None
        })
    }

    async fn is_available(&self) -> bool {
        let status = self.authorize(ProviderRequest::get(format!("{}/status", self.base_url)));

        match self.client.execute_with_timeout(status, self.timeout).await {
            Ok(response) => response.is_success(),
            Err(e) => {
                debug!("WIPO status check failed: {}", e);
                false
            }
        }
    }
}
