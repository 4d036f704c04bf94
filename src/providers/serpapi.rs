//! Google Patents results through the SerpApi search gateway

use super::traits::*;
use crate::assets::{parse_registry_date, AssetType, CanonicalAsset};
use crate::config::ProviderConfig;
use crate::network::HttpClient;
use crate::search::SearchRequest;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://serpapi.com";

/// Page sizes the gateway accepts
const MIN_NUM: u32 = 10;
const MAX_NUM: u32 = 100;

/// Publication prefixes mapped to a jurisdiction
const KNOWN_JURISDICTIONS: [&str; 9] = ["US", "EP", "WO", "CN", "JP", "KR", "GB", "DE", "FR"];

/// SerpApi `google_patents` engine
pub struct SerpApi {
    client: HttpClient,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl SerpApi {
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

    fn engine_request(&self, api_key: &str, query: &str, num: u32) -> ProviderRequest {
        ProviderRequest::get(format!("{}/search", self.base_url))
            .param("engine", "google_patents")
            .param("q", query)
            .param("api_key", api_key)
            .param("num", num.to_string())
    }

    async fn run_search(&self, request: &SearchRequest) -> Result<Vec<CanonicalAsset>> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(ProviderFailure::Auth("no SerpApi key configured".into()).into());
        };

        let query = effective_query(request);
        let num = request.size.clamp(MIN_NUM, MAX_NUM);
        let start = u64::from(request.page) * u64::from(num);
        debug!("SerpApi query '{}' (num={}, start={})", query, num, start);

        let req = self
            .engine_request(api_key, &query, num)
            .param("start", start.to_string());
        let json: Value = self
            .client
            .execute_with_timeout(req, self.timeout)
            .await?
            .ensure_success()?
            .json()?;

        let limit = usize::try_from(request.size).unwrap_or(usize::MAX);
        Ok(organic_results(&json)
            .take(limit)
            .filter_map(|item| self.parse_result(item))
            .collect())
    }

    fn parse_result(&self, item: &Value) -> Option<CanonicalAsset> {
        if !item.is_object() {
            return None;
        }
        let text = |key: &str| value_text(item.get(key));

        let publication_number = text("publication_number");
        let external_id = text("patent_id").or_else(|| publication_number.clone());

        let mut asset = CanonicalAsset::new(external_id.unwrap_or_default(), "SERPAPI", self.name())
            .with_type(AssetType::Patent)
            .with_title(text("title").unwrap_or_default());

        asset.description = text("snippet");
        asset.jurisdiction = Some(jurisdiction_of(publication_number.as_deref()).to_string());
        asset.publication_number = publication_number;
        asset.application_number = text("application_number");
        asset.inventor = text("inventor");
        asset.assignee = text("assignee");
        asset.publication_date = text("publication_date").and_then(|d| parse_listing_date(&d));
        asset.priority_date = text("priority_date").and_then(|d| parse_listing_date(&d));
        asset.application_date = text("filing_date").and_then(|d| parse_listing_date(&d));
        asset.grant_date = text("grant_date").and_then(|d| parse_listing_date(&d));
        asset.cpc_classification = text("cpc");
        asset.ipc_classification = text("cpc");
        asset.status = Some("Published".to_string());

        let extras: Vec<String> = [("PDF", text("pdf")), ("Family ID", text("family_id"))]
            .into_iter()
            .filter_map(|(label, value)| value.map(|v| format!("{}: {}", label, v)))
            .collect();
        asset.keywords = (!extras.is_empty()).then(|| extras.join("; "));

        Some(asset)
    }
}

/// Entity searches send the entity name as the query
fn effective_query(request: &SearchRequest) -> String {
    let kind = request.search_type.as_deref().map(str::to_lowercase);
    let entity = match kind.as_deref() {
        Some("inventor") => request.inventor.as_deref(),
        Some("assignee") => request.assignee.as_deref(),
        _ => None,
    };

    entity
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| request.display_query())
}

fn organic_results(json: &Value) -> impl Iterator<Item = &Value> {
    json.get("organic_results")
        .and_then(|r| r.as_array())
        .into_iter()
        .flatten()
}

/// Strings as-is, numbers rendered
fn value_text(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Listing dates come as `Oct 17, 2002`, ISO or `YYYYMMDD`
fn parse_listing_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%b %d, %Y")
        .ok()
        .or_else(|| parse_registry_date(raw))
}

fn jurisdiction_of(publication_number: Option<&str>) -> &'static str {
    let upper = publication_number.unwrap_or_default().to_uppercase();
    KNOWN_JURISDICTIONS
        .iter()
        .copied()
        .find(|code| upper.starts_with(code))
        .unwrap_or("UNKNOWN")
}

#[async_trait]
impl ProviderClient for SerpApi {
    fn name(&self) -> &str {
        "SERPAPI"
    }

    fn about(&self) -> ProviderAbout {
        ProviderAbout::new()
            .website("https://serpapi.com/google-patents-api")
            .official_api(false)
            .credentials_required(true)
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
        let api_key = self.api_key.as_deref()?;
        let request = self.engine_request(api_key, external_id, MIN_NUM);

        let result: Result<Option<CanonicalAsset>> = async {
            let json: Value = self
                .client
                .execute_with_timeout(request, self.timeout)
                .await?
                .ensure_success()?
                .json()?;
            let asset = organic_results(&json).next().and_then(|item| self.parse_result(item));
            Ok(asset)
        }
        .await;

        result.unwrap_or_else(|e| {
            warn!("SerpApi details for {} failed: {:#}", external_id, e);
            None
        })
    }

    async fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}
