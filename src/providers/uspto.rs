//! USPTO patent search provider

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

const DEFAULT_BASE_URL: &str = "https://developer.uspto.gov/ds-api";

/// USPTO patent data API
pub struct Uspto {
    client: HttpClient,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl Uspto {
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
            Some(ref key) => request.header("X-API-Key", key),
            None => request,
        }
    }

    /// Build the search request
    fn search_request(&self, request: &SearchRequest) -> ProviderRequest {
        let mut req = ProviderRequest::get(format!("{}/patents", self.base_url))
            .param("start", request.offset().to_string())
            .param("rows", request.size.to_string());

        let text_params = [
            ("searchText", &request.query),
            ("title", &request.title),
            ("inventor", &request.inventor),
            ("assignee", &request.assignee),
        ];
        for (key, value) in text_params {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                req = req.param(key, value);
            }
        }

        if let Some(from) = request.from_date {
            req = req.param("dateStart", from.format("%Y-%m-%d").to_string());
        }
        if let Some(to) = request.to_date {
            req = req.param("dateEnd", to.format("%Y-%m-%d").to_string());
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
        if let Some(total) = json.get("totalHits").and_then(|t| t.as_u64()) {
            debug!("USPTO reports {} total hits", total);
        }

        Ok(self.parse_results(&json))
    }

    /// Map the `results` array of a search response
    fn parse_results(&self, json: &Value) -> Vec<CanonicalAsset> {
        json.get("results")
            .and_then(|r| r.as_array())
            .map(|results| results.iter().filter_map(|p| self.parse_patent(p)).collect())
            .unwrap_or_default()
    }

    fn parse_patent(&self, patent: &Value) -> Option<CanonicalAsset> {
        let text = |key: &str| {
            patent
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        if !patent.is_object() {
            return None;
        }

        let patent_number = text("patentNumber").unwrap_or_default();
        let mut asset = CanonicalAsset::new(patent_number, "USPTO", self.name())
            .with_type(AssetType::Patent)
            .with_title(text("title").unwrap_or_default());

        asset.description = text("abstract");
        asset.application_number = text("applicationNumber");
        asset.publication_number = text("publicationNumber");
        asset.jurisdiction = Some("US".to_string());
        asset.application_date = text("applicationDate").and_then(|d| parse_registry_date(&d));
        asset.publication_date = text("publicationDate").and_then(|d| parse_registry_date(&d));
        asset.inventor = joined_names(patent.get("inventors"));
        asset.assignee = joined_names(patent.get("assignees"));

        Some(asset)
    }
}

/// Join the `name` fields of an array of party objects
fn joined_names(parties: Option<&Value>) -> Option<String> {
    let names: Vec<&str> = parties?
        .as_array()?
        .iter()
        .filter_map(|p| p.get("name").and_then(|n| n.as_str()))
        .filter(|n| !n.trim().is_empty())
        .collect();

    (!names.is_empty()).then(|| names.join(", "))
}

#[async_trait]
impl ProviderClient for Uspto {
    fn name(&self) -> &str {
        "USPTO"
    }

    fn about(&self) -> ProviderAbout {
        ProviderAbout::new()
            .website("https://www.uspto.gov")
            .official_api(true)
            .results_format("JSON")
    }

    fn rate_limit_per_minute(&self) -> u32 {
        60
    }

    async fn search(&self, request: &SearchRequest) -> ProviderOutcome {
        let start = Instant::now();
        outcome_from(self.name(), start, self.run_search(request).await)
    }

    async fn get_details(&self, external_id: &str) -> Option<CanonicalAsset> {
        let request = self.authorize(ProviderRequest::get(format!(
            "{}/patents/{}",
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
            Ok(self.parse_patent(&json))
        }
        .await;

        result.unwrap_or_else(|e| {
            warn!("USPTO details for {} failed: {:#}", external_id, e);
            None
        })
    }

    async fn is_available(&self) -> bool {
        let check = self.authorize(
            ProviderRequest::get(format!("{}/patents", self.base_url))
                .param("searchText", "test")
                .param("start", "0")
                .param("rows", "1"),
        );

        match self.client.execute_with_timeout(check, self.timeout).await {
            Ok(response) => response.is_success(),
            Err(e) => {
                debug!("USPTO availability check failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer, api_key: Option<&str>) -> Uspto {
        let config = ProviderConfig {
            base_url: Some(server.uri()),
            api_key: api_key.map(str::to_string),
            ..ProviderConfig::of("uspto")
        };
        Uspto::new(HttpClient::new().unwrap(), &config)
    }

    fn search_payload() -> serde_json::Value {
        json!({
            "totalHits": 2,
            "results": [
                {
                    "patentNumber": "US10000001",
                    "title": "Solid-state battery",
                    "abstract": "A battery with a solid electrolyte.",
                    "applicationNumber": "15/123,456",
                    "publicationNumber": "US2018000001A1",
                    "applicationDate": "2016-03-01",
                    "publicationDate": "2018-06-19",
                    "inventors": [{"name": "Jane Roe"}, {"name": "John Doe"}],
                    "assignees": [{"name": "Acme Corp"}]
                },
                {
                    "title": "Record without a number"
                }
            ]
        })
    }

    #[tokio::test]
    async fn test_search_maps_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/patents"))
            .and(query_param("searchText", "battery"))
            .and(query_param("assignee", "Acme"))
            .and(query_param("start", "20"))
            .and(query_param("rows", "20"))
            .and(query_param("dateStart", "2015-01-01"))
            .and(header("X-API-Key", "k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_payload()))
            .expect(1)
            .mount(&server)
            .await;

        let mut request = SearchRequest::simple("battery")
            .with_assignee("Acme")
            .with_page(1, 20);
        request.from_date = NaiveDate::from_ymd_opt(2015, 1, 1);

        let outcome = provider(&server, Some("k")).search(&request).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.source, "USPTO");
        assert_eq!(outcome.assets.len(), 2);
        assert_eq!(outcome.assets[1].external_id, None);

        let asset = &outcome.assets[0];
        assert_eq!(asset.external_id.as_deref(), Some("US10000001"));
        assert_eq!(asset.patent_office.as_deref(), Some("USPTO"));
        assert_eq!(asset.jurisdiction.as_deref(), Some("US"));
        assert_eq!(asset.inventor.as_deref(), Some("Jane Roe, John Doe"));
        assert_eq!(asset.assignee.as_deref(), Some("Acme Corp"));
        assert_eq!(asset.publication_date, NaiveDate::from_ymd_opt(2018, 6, 19));
        assert_eq!(asset.data_source, "USPTO");
    }

    #[tokio::test]
    async fn test_far_page_start_does_not_overflow() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/patents"))
            .and(query_param("start", "6000000000"))
            .and(query_param("rows", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .expect(1)
            .mount(&server)
            .await;

        let request = SearchRequest::simple("battery").with_page(300_000_000, 20);
        let outcome = provider(&server, None).search(&request).await;

        assert!(outcome.is_success());
        assert!(outcome.assets.is_empty());
    }

    #[tokio::test]
    async fn test_server_error_becomes_failed_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let outcome = provider(&server, None).search(&SearchRequest::simple("x")).await;
        assert!(outcome.assets.is_empty());
        assert_eq!(outcome.failure, Some(ProviderFailure::Http(500)));
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let outcome = provider(&server, None).search(&SearchRequest::simple("x")).await;
        assert!(matches!(outcome.failure, Some(ProviderFailure::Parse(_))));
    }

    #[tokio::test]
    async fn test_details_and_availability() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/patents/US10000001"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(search_payload()["results"][0].clone()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/patents"))
            .and(query_param("searchText", "test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .mount(&server)
            .await;

        let uspto = provider(&server, None);
        let details = uspto.get_details("US10000001").await.unwrap();
        assert_eq!(details.title, "Solid-state battery");
        assert!(uspto.get_details("US404").await.is_none());
        assert!(uspto.is_available().await);
    }
}
