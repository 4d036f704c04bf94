//! TMView trademark provider
//!
//! TMView only offers a client-rendered results page. A headless rendering
//! gateway loads the page and returns the final HTML, which is scraped here.

use super::traits::*;
use crate::assets::{AssetType, CanonicalAsset};
use crate::config::ProviderConfig;
use crate::network::HttpClient;
use crate::search::SearchRequest;
use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://www.tmdn.org/tmview";

/// How long the gateway waits for the results table to appear
const RENDER_WAIT_MS: u64 = 20_000;

/// Rendered once the page settled on either results or an empty state
const READY_SELECTOR: &str =
    "div.ReactTable .rt-table, .no-data, .noData, .noRows, .no-results, .noRecords";

static ROW_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.ReactTable .rt-tbody .rt-tr-group").expect("valid row selector")
});

static CELL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".rt-td").expect("valid cell selector"));

static EMPTY_STATE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".no-data, .noData, .noRows, .no-results, .noRecords, .noResult")
        .expect("valid empty-state selector")
});

const EMPTY_STATE_PHRASES: [&str; 3] = ["No results", "No records found", "No data available"];

/// Columns of the TMView results table
const MIN_CELLS: usize = 10;
const COL_NAME: usize = 3;
const COL_STATUS: usize = 6;
const COL_OFFICE: usize = 7;
const COL_APPLICATION_NUMBER: usize = 8;
const COL_OWNER: usize = 9;

/// TMView results scraper
pub struct TmView {
    client: HttpClient,
    base_url: String,
    render_url: Option<String>,
    timeout: Duration,
}

impl TmView {
    pub fn new(client: HttpClient, config: &ProviderConfig) -> Self {
        Self {
            timeout: client.timeout_for(config.timeout),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            render_url: config.render_url.clone().filter(|u| !u.is_empty()),
            client,
        }
    }

    /// Deep link to the TMView results page for a basic search
    fn results_url(&self, term: &str, request: &SearchRequest) -> String {
        format!(
            "{}/#/tmview/results?page={}&pageSize={}&criteria=C&basicSearch={}",
            self.base_url,
            request.page_number(),
            request.size.max(1),
            urlencoding::encode(term)
        )
    }

    /// Have the gateway render a page and return its HTML
    async fn render(&self, page_url: &str) -> Result<String> {
        let Some(ref render_url) = self.render_url else {
            return Err(ProviderFailure::Unavailable.into());
        };

        let request = ProviderRequest::post(render_url.clone()).json(json!({
            "url": page_url,
            "waitForSelector": {
                "selector": READY_SELECTOR,
                "timeout": RENDER_WAIT_MS,
            },
        }));

        let response = self
            .client
            .execute_with_timeout(request, self.timeout)
            .await?
            .ensure_success()?;

        Ok(response.text)
    }

    async fn run_search(&self, request: &SearchRequest) -> Result<Vec<CanonicalAsset>> {
        let Some(term) = search_term(request) else {
            debug!("TMView search skipped: no query or owner given");
            return Ok(vec![]);
        };

        let html = self.render(&self.results_url(&term, request)).await?;
        Ok(parse_results(&html, self.name()))
    }
}

/// Free-text query, else the owner name
fn search_term(request: &SearchRequest) -> Option<String> {
    request
        .query_text()
        .or_else(|| request.assignee.as_deref().map(str::trim).filter(|a| !a.is_empty()))
        .map(str::to_string)
}

fn cell_text(cell: &ElementRef) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn has_empty_state(document: &Html) -> bool {
    if document.select(&EMPTY_STATE_SELECTOR).next().is_some() {
        return true;
    }

    let text: String = document.root_element().text().collect();
    EMPTY_STATE_PHRASES.iter().any(|p| text.contains(p))
}

/// Map the rows of a rendered results page
pub fn parse_results(html: &str, source: &str) -> Vec<CanonicalAsset> {
    let document = Html::parse_document(html);

    if has_empty_state(&document) {
        debug!("TMView reported no results");
        return vec![];
    }

    let mut assets = Vec::new();
    for row in document.select(&ROW_SELECTOR) {
        let cells: Vec<String> = row.select(&CELL_SELECTOR).map(|c| cell_text(&c)).collect();
        if cells.len() < MIN_CELLS {
            // padding rows of the table widget
            continue;
        }

        let non_empty = |i: usize| Some(cells[i].clone()).filter(|c| !c.is_empty());
        let number = cells[COL_APPLICATION_NUMBER].clone();
        let office = non_empty(COL_OFFICE).unwrap_or_else(|| source.to_string());

        let mut asset = CanonicalAsset::new(number, office, source)
            .with_type(AssetType::Trademark)
            .with_title(cells[COL_NAME].clone());
        asset.application_number = non_empty(COL_APPLICATION_NUMBER);
        asset.assignee = non_empty(COL_OWNER);
        asset.status = non_empty(COL_STATUS);

        assets.push(asset);
    }

    debug!("TMView page yielded {} trademarks", assets.len());
    assets
}

#[async_trait]
impl ProviderClient for TmView {
    fn name(&self) -> &str {
        "TMVIEW"
    }

    fn coverage(&self) -> Coverage {
        Coverage::Trademarks
    }

    fn about(&self) -> ProviderAbout {
        ProviderAbout::new()
            .website("https://www.tmdn.org/tmview")
            .official_api(false)
            .results_format("HTML")
    }

    fn rate_limit_per_minute(&self) -> u32 {
        10
    }

    async fn search(&self, request: &SearchRequest) -> ProviderOutcome {
        let start = Instant::now();
        outcome_from(self.name(), start, self.run_search(request).await)
    }

    async fn get_details(&self, external_id: &str) -> Option<CanonicalAsset> {
        let request = SearchRequest::simple(external_id);

        match self.run_search(&request).await {
            Ok(assets) => assets
                .into_iter()
                .find(|a| a.external_id.as_deref() == Some(external_id)),
            Err(e) => {
                warn!("TMView details for {} failed: {:#}", external_id, e);
                None
            }
        }
    }

    async fn is_available(&self) -> bool {
        self.render_url.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn row(cells: &[&str]) -> String {
        let cells: String = cells
            .iter()
            .map(|c| format!(r#"<div class="rt-td">{}</div>"#, c))
            .collect();
        format!(r#"<div class="rt-tr-group"><div class="rt-tr">{}</div></div>"#, cells)
    }

    fn results_page() -> String {
        format!(
            r#"<html><body><div class="ReactTable"><div class="rt-table"><div class="rt-tbody">{}{}{}</div></div></div></body></html>"#,
            row(&["", "", "img", "ACME", "Word", "9, 35", "Registered", "EUIPO", "018123456", "Acme Corp"]),
            row(&["", "", "", "ACME  BOLT", "Figurative", "7", "Filed", "", "UK00003123456", " Acme Ltd "]),
            row(&["", "", ""]),
        )
    }

    fn provider(server: &MockServer) -> TmView {
        let config = ProviderConfig {
            render_url: Some(format!("{}/content", server.uri())),
            ..ProviderConfig::of("tmview")
        };
        TmView::new(HttpClient::new().unwrap(), &config)
    }

    #[test]
    fn test_parse_results_rows() {
        let assets = parse_results(&results_page(), "TMVIEW");
        assert_eq!(assets.len(), 2);

        let first = &assets[0];
        assert_eq!(first.external_id.as_deref(), Some("018123456"));
        assert_eq!(first.patent_office.as_deref(), Some("EUIPO"));
        assert_eq!(first.title, "ACME");
        assert_eq!(first.assignee.as_deref(), Some("Acme Corp"));
        assert_eq!(first.status.as_deref(), Some("Registered"));
        assert_eq!(first.asset_type, AssetType::Trademark);
        assert_eq!(first.data_source, "TMVIEW");

        let second = &assets[1];
        assert_eq!(second.title, "ACME BOLT");
        assert_eq!(second.patent_office.as_deref(), Some("TMVIEW"));
        assert_eq!(second.assignee.as_deref(), Some("Acme Ltd"));
    }

    #[test]
    fn test_empty_state_page() {
        let html = r#"<html><body><div class="ReactTable"><div class="rt-noData">No data available</div></div></body></html>"#;
        assert!(parse_results(html, "TMVIEW").is_empty());
    }

    #[test]
    fn test_search_term_falls_back_to_owner() {
        assert_eq!(search_term(&SearchRequest::simple("acme")).as_deref(), Some("acme"));
        assert_eq!(
            search_term(&SearchRequest::default().with_assignee("Globex")).as_deref(),
            Some("Globex")
        );
        assert_eq!(search_term(&SearchRequest::default().with_inventor("x")), None);
    }

    #[tokio::test]
    async fn test_search_through_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/content"))
            .and(body_partial_json(serde_json::json!({
                "url": "https://www.tmdn.org/tmview/#/tmview/results?page=1&pageSize=20&criteria=C&basicSearch=acme%20bolt"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(results_page()))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = provider(&server).search(&SearchRequest::simple("acme bolt")).await;
        assert!(outcome.is_success());
        assert_eq!(outcome.assets.len(), 2);
    }

    #[tokio::test]
    async fn test_far_page_url_does_not_overflow() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/content"))
            .and(body_partial_json(serde_json::json!({
                "url": "https://www.tmdn.org/tmview/#/tmview/results?page=4294967296&pageSize=20&criteria=C&basicSearch=acme"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(results_page()))
            .expect(1)
            .mount(&server)
            .await;

        let request = SearchRequest::simple("acme").with_page(u32::MAX, 20);
        let outcome = provider(&server).search(&request).await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_gateway_failure_and_availability() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let tmview = provider(&server);
        assert!(tmview.is_available().await);
        let outcome = tmview.search(&SearchRequest::simple("acme")).await;
        assert_eq!(outcome.failure, Some(ProviderFailure::Http(502)));

        let unconfigured = TmView::new(HttpClient::new().unwrap(), &ProviderConfig::of("tmview"));
        assert!(!unconfigured.is_available().await);
    }
}
