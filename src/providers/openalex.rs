//! OpenAlex scholarly works provider

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

const DEFAULT_BASE_URL: &str = "https://api.openalex.org";
const ENTITY_PREFIX: &str = "https://openalex.org/";
const DOI_PREFIX: &str = "https://doi.org/";
const MAX_PER_PAGE: u32 = 25;
const MAX_KEYWORDS: usize = 5;

/// OpenAlex works API
pub struct OpenAlex {
    client: HttpClient,
    base_url: String,
    mailto: Option<String>,
    timeout: Duration,
}

impl OpenAlex {
    pub fn new(client: HttpClient, config: &ProviderConfig) -> Self {
        Self {
            timeout: client.timeout_for(config.timeout),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            mailto: config.mailto.clone().filter(|m| !m.is_empty()),
            client,
        }
    }

    /// Identified requests are served from the polite pool
    fn identify(&self, request: ProviderRequest) -> ProviderRequest {
        let request = request.header("Accept", "application/json");
        match self.mailto {
            Some(ref mailto) => request.param("mailto", mailto),
            None => request,
        }
    }

    async fn run_search(&self, request: &SearchRequest) -> Result<Vec<CanonicalAsset>> {
        let req = self.identify(
            ProviderRequest::get(format!("{}/works", self.base_url))
                .param("search", request.display_query())
                .param("per-page", request.size.min(MAX_PER_PAGE).to_string())
                .param("page", request.page_number().to_string()),
        );

        let json: Value = self
            .client
            .execute_with_timeout(req, self.timeout)
            .await?
            .ensure_success()?
            .json()?;

        if let Some(count) = json.pointer("/meta/count").and_then(|c| c.as_u64()) {
            debug!("OpenAlex reports {} matching works", count);
        }

        Ok(json
            .get("results")
            .and_then(|r| r.as_array())
            .map(|works| works.iter().filter_map(|w| self.parse_work(w)).collect())
            .unwrap_or_default())
    }

    fn parse_work(&self, work: &Value) -> Option<CanonicalAsset> {
        if !work.is_object() {
            return None;
        }
        let text = |pointer: &str| {
            work.pointer(pointer)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let mut asset = CanonicalAsset::new(text("/id").unwrap_or_default(), "OPENALEX", self.name())
            .with_type(AssetType::Patent)
            .with_title(text("/title").unwrap_or_default());

        asset.description = text("/abstract").or_else(|| rebuild_abstract(work));
        asset.publication_date = text("/publication_date").and_then(|d| parse_registry_date(&d));
        asset.assignee = text("/primary_location/source/display_name");
        asset.inventor = joined(
            work.get("authorships")
                .and_then(|a| a.as_array())
                .into_iter()
                .flatten()
                .filter_map(|a| a.pointer("/author/display_name")?.as_str()),
            ", ",
        );
        asset.publication_number =
            text("/doi").map(|doi| doi.trim_start_matches(DOI_PREFIX).to_string());
        asset.keywords = joined(
            work.get("concepts")
                .and_then(|c| c.as_array())
                .into_iter()
                .flatten()
                .filter_map(|c| c.get("display_name")?.as_str())
                .take(MAX_KEYWORDS),
            "; ",
        );
        asset.status = Some("Published".to_string());
        asset.jurisdiction = Some("GLOBAL".to_string());
        asset.url = text("/id");

        Some(asset)
    }
}

fn joined<'a>(names: impl Iterator<Item = &'a str>, separator: &str) -> Option<String> {
    let names: Vec<&str> = names.map(str::trim).filter(|n| !n.is_empty()).collect();
    (!names.is_empty()).then(|| names.join(separator))
}

/// Reassemble an abstract from its word -> positions index
fn rebuild_abstract(work: &Value) -> Option<String> {
    let index = work.get("abstract_inverted_index")?.as_object()?;

    let mut words: Vec<(u64, &str)> = index
        .iter()
        .flat_map(|(word, positions)| {
            positions
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|p| p.as_u64())
                .map(move |p| (p, word.as_str()))
        })
        .collect();
    words.sort_unstable_by_key(|(position, _)| *position);

    joined(words.into_iter().map(|(_, word)| word), " ")
}

#[async_trait]
impl ProviderClient for OpenAlex {
    fn name(&self) -> &str {
        "OPENALEX"
    }

    fn about(&self) -> ProviderAbout {
        ProviderAbout::new()
            .website("https://openalex.org")
            .official_api(true)
            .results_format("JSON")
    }

    fn rate_limit_per_minute(&self) -> u32 {
        600
    }

    async fn search(&self, request: &SearchRequest) -> ProviderOutcome {
        let start = Instant::now();
        outcome_from(self.name(), start, self.run_search(request).await)
    }

    async fn get_details(&self, external_id: &str) -> Option<CanonicalAsset> {
        let work_id = external_id.trim_start_matches(ENTITY_PREFIX);
        let request = self.identify(ProviderRequest::get(format!(
            "{}/works/{}",
            self.base_url,
            urlencoding::encode(work_id)
        )));

        let result: Result<Option<CanonicalAsset>> = async {
            let json: Value = self
                .client
                .execute_with_timeout(request, self.timeout)
                .await?
                .ensure_success()?
                .json()?;
            Ok(self.parse_work(&json))
        }
        .await;

        result.unwrap_or_else(|e| {
            warn!("OpenAlex details for {} failed: {:#}", external_id, e);
            None
        })
    }

    async fn is_available(&self) -> bool {
        true
    }
}
