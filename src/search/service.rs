//! Federated search pipeline

use super::models::{AssetRoute, SearchRequest, SearchResult};
use super::orchestrator::SearchOrchestrator;
use crate::assets::{paginate, CanonicalAsset, PostFilter, ResultMerger};
use crate::config::SearchSettings;
use crate::providers::{ProviderOutcome, ProviderRegistry};
use crate::storage::{AssetRepository, HistoryEvent, HistoryRecorder, StorageError};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Failure of a search operation
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("no providers registered for {0:?} searches")]
    NoEligibleProviders(AssetRoute),
    #[error("unknown data source: {0}")]
    UnknownSource(String),
    #[error("data source {0} is not available")]
    SourceUnavailable(String),
    #[error("persistence failed: {0}")]
    Persistence(#[from] StorageError),
}

/// Runs searches across the registered providers and persists what they find
pub struct FederatedSearch {
    registry: Arc<ProviderRegistry>,
    repository: Arc<dyn AssetRepository>,
    history: Arc<dyn HistoryRecorder>,
    orchestrator: SearchOrchestrator,
    merger: ResultMerger,
    default_page_size: u32,
    max_page_size: u32,
}

impl FederatedSearch {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        repository: Arc<dyn AssetRepository>,
        history: Arc<dyn HistoryRecorder>,
        settings: &SearchSettings,
    ) -> Self {
        Self {
            registry,
            repository,
            history,
            orchestrator: SearchOrchestrator::new(),
            merger: ResultMerger::new(settings.default_patent_office.clone()),
            default_page_size: settings.default_page_size,
            max_page_size: settings.max_page_size,
        }
    }

    /// The providers this service dispatches to
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Search every provider eligible for the request's route
    pub async fn search_all(&self, request: SearchRequest) -> Result<SearchResult, SearchError> {
        let start = Instant::now();
        let request = self.prepare(request);
        let route = request.route();

        let providers = self.registry.eligible(route);
        if providers.is_empty() {
            warn!("No providers registered for {:?} searches", route);
            return Err(SearchError::NoEligibleProviders(route));
        }

        let request = Arc::new(request);
        let outcomes = self.orchestrator.dispatch(request.clone(), providers).await;
        let result = self.assemble(&request, outcomes).await?;

        info!(
            "Search '{}' returned {} assets from [{}] in {}ms",
            request.display_query(),
            result.total_elements,
            result.data_source,
            start.elapsed().as_millis()
        );

        Ok(result)
    }

    /// Search a single named provider
    pub async fn search_source(
        &self,
        request: SearchRequest,
        source: &str,
    ) -> Result<SearchResult, SearchError> {
        let provider = self
            .registry
            .get(source)
            .cloned()
            .ok_or_else(|| SearchError::UnknownSource(source.to_string()))?;

        if !provider.is_available().await {
            return Err(SearchError::SourceUnavailable(provider.name().to_string()));
        }

        let request = self.prepare(request);
        let started = Instant::now();
        let outcome = provider.search(&request).await.timed(started);
        debug!(
            "{} returned {} assets in {}ms",
            outcome.source,
            outcome.assets.len(),
            outcome.elapsed_ms
        );

        self.assemble(&request, vec![outcome]).await
    }

    /// Details for one asset, from local storage or else the named provider
    pub async fn asset_details(
        &self,
        external_id: &str,
        source: &str,
    ) -> Result<Option<CanonicalAsset>, SearchError> {
        if let Some(asset) = self.repository.find(external_id, source).await? {
            debug!("Found {} in local storage", external_id);
            return Ok(Some(asset));
        }

        let provider = self
            .registry
            .get(source)
            .cloned()
            .ok_or_else(|| SearchError::UnknownSource(source.to_string()))?;

        if !provider.is_available().await {
            warn!("Cannot fetch {} details, {} is not available", external_id, provider.name());
            return Ok(None);
        }

        match provider.get_details(external_id).await {
            Some(asset) if asset.is_persistable() => Ok(Some(self.repository.upsert(asset).await?)),
            other => Ok(other),
        }
    }

    /// Record a completed search; failures are logged only
    pub async fn record_history(&self, request: &SearchRequest, result: &SearchResult) {
        let event = match HistoryEvent::from_search(request, result) {
            Ok(event) => event,
            Err(e) => {
                error!("Failed to build history event: {}", e);
                return;
            }
        };

        if let Err(e) = self.history.record(event).await {
            error!("Failed to record search history: {}", e);
        }
    }

    /// Most recent history events
    pub async fn recent_history(&self, limit: usize) -> Result<Vec<HistoryEvent>, SearchError> {
        Ok(self.history.recent(limit).await?)
    }

    /// Labels of the registered providers
    pub fn available_sources(&self) -> Vec<String> {
        self.registry.names()
    }

    fn prepare(&self, request: SearchRequest) -> SearchRequest {
        let mut request = request.normalized(self.default_page_size, self.max_page_size);
        // trademarks carry no inventors
        if request.route() == AssetRoute::Trademarks {
            request.inventor = None;
        }
        request
    }

    /// Merge, filter, persist and paginate provider outcomes
    async fn assemble(
        &self,
        request: &SearchRequest,
        outcomes: Vec<ProviderOutcome>,
    ) -> Result<SearchResult, SearchError> {
        let merged = self.merger.merge(outcomes);
        let data_source = merged.source_label();

        let filter = PostFilter::from_request(request);
        let assets = self.persist(filter.apply(merged.assets)).await?;
        let page_info = paginate(assets.len(), request.page, request.size);

        Ok(SearchResult::new(
            request,
            assets,
            page_info,
            data_source,
            merged.failures,
        ))
    }

    async fn persist(&self, assets: Vec<CanonicalAsset>) -> Result<Vec<CanonicalAsset>, StorageError> {
        let mut stored = Vec::with_capacity(assets.len());
        for asset in assets {
            if asset.is_persistable() {
                stored.push(self.repository.upsert(asset).await?);
            } else {
                stored.push(asset);
            }
        }
        Ok(stored)
    }
}
