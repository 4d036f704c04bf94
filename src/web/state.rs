//! Application state shared across handlers

use crate::config::Settings;
use crate::providers::ProviderRegistry;
use crate::search::FederatedSearch;
use crate::storage::{MemoryAssetStore, MemoryHistory};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Global settings
    pub settings: Arc<Settings>,
    /// Search service
    pub search: Arc<FederatedSearch>,
}

impl AppState {
    /// Create state backed by the in-memory stores
    pub fn new(settings: Settings, registry: ProviderRegistry) -> Self {
        let repository = Arc::new(MemoryAssetStore::new(
            settings.storage.asset_ttl,
            settings.storage.asset_capacity,
        ));
        let history = Arc::new(MemoryHistory::new(settings.storage.history_capacity));
        let search = FederatedSearch::new(Arc::new(registry), repository, history, &settings.search);

        Self::with_search(settings, search)
    }

    /// Create state around an already assembled search service
    pub fn with_search(settings: Settings, search: FederatedSearch) -> Self {
        Self {
            settings: Arc::new(settings),
            search: Arc::new(search),
        }
    }

    /// Get instance name
    pub fn instance_name(&self) -> &str {
        &self.settings.general.instance_name
    }
}
