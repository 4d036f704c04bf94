//! In-memory storage backends

use super::{AssetRepository, HistoryEvent, HistoryRecorder, StorageError};
use crate::assets::CanonicalAsset;
use async_trait::async_trait;
use chrono::Utc;
use moka::future::Cache;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::RwLock;

/// Bounded asset store with time-based expiry
pub struct MemoryAssetStore {
    cache: Cache<String, CanonicalAsset>,
}

impl MemoryAssetStore {
    /// Create a store with the given TTL and capacity
    pub fn new(ttl_seconds: u64, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(ttl_seconds))
            .max_capacity(max_capacity)
            .build();

        Self { cache }
    }

    fn key(external_id: &str, patent_office: &str) -> String {
        format!("{}_{}", external_id.trim(), patent_office.trim().to_uppercase())
    }
}

impl Default for MemoryAssetStore {
    fn default() -> Self {
        Self::new(86400, 100_000)
    }
}

#[async_trait]
impl AssetRepository for MemoryAssetStore {
    async fn upsert(&self, asset: CanonicalAsset) -> Result<CanonicalAsset, StorageError> {
        let Some(external_id) = asset.external_id.as_deref().filter(|id| !id.trim().is_empty()) else {
            return Err(StorageError::MissingIdentifier);
        };
        let key = Self::key(external_id, asset.patent_office.as_deref().unwrap_or_default());

        let mut stored = match self.cache.get(&key).await {
            Some(mut existing) => {
                existing.refresh_from(&asset);
                existing
            }
            None => asset,
        };
        stored.updated_at = Some(Utc::now());

        self.cache.insert(key, stored.clone()).await;
        Ok(stored)
    }

    async fn find(
        &self,
        external_id: &str,
        patent_office: &str,
    ) -> Result<Option<CanonicalAsset>, StorageError> {
        Ok(self.cache.get(&Self::key(external_id, patent_office)).await)
    }
}

/// Bounded ring of recent history events
pub struct MemoryHistory {
    events: RwLock<VecDeque<HistoryEvent>>,
    capacity: usize,
}

impl MemoryHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl HistoryRecorder for MemoryHistory {
    async fn record(&self, event: HistoryEvent) -> Result<(), StorageError> {
        let mut events = self.events.write().await;
        events.push_front(event);
        events.truncate(self.capacity);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<HistoryEvent>, StorageError> {
        let events = self.events.read().await;
        Ok(events.iter().take(limit).cloned().collect())
    }
}
