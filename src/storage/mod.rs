//! Local persistence for assets and search history
//!
//! The search pipeline only sees the two traits defined here; the bundled
//! server wires in the in-memory implementations.

mod history;
mod memory;

pub use history::{normalize_source_label, HistoryEvent};
pub use memory::{MemoryAssetStore, MemoryHistory};

use crate::assets::CanonicalAsset;
use async_trait::async_trait;

/// Storage failure
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("asset has no external id")]
    MissingIdentifier,
    #[error("failed to serialize record: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Asset store keyed by `(external_id, patent_office)`
#[async_trait]
pub trait AssetRepository: Send + Sync {
    /// Insert the asset, or refresh the stored record with the same identity
    async fn upsert(&self, asset: CanonicalAsset) -> Result<CanonicalAsset, StorageError>;

    /// Look up a stored asset
    async fn find(
        &self,
        external_id: &str,
        patent_office: &str,
    ) -> Result<Option<CanonicalAsset>, StorageError>;
}

/// Sink for completed-search records
#[async_trait]
pub trait HistoryRecorder: Send + Sync {
    async fn record(&self, event: HistoryEvent) -> Result<(), StorageError>;

    /// Most recent events first
    async fn recent(&self, limit: usize) -> Result<Vec<HistoryEvent>, StorageError>;
}
