//! IP-Federator: federated search across patent and trademark registries
//!
//! Fans a single search out to USPTO, EPO, Google Patents and TMView,
//! then merges, deduplicates, filters and persists the results.

pub mod assets;
pub mod config;
pub mod network;
pub mod providers;
pub mod search;
pub mod storage;
pub mod web;

pub use assets::CanonicalAsset;
pub use config::Settings;
pub use providers::{ProviderClient, ProviderOutcome};
pub use search::{FederatedSearch, SearchError, SearchRequest, SearchResult};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
