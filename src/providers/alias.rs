//! Entity alias expansion
//!
//! Registries index the same company under several spellings. The decorator
//! here fans an assignee or inventor search out over every known variant of
//! the name and falls back to a keyword search when none of them matched.

use super::traits::*;
use crate::assets::{CanonicalAsset, ResultMerger};
use crate::search::SearchRequest;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Canonical entity names and the variants searched in their place
#[derive(Debug, Clone, Default)]
pub struct AliasSet {
    /// Lowercased, trimmed key -> variants
    entries: HashMap<String, Vec<String>>,
}

impl AliasSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a configuration map
    pub fn from_map(map: &HashMap<String, Vec<String>>) -> Self {
        let mut set = Self::new();
        for (key, variants) in map {
            set.insert(key, variants.clone());
        }
        set
    }

    /// Register the variants of a name
    pub fn insert(&mut self, key: &str, variants: Vec<String>) {
        self.entries.insert(normalize(key), variants);
    }

    /// Names to search for `value`, without case-insensitive duplicates
    ///
    /// Unknown names expand to themselves.
    pub fn expand(&self, value: &str) -> Vec<String> {
        let candidates = match self.entries.get(&normalize(value)) {
            Some(variants) if !variants.is_empty() => variants.clone(),
            _ => vec![value.trim().to_string()],
        };

        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(|c| !c.trim().is_empty())
            .filter(|c| seen.insert(normalize(c)))
            .collect()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Wraps a provider with alias expansion and keyword fallback
pub struct AliasExpansionDecorator {
    inner: Arc<dyn ProviderClient>,
    aliases: Arc<AliasSet>,
    merger: ResultMerger,
}

impl AliasExpansionDecorator {
    pub fn new(inner: Arc<dyn ProviderClient>, aliases: Arc<AliasSet>, merger: ResultMerger) -> Self {
        Self {
            inner,
            aliases,
            merger,
        }
    }
}

#[async_trait]
impl ProviderClient for AliasExpansionDecorator {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn coverage(&self) -> Coverage {
        self.inner.coverage()
    }

    fn about(&self) -> ProviderAbout {
        self.inner.about()
    }

    fn rate_limit_per_minute(&self) -> u32 {
        self.inner.rate_limit_per_minute()
    }

    async fn search(&self, request: &SearchRequest) -> ProviderOutcome {
        let Some((field, value)) = request.entity_filter() else {
            return self.inner.search(request).await;
        };

        let start = Instant::now();
        let names = self.aliases.expand(value);
        if names.len() > 1 {
            info!(
                "{}: expanding {:?} '{}' into {} aliases",
                self.name(),
                field,
                value,
                names.len()
            );
        }

        // One request at a time, within the registry's rate limit
        let mut outcomes = Vec::with_capacity(names.len() + 1);
        for name in &names {
            let outcome = self.inner.search(&request.with_entity(field, name)).await;
            debug!("{}: alias '{}' returned {} assets", self.name(), name, outcome.assets.len());
            outcomes.push(outcome);
        }

        if outcomes.iter().all(|o| o.assets.is_empty()) {
            info!("{}: no hits for '{}', retrying as keyword search", self.name(), value);
            outcomes.push(self.inner.search(&request.keyword_fallback(value)).await);
        }

        let all_failed = outcomes.iter().all(|o| !o.is_success());
        let last_failure = outcomes.iter().rev().find_map(|o| o.failure.clone());

        let merged: Vec<CanonicalAsset> = self.merger.merge(outcomes).assets;

        match last_failure {
            Some(failure) if all_failed => ProviderOutcome::failed(self.name(), failure).timed(start),
            _ => ProviderOutcome::success(self.name(), merged).timed(start),
        }
    }

    async fn get_details(&self, external_id: &str) -> Option<CanonicalAsset> {
        self.inner.get_details(external_id).await
    }

    async fn is_available(&self) -> bool {
        self.inner.is_available().await
    }
}
