//! Concurrent fan-out across registry providers

use super::models::SearchRequest;
use crate::providers::{ProviderClient, ProviderFailure, ProviderOutcome};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Dispatches one request to many providers and collects their outcomes
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOrchestrator;

impl SearchOrchestrator {
    pub fn new() -> Self {
        Self
    }

    /// Run `request` against every provider in parallel
    ///
    /// Each provider runs in its own task and reports availability first;
    /// unavailable providers contribute no outcome. A provider that panics
    /// yields a failed outcome. Returns once every task has finished.
    pub async fn dispatch(
        &self,
        request: Arc<SearchRequest>,
        providers: Vec<Arc<dyn ProviderClient>>,
    ) -> Vec<ProviderOutcome> {
        let start = Instant::now();
        let names: Vec<String> = providers.iter().map(|p| p.name().to_string()).collect();

        info!(
            "Dispatching search '{}' to {} providers",
            request.display_query(),
            providers.len()
        );

        let handles: Vec<_> = providers
            .into_iter()
            .map(|provider| {
                let request = request.clone();
                tokio::spawn(async move {
                    if !provider.is_available().await {
                        info!("Provider {} is not available, skipping", provider.name());
                        return None;
                    }
                    let started = Instant::now();
                    Some(provider.search(&request).await.timed(started))
                })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (name, joined) in names.into_iter().zip(join_all(handles).await) {
            match joined {
                Ok(Some(outcome)) => {
                    debug!(
                        "{} returned {} assets in {}ms",
                        outcome.source,
                        outcome.assets.len(),
                        outcome.elapsed_ms
                    );
                    outcomes.push(outcome);
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Provider task for {} failed: {}", name, e);
                    outcomes.push(ProviderOutcome::failed(
                        name,
                        ProviderFailure::Panicked(e.to_string()),
                    ));
                }
            }
        }

        info!(
            "Collected {} outcomes in {}ms",
            outcomes.len(),
            start.elapsed().as_millis()
        );

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::CanonicalAsset;
    use crate::providers::fake::FakeProvider;
    use std::time::Duration;

    fn asset(id: &str) -> CanonicalAsset {
        CanonicalAsset::new(id, "USPTO", "USPTO")
    }

    fn sources(outcomes: &[ProviderOutcome]) -> Vec<&str> {
        let mut names: Vec<_> = outcomes.iter().map(|o| o.source.as_str()).collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_dispatch_collects_every_provider() {
        let providers: Vec<Arc<dyn ProviderClient>> = vec![
            Arc::new(FakeProvider::returning("A", vec![asset("1"), asset("2")])),
            Arc::new(FakeProvider::returning("B", vec![asset("3")])),
        ];

        let outcomes = SearchOrchestrator::new()
            .dispatch(Arc::new(SearchRequest::simple("x")), providers)
            .await;

        assert_eq!(sources(&outcomes), vec!["A", "B"]);
        assert_eq!(outcomes.iter().map(|o| o.assets.len()).sum::<usize>(), 3);
    }

    #[tokio::test]
    async fn test_unavailable_provider_is_skipped() {
        let down = Arc::new(FakeProvider::returning("DOWN", vec![asset("1")]).unavailable());
        let providers: Vec<Arc<dyn ProviderClient>> = vec![
            down.clone(),
            Arc::new(FakeProvider::returning("UP", vec![asset("2")])),
        ];

        let outcomes = SearchOrchestrator::new()
            .dispatch(Arc::new(SearchRequest::simple("x")), providers)
            .await;

        assert_eq!(sources(&outcomes), vec!["UP"]);
        assert_eq!(down.call_count(), 0);
    }

    #[tokio::test]
    async fn test_panicking_provider_becomes_failure() {
        let providers: Vec<Arc<dyn ProviderClient>> = vec![
            Arc::new(FakeProvider::returning("BOOM", vec![]).panicking()),
            Arc::new(FakeProvider::returning("OK", vec![asset("1")])),
        ];

        let outcomes = SearchOrchestrator::new()
            .dispatch(Arc::new(SearchRequest::simple("x")), providers)
            .await;

        assert_eq!(outcomes.len(), 2);
        let boom = outcomes.iter().find(|o| o.source == "BOOM").unwrap();
        assert!(matches!(boom.failure, Some(ProviderFailure::Panicked(_))));
        let ok = outcomes.iter().find(|o| o.source == "OK").unwrap();
        assert!(ok.is_success());
        assert_eq!(ok.assets.len(), 1);
    }

    #[tokio::test]
    async fn test_failing_provider_does_not_affect_others() {
        let providers: Vec<Arc<dyn ProviderClient>> = vec![
            Arc::new(FakeProvider::failing("BAD", ProviderFailure::Http(500))),
            Arc::new(FakeProvider::returning("GOOD", vec![asset("1")])),
        ];

        let outcomes = SearchOrchestrator::new()
            .dispatch(Arc::new(SearchRequest::simple("x")), providers)
            .await;

        let bad = outcomes.iter().find(|o| o.source == "BAD").unwrap();
        assert_eq!(bad.failure, Some(ProviderFailure::Http(500)));
        assert!(bad.assets.is_empty());
        let good = outcomes.iter().find(|o| o.source == "GOOD").unwrap();
        assert_eq!(good.assets.len(), 1);
    }

    #[tokio::test]
    async fn test_providers_run_in_parallel() {
        let providers: Vec<Arc<dyn ProviderClient>> = (0..4)
            .map(|i| {
                Arc::new(
                    FakeProvider::returning(&format!("P{}", i), vec![asset(&i.to_string())])
                        .delayed(Duration::from_millis(200)),
                ) as Arc<dyn ProviderClient>
            })
            .collect();

        let start = Instant::now();
        let outcomes = SearchOrchestrator::new()
            .dispatch(Arc::new(SearchRequest::simple("x")), providers)
            .await;

        assert_eq!(outcomes.len(), 4);
        assert!(start.elapsed() < Duration::from_millis(700));
        assert!(outcomes.iter().all(|o| o.elapsed_ms >= 200));
    }

    #[tokio::test]
    async fn test_empty_provider_list() {
        let outcomes = SearchOrchestrator::new()
            .dispatch(Arc::new(SearchRequest::simple("x")), vec![])
            .await;
        assert!(outcomes.is_empty());
    }
}
