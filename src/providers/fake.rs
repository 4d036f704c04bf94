//! Scriptable in-memory provider for tests

use super::traits::*;
use crate::assets::CanonicalAsset;
use crate::search::SearchRequest;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

type Behavior =
    Box<dyn Fn(&SearchRequest) -> Result<Vec<CanonicalAsset>, ProviderFailure> + Send + Sync>;

pub struct FakeProvider {
    name: String,
    coverage: Coverage,
    available: bool,
    panics: bool,
    delay: Option<Duration>,
    details: Option<CanonicalAsset>,
    behavior: Behavior,
    calls: Mutex<Vec<SearchRequest>>,
}

impl FakeProvider {
    /// Provider answering every request through `behavior`
    pub fn with<F>(name: &str, behavior: F) -> Self
    where
        F: Fn(&SearchRequest) -> Result<Vec<CanonicalAsset>, ProviderFailure> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            coverage: Coverage::Patents,
            available: true,
            panics: false,
            delay: None,
            details: None,
            behavior: Box::new(behavior),
            calls: Mutex::new(vec![]),
        }
    }

    /// Provider always returning the same assets
    pub fn returning(name: &str, assets: Vec<CanonicalAsset>) -> Self {
        Self::with(name, move |_| Ok(assets.clone()))
    }

    /// Provider always failing
    pub fn failing(name: &str, failure: ProviderFailure) -> Self {
        Self::with(name, move |_| Err(failure.clone()))
    }

    pub fn trademarks(mut self) -> Self {
        self.coverage = Coverage::Trademarks;
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_details(mut self, asset: CanonicalAsset) -> Self {
        self.details = Some(asset);
        self
    }

    /// Requests received so far
    pub fn calls(&self) -> Vec<SearchRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ProviderClient for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn coverage(&self) -> Coverage {
        self.coverage
    }

    fn rate_limit_per_minute(&self) -> u32 {
        60
    }

    async fn search(&self, request: &SearchRequest) -> ProviderOutcome {
        self.calls.lock().unwrap().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panics {
            panic!("{} exploded", self.name);
        }

        match (self.behavior)(request) {
            Ok(assets) => ProviderOutcome::success(self.name.as_str(), assets),
            Err(failure) => ProviderOutcome::failed(self.name.as_str(), failure),
        }
    }

    async fn get_details(&self, external_id: &str) -> Option<CanonicalAsset> {
        self.details
            .clone()
            .filter(|a| a.external_id.as_deref() == Some(external_id))
    }

    async fn is_available(&self) -> bool {
        self.available
    }
}
