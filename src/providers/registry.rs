//! Provider registry for managing configured registries

use super::traits::ProviderClient;
use crate::search::AssetRoute;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of all loaded providers, keyed by data-source label
pub struct ProviderRegistry {
    /// Providers by uppercased label
    providers: HashMap<String, Arc<dyn ProviderClient>>,
    /// Labels in registration order
    order: Vec<String>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a provider, replacing any earlier one with the same label
    pub fn register(&mut self, provider: Arc<dyn ProviderClient>) {
        let key = provider.name().to_uppercase();

        if !self.providers.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.providers.insert(key, provider);
    }

    /// Get a provider by label, case-insensitively
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ProviderClient>> {
        self.providers.get(&name.trim().to_uppercase())
    }

    /// All providers in registration order
    pub fn all(&self) -> Vec<Arc<dyn ProviderClient>> {
        self.order
            .iter()
            .filter_map(|key| self.providers.get(key).cloned())
            .collect()
    }

    /// Providers serving a route
    pub fn eligible(&self, route: AssetRoute) -> Vec<Arc<dyn ProviderClient>> {
        self.all()
            .into_iter()
            .filter(|p| p.coverage().serves(route))
            .collect()
    }

    /// Labels of all providers in registration order
    pub fn names(&self) -> Vec<String> {
        self.all().iter().map(|p| p.name().to_string()).collect()
    }

    /// Get number of registered providers
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::fake::FakeProvider;

    fn registry() -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        for provider in [
            FakeProvider::returning("USPTO", vec![]),
            FakeProvider::returning("EPO", vec![]),
            FakeProvider::returning("TMVIEW", vec![]).trademarks(),
        ] {
            registry.register(Arc::new(provider));
        }
        registry
    }

    #[test]
    fn test_registry_lookup() {
        let registry = registry();
        assert_eq!(registry.len(), 3);
        assert!(registry.get("uspto").is_some());
        assert!(registry.get(" Epo ").is_some());
        assert!(registry.get("WIPO").is_none());
        assert_eq!(registry.names(), vec!["USPTO", "EPO", "TMVIEW"]);
    }

    #[test]
    fn test_reregistering_keeps_position() {
        let mut registry = registry();
        registry.register(Arc::new(FakeProvider::returning("usPTO", vec![])));

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.names(), vec!["usPTO", "EPO", "TMVIEW"]);
    }

    #[test]
    fn test_eligibility_by_route() {
        let registry = registry();

        let patents: Vec<String> = registry
            .eligible(AssetRoute::Patents)
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(patents, vec!["USPTO", "EPO"]);

        let trademarks = registry.eligible(AssetRoute::Trademarks);
        assert_eq!(trademarks.len(), 1);
        assert_eq!(trademarks[0].name(), "TMVIEW");
    }
}
