//! Provider loader for initializing providers from configuration

use super::alias::{AliasExpansionDecorator, AliasSet};
use super::registry::ProviderRegistry;
use super::traits::ProviderClient;
use super::{epo, google_patents, openalex, serpapi, tmview, uspto, wipo};
use crate::assets::ResultMerger;
use crate::config::{ProviderConfig, Settings};
use crate::network::HttpClient;
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Loader for initializing providers from configuration
pub struct ProviderLoader;

impl ProviderLoader {
    /// Load all enabled providers from settings
    pub fn load(settings: &Settings, client: &HttpClient) -> Result<ProviderRegistry> {
        let mut registry = ProviderRegistry::new();
        let aliases = Arc::new(AliasSet::from_map(&settings.aliases));
        let merger = ResultMerger::new(settings.search.default_patent_office.clone());

        for config in &settings.providers {
            if config.disabled {
                info!("Skipping disabled provider: {}", config.name);
                continue;
            }

            match Self::create_provider(&config.provider, config, client.clone()) {
                Ok(provider) => {
                    let provider = if config.alias_expansion {
                        info!("Alias expansion enabled for {}", config.name);
                        Arc::new(AliasExpansionDecorator::new(
                            provider,
                            aliases.clone(),
                            merger.clone(),
                        )) as Arc<dyn ProviderClient>
                    } else {
                        provider
                    };

                    info!(
                        "Loaded provider: {} ({}, {}/min)",
                        config.name,
                        provider.name(),
                        provider.rate_limit_per_minute()
                    );
                    registry.register(provider);
                }
                Err(e) => {
                    warn!("Failed to load provider {}: {}", config.name, e);
                }
            }
        }

        info!("Loaded {} providers", registry.len());
        Ok(registry)
    }

    /// Create a provider instance by type
    fn create_provider(
        provider_type: &str,
        config: &ProviderConfig,
        client: HttpClient,
    ) -> Result<Arc<dyn ProviderClient>> {
        let provider: Arc<dyn ProviderClient> = match provider_type {
            "uspto" => Arc::new(uspto::Uspto::new(client, config)),
            "epo" => Arc::new(epo::Epo::new(client, config)),
            "google_patents" => Arc::new(google_patents::GooglePatents::new(client, config)),
            "tmview" => Arc::new(tmview::TmView::new(client, config)),
            "wipo" => Arc::new(wipo::Wipo::new(client, config)),
            "serpapi" => Arc::new(serpapi::SerpApi::new(client, config)),
            "openalex" => Arc::new(openalex::OpenAlex::new(client, config)),
            _ => {
                return Err(anyhow::anyhow!("Unknown provider type: {}", provider_type));
            }
        };

        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Coverage;

    #[test]
    fn test_load_default_providers() {
        let registry = ProviderLoader::load(&Settings::default(), &HttpClient::new().unwrap()).unwrap();

        assert_eq!(
            registry.names(),
            vec!["USPTO", "EPO", "GOOGLE_PATENT", "TMVIEW", "WIPO", "SERPAPI", "OPENALEX"]
        );
        assert_eq!(registry.get("TMVIEW").unwrap().coverage(), Coverage::Trademarks);
        assert_eq!(registry.get("EPO").unwrap().rate_limit_per_minute(), 30);
        assert_eq!(registry.get("OPENALEX").unwrap().rate_limit_per_minute(), 600);
    }

    #[test]
    fn test_skips_disabled_and_unknown() {
        let mut settings = Settings::default();
        settings.providers = vec![
            ProviderConfig::of("uspto"),
            ProviderConfig {
                disabled: true,
                ..ProviderConfig::of("epo")
            },
            ProviderConfig::of("kipo"),
        ];

        let registry = ProviderLoader::load(&settings, &HttpClient::new().unwrap()).unwrap();
        assert_eq!(registry.names(), vec!["USPTO"]);
    }
}
