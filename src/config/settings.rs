//! Settings structures for IP-Federator configuration

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Main settings structure matching settings.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub server: ServerSettings,
    pub outgoing: OutgoingSettings,
    pub search: SearchSettings,
    pub storage: StorageSettings,
    pub providers: Vec<ProviderConfig>,
    /// Canonical entity name -> name variants searched in its place
    pub aliases: HashMap<String, Vec<String>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            general: GeneralSettings::default(),
            server: ServerSettings::default(),
            outgoing: OutgoingSettings::default(),
            search: SearchSettings::default(),
            storage: StorageSettings::default(),
            providers: default_providers(),
            aliases: default_aliases(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse settings from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(content)?;
        Ok(settings)
    }

    /// Merge with environment variables (GLOBALIP_* prefix)
    pub fn merge_env(&mut self) {
        self.merge_vars(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any variable source
    pub fn merge_vars<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = var("GLOBALIP_DEBUG") {
            self.general.debug = val.parse().unwrap_or(false);
        }
        if let Some(val) = var("GLOBALIP_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Some(val) = var("GLOBALIP_BIND_ADDRESS") {
            self.server.bind_address = val;
        }

        if let Some(val) = var("GLOBALIP_USPTO_API_KEY") {
            self.provider_mut("uspto", |p| p.api_key = Some(val.clone()));
        }
        if let Some(val) = var("GLOBALIP_EPO_CONSUMER_KEY") {
            self.provider_mut("epo", |p| p.consumer_key = Some(val.clone()));
        }
        if let Some(val) = var("GLOBALIP_EPO_CONSUMER_SECRET") {
            self.provider_mut("epo", |p| p.consumer_secret = Some(val.clone()));
        }
        if let Some(val) = var("GLOBALIP_WAREHOUSE_PROJECT") {
            self.provider_mut("google_patents", |p| p.project_id = Some(val.clone()));
        }
        if let Some(val) = var("GLOBALIP_WAREHOUSE_TOKEN") {
            self.provider_mut("google_patents", |p| p.access_token = Some(val.clone()));
        }
        if let Some(val) = var("GLOBALIP_TMVIEW_RENDER_URL") {
            self.provider_mut("tmview", |p| p.render_url = Some(val.clone()));
        }
        if let Some(val) = var("GLOBALIP_WIPO_API_KEY") {
            self.provider_mut("wipo", |p| p.api_key = Some(val.clone()));
        }
        if let Some(val) = var("GLOBALIP_SERPAPI_KEY") {
            self.provider_mut("serpapi", |p| p.api_key = Some(val.clone()));
        }
        if let Some(val) = var("GLOBALIP_OPENALEX_MAILTO") {
            self.provider_mut("openalex", |p| p.mailto = Some(val.clone()));
        }
    }

    /// Apply a change to every entry of the given provider type
    fn provider_mut<F>(&mut self, provider: &str, apply: F)
    where
        F: Fn(&mut ProviderConfig),
    {
        self.providers
            .iter_mut()
            .filter(|p| p.provider == provider)
            .for_each(apply);
    }

    /// Get provider config by name
    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }
}

/// General settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Enable debug logging
    pub debug: bool,
    /// Instance name reported by the API
    pub instance_name: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            debug: false,
            instance_name: "IP-Federator".to_string(),
        }
    }
}

/// Server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Server port
    pub port: u16,
    /// Bind address
    pub bind_address: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "127.0.0.1".to_string(),
        }
    }
}

/// Outgoing request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutgoingSettings {
    /// Default request timeout in seconds
    pub request_timeout: f64,
    /// Pool max size
    pub pool_maxsize: usize,
    /// Verify SSL certificates
    pub verify_ssl: bool,
    /// Proxy settings
    pub proxies: ProxySettings,
    /// User agent sent to registries
    pub user_agent: String,
    /// Extra headers to send
    pub extra_headers: HashMap<String, String>,
}

impl Default for OutgoingSettings {
    fn default() -> Self {
        Self {
            request_timeout: 30.0,
            pool_maxsize: 20,
            verify_ssl: true,
            proxies: ProxySettings::default(),
            user_agent: format!("ip-federator/{}", env!("CARGO_PKG_VERSION")),
            extra_headers: HashMap::new(),
        }
    }
}

/// Proxy settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    pub http: Option<String>,
    pub https: Option<String>,
    pub all: Option<String>,
}

/// Search pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Page size when the request gives none
    pub default_page_size: u32,
    /// Upper bound on the requested page size
    pub max_page_size: u32,
    /// Office assumed for assets that carry none
    pub default_patent_office: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
            default_patent_office: "EPO".to_string(),
        }
    }
}

/// Local asset and history storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Seconds an asset stays in the local store
    pub asset_ttl: u64,
    /// Maximum number of stored assets
    pub asset_capacity: u64,
    /// Maximum number of history events kept
    pub history_capacity: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            asset_ttl: 86400,
            asset_capacity: 100_000,
            history_capacity: 1000,
        }
    }
}

/// Individual provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider name (unique identifier)
    pub name: String,
    /// Provider implementation to use
    pub provider: String,
    /// Whether the provider is disabled
    pub disabled: bool,
    /// Override for the registry base URL
    pub base_url: Option<String>,
    /// API key if required
    pub api_key: Option<String>,
    /// OAuth client id
    pub consumer_key: Option<String>,
    /// OAuth client secret
    pub consumer_secret: Option<String>,
    /// Warehouse project
    pub project_id: Option<String>,
    /// Pre-issued bearer token
    pub access_token: Option<String>,
    /// Rendering gateway endpoint
    pub render_url: Option<String>,
    /// Contact address sent with requests to open scholarly APIs
    pub mailto: Option<String>,
    /// Wrap the provider with entity alias expansion
    pub alias_expansion: bool,
    /// Custom timeout for this provider in seconds
    pub timeout: Option<f64>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            provider: String::new(),
            disabled: false,
            base_url: None,
            api_key: None,
            consumer_key: None,
            consumer_secret: None,
            project_id: None,
            access_token: None,
            render_url: None,
            mailto: None,
            alias_expansion: false,
            timeout: None,
        }
    }
}

impl ProviderConfig {
    /// Entry for a provider type, named after it
    pub fn of(provider: &str) -> Self {
        Self {
            name: provider.to_string(),
            provider: provider.to_string(),
            ..Default::default()
        }
    }
}

/// Default provider configurations
fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig::of("uspto"),
        ProviderConfig {
            alias_expansion: true,
            ..ProviderConfig::of("epo")
        },
        ProviderConfig::of("google_patents"),
        ProviderConfig::of("tmview"),
        ProviderConfig::of("wipo"),
        ProviderConfig::of("serpapi"),
        ProviderConfig::of("openalex"),
    ]
}

/// Default entity alias table
fn default_aliases() -> HashMap<String, Vec<String>> {
    let ibm = [
        "IBM",
        "IBM Corporation",
        "International Business Machines",
        "International Business Machines Corporation",
    ];

    ["IBM", "International Business Machines", "International Business Machines Corporation"]
        .into_iter()
        .map(|key| {
            // the key itself leads its variant list
            let mut variants = vec![key.to_string()];
            variants.extend(ibm.iter().filter(|v| **v != key).map(|v| v.to_string()));
            (key.to_string(), variants)
        })
        .collect()
}
