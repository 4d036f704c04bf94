//! IP-Federator server entry point

use anyhow::Result;
use ip_federator::{
    config,
    network::HttpClient,
    providers::ProviderLoader,
    web::{create_router, AppState},
};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let Some(config_path) = parse_args()? else {
        return Ok(());
    };

    // Load configuration
    let settings = config::load(config_path)?;

    // Initialize logging
    let default_level = if settings.general.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("Starting IP-Federator v{}", ip_federator::VERSION);
    info!("Loaded configuration for instance: {}", settings.general.instance_name);

    // Initialize HTTP client
    let client = HttpClient::with_settings(&settings.outgoing)?;
    info!("HTTP client initialized");

    // Load providers
    let registry = ProviderLoader::load(&settings, &client)?;
    info!("Loaded {} registry providers", registry.len());

    // Create application state
    let state = AppState::new(settings.clone(), registry);
    let app = create_router(state);

    // Bind address
    let addr = SocketAddr::new(
        settings.server.bind_address.parse()?,
        settings.server.port,
    );

    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Parse command-line arguments
///
/// Returns `None` when the process should exit after printing help or version.
fn parse_args() -> Result<Option<Option<PathBuf>>> {
    let mut config_path = None;
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("{} requires a file argument", arg))?;
                config_path = Some(PathBuf::from(path));
            }
            "-h" | "--help" => {
                print_usage();
                return Ok(None);
            }
            "-V" | "--version" => {
                println!("ip-federator {}", ip_federator::VERSION);
                return Ok(None);
            }
            other => anyhow::bail!("Unknown argument: {} (see --help)", other),
        }
    }

    Ok(Some(config_path))
}

/// Print usage information
fn print_usage() {
    println!(
        r#"
IP-Federator v{}
Federated search across patent and trademark registries

USAGE:
    ip-federator [OPTIONS]

OPTIONS:
    -c, --config <FILE>    Path to configuration file
    -h, --help             Print help information
    -V, --version          Print version information

ENVIRONMENT VARIABLES:
    GLOBALIP_SETTINGS_PATH     Path to settings.yml
    GLOBALIP_DEBUG             Enable debug logging (true/false)
    GLOBALIP_PORT              Server port
    GLOBALIP_BIND_ADDRESS      Bind address
    GLOBALIP_USPTO_API_KEY     USPTO API key
    GLOBALIP_EPO_CONSUMER_KEY  EPO OPS consumer key
    GLOBALIP_EPO_CONSUMER_SECRET
                               EPO OPS consumer secret
    GLOBALIP_WAREHOUSE_PROJECT Google Patents warehouse project id
    GLOBALIP_WAREHOUSE_TOKEN   Google Patents warehouse access token
    GLOBALIP_TMVIEW_RENDER_URL TMView rendering gateway URL
    GLOBALIP_WIPO_API_KEY      PATENTSCOPE bearer token
    GLOBALIP_SERPAPI_KEY       SerpApi key (SERPAPI is skipped without one)
    GLOBALIP_OPENALEX_MAILTO   Contact address for OpenAlex requests
    RUST_LOG                   Log filter (overrides debug setting)
"#,
        ip_federator::VERSION
    );
}
