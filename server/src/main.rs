use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use signaling_server::config::{generate_config_template, Cli, Config};
use signaling_server::routes;
use signaling_server::state::AppState;

const DEFAULT_LOG_FILTER: &str = "signaling_server=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Handle --generate-config: print template and exit
    if cli.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load(&cli)?;

    // Initialize tracing/logging
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };
    if config.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter()).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(filter()).init();
    }

    tracing::info!("Signaling server v{} starting", env!("CARGO_PKG_VERSION"));
    if config.debug_endpoints {
        tracing::warn!("Room introspection routes enabled under /v1/rooms");
    }

    let state = AppState::new(&config);
    let app = routes::build_router(state, &config);

    // Bind and serve
    let addr = config.listen_address();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
