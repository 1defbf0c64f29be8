//! fedilookup binary entry point

use clap::{Parser, Subcommand};
use fedilookup::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Fediverse profile lookup
#[derive(Debug, Parser)]
#[command(name = "fedilookup", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the instance actor and WebFinger endpoints (default)
    Serve,
    /// Look up a fediverse account and print the profile line
    Profile {
        /// Account address, e.g. @alice@example.org
        handle: String,
    },
}

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging and metrics
/// 3. Initialize AppState
/// 4. Serve, or run a single profile lookup
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 1. Load configuration
    let config = config::AppConfig::load()?;

    // 2. Initialize tracing/logging
    init_tracing(&config.logging);
    tracing::info!(
        public_url = %config.server.public_url,
        "Configuration loaded"
    );

    fedilookup::metrics::init_metrics();

    // 3. Initialize application state
    let state = AppState::new(config.clone()).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state, &config).await?,
        Command::Profile { handle } => {
            println!("{}", state.profile_service().reply(&handle).await);
        }
    }

    Ok(())
}

fn init_tracing(logging: &config::LoggingConfig) {
    let default_filter = format!("fedilookup={},tower_http=debug", logging.level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    if logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

async fn serve(
    state: AppState,
    config: &config::AppConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = fedilookup::build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Public URL: {}", config.server.base_url());

    axum::serve(listener, app).await?;

    Ok(())
}
