//! fedilookup - Fediverse profile lookup with a minimal instance actor
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - /.well-known/webfinger (instance actor only)             │
//! │  - /instance_actor                                          │
//! │  - /health, /metrics                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Profile lookup and chat reply formatting                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Federation Layer                          │
//! │  - WebFinger discovery, actor fetch                         │
//! │  - HTTP Signatures as the instance actor                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers and the route table
//! - `service`: Profile lookup for chat commands
//! - `federation`: ActivityPub federation handling
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod config;
pub mod error;
pub mod federation;
pub mod metrics;
pub mod service;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// Everything in here is immutable after startup.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Instance actor identity and key material
    pub instance: Arc<federation::InstanceActor>,

    /// Actor resolver signing as the instance actor
    pub resolver: Arc<federation::ActorResolver>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Load or generate the instance key
    /// 2. Build the HTTP client
    /// 3. Wire the signed request issuer and actor resolver
    ///
    /// # Errors
    /// Returns error if the key cannot be loaded or generated, or the
    /// HTTP client cannot be built
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        // 1. Instance actor
        let instance = federation::InstanceActor::from_config(&config).await?;
        tracing::info!(
            actor = %instance.actor_url(),
            key_id = %instance.key_id(),
            "Instance actor ready"
        );

        // 2. HTTP client
        let http_client = reqwest::Client::builder()
            .user_agent(config.http.user_agent.clone())
            .timeout(std::time::Duration::from_secs(config.http.timeout_seconds))
            .build()
            .map_err(|e| error::AppError::Internal(e.into()))?;
        let http_client = Arc::new(http_client);

        Ok(Self::from_parts(config, instance, http_client))
    }

    /// Assemble state from an already built instance actor and client
    pub fn from_parts(
        config: config::AppConfig,
        instance: federation::InstanceActor,
        http_client: Arc<reqwest::Client>,
    ) -> Self {
        // 3. Issuer and resolver
        let issuer = federation::SignedRequestIssuer::new(
            http_client.clone(),
            instance.keypair().clone(),
            instance.key_id().to_string(),
        );
        let resolver =
            federation::ActorResolver::new(http_client, issuer, &config.federation.scheme);

        Self {
            config: Arc::new(config),
            instance: Arc::new(instance),
            resolver: Arc::new(resolver),
        }
    }

    /// Profile lookup service over this state's resolver
    pub fn profile_service(&self) -> service::ProfileService {
        service::ProfileService::new(self.resolver.clone())
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use tower_http::trace::TraceLayer;

    api::routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
