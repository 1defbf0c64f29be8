//! Actor resolution: WebFinger discovery followed by a signed actor fetch

use std::sync::Arc;

use http::{HeaderMap, HeaderValue, Method, header::ACCEPT};

use crate::error::{AppError, Result};
use crate::federation::actor::{ACTIVITY_MIMETYPE, ActorDocument};
use crate::federation::handle::FediverseHandle;
use crate::federation::signature::SignedRequestIssuer;
use crate::federation::webfinger::resolve_webfinger;
use crate::metrics::ACTOR_RESOLUTIONS_TOTAL;

/// Resolves fediverse handles into actor documents
///
/// Holds no mutable state; every call does a fresh discovery and fetch.
#[derive(Clone)]
pub struct ActorResolver {
    http_client: Arc<reqwest::Client>,
    issuer: SignedRequestIssuer,
    scheme: String,
}

impl ActorResolver {
    pub fn new(
        http_client: Arc<reqwest::Client>,
        issuer: SignedRequestIssuer,
        scheme: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            issuer,
            scheme: scheme.into(),
        }
    }

    /// Resolve `localuser@hostname` to its actor document
    ///
    /// # Errors
    /// `ActorNotFound` for every failure after the handle itself was
    /// accepted, transport failures included. No retries.
    #[tracing::instrument(skip_all, fields(handle = %handle))]
    pub async fn resolve(&self, handle: &FediverseHandle) -> Result<ActorDocument> {
        match self.try_resolve(handle).await {
            Ok(actor) => {
                ACTOR_RESOLUTIONS_TOTAL.with_label_values(&["ok"]).inc();
                tracing::info!(
                    preferred_username = %actor.preferred_username,
                    "Actor resolved"
                );
                Ok(actor)
            }
            Err(error) => {
                ACTOR_RESOLUTIONS_TOTAL
                    .with_label_values(&[error.kind()])
                    .inc();
                tracing::debug!(%error, "Actor resolution failed");
                Err(AppError::ActorNotFound(handle.to_string()))
            }
        }
    }

    async fn try_resolve(&self, handle: &FediverseHandle) -> Result<ActorDocument> {
        // 1. WebFinger discovery
        let actor_url = resolve_webfinger(handle, &self.scheme, &self.http_client).await?;
        tracing::debug!(%actor_url, "WebFinger resolved");

        // 2. Signed actor fetch
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACTIVITY_MIMETYPE));
        let response = self
            .issuer
            .sign_and_send(Method::GET, &actor_url, headers, Vec::new())
            .await?;

        if !response.status().is_success() {
            tracing::debug!(%actor_url, status = %response.status(), "Actor fetch failed");
            return Err(AppError::ActorNotFound(handle.to_string()));
        }

        // 3. Parse
        let body = response.bytes().await?;
        serde_json::from_slice::<ActorDocument>(&body).map_err(|e| {
            tracing::debug!(%actor_url, error = %e, "Actor document did not parse");
            AppError::ActorNotFound(handle.to_string())
        })
    }
}
