//! WebFinger protocol implementation
//!
//! Used to discover ActivityPub actor URIs from addresses, and to answer
//! discovery queries for the instance actor.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::federation::actor::ACTIVITY_MIMETYPE;
use crate::federation::handle::FediverseHandle;

/// Media type of WebFinger responses
pub const JRD_MIMETYPE: &str = "application/jrd+json";

/// WebFinger JRD response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebFingerResponse {
    #[serde(default)]
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aliases: Option<Vec<String>>,
    #[serde(default)]
    pub links: Vec<WebFingerLink>,
}

/// WebFinger link
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebFingerLink {
    #[serde(default)]
    pub rel: String,
    #[serde(rename = "type")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

impl WebFingerResponse {
    /// `href` of the `rel=self`, `type=application/activity+json` link
    pub fn actor_url(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|link| {
                link.rel == "self" && link.link_type.as_deref() == Some(ACTIVITY_MIMETYPE)
            })
            .and_then(|link| link.href.as_deref())
    }
}

/// WebFinger URL for `handle` on its home server
pub fn webfinger_url(scheme: &str, handle: &FediverseHandle) -> Result<url::Url> {
    let mut url = url::Url::parse(&format!(
        "{}://{}/.well-known/webfinger",
        scheme,
        handle.hostname()
    ))
    .map_err(|_| AppError::InvalidHandle(handle.to_string()))?;
    url.query_pairs_mut().append_pair("resource", &handle.acct());
    Ok(url)
}

/// Resolve a handle to its ActivityPub actor URL
///
/// # Errors
/// `ActorNotFound` on non-2xx, undecodable JSON, or a JRD without a
/// self link; `Transport` when the request itself fails.
pub async fn resolve_webfinger(
    handle: &FediverseHandle,
    scheme: &str,
    http_client: &reqwest::Client,
) -> Result<String> {
    let not_found = || AppError::ActorNotFound(handle.to_string());
    let url = webfinger_url(scheme, handle)?;

    let response = http_client
        .get(url)
        .header("Accept", JRD_MIMETYPE)
        .send()
        .await?;

    if !response.status().is_success() {
        tracing::debug!(%handle, status = %response.status(), "WebFinger lookup failed");
        return Err(not_found());
    }

    let jrd: WebFingerResponse = response.json().await.map_err(|e| {
        tracing::debug!(%handle, error = %e, "WebFinger response is not a JRD");
        not_found()
    })?;

    jrd.actor_url().map(str::to_string).ok_or_else(|| {
        tracing::debug!(%handle, "WebFinger response has no ActivityPub self link");
        not_found()
    })
}

/// Generate WebFinger response for the instance actor.
///
/// # Arguments
/// * `hostname` - Instance hostname; the account is `acct:{hostname}@{hostname}`
/// * `actor_url` - Instance actor URL
pub fn generate_webfinger_response(hostname: &str, actor_url: &str) -> WebFingerResponse {
    WebFingerResponse {
        subject: format!("acct:{}@{}", hostname, hostname),
        aliases: None,
        links: vec![WebFingerLink {
            rel: "self".to_string(),
            link_type: Some(ACTIVITY_MIMETYPE.to_string()),
            href: Some(actor_url.to_string()),
            template: None,
        }],
    }
}
