//! The synthetic instance actor
//!
//! Represents this server itself (not a chat user). It signs outbound
//! fetches and publishes its public key at `/instance_actor`. It has an
//! advertised inbox but never processes anything delivered there.

use std::sync::Arc;

use url::Url;

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::federation::actor::{PublicKey, main_key_id};
use crate::federation::keys::InstanceKeyPair;
use crate::federation::webfinger::{WebFingerResponse, generate_webfinger_response};

/// Path the instance actor document is served at
pub const INSTANCE_ACTOR_PATH: &str = "/instance_actor";

/// Identity and key material of the instance actor
#[derive(Debug, Clone)]
pub struct InstanceActor {
    actor_url: Url,
    key_id: String,
    hostname: String,
    keypair: Arc<InstanceKeyPair>,
}

impl InstanceActor {
    /// Build the instance actor under `base_url`
    ///
    /// The hostname is taken from `base_url` itself.
    pub fn new(base_url: &str, keypair: Arc<InstanceKeyPair>) -> Result<Self> {
        let actor_url = Url::parse(&format!(
            "{}{}",
            base_url.trim_end_matches('/'),
            INSTANCE_ACTOR_PATH
        ))
        .map_err(|e| AppError::Config(format!("Invalid public URL: {}", e)))?;

        let hostname = actor_url
            .host_str()
            .ok_or_else(|| AppError::Config("Public URL must include a host".to_string()))?
            .to_ascii_lowercase();

        Ok(Self {
            key_id: main_key_id(&actor_url),
            actor_url,
            hostname,
            keypair,
        })
    }

    /// Load or generate the key described by `config`, then build the actor
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let keypair = match &config.instance.private_key_path {
            Some(path) => InstanceKeyPair::load_or_generate(path, config.instance.key_bits).await?,
            None => {
                tracing::warn!(
                    "instance.private_key_path is not set; generating an ephemeral instance key"
                );
                let bits = config.instance.key_bits;
                tokio::task::spawn_blocking(move || InstanceKeyPair::generate(bits))
                    .await
                    .map_err(|e| AppError::Internal(e.into()))??
            }
        };

        Self::new(&config.server.base_url(), Arc::new(keypair))
    }

    pub fn actor_url(&self) -> &Url {
        &self.actor_url
    }

    /// `{actor_url}#main-key`
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn keypair(&self) -> &Arc<InstanceKeyPair> {
        &self.keypair
    }

    /// `acct:{hostname}@{hostname}`
    pub fn acct(&self) -> String {
        format!("acct:{}@{}", self.hostname, self.hostname)
    }

    /// JRD answered for `acct()`
    pub fn webfinger(&self) -> WebFingerResponse {
        generate_webfinger_response(&self.hostname, self.actor_url.as_str())
    }

    /// JSON-LD actor document
    pub fn document(&self) -> serde_json::Value {
        let public_key = PublicKey::new(
            self.actor_url.clone(),
            self.keypair.public_key_pem().to_string(),
        );

        serde_json::json!({
            "@context": [
                "https://www.w3.org/ns/activitystreams",
                "https://w3id.org/security/v1"
            ],
            "id": self.actor_url,
            "type": "Person",
            "preferredUsername": self.hostname,
            "publicKey": public_key,
            "inbox": format!("{}/inbox", self.actor_url),
        })
    }
}
