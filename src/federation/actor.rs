//! ActivityPub actor documents

use serde::{Deserialize, Serialize};
use url::Url;

/// Media type of ActivityPub documents
pub const ACTIVITY_MIMETYPE: &str = "application/activity+json";

/// Remote actor as fetched from its home server
///
/// Only the fields needed to describe a profile are kept; everything else
/// in the JSON-LD document is ignored.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Url>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub actor_type: Option<String>,
    pub preferred_username: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    /// HTML
    #[serde(default, deserialize_with = "null_as_empty")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<Url>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbox: Option<Url>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<PublicKey>,
}

/// Public key of actors which is used for HTTP signatures
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKey {
    pub id: String,
    pub owner: Url,
    pub public_key_pem: String,
}

impl PublicKey {
    pub fn new(owner: Url, public_key_pem: String) -> Self {
        Self {
            id: main_key_id(&owner),
            owner,
            public_key_pem,
        }
    }
}

/// `{owner}#main-key`
pub fn main_key_id(owner: &Url) -> String {
    format!("{}#main-key", owner)
}

// Some servers send `"summary": null` for empty bios.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
