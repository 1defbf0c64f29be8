//! ActivityPub federation module
//!
//! Handles:
//! - Fediverse handle parsing
//! - WebFinger discovery
//! - Actor fetching
//! - HTTP Signatures
//! - The instance actor identity

mod actor;
mod handle;
mod instance_actor;
mod keys;
mod resolver;
mod signature;
mod webfinger;

pub use actor::{ACTIVITY_MIMETYPE, ActorDocument, PublicKey, main_key_id};
pub use handle::FediverseHandle;
pub use instance_actor::{INSTANCE_ACTOR_PATH, InstanceActor};
pub use keys::InstanceKeyPair;
pub use resolver::ActorResolver;
pub use signature::{
    ParsedSignature, SIGNED_HEADERS, SignatureHeaders, SignedRequestContext, SignedRequestIssuer,
    format_http_date, generate_digest, parse_signature_header, verify_signature,
};
pub use webfinger::{
    JRD_MIMETYPE, WebFingerLink, WebFingerResponse, generate_webfinger_response,
    resolve_webfinger, webfinger_url,
};
