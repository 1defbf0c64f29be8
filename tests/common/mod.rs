//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{OriginalUri, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use fedilookup::{AppState, config, federation};
use serde_json::Value;
use tokio::net::TcpListener;

/// Build a configuration pointing at `public_url`
pub fn test_config(public_url: &str) -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            public_url: public_url.to_string(),
        },
        instance: config::InstanceConfig {
            private_key_path: None,
            key_bits: 1024,
        },
        federation: config::FederationConfig {
            scheme: "http".to_string(),
        },
        http: config::HttpClientConfig {
            timeout_seconds: 10,
            user_agent: "fedilookup-test".to_string(),
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        fedilookup::metrics::init_metrics();

        // Bind first so the public URL carries the real port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let state = AppState::new(test_config(&addr_str)).await.unwrap();

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        let app = fedilookup::build_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            client,
        }
    }

    /// Get URL for a path on this server
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }
}

/// What the fake remote saw on a signed actor fetch
#[derive(Debug, Clone)]
pub struct SignatureRecord {
    pub key_id: Option<String>,
    pub verified: Result<(), String>,
    pub headers: HeaderMap,
}

#[derive(Clone, Default)]
struct RemoteState {
    host: String,
    actors: HashMap<String, Value>,
    advertised: HashSet<String>,
    webfinger_override: Option<(StatusCode, String)>,
    records: Arc<Mutex<Vec<SignatureRecord>>>,
}

/// A fake fediverse server
///
/// Serves WebFinger and actor documents, and checks the HTTP signature of
/// every actor fetch against the key published by the signer.
pub struct FakeRemote {
    /// `host:port`, usable as the hostname part of a handle
    pub host: String,
    records: Arc<Mutex<Vec<SignatureRecord>>>,
}

/// Builder for [`FakeRemote`]
#[derive(Default)]
pub struct FakeRemoteBuilder {
    actors: HashMap<String, Value>,
    advertised: HashSet<String>,
    webfinger_override: Option<(StatusCode, String)>,
}

impl FakeRemoteBuilder {
    /// Serve `document` as `/users/{username}` and advertise it via WebFinger
    pub fn actor(mut self, username: &str, document: Value) -> Self {
        self.actors.insert(username.to_string(), document);
        self.advertised.insert(username.to_string());
        self
    }

    /// Advertise `username` via WebFinger without serving its actor document
    pub fn advertise_only(mut self, username: &str) -> Self {
        self.advertised.insert(username.to_string());
        self
    }

    /// Answer every WebFinger query with `status` and `body`
    pub fn webfinger_response(mut self, status: StatusCode, body: impl Into<String>) -> Self {
        self.webfinger_override = Some((status, body.into()));
        self
    }

    pub async fn start(self) -> FakeRemote {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let host = listener.local_addr().unwrap().to_string();
        let records = Arc::new(Mutex::new(Vec::new()));

        let state = RemoteState {
            host: host.clone(),
            actors: self.actors,
            advertised: self.advertised,
            webfinger_override: self.webfinger_override,
            records: records.clone(),
        };

        let app = Router::new()
            .route("/.well-known/webfinger", get(remote_webfinger))
            .route("/users/:username", get(remote_actor))
            .with_state(state);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        FakeRemote { host, records }
    }
}

impl FakeRemote {
    pub fn builder() -> FakeRemoteBuilder {
        FakeRemoteBuilder::default()
    }

    /// `@{username}@{host}`
    pub fn handle(&self, username: &str) -> String {
        format!("@{}@{}", username, self.host)
    }

    /// Signature checks recorded so far
    pub fn signature_records(&self) -> Vec<SignatureRecord> {
        self.records.lock().unwrap().clone()
    }
}

async fn remote_webfinger(
    State(state): State<RemoteState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Some((status, body)) = state.webfinger_override {
        return (status, body).into_response();
    }

    let Some(resource) = query.get("resource") else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let Some(acct) = resource.strip_prefix("acct:") else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let Some((username, host)) = acct.split_once('@') else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    if host != state.host || !state.advertised.contains(username) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let actor_url = format!("http://{}/users/{}", state.host, username);
    Json(serde_json::json!({
        "subject": resource,
        "links": [
            {
                "rel": "http://webfinger.net/rel/profile-page",
                "type": "text/html",
                "href": format!("http://{}/@{}", state.host, username)
            },
            {
                "rel": "self",
                "type": "application/activity+json",
                "href": actor_url
            }
        ]
    }))
    .into_response()
}

async fn remote_actor(
    State(state): State<RemoteState>,
    Path(username): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Response {
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    let (key_id, verified) = check_signature(&path, &headers).await;
    state.records.lock().unwrap().push(SignatureRecord {
        key_id,
        verified: verified.clone(),
        headers: headers.clone(),
    });

    if verified.is_err() {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    match state.actors.get(&username) {
        Some(document) => (
            [("content-type", "application/activity+json")],
            document.to_string(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Fetch the signer's key from its keyId and verify the request with it
async fn check_signature(path: &str, headers: &HeaderMap) -> (Option<String>, Result<(), String>) {
    let Some(signature) = headers.get("signature").and_then(|v| v.to_str().ok()) else {
        return (None, Err("unsigned".to_string()));
    };
    let parsed = match federation::parse_signature_header(signature) {
        Ok(parsed) => parsed,
        Err(e) => return (None, Err(e.to_string())),
    };
    let key_id = parsed.key_id.clone();
    let owner_url = key_id.split('#').next().unwrap_or(&key_id).to_string();

    let actor: Value = match reqwest::Client::new()
        .get(&owner_url)
        .header("Accept", "application/activity+json")
        .send()
        .await
    {
        Ok(response) => match response.json().await {
            Ok(actor) => actor,
            Err(e) => return (Some(key_id), Err(e.to_string())),
        },
        Err(e) => return (Some(key_id), Err(e.to_string())),
    };

    if actor["publicKey"]["id"] != Value::String(key_id.clone()) {
        return (Some(key_id), Err("keyId not advertised by owner".to_string()));
    }
    let Some(pem) = actor["publicKey"]["publicKeyPem"].as_str() else {
        return (Some(key_id), Err("owner has no publicKeyPem".to_string()));
    };

    let verified = federation::verify_signature("GET", path, headers, None, pem)
        .map_err(|e| e.to_string());
    (Some(key_id), verified)
}
