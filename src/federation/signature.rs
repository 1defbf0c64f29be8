//! HTTP Signatures for ActivityPub
//!
//! Implements signing and verification per:
//! https://docs.joinmastodon.org/spec/security/
//!
//! Outgoing requests always sign the fixed header set
//! `(request-target) host date digest`.

use std::sync::Arc;
use std::time::Instant;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use http::{HeaderMap, HeaderValue, Method};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::{RsaPublicKey, pkcs1v15::Signature as Pkcs1v15Signature};
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::federation::keys::InstanceKeyPair;
use crate::metrics::{FEDERATION_REQUEST_DURATION_SECONDS, FEDERATION_REQUESTS_TOTAL};

/// Header names covered by every outgoing signature, in signing order
pub const SIGNED_HEADERS: [&str; 4] = ["(request-target)", "host", "date", "digest"];

/// Maximum accepted clock skew for the Date header, in seconds
const MAX_DATE_SKEW_SECS: i64 = 300;

/// Everything that goes into one request's signing string
#[derive(Debug, Clone)]
pub struct SignedRequestContext {
    pub method: Method,
    pub path_and_query: String,
    pub host: String,
    pub date: String,
    pub digest: String,
}

impl SignedRequestContext {
    /// Build the context for `method url` carrying `body`, dated `date`
    pub fn new(
        method: &Method,
        url: &str,
        body: &[u8],
        date: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        let parsed_url =
            url::Url::parse(url).map_err(|e| AppError::Validation(format!("Invalid URL: {}", e)))?;

        let host = parsed_url
            .host_str()
            .ok_or_else(|| AppError::Validation("Missing host in URL".to_string()))?;
        // Url::port() is None for the scheme's default port.
        let host = match parsed_url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let path_and_query = match parsed_url.query() {
            Some(q) => format!("{}?{}", parsed_url.path(), q),
            None => parsed_url.path().to_string(),
        };

        Ok(Self {
            method: method.clone(),
            path_and_query,
            host,
            date: format_http_date(date),
            digest: generate_digest(body),
        })
    }

    /// `(request-target)` pseudo-header value
    pub fn request_target(&self) -> String {
        format!(
            "{} {}",
            self.method.as_str().to_lowercase(),
            self.path_and_query
        )
    }

    /// Canonical string that gets signed
    pub fn signing_string(&self) -> String {
        [
            format!("(request-target): {}", self.request_target()),
            format!("host: {}", self.host),
            format!("date: {}", self.date),
            format!("digest: {}", self.digest),
        ]
        .join("\n")
    }

    /// Sign this context with `keypair`, advertising `key_id`
    pub fn sign(&self, keypair: &InstanceKeyPair, key_id: &str) -> SignatureHeaders {
        let signature_b64 = keypair.sign(self.signing_string().as_bytes());

        let signature_header = format!(
            "keyId=\"{}\",algorithm=\"rsa-sha256\",headers=\"{}\",signature=\"{}\"",
            key_id,
            SIGNED_HEADERS.join(" "),
            signature_b64
        );

        SignatureHeaders {
            signature: signature_header,
            host: self.host.clone(),
            date: self.date.clone(),
            digest: self.digest.clone(),
        }
    }
}

/// Headers to add for signed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeaders {
    /// Signature header value
    pub signature: String,
    /// Host header value
    pub host: String,
    /// Date header value (RFC 7231)
    pub date: String,
    /// Digest header value
    pub digest: String,
}

impl SignatureHeaders {
    /// Write the signed headers over `headers`, replacing any caller values
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<(), AppError> {
        let value = |v: &str| {
            HeaderValue::from_str(v)
                .map_err(|e| AppError::Signing(format!("Invalid header value: {}", e)))
        };

        headers.insert(http::header::HOST, value(&self.host)?);
        headers.insert(http::header::DATE, value(&self.date)?);
        headers.insert("digest", value(&self.digest)?);
        headers.insert("signature", value(&self.signature)?);
        Ok(())
    }
}

/// Sends outbound requests signed as the instance actor
#[derive(Clone)]
pub struct SignedRequestIssuer {
    http_client: Arc<reqwest::Client>,
    keypair: Arc<InstanceKeyPair>,
    key_id: String,
}

impl SignedRequestIssuer {
    pub fn new(
        http_client: Arc<reqwest::Client>,
        keypair: Arc<InstanceKeyPair>,
        key_id: String,
    ) -> Self {
        Self {
            http_client,
            keypair,
            key_id,
        }
    }

    /// Key ID advertised in the Signature header
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Sign a request without sending it
    pub fn sign(
        &self,
        method: &Method,
        url: &str,
        body: &[u8],
    ) -> Result<SignatureHeaders, AppError> {
        let context = SignedRequestContext::new(method, url, body, Utc::now())?;
        Ok(context.sign(&self.keypair, &self.key_id))
    }

    /// Sign and send a request
    ///
    /// Caller headers are sent as well, except `host`, `date`, `digest` and
    /// `signature`, which always carry the signed values.
    ///
    /// # Errors
    /// Network failures surface unmodified as `AppError::Transport`.
    pub async fn sign_and_send(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Vec<u8>,
    ) -> Result<reqwest::Response, AppError> {
        let signed = self.sign(&method, url, &body)?;

        let mut request_headers = headers;
        signed.apply(&mut request_headers)?;

        let mut request = self
            .http_client
            .request(method.clone(), url)
            .headers(request_headers);
        if !body.is_empty() {
            request = request.body(body);
        }

        let kind = if method == Method::GET { "fetch" } else { "deliver" };
        let started = Instant::now();
        let result = request.send().await;
        FEDERATION_REQUEST_DURATION_SECONDS
            .with_label_values(&[kind])
            .observe(started.elapsed().as_secs_f64());

        match result {
            Ok(response) => {
                FEDERATION_REQUESTS_TOTAL
                    .with_label_values(&[kind, response.status().as_str()])
                    .inc();
                tracing::debug!(
                    %method,
                    url,
                    status = %response.status(),
                    "Signed request completed"
                );
                Ok(response)
            }
            Err(e) => {
                FEDERATION_REQUESTS_TOTAL
                    .with_label_values(&[kind, "transport_error"])
                    .inc();
                Err(AppError::Transport(e))
            }
        }
    }
}

/// Verify an HTTP request signature
///
/// # Arguments
/// * `method` - HTTP method
/// * `path` - Request path and query
/// * `headers` - All request headers
/// * `body` - Request body (for digest verification)
/// * `public_key_pem` - RSA public key in PEM format
///
/// # Errors
/// `AppError::Validation` describing the first check that failed
pub fn verify_signature(
    method: &str,
    path: &str,
    headers: &HeaderMap,
    body: Option<&[u8]>,
    public_key_pem: &str,
) -> Result<(), AppError> {
    // 1. Parse Signature header
    let signature_header = header_str(headers, "signature", "Signature")?;
    let parsed = parse_signature_header(signature_header)?;

    // 2. Validate algorithm and required signed headers.
    if parsed.algorithm != "rsa-sha256" && parsed.algorithm != "hs2019" {
        return Err(AppError::Validation(format!(
            "Unsupported signature algorithm: {}",
            parsed.algorithm
        )));
    }

    for required in ["(request-target)", "host", "date"] {
        if !parsed.headers.iter().any(|h| h == required) {
            return Err(AppError::Validation(format!(
                "Signed headers must include: {}",
                required
            )));
        }
    }

    let digest_signed = parsed.headers.iter().any(|h| h == "digest");
    if body.is_some_and(|b| !b.is_empty()) && !digest_signed {
        return Err(AppError::Validation(
            "Signed headers must include: digest".to_string(),
        ));
    }

    // 3. Verify Date is recent.
    let date_str = header_str(headers, "date", "Date")?;
    let date = DateTime::parse_from_rfc2822(date_str)
        .map_err(|_| AppError::Validation("Invalid Date format".to_string()))?;

    let diff = (Utc::now().timestamp() - date.timestamp()).abs();
    if diff > MAX_DATE_SKEW_SECS {
        return Err(AppError::Validation(
            "Date header too old or in future".to_string(),
        ));
    }

    // 4. Verify Digest against the body.
    if digest_signed {
        let digest_str = header_str(headers, "digest", "Digest")?;
        if digest_str != generate_digest(body.unwrap_or_default()) {
            return Err(AppError::Validation("Digest mismatch".to_string()));
        }
    }

    // 5. Reconstruct signing string.
    let mut signing_parts = Vec::with_capacity(parsed.headers.len());
    for header_name in &parsed.headers {
        let value = match header_name.as_str() {
            "(request-target)" => format!("{} {}", method.to_lowercase(), path),
            name @ ("host" | "date" | "digest") => header_str(headers, name, name)?.to_string(),
            _ => {
                return Err(AppError::Validation(format!(
                    "Unsupported header in signature: {}",
                    header_name
                )));
            }
        };

        signing_parts.push(format!("{}: {}", header_name, value));
    }
    let signing_string = signing_parts.join("\n");

    // 6. Verify RSA signature.
    let signature_bytes = BASE64
        .decode(&parsed.signature)
        .map_err(|_| AppError::Validation("Invalid signature encoding".to_string()))?;

    let public_key = RsaPublicKey::from_public_key_pem(public_key_pem)
        .map_err(|e| AppError::Validation(format!("Invalid public key: {}", e)))?;
    let verifier = rsa::pkcs1v15::VerifyingKey::<Sha256>::new(public_key);

    let signature = Pkcs1v15Signature::try_from(signature_bytes.as_slice())
        .map_err(|e| AppError::Validation(format!("Invalid signature format: {}", e)))?;

    verifier
        .verify(signing_string.as_bytes(), &signature)
        .map_err(|_| AppError::Validation("Signature verification failed".to_string()))?;

    Ok(())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str, label: &str) -> Result<&'a str, AppError> {
    headers
        .get(name)
        .ok_or_else(|| AppError::Validation(format!("Missing {} header", label)))?
        .to_str()
        .map_err(|_| AppError::Validation(format!("Invalid {} header", label)))
}

/// Parsed Signature header
#[derive(Debug, Clone)]
pub struct ParsedSignature {
    /// Key ID (URL to public key)
    pub key_id: String,
    /// Algorithm (usually rsa-sha256)
    pub algorithm: String,
    /// Signed header names
    pub headers: Vec<String>,
    /// Base64-encoded signature
    pub signature: String,
}

/// Parse Signature header value
///
/// # Format
/// ```text
/// keyId="...",algorithm="...",headers="...",signature="..."
/// ```
pub fn parse_signature_header(header: &str) -> Result<ParsedSignature, AppError> {
    let mut key_id = None;
    let mut algorithm = None;
    let mut headers = None;
    let mut signature = None;

    for part in header.split(',') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            let value = value.trim().trim_matches('"');

            match key.trim() {
                "keyId" => key_id = Some(value.to_string()),
                "algorithm" => algorithm = Some(value.to_string()),
                "headers" => {
                    headers = Some(
                        value
                            .split_whitespace()
                            .map(|s| s.to_ascii_lowercase())
                            .collect(),
                    )
                }
                "signature" => signature = Some(value.to_string()),
                _ => {}
            }
        }
    }

    Ok(ParsedSignature {
        key_id: key_id.ok_or_else(|| AppError::Validation("Missing keyId".to_string()))?,
        algorithm: algorithm
            .ok_or_else(|| AppError::Validation("Missing algorithm".to_string()))?,
        headers: headers.ok_or_else(|| AppError::Validation("Missing headers".to_string()))?,
        signature: signature
            .ok_or_else(|| AppError::Validation("Missing signature".to_string()))?,
    })
}

/// Generate SHA-256 digest for body
///
/// # Returns
/// `SHA-256=base64(hash)`
pub fn generate_digest(body: &[u8]) -> String {
    let hash = Sha256::digest(body);
    format!("SHA-256={}", BASE64.encode(hash))
}

/// IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`
pub fn format_http_date(date: DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const KEY_ID: &str = "https://bot.example.net/instance_actor#main-key";

    fn test_keypair() -> InstanceKeyPair {
        InstanceKeyPair::generate(1024).expect("key generation should work")
    }

    fn headers_for(signed: &SignatureHeaders) -> HeaderMap {
        let mut headers = HeaderMap::new();
        signed.apply(&mut headers).expect("apply");
        headers
    }

    #[test]
    fn digest_of_empty_body_is_digest_of_empty_string() {
        assert_eq!(
            generate_digest(b""),
            "SHA-256=47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="
        );
    }

    #[test]
    fn signing_string_covers_fixed_header_set_in_order() {
        let date = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let context = SignedRequestContext::new(
            &Method::GET,
            "https://example.org/users/alice?page=1",
            b"",
            date,
        )
        .unwrap();

        assert_eq!(
            context.signing_string(),
            "(request-target): get /users/alice?page=1\n\
             host: example.org\n\
             date: Tue, 02 Jan 2024 03:04:05 GMT\n\
             digest: SHA-256=47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="
        );
    }

    #[test]
    fn host_includes_non_default_port() {
        let context =
            SignedRequestContext::new(&Method::GET, "http://127.0.0.1:3000/a", b"", Utc::now())
                .unwrap();
        assert_eq!(context.host, "127.0.0.1:3000");

        let context =
            SignedRequestContext::new(&Method::GET, "https://example.org:443/a", b"", Utc::now())
                .unwrap();
        assert_eq!(context.host, "example.org");
    }

    #[test]
    fn signature_header_has_expected_shape() {
        let keypair = test_keypair();
        let context =
            SignedRequestContext::new(&Method::GET, "https://example.org/users/alice", b"", Utc::now())
                .unwrap();
        let signed = context.sign(&keypair, KEY_ID);

        let parsed = parse_signature_header(&signed.signature).unwrap();
        assert_eq!(parsed.key_id, KEY_ID);
        assert_eq!(parsed.algorithm, "rsa-sha256");
        let expected: Vec<String> = SIGNED_HEADERS.iter().map(|h| h.to_string()).collect();
        assert_eq!(parsed.headers, expected);
        assert!(signed.signature.starts_with(&format!(
            "keyId=\"{}\",algorithm=\"rsa-sha256\",headers=\"(request-target) host date digest\",signature=\"",
            KEY_ID
        )));
    }

    #[test]
    fn signing_same_input_twice_is_identical_and_verifies() {
        let keypair = test_keypair();
        let date = Utc::now();
        let url = "https://example.org/users/alice";

        let first = SignedRequestContext::new(&Method::GET, url, b"", date)
            .unwrap()
            .sign(&keypair, KEY_ID);
        let second = SignedRequestContext::new(&Method::GET, url, b"", date)
            .unwrap()
            .sign(&keypair, KEY_ID);

        assert_eq!(first.digest, second.digest);
        assert_eq!(first.signature, second.signature);

        let headers = headers_for(&first);
        verify_signature(
            "GET",
            "/users/alice",
            &headers,
            None,
            keypair.public_key_pem(),
        )
        .expect("signature should verify against the instance public key");
    }

    #[test]
    fn verify_signature_accepts_signed_post_with_body() {
        let keypair = test_keypair();
        let body = br#"{"type":"Follow"}"#;
        let signed = SignedRequestContext::new(
            &Method::POST,
            "https://remote.example/inbox?foo=bar",
            body,
            Utc::now(),
        )
        .unwrap()
        .sign(&keypair, KEY_ID);

        let result = verify_signature(
            "POST",
            "/inbox?foo=bar",
            &headers_for(&signed),
            Some(body),
            keypair.public_key_pem(),
        );
        assert!(result.is_ok(), "valid signature should verify: {result:?}");
    }

    #[test]
    fn verify_signature_rejects_other_key() {
        let keypair = test_keypair();
        let other = test_keypair();
        let signed = SignedRequestContext::new(&Method::GET, "https://example.org/a", b"", Utc::now())
            .unwrap()
            .sign(&keypair, KEY_ID);

        match verify_signature("GET", "/a", &headers_for(&signed), None, other.public_key_pem()) {
            Err(AppError::Validation(msg)) => assert!(msg.contains("verification failed")),
            other => panic!("expected verification failure, got: {other:?}"),
        }
    }

    #[test]
    fn verify_signature_rejects_tampered_body() {
        let keypair = test_keypair();
        let signed = SignedRequestContext::new(
            &Method::POST,
            "https://example.org/inbox",
            b"original",
            Utc::now(),
        )
        .unwrap()
        .sign(&keypair, KEY_ID);

        match verify_signature(
            "POST",
            "/inbox",
            &headers_for(&signed),
            Some(b"tampered"),
            keypair.public_key_pem(),
        ) {
            Err(AppError::Validation(msg)) => assert!(msg.contains("Digest mismatch")),
            other => panic!("expected digest mismatch, got: {other:?}"),
        }
    }

    #[test]
    fn verify_signature_rejects_stale_date() {
        let keypair = test_keypair();
        let stale = Utc::now() - chrono::Duration::minutes(30);
        let signed = SignedRequestContext::new(&Method::GET, "https://example.org/a", b"", stale)
            .unwrap()
            .sign(&keypair, KEY_ID);

        match verify_signature("GET", "/a", &headers_for(&signed), None, keypair.public_key_pem()) {
            Err(AppError::Validation(msg)) => assert!(msg.contains("too old")),
            other => panic!("expected stale date error, got: {other:?}"),
        }
    }

    #[test]
    fn apply_overrides_caller_supplied_signing_headers() {
        let keypair = test_keypair();
        let signed = SignedRequestContext::new(&Method::GET, "https://example.org/a", b"", Utc::now())
            .unwrap()
            .sign(&keypair, KEY_ID);

        let mut headers = HeaderMap::new();
        headers.insert("date", HeaderValue::from_static("Mon, 01 Jan 1990 00:00:00 GMT"));
        headers.insert("digest", HeaderValue::from_static("SHA-256=bogus"));
        headers.insert("signature", HeaderValue::from_static("keyId=\"evil\""));
        headers.insert("accept", HeaderValue::from_static("application/activity+json"));

        signed.apply(&mut headers).unwrap();

        assert_eq!(headers.get("date").unwrap(), signed.date.as_str());
        assert_eq!(headers.get("digest").unwrap(), signed.digest.as_str());
        assert_eq!(headers.get("signature").unwrap(), signed.signature.as_str());
        assert_eq!(headers.get("host").unwrap(), "example.org");
        assert_eq!(headers.get("accept").unwrap(), "application/activity+json");
        assert_eq!(headers.get_all("date").iter().count(), 1);
    }

    #[tokio::test]
    async fn sign_and_send_returns_transport_error_unmapped() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let issuer = SignedRequestIssuer::new(
            Arc::new(reqwest::Client::new()),
            Arc::new(test_keypair()),
            KEY_ID.to_string(),
        );

        let url = format!("http://127.0.0.1:{}/users/alice", port);
        match issuer
            .sign_and_send(Method::GET, &url, HeaderMap::new(), Vec::new())
            .await
        {
            Err(AppError::Transport(_)) => {}
            other => panic!("expected transport error, got: {other:?}"),
        }
    }

    #[test]
    fn parse_signature_header_requires_all_fields() {
        match parse_signature_header("keyId=\"a\",algorithm=\"rsa-sha256\",headers=\"date\"") {
            Err(AppError::Validation(msg)) => assert_eq!(msg, "Missing signature"),
            other => panic!("expected missing signature, got: {other:?}"),
        }
    }
}
