//! Instance RSA keypair
//!
//! Loaded or generated once at startup and shared read-only afterwards.

use std::path::Path;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::signature::{SignatureEncoding, Signer};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::error::{AppError, Result};

/// RSA keypair used to sign outgoing requests
pub struct InstanceKeyPair {
    private_key: RsaPrivateKey,
    signing_key: SigningKey<Sha256>,
    public_key_pem: String,
}

impl std::fmt::Debug for InstanceKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceKeyPair")
            .field("public_key_pem", &self.public_key_pem)
            .finish_non_exhaustive()
    }
}

impl InstanceKeyPair {
    /// Wrap an existing private key
    pub fn from_private_key(private_key: RsaPrivateKey) -> Result<Self> {
        let public_key_pem = RsaPublicKey::from(&private_key)
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| AppError::Config(format!("Failed to encode public key: {}", e)))?;

        Ok(Self {
            signing_key: SigningKey::<Sha256>::new(private_key.clone()),
            private_key,
            public_key_pem,
        })
    }

    /// Generate a fresh keypair
    pub fn generate(bits: usize) -> Result<Self> {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| AppError::Config(format!("Failed to generate RSA key: {}", e)))?;
        Self::from_private_key(private_key)
    }

    /// Parse a PKCS#8 PEM private key
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| AppError::Config(format!("Invalid instance private key: {}", e)))?;
        Self::from_private_key(private_key)
    }

    /// Load the key at `path`, or generate one and write it there
    /// when the file does not exist yet.
    pub async fn load_or_generate(path: &Path, bits: usize) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(pem) => {
                tracing::info!(path = %path.display(), "Loaded instance key");
                Self::from_pkcs8_pem(&pem)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), bits, "Generating instance key...");
                let keypair = tokio::task::spawn_blocking(move || Self::generate(bits))
                    .await
                    .map_err(|e| AppError::Internal(e.into()))??;

                let pem = keypair.private_key_pem()?;
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await.map_err(|e| {
                        AppError::Config(format!("Failed to create key directory: {}", e))
                    })?;
                }
                tokio::fs::write(path, pem.as_bytes()).await.map_err(|e| {
                    AppError::Config(format!("Failed to write instance key: {}", e))
                })?;
                restrict_permissions(path).await?;

                tracing::info!(path = %path.display(), "Instance key written");
                Ok(keypair)
            }
            Err(e) => Err(AppError::Config(format!(
                "Failed to read instance key {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Public key in SPKI PEM form, as published in the actor document
    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }

    /// Private key in PKCS#8 PEM form
    pub fn private_key_pem(&self) -> Result<String> {
        self.private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| AppError::Signing(format!("Failed to encode private key: {}", e)))
    }

    /// RSASSA-PKCS1-v1_5 / SHA-256 signature, base64 encoded.
    ///
    /// Deterministic for a given key and message.
    pub fn sign(&self, message: &[u8]) -> String {
        let signature = self.signing_key.sign(message);
        BASE64.encode(signature.to_bytes())
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(|e| AppError::Config(format!("Failed to restrict key permissions: {}", e)))
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
