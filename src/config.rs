//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub instance: InstanceConfig,
    pub federation: FederationConfig,
    pub http: HttpClientConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public base URL remote servers reach us at
    /// (e.g., "https://bot.example.net")
    pub public_url: String,
}

impl ServerConfig {
    /// Get the base URL for the instance, without trailing slash
    pub fn base_url(&self) -> String {
        self.public_url.trim_end_matches('/').to_string()
    }
}

/// Instance actor key material
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceConfig {
    /// PKCS#8 PEM file holding the instance private key.
    ///
    /// Generated and written on first start when the file does not exist.
    /// When unset, a fresh in-memory key is generated on every start.
    pub private_key_path: Option<PathBuf>,
    /// RSA modulus size for generated keys
    #[serde(default = "default_key_bits")]
    pub key_bits: usize,
}

fn default_key_bits() -> usize {
    2048
}

/// Outbound federation settings
#[derive(Debug, Clone, Deserialize)]
pub struct FederationConfig {
    /// URL scheme used for WebFinger discovery ("https" or "http")
    #[serde(default = "default_scheme")]
    pub scheme: String,
}

fn default_scheme() -> String {
    "https".to_string()
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpClientConfig {
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,
    /// User-Agent sent on outbound requests
    pub user_agent: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (FEDILOOKUP__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("instance.key_bits", 2048)?
            .set_default("federation.scheme", "https")?
            .set_default("http.timeout_seconds", 30)?
            .set_default(
                "http.user_agent",
                concat!("fedilookup/", env!("CARGO_PKG_VERSION")),
            )?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("FEDILOOKUP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Hostname of the public base URL
    pub fn public_hostname(&self) -> Result<String, crate::error::AppError> {
        let parsed = url::Url::parse(&self.server.public_url).map_err(|e| {
            crate::error::AppError::Config(format!("server.public_url is not a valid URL: {}", e))
        })?;
        parsed
            .host_str()
            .map(|host| host.to_ascii_lowercase())
            .ok_or_else(|| {
                crate::error::AppError::Config("server.public_url must include a host".to_string())
            })
    }

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_KEY_BITS: usize = 1024;

        let parsed = url::Url::parse(&self.server.public_url).map_err(|e| {
            crate::error::AppError::Config(format!("server.public_url is not a valid URL: {}", e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(crate::error::AppError::Config(
                "server.public_url must use http or https".to_string(),
            ));
        }
        self.public_hostname()?;

        if !matches!(self.federation.scheme.as_str(), "http" | "https") {
            return Err(crate::error::AppError::Config(format!(
                "federation.scheme must be http or https, got {}",
                self.federation.scheme
            )));
        }

        if self.instance.key_bits < MIN_KEY_BITS {
            return Err(crate::error::AppError::Config(format!(
                "instance.key_bits must be at least {}",
                MIN_KEY_BITS
            )));
        }

        if self.http.timeout_seconds == 0 {
            return Err(crate::error::AppError::Config(
                "http.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.federation.scheme == "http" {
            tracing::warn!("WebFinger discovery over plain http; use only for local testing");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                public_url: "https://bot.example.net/".to_string(),
            },
            instance: InstanceConfig {
                private_key_path: None,
                key_bits: 2048,
            },
            federation: FederationConfig {
                scheme: "https".to_string(),
            },
            http: HttpClientConfig {
                timeout_seconds: 30,
                user_agent: "fedilookup/test".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    #[test]
    fn validate_accepts_default_shape() {
        let config = valid_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.base_url(), "https://bot.example.net");
        assert_eq!(config.public_hostname().unwrap(), "bot.example.net");
    }

    #[test]
    fn validate_rejects_public_url_without_host() {
        let mut config = valid_config();
        config.server.public_url = "not a url".to_string();

        let error = config.validate().expect_err("invalid public url must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message) if message.contains("server.public_url")
        ));
    }

    #[test]
    fn validate_rejects_unknown_scheme() {
        let mut config = valid_config();
        config.federation.scheme = "gopher".to_string();

        let error = config.validate().expect_err("unknown scheme must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message) if message.contains("federation.scheme")
        ));
    }

    #[test]
    fn validate_rejects_small_keys() {
        let mut config = valid_config();
        config.instance.key_bits = 512;

        let error = config.validate().expect_err("512-bit keys must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message) if message.contains("instance.key_bits")
        ));
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = valid_config();
        config.http.timeout_seconds = 0;

        assert!(config.validate().is_err());
    }
}
