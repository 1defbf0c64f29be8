//! Fediverse handle parsing (`@user@host`)

use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// A parsed `@localuser@hostname` account address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FediverseHandle {
    localuser: String,
    hostname: String,
}

impl FediverseHandle {
    /// Parse `@localuser@hostname` (the leading `@` is optional).
    ///
    /// Exactly two non-empty segments are accepted; the hostname must be
    /// usable as a URL authority.
    pub fn parse(input: &str) -> Result<Self, AppError> {
        let invalid = || AppError::InvalidHandle(input.to_string());

        let address = input.strip_prefix('@').unwrap_or(input);
        let (localuser, hostname) = address.split_once('@').ok_or_else(invalid)?;

        if localuser.is_empty() || hostname.is_empty() || hostname.contains('@') {
            return Err(invalid());
        }

        if localuser.chars().any(char::is_whitespace)
            || hostname
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '\\'))
        {
            return Err(invalid());
        }

        // Must survive as the authority of a URL.
        let parsed = url::Url::parse(&format!("https://{}/", hostname)).map_err(|_| invalid())?;
        if parsed.host_str().is_none() {
            return Err(invalid());
        }

        Ok(Self {
            localuser: localuser.to_string(),
            hostname: hostname.to_string(),
        })
    }

    pub fn localuser(&self) -> &str {
        &self.localuser
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// WebFinger resource (`acct:user@host`)
    pub fn acct(&self) -> String {
        format!("acct:{}@{}", self.localuser, self.hostname)
    }
}

impl FromStr for FediverseHandle {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FediverseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}@{}", self.localuser, self.hostname)
    }
}
