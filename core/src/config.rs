//! Client configuration.
//!
//! # Design
//! A `ClientConfig` is fixed once the client is built. Pointing the client at
//! a different host (a mock server in tests) is a construction-time option,
//! so a shared client can never change its target between calls.

use std::fmt;

use crate::error::ApiError;
use crate::retry::RetryConfig;

pub const DEFAULT_BASE_URL: &str = "https://api.lexoffice.io";
pub const TOKEN_ENV: &str = "LEXOFFICE_API_TOKEN";
pub const BASE_URL_ENV: &str = "LEXOFFICE_BASE_URL";

#[derive(Clone, PartialEq)]
pub struct ClientConfig {
    token: String,
    base_url: String,
    retry: RetryConfig,
}

impl ClientConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryConfig::default(),
        }
    }

    /// Send requests to `base_url` instead of the lexoffice host. A trailing
    /// `/` is dropped.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Reads `LEXOFFICE_API_TOKEN` and, if set, `LEXOFFICE_BASE_URL`.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ApiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup(TOKEN_ENV)
            .filter(|token| !token.trim().is_empty())
            .ok_or(ApiError::MissingToken(TOKEN_ENV))?;
        let config = Self::new(token.trim());
        Ok(match lookup(BASE_URL_ENV).filter(|url| !url.is_empty()) {
            Some(url) => config.with_base_url(&url),
            None => config,
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .finish()
    }
}
