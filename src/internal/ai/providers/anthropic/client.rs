//! Anthropic API client.

use std::fmt;

use crate::internal::ai::client::{Client as GenericClient, Provider};

/// Default endpoint of the Anthropic API.
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic API provider.
#[derive(Clone)]
pub struct AnthropicProvider {
    api_key: String,
}

impl fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("api_key", &"***")
            .finish()
    }
}

impl AnthropicProvider {
    pub fn new(api_key: String) -> Self {
        Self { api_key }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl Provider for AnthropicProvider {
    fn on_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        // x-api-key, not a Bearer token
        request
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", super::ANTHROPIC_VERSION)
    }
}

/// Anthropic client type.
pub type Client = GenericClient<AnthropicProvider>;

impl Client {
    /// Reads `ANTHROPIC_API_KEY`, and `ANTHROPIC_BASE_URL` for custom endpoints.
    pub fn from_env() -> Result<Self, std::env::VarError> {
        Self::from_lookup(|key| std::env::var(key).ok())
            .ok_or(std::env::VarError::NotPresent)
    }

    /// Like [`Client::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let api_key = lookup("ANTHROPIC_API_KEY").filter(|k| !k.trim().is_empty())?;
        let base_url = lookup("ANTHROPIC_BASE_URL")
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| ANTHROPIC_BASE_URL.to_string());
        Some(Self::with_base_url(&base_url, api_key))
    }

    pub fn with_api_key(api_key: String) -> Self {
        Self::with_base_url(ANTHROPIC_BASE_URL, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: String) -> Self {
        Self::new(base_url, AnthropicProvider::new(api_key))
    }
}
