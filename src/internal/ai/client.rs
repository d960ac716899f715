use std::time::Duration;

use reqwest::Client as HttpClient;

/// Transport timeout for model calls. Streamed replies can run for minutes.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// A generic client for AI providers.
///
/// It holds the shared HTTP client, base URL, and provider-specific extension.
#[derive(Clone, Debug)]
pub struct Client<P> {
    /// The base URL of the AI provider's API.
    pub base_url: String,
    /// The shared HTTP client (reqwest).
    pub http_client: HttpClient,
    /// Provider-specific logic (e.g., authentication).
    pub provider: P,
}

impl<P> Client<P> {
    /// Creates a new generic Client with [`REQUEST_TIMEOUT`] and system proxy support.
    pub fn new(base_url: &str, provider: P) -> Self {
        let http_client = HttpClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(
                    "Failed to build HTTP client with timeout: {}. Using default client.",
                    e
                );
                HttpClient::new()
            });

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
            provider,
        }
    }

    /// Absolute URL of an API path such as `/v1/messages`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Trait defining provider-specific behavior.
pub trait Provider: Send + Sync {
    /// Allows the provider to customize the HTTP request (e.g., adding headers).
    fn on_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
    }
}
