//! HTTP client utilities for provider implementations.
//!
//! The client does not retry or rate limit; [`crate::sources::ManagedSource`]
//! does both around every call. It only turns transport failures and error
//! statuses into [`SourceError`] values the retry handler can classify.

use chrono::{DateTime, Utc};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Proxy, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::sources::SourceError;

/// Longest error body kept in an error message
const MAX_ERROR_BODY: usize = 200;

const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client with sensible defaults
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Create a new HTTP client with the given request timeout
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        Self::with_user_agent(DEFAULT_USER_AGENT, timeout)
    }

    /// Create a new HTTP client with a custom user agent
    pub fn with_user_agent(user_agent: &str, timeout: Duration) -> Result<Self, SourceError> {
        Self::build(user_agent, timeout, Vec::new())
    }

    /// Create a client using the configured request timeout and proxies.
    ///
    /// Configured proxies replace any proxy picked up from the environment.
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let proxies = config
            .proxy
            .proxies()
            .map_err(|e| SourceError::Other(e.to_string()))?;
        if !proxies.is_empty() {
            tracing::debug!("Routing provider requests through {} proxy(ies)", proxies.len());
        }
        Self::build(DEFAULT_USER_AGENT, config.request_timeout(), proxies)
    }

    fn build(
        user_agent: &str,
        timeout: Duration,
        proxies: Vec<Proxy>,
    ) -> Result<Self, SourceError> {
        let mut builder = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10).min(timeout))
            .pool_idle_timeout(Duration::from_secs(90));
        for proxy in proxies {
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| SourceError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Get the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// GET `url` with query parameters and decode a JSON body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let response = self.client.get(url).query(query).send().await?;
        let response = check_status(response).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Pass a successful response through, or turn an error status into a
/// [`SourceError`]
pub async fn check_status(response: Response) -> Result<Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);

    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    let mut message: String = body.trim().chars().take(MAX_ERROR_BODY).collect();
    if message.is_empty() {
        message = status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string();
    }

    tracing::debug!("HTTP {} from {}: {}", status.as_u16(), url, message);

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            SourceError::Auth(format!("HTTP {}: {}", status.as_u16(), message))
        }
        StatusCode::NOT_FOUND => SourceError::NotFound(url),
        _ => SourceError::Http {
            status: status.as_u16(),
            message,
            retry_after,
        },
    })
}

/// Parse a `Retry-After` value: delta-seconds or an HTTP-date
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
}
