//! Research source plugins with a capability-set interface.
//!
//! This module defines the [`Source`] trait that every provider client
//! implements. Provider clients own their wire format and parsing; this crate
//! only sees the common [`Paper`] shape they produce.
//!
//! Sources are looked up by name through the [`SourceRegistry`]. The
//! [`ManagedSource`] wrapper puts each source behind its own rate limiter, the
//! shared retry policy and the pagination rules from its [`PaginationLimits`].

mod client;
mod limits;
mod registry;

pub mod mock;

pub use client::{ManagedSource, PaperStream};
pub use limits::{api_limits, known_providers, PaginationLimits};
pub use mock::{make_paper, MockSource};
pub use registry::{SourceCapabilities, SourceRegistry};

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::models::Paper;

/// Provider-specific parameters passed through to a source untouched
pub type Extra = HashMap<String, serde_json::Value>;

/// One page of a cursor-paginated listing
#[derive(Debug, Clone, Default)]
pub struct CursorPage {
    /// Papers on this page
    pub papers: Vec<Paper>,
    /// Token for the next page, `None` once the listing is exhausted
    pub next_cursor: Option<String>,
}

/// The Source trait defines the interface for all research source plugins.
///
/// # Implementing a New Source
///
/// 1. Create a new struct that implements `Source`
/// 2. Implement `id`, `name`, `search` and `get_paper`
/// 3. Override `capabilities` and the optional methods the provider supports
/// 4. Override `limits` if the provider is not in the static table
/// 5. Register it with [`SourceRegistry::register`]
///
/// Implementations must not rate limit or retry on their own; the
/// [`ManagedSource`] wrapper does both.
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this source (e.g. "openalex", "crossref")
    fn id(&self) -> &str;

    /// Human-readable name of this source
    fn name(&self) -> &str;

    /// Describe the capabilities of this source
    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::PAPER_LOOKUP
    }

    /// Pagination limits of the provider's listing API
    fn limits(&self) -> PaginationLimits {
        api_limits(self.id())
    }

    /// Whether this source supports citation lookup
    fn supports_citations(&self) -> bool {
        self.capabilities().contains(SourceCapabilities::CITATIONS)
    }

    /// Whether this source supports reference lookup
    fn supports_references(&self) -> bool {
        self.capabilities().contains(SourceCapabilities::REFERENCES)
    }

    // ========== SEARCH METHODS ==========

    /// Search for papers matching the query, starting at `offset`
    async fn search(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
        extra: &Extra,
    ) -> Result<Vec<Paper>, SourceError>;

    /// Fetch one page of a cursor-paginated search.
    ///
    /// `cursor` is `None` for the first page. Only called when
    /// [`PaginationLimits::cursor_support`] is set.
    async fn search_cursor_page(
        &self,
        _query: &str,
        _limit: usize,
        _cursor: Option<&str>,
        _extra: &Extra,
    ) -> Result<CursorPage, SourceError> {
        Err(SourceError::NotImplemented)
    }

    // ========== LOOKUP METHODS ==========

    /// Get a paper by DOI or provider-native ID
    async fn get_paper(&self, identifier: &str) -> Result<Option<Paper>, SourceError>;

    // ========== CITATION METHODS ==========

    /// Get papers that cite this paper
    async fn get_citations(
        &self,
        _identifier: &str,
        _limit: usize,
        _offset: usize,
    ) -> Result<Vec<Paper>, SourceError> {
        Err(SourceError::NotImplemented)
    }

    /// Get papers referenced by this paper
    async fn get_references(
        &self,
        _identifier: &str,
        _limit: usize,
        _offset: usize,
    ) -> Result<Vec<Paper>, SourceError> {
        Err(SourceError::NotImplemented)
    }
}

/// Errors that can occur when interacting with a source
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SourceError {
    /// The requested operation is not implemented for this source
    #[error("Operation not implemented for this source")]
    NotImplemented,

    /// Connect, read or write timeout
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Connection refused or reset
    #[error("Connection error: {0}")]
    Connection(String),

    /// Other transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },

    /// Authentication or authorization failure
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Paper not found
    #[error("Paper not found: {0}")]
    NotFound(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Parsing error (XML, JSON, HTML, etc.)
    #[error("Parse error: {0}")]
    Parse(String),

    /// No source registered under this name
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    /// API error from the source
    #[error("API error: {0}")]
    Api(String),

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

/// HTTP statuses worth another attempt
pub const RETRYABLE_STATUS_CODES: &[u16] = &[429, 500, 502, 503, 504, 520, 521, 522, 523, 524];

impl SourceError {
    /// Whether the retry handler may try the operation again
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::Timeout(_) | SourceError::Connection(_) | SourceError::Network(_) => true,
            SourceError::Http { status, .. } => RETRYABLE_STATUS_CODES.contains(status),
            _ => false,
        }
    }

    /// Delay the provider asked for before the next request
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SourceError::Http { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Build an HTTP status error without a retry hint
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        SourceError::Http {
            status,
            message: message.into(),
            retry_after: None,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout(err.to_string())
        } else if err.is_connect() {
            SourceError::Connection(err.to_string())
        } else if err.is_decode() {
            SourceError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            SourceError::http(status.as_u16(), err.to_string())
        } else if err.is_builder() {
            SourceError::InvalidRequest(err.to_string())
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}
