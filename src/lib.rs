//! # Paper Ladder
//!
//! Concurrent multi-source academic paper search. One query is fanned out to
//! several metadata providers at once, each provider behind its own rate
//! limiter and retry policy, and the combined results are resolved so that
//! every work appears once with the best field from each provider.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (Paper, SearchQuery, SearchResult)
//! - [`sources`]: The provider interface, registry, capability table and managed clients
//! - [`aggregator`]: Query fan-out and round-robin interleaving
//! - [`utils`]: Rate limiting, retry, pagination planning, entity resolution and HTTP
//! - [`config`]: Configuration management
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use paper_ladder::config::Config;
//! use paper_ladder::models::SearchQuery;
//! use paper_ladder::sources::{MockSource, Source, SourceRegistry};
//! use paper_ladder::Aggregator;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = SourceRegistry::with_sources([
//!     Arc::new(MockSource::new("openalex").with_generated(20)) as Arc<dyn Source>,
//!     Arc::new(MockSource::new("crossref").with_generated(20)),
//! ]);
//! let aggregator = Aggregator::new(registry, &Config::default())?;
//!
//! let query = SearchQuery::new("graph neural networks")
//!     .sources(["openalex", "crossref"])
//!     .max_results(10);
//! let result = aggregator.search(&query).await;
//! println!("{} papers, {} failed sources", result.total_results, result.errors.len());
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod config;
pub mod models;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use aggregator::{interleave, Aggregator};
pub use config::Config;
pub use models::{Paper, SearchQuery, SearchResult};
pub use sources::{Source, SourceError, SourceRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
