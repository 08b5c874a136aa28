//! Utility modules supporting the aggregator and provider clients.
//!
//! - [`RateLimiter`]: minimum-interval pacing, one per provider
//! - [`RetryConfig`] / [`RetryHandler`]: exponential backoff with jitter for transient failures
//! - [`pagination`]: decides between offset and cursor paging for one provider
//! - [`EntityResolver`]: groups papers by DOI or title and merges each group
//! - [`merge_papers`] / [`SourcePriority`]: the field-level merge policy
//! - [`HttpClient`]: reqwest wrapper for provider implementations
//!
//! # Deduplication
//!
//! ```rust
//! use paper_ladder::utils::{deduplicate_papers, DuplicateStrategy};
//! use paper_ladder::models::PaperBuilder;
//!
//! let papers = vec![
//!     PaperBuilder::new("Deep learning", "crossref").doi("10.1038/nature14539").build(),
//!     PaperBuilder::new("Deep Learning", "semantic_scholar")
//!         .doi("https://doi.org/10.1038/NATURE14539")
//!         .abstract_text("Deep learning allows computational models...")
//!         .build(),
//! ];
//!
//! let unique = deduplicate_papers(papers, DuplicateStrategy::Merge);
//! assert_eq!(unique.len(), 1);
//! assert_eq!(unique[0].source, "crossref,semantic_scholar");
//! ```
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use paper_ladder::sources::SourceError;
//! use paper_ladder::utils::{RetryConfig, RetryHandler};
//!
//! # async fn fetch_data() -> Result<String, SourceError> { Ok("data".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), SourceError> {
//! let handler = RetryHandler::new("crossref", RetryConfig::default().max_retries(3));
//! let data = handler.execute(fetch_data).await?;
//! # Ok(())
//! # }
//! ```

mod dedup;
mod http;
mod merge;
mod normalize;
pub mod pagination;
mod rate_limit;
mod retry;

pub use dedup::{
    deduplicate_papers, find_duplicates, group_papers, DuplicateStrategy, EntityResolver,
    ResolveError,
};
pub use http::{check_status, parse_retry_after, HttpClient};
pub use merge::{merge_papers, SourcePriority, MAX_MERGED_KEYWORDS};
pub use normalize::{normalize_doi, normalize_title};
pub use pagination::{PagePlan, PageStrategy};
pub use rate_limit::RateLimiter;
pub use retry::{RetryConfig, RetryHandler};
