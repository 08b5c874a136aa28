//! Search request and aggregate result models.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::utils::DuplicateStrategy;

/// One logical query to fan out across providers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Main search query string
    pub query: String,

    /// Maximum number of results requested from each provider
    pub max_results: usize,

    /// Providers to query; `None` means the configured defaults
    pub sources: Option<Vec<String>>,

    /// Whether to run entity resolution over the combined stream
    pub deduplicate: bool,

    /// How duplicate groups are collapsed
    pub strategy: DuplicateStrategy,

    /// Provider-specific parameters, passed through untouched
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            query: String::new(),
            max_results: 10,
            sources: None,
            deduplicate: true,
            strategy: DuplicateStrategy::Merge,
            extra: HashMap::new(),
        }
    }
}

impl SearchQuery {
    /// Create a new search query
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Set maximum results per provider
    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    /// Restrict the query to these providers
    pub fn sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = Some(sources.into_iter().map(Into::into).collect());
        self
    }

    /// Enable/disable entity resolution
    pub fn deduplicate(mut self, deduplicate: bool) -> Self {
        self.deduplicate = deduplicate;
        self
    }

    /// Set the duplicate strategy
    pub fn strategy(mut self, strategy: DuplicateStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Add a provider-specific parameter
    pub fn extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Combined result of a fan-out search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResult {
    /// Query that was executed
    pub query: String,

    /// Interleaved (and optionally resolved) papers
    pub papers: Vec<crate::models::Paper>,

    /// Number of papers after resolution
    pub total_results: usize,

    /// Providers that were actually queried, in request order
    pub providers_queried: Vec<String>,

    /// Failure message per provider that failed
    pub errors: HashMap<String, String>,
}

impl SearchResult {
    /// Whether at least one provider failed
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Whether every queried provider failed
    pub fn is_total_failure(&self) -> bool {
        !self.providers_queried.is_empty() && self.errors.len() == self.providers_queried.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_query_builder() {
        let query = SearchQuery::new("deep learning")
            .max_results(50)
            .sources(["crossref", "openalex"])
            .deduplicate(false)
            .extra("year", serde_json::json!(2015));

        assert_eq!(query.query, "deep learning");
        assert_eq!(query.max_results, 50);
        assert_eq!(
            query.sources,
            Some(vec!["crossref".to_string(), "openalex".to_string()])
        );
        assert!(!query.deduplicate);
        assert_eq!(query.extra.get("year"), Some(&serde_json::json!(2015)));
    }

    #[test]
    fn test_total_failure() {
        let mut result = SearchResult {
            providers_queried: vec!["a".to_string(), "b".to_string()],
            ..Default::default()
        };
        result.errors.insert("a".to_string(), "boom".to_string());
        assert!(result.has_errors());
        assert!(!result.is_total_failure());

        result.errors.insert("b".to_string(), "boom".to_string());
        assert!(result.is_total_failure());
    }
}
