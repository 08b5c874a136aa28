//! Query fan-out across providers.
//!
//! The [`Aggregator`] sends one logical query to every requested provider at
//! once, waits for all of them, interleaves their results by rank and hands
//! the combined list to the entity resolver. Provider failures never abort a
//! search: they are reported per provider in [`SearchResult::errors`].

use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{Config, ConfigError};
use crate::models::{Paper, SearchQuery, SearchResult};
use crate::sources::{ManagedSource, SourceError, SourceRegistry};
use crate::utils::EntityResolver;

/// Fans queries out to registered sources and resolves the combined results
#[derive(Debug)]
pub struct Aggregator {
    registry: SourceRegistry,
    managed: HashMap<String, Arc<ManagedSource>>,
    resolver: EntityResolver,
    default_sources: Vec<String>,
}

impl Aggregator {
    /// Build an aggregator over every source in `registry`.
    ///
    /// Each source gets its own rate limiter for the lifetime of the
    /// aggregator. Fails only when `config` is invalid.
    pub fn new(registry: SourceRegistry, config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut managed = HashMap::with_capacity(registry.len());
        for source in registry.all() {
            let client = ManagedSource::new(Arc::clone(source), config)?;
            managed.insert(source.id().to_string(), Arc::new(client));
        }

        Ok(Self {
            registry,
            managed,
            resolver: EntityResolver::new(config.priority.clone()),
            default_sources: config.default_sources.clone(),
        })
    }

    /// The source registry
    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// The managed client for a provider
    pub fn source(&self, id: &str) -> Option<&Arc<ManagedSource>> {
        self.managed.get(id)
    }

    /// The entity resolver applied to search results
    pub fn resolver(&self) -> &EntityResolver {
        &self.resolver
    }

    /// Providers queried when a request names none
    pub fn default_sources(&self) -> &[String] {
        &self.default_sources
    }

    /// Managed clients for the requested names, in request order.
    ///
    /// Unknown names are logged and skipped.
    fn select(&self, requested: Option<&[String]>) -> Vec<&Arc<ManagedSource>> {
        let names = match requested {
            Some(names) if !names.is_empty() => names,
            _ => self.default_sources.as_slice(),
        };

        let (known, unknown) = self.registry.resolve(names);
        for name in &unknown {
            tracing::warn!("Skipping unknown source '{}'", name);
        }

        known
            .into_iter()
            .filter_map(|source| self.managed.get(source.id()))
            .collect()
    }

    /// Search all requested providers concurrently.
    ///
    /// `query.max_results` applies per provider. Always returns a result;
    /// failed providers contribute no papers and an entry in `errors`.
    pub async fn search(&self, query: &SearchQuery) -> SearchResult {
        let sources = self.select(query.sources.as_deref());
        let providers_queried: Vec<String> = sources.iter().map(|s| s.id().to_string()).collect();

        tracing::info!(
            "Searching {} source(s) for '{}': {:?}",
            sources.len(),
            query.query,
            providers_queried
        );

        let outcomes = join_all(sources.iter().map(|source| async move {
            let result = source
                .fetch_all(&query.query, Some(query.max_results), &query.extra)
                .await;
            (source.id(), result)
        }))
        .await;

        let mut lists: Vec<Vec<Paper>> = Vec::with_capacity(outcomes.len());
        let mut errors: HashMap<String, String> = HashMap::new();

        for (id, outcome) in outcomes {
            match outcome {
                Ok(papers) => {
                    tracing::debug!("[{}] Returned {} papers", id, papers.len());
                    lists.push(papers);
                }
                Err(e) => {
                    tracing::warn!("[{}] Search failed: {}", id, e);
                    errors.insert(id.to_string(), e.to_string());
                    lists.push(Vec::new());
                }
            }
        }

        let combined = interleave(lists);
        let fetched = combined.len();
        let papers = if query.deduplicate {
            self.resolver.resolve(combined, query.strategy)
        } else {
            combined
        };

        tracing::info!(
            "Search for '{}' complete: {} papers ({} before resolution), {} failed source(s)",
            query.query,
            papers.len(),
            fetched,
            errors.len()
        );

        SearchResult {
            query: query.query.clone(),
            total_results: papers.len(),
            papers,
            providers_queried,
            errors,
        }
    }

    /// Look a paper up provider by provider and return the first hit.
    ///
    /// Provider errors are logged and the next provider is tried.
    pub async fn get_paper(&self, identifier: &str, sources: Option<&[String]>) -> Option<Paper> {
        for source in self.select(sources) {
            match source.get_paper(identifier).await {
                Ok(Some(paper)) => return Some(paper),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("[{}] Lookup of '{}' failed: {}", source.id(), identifier, e)
                }
            }
        }
        None
    }

    /// Look a paper up on all providers at once and merge every hit
    pub async fn get_paper_from_all(
        &self,
        identifier: &str,
        sources: Option<&[String]>,
    ) -> Option<Paper> {
        let sources = self.select(sources);
        let outcomes = join_all(sources.iter().map(|source| async move {
            (source.id(), source.get_paper(identifier).await)
        }))
        .await;

        let hits: Vec<Paper> = outcomes
            .into_iter()
            .filter_map(|(id, outcome)| match outcome {
                Ok(hit) => hit,
                Err(e) => {
                    tracing::warn!("[{}] Lookup of '{}' failed: {}", id, identifier, e);
                    None
                }
            })
            .collect();

        self.resolver.merge(&hits)
    }

    /// Papers citing `identifier`, from one provider
    pub async fn get_citations(
        &self,
        provider: &str,
        identifier: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Paper>, SourceError> {
        self.required(provider)?
            .get_citations(identifier, limit, offset)
            .await
    }

    /// Papers referenced by `identifier`, from one provider
    pub async fn get_references(
        &self,
        provider: &str,
        identifier: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Paper>, SourceError> {
        self.required(provider)?
            .get_references(identifier, limit, offset)
            .await
    }

    fn required(&self, provider: &str) -> Result<&Arc<ManagedSource>, SourceError> {
        self.managed
            .get(provider)
            .ok_or_else(|| SourceError::UnknownSource(provider.to_string()))
    }
}

/// Round-robin merge of per-provider result lists.
///
/// Emits every list's first record in list order, then every list's second
/// record, and so on, skipping lists that have run out.
pub fn interleave(lists: Vec<Vec<Paper>>) -> Vec<Paper> {
    let total: usize = lists.iter().map(Vec::len).sum();
    let mut iters: Vec<_> = lists.into_iter().map(Vec::into_iter).collect();
    let mut combined = Vec::with_capacity(total);

    while combined.len() < total {
        for iter in iters.iter_mut() {
            if let Some(paper) = iter.next() {
                combined.push(paper);
            }
        }
    }

    combined
}
