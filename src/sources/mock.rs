//! Mock source for testing purposes.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::models::{Paper, PaperBuilder};
use crate::sources::{
    CursorPage, Extra, PaginationLimits, Source, SourceCapabilities, SourceError,
};
use crate::utils::normalize_doi;

/// A call received by a [`MockSource`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Search { limit: usize, offset: usize },
    CursorPage { limit: usize, cursor: Option<String> },
    GetPaper(String),
    Citations { limit: usize, offset: usize },
    References { limit: usize, offset: usize },
}

/// A mock source for testing that serves a fixed corpus.
///
/// Offset searches return slices of the corpus; cursor pages use the offset
/// as the cursor token. Scripted failures are returned one per call, in order,
/// before any call succeeds.
#[derive(Debug)]
pub struct MockSource {
    id: String,
    capabilities: SourceCapabilities,
    limits: Option<PaginationLimits>,
    latency: Option<Duration>,
    corpus: Mutex<Vec<Paper>>,
    scripted_failures: Mutex<VecDeque<SourceError>>,
    persistent_failure: Mutex<Option<SourceError>>,
    calls: Mutex<Vec<MockCall>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockSource {
    /// Create a new mock source with an empty corpus.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            capabilities: SourceCapabilities::all(),
            limits: None,
            latency: None,
            corpus: Mutex::new(Vec::new()),
            scripted_failures: Mutex::new(VecDeque::new()),
            persistent_failure: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Serve these papers.
    pub fn with_papers(self, papers: Vec<Paper>) -> Self {
        *lock(&self.corpus) = papers;
        self
    }

    /// Serve `count` generated papers titled "<id> paper <n>".
    pub fn with_generated(self, count: usize) -> Self {
        let papers = (0..count)
            .map(|n| make_paper(&format!("{} paper {}", self.id, n), &self.id))
            .collect();
        self.with_papers(papers)
    }

    /// Override the capability set.
    pub fn with_capabilities(mut self, capabilities: SourceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Override the pagination limits.
    pub fn with_limits(mut self, limits: PaginationLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail the next calls with these errors, one per call.
    pub fn fail_next(&self, errors: impl IntoIterator<Item = SourceError>) {
        lock(&self.scripted_failures).extend(errors);
    }

    /// Fail every call with `error` until cleared.
    pub fn fail_always(&self, error: SourceError) {
        *lock(&self.persistent_failure) = Some(error);
    }

    /// Clear all configured failures.
    pub fn clear_failures(&self) {
        lock(&self.scripted_failures).clear();
        *lock(&self.persistent_failure) = None;
    }

    /// All calls received so far.
    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.calls).clone()
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    async fn enter(&self, call: MockCall) -> Result<(), SourceError> {
        lock(&self.calls).push(call);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(error) = lock(&self.scripted_failures).pop_front() {
            return Err(error);
        }
        match lock(&self.persistent_failure).as_ref() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn slice(&self, limit: usize, offset: usize) -> Vec<Paper> {
        lock(&self.corpus)
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Source for MockSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "Mock Source"
    }

    fn capabilities(&self) -> SourceCapabilities {
        self.capabilities
    }

    fn limits(&self) -> PaginationLimits {
        self.limits
            .unwrap_or_else(|| crate::sources::api_limits(&self.id))
    }

    async fn search(
        &self,
        _query: &str,
        limit: usize,
        offset: usize,
        _extra: &Extra,
    ) -> Result<Vec<Paper>, SourceError> {
        self.enter(MockCall::Search { limit, offset }).await?;
        Ok(self.slice(limit, offset))
    }

    async fn search_cursor_page(
        &self,
        _query: &str,
        limit: usize,
        cursor: Option<&str>,
        _extra: &Extra,
    ) -> Result<CursorPage, SourceError> {
        self.enter(MockCall::CursorPage {
            limit,
            cursor: cursor.map(str::to_string),
        })
        .await?;

        let offset = match cursor {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| SourceError::InvalidRequest(format!("bad cursor: {}", token)))?,
            None => 0,
        };
        let papers = self.slice(limit, offset);
        let next = offset + papers.len();
        let next_cursor = (!papers.is_empty() && next < lock(&self.corpus).len())
            .then(|| next.to_string());

        Ok(CursorPage { papers, next_cursor })
    }

    async fn get_paper(&self, identifier: &str) -> Result<Option<Paper>, SourceError> {
        self.enter(MockCall::GetPaper(identifier.to_string())).await?;
        let wanted = normalize_doi(Some(identifier));
        Ok(lock(&self.corpus)
            .iter()
            .find(|p| {
                let doi = normalize_doi(p.doi.as_deref());
                (doi.is_some() && doi == wanted) || p.title == identifier
            })
            .cloned())
    }

    async fn get_citations(
        &self,
        _identifier: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Paper>, SourceError> {
        self.enter(MockCall::Citations { limit, offset }).await?;
        Ok(self.slice(limit, offset))
    }

    async fn get_references(
        &self,
        _identifier: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Paper>, SourceError> {
        self.enter(MockCall::References { limit, offset }).await?;
        Ok(self.slice(limit, offset))
    }
}

/// Helper function to create a mock paper for testing.
pub fn make_paper(title: &str, source: &str) -> Paper {
    PaperBuilder::new(title, source)
        .url(format!("http://example.com/{}", title.replace(' ', "-")))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offset_slices() {
        let source = MockSource::new("mock").with_generated(5);
        let extra = Extra::new();

        let page = source.search("q", 2, 3, &extra).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].title, "mock paper 3");

        let past_end = source.search("q", 10, 7, &extra).await.unwrap();
        assert!(past_end.is_empty());
        assert_eq!(source.call_count(), 2);
    }

    #[tokio::test]
    async fn test_scripted_failures_then_success() {
        let source = MockSource::new("mock").with_generated(1);
        source.fail_next([SourceError::Timeout("t".into())]);

        let extra = Extra::new();
        assert!(source.search("q", 1, 0, &extra).await.is_err());
        assert_eq!(source.search("q", 1, 0, &extra).await.unwrap().len(), 1);

        source.fail_always(SourceError::Auth("revoked".into()));
        assert!(source.search("q", 1, 0, &extra).await.is_err());
        source.clear_failures();
        assert_eq!(source.search("q", 1, 0, &extra).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cursor_pages() {
        let source = MockSource::new("mock").with_generated(3);
        let extra = Extra::new();

        let first = source.search_cursor_page("q", 2, None, &extra).await.unwrap();
        assert_eq!(first.papers.len(), 2);
        assert_eq!(first.next_cursor.as_deref(), Some("2"));

        let last = source
            .search_cursor_page("q", 2, first.next_cursor.as_deref(), &extra)
            .await
            .unwrap();
        assert_eq!(last.papers.len(), 1);
        assert_eq!(last.next_cursor, None);
    }

    #[tokio::test]
    async fn test_get_paper_by_doi() {
        let paper = PaperBuilder::new("Deep learning", "mock")
            .doi("10.1038/nature14539")
            .build();
        let source = MockSource::new("mock").with_papers(vec![paper]);

        let found = source
            .get_paper("https://doi.org/10.1038/NATURE14539")
            .await
            .unwrap();
        assert_eq!(found.map(|p| p.title), Some("Deep learning".to_string()));
        assert!(source.get_paper("10.1/none").await.unwrap().is_none());
    }
}
