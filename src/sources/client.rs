//! Managed provider client: one source behind its own limiter and retry policy.

use futures_util::stream::BoxStream;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, ConfigError};
use crate::models::Paper;
use crate::utils::{pagination, PageStrategy, RateLimiter, RetryHandler};

use super::{CursorPage, Extra, PaginationLimits, Source, SourceError};

/// Lazy sequence of papers from a cursor-paginated listing
pub type PaperStream<'a> = BoxStream<'a, Result<Paper, SourceError>>;

/// A [`Source`] wrapped with everything needed to call it safely.
///
/// Every outbound call goes retry handler, then rate limiter, then the
/// source, with each attempt bounded by the request timeout. The limiter
/// lives as long as this value, so one `ManagedSource` should be kept per
/// provider for the life of the process.
#[derive(Debug)]
pub struct ManagedSource {
    source: Arc<dyn Source>,
    limiter: RateLimiter,
    retry: RetryHandler,
    limits: PaginationLimits,
    default_cap: usize,
    timeout: Duration,
}

impl ManagedSource {
    /// Wrap `source` using the rate, retry, cap and timeout settings in `config`
    pub fn new(source: Arc<dyn Source>, config: &Config) -> Result<Self, ConfigError> {
        let id = source.id().to_string();
        let limiter = RateLimiter::new(id.clone(), config.rate_for(&id))?;
        let retry = RetryHandler::new(id.clone(), config.retry_config()?);
        let limits = source.limits();
        let default_cap = config.cap_for(&id);

        if default_cap == 0 {
            return Err(ConfigError::Invalid(format!(
                "pagination cap for '{}' must be greater than zero",
                id
            )));
        }

        Ok(Self {
            source,
            limiter,
            retry,
            limits,
            default_cap,
            timeout: config.request_timeout(),
        })
    }

    /// Provider identifier
    pub fn id(&self) -> &str {
        self.source.id()
    }

    /// The wrapped source
    pub fn source(&self) -> &Arc<dyn Source> {
        &self.source
    }

    /// Pagination limits of the provider
    pub fn limits(&self) -> &PaginationLimits {
        &self.limits
    }

    /// Records fetched per search when the caller sets no limit
    pub fn default_cap(&self) -> usize {
        self.default_cap
    }

    /// Run one logical call: retried, rate limited and timed out per attempt
    async fn call<T, F, Fut>(&self, what: &str, mut operation: F) -> Result<T, SourceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        self.retry
            .execute(|| {
                let attempt = operation();
                async move {
                    self.limiter.acquire().await;
                    match tokio::time::timeout(self.timeout, attempt).await {
                        Ok(result) => result,
                        Err(_) => Err(SourceError::Timeout(format!(
                            "{} did not complete within {}s",
                            what,
                            self.timeout.as_secs_f64()
                        ))),
                    }
                }
            })
            .await
    }

    /// Fetch one offset page
    pub async fn search_page(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
        extra: &Extra,
    ) -> Result<Vec<Paper>, SourceError> {
        self.call("search", || self.source.search(query, limit, offset, extra))
            .await
    }

    /// Fetch one cursor page
    pub async fn search_cursor_page(
        &self,
        query: &str,
        limit: usize,
        cursor: Option<&str>,
        extra: &Extra,
    ) -> Result<CursorPage, SourceError> {
        self.call("cursor search", || {
            self.source.search_cursor_page(query, limit, cursor, extra)
        })
        .await
    }

    /// Fetch up to `max_results` records, paging as the provider requires.
    ///
    /// `None` or zero means the configured cap. A page shorter than requested ends
    /// the listing, so no request is issued past the last record or the cap.
    pub async fn fetch_all(
        &self,
        query: &str,
        max_results: Option<usize>,
        extra: &Extra,
    ) -> Result<Vec<Paper>, SourceError> {
        let plan = pagination::plan(self.id(), &self.limits, max_results, self.default_cap);

        if plan.strategy == PageStrategy::Cursor {
            return self.collect_cursor(query, plan.cap, extra).await;
        }

        let mut papers: Vec<Paper> = Vec::new();
        let mut requests = 0usize;

        loop {
            let limit = plan.next_request(papers.len());
            if limit == 0 {
                break;
            }

            let page = self.search_page(query, limit, papers.len(), extra).await?;
            requests += 1;
            let returned = page.len();
            papers.extend(page);

            tracing::debug!(
                "[{}] Page {} returned {} of {} requested ({} total)",
                self.id(),
                requests,
                returned,
                limit,
                papers.len()
            );

            if returned < limit {
                break;
            }
        }

        papers.truncate(plan.cap);
        Ok(papers)
    }

    async fn collect_cursor(
        &self,
        query: &str,
        cap: usize,
        extra: &Extra,
    ) -> Result<Vec<Paper>, SourceError> {
        let page_size = self.limits.per_request_max.max(1);
        let mut papers: Vec<Paper> = Vec::new();
        let mut cursor: Option<String> = None;

        while papers.len() < cap {
            let limit = page_size.min(cap - papers.len());
            let page = self
                .search_cursor_page(query, limit, cursor.as_deref(), extra)
                .await?;
            let returned = page.papers.len();
            papers.extend(page.papers);

            tracing::debug!(
                "[{}] Cursor page returned {} ({} total)",
                self.id(),
                returned,
                papers.len()
            );

            match page.next_cursor {
                Some(next) if returned > 0 => cursor = Some(next),
                _ => break,
            }
        }

        papers.truncate(cap);
        Ok(papers)
    }

    /// Stream up to `max_results` records through cursor continuation.
    ///
    /// Pages are fetched on demand as the stream is polled. For a provider
    /// without cursor support the stream yields a single
    /// [`SourceError::NotImplemented`].
    pub fn search_with_cursor<'a>(
        &'a self,
        query: &'a str,
        max_results: usize,
        extra: &'a Extra,
    ) -> PaperStream<'a> {
        let supported = self.limits.cursor_support;
        let page_size = self.limits.per_request_max.max(1);

        Box::pin(async_stream::stream! {
            if !supported {
                yield Err(SourceError::NotImplemented);
                return;
            }

            let mut emitted = 0usize;
            let mut cursor: Option<String> = None;

            while emitted < max_results {
                let limit = page_size.min(max_results - emitted);
                let page = match self
                    .search_cursor_page(query, limit, cursor.as_deref(), extra)
                    .await
                {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };

                let returned = page.papers.len();
                for paper in page.papers.into_iter().take(max_results - emitted) {
                    emitted += 1;
                    yield Ok(paper);
                }

                match page.next_cursor {
                    Some(next) if returned > 0 => cursor = Some(next),
                    _ => break,
                }
            }
        })
    }

    /// Look up a paper by DOI or provider-native ID
    pub async fn get_paper(&self, identifier: &str) -> Result<Option<Paper>, SourceError> {
        self.call("get_paper", || self.source.get_paper(identifier))
            .await
    }

    /// Papers citing `identifier`
    pub async fn get_citations(
        &self,
        identifier: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Paper>, SourceError> {
        if !self.source.supports_citations() {
            return Err(SourceError::NotImplemented);
        }
        self.call("get_citations", || {
            self.source.get_citations(identifier, limit, offset)
        })
        .await
    }

    /// Papers referenced by `identifier`
    pub async fn get_references(
        &self,
        identifier: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Paper>, SourceError> {
        if !self.source.supports_references() {
            return Err(SourceError::NotImplemented);
        }
        self.call("get_references", || {
            self.source.get_references(identifier, limit, offset)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::mock::MockCall;
    use crate::sources::{MockSource, SourceCapabilities};
    use futures_util::StreamExt;
    use tokio::time::Instant;

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.rate_limits.default_requests_per_second = 1000.0;
        config.rate_limits.sources.clear();
        config.retry.base_delay_secs = 0.01;
        config.retry.max_delay_secs = 0.1;
        config.retry.jitter_fraction = 0.0;
        config
    }

    fn managed(mock: &Arc<MockSource>, config: &Config) -> ManagedSource {
        ManagedSource::new(Arc::clone(mock) as Arc<dyn Source>, config).unwrap()
    }

    fn offset_calls(mock: &MockSource) -> Vec<(usize, usize)> {
        mock.calls()
            .into_iter()
            .filter_map(|c| match c {
                MockCall::Search { limit, offset } => Some((limit, offset)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_all_pages_by_offset() {
        let mock = Arc::new(
            MockSource::new("paged")
                .with_generated(250)
                .with_limits(PaginationLimits::new(100, None, false, "")),
        );
        let source = managed(&mock, &fast_config());

        let papers = source.fetch_all("q", Some(250), &Extra::new()).await.unwrap();
        assert_eq!(papers.len(), 250);
        assert_eq!(papers[249].title, "paged paper 249");
        assert_eq!(offset_calls(&mock), vec![(100, 0), (100, 100), (50, 200)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_all_stops_on_short_page() {
        let mock = Arc::new(
            MockSource::new("short")
                .with_generated(130)
                .with_limits(PaginationLimits::new(100, None, false, "")),
        );
        let source = managed(&mock, &fast_config());

        let papers = source.fetch_all("q", Some(500), &Extra::new()).await.unwrap();
        assert_eq!(papers.len(), 130);
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_all_exact_page_boundary_probes_once() {
        let mock = Arc::new(
            MockSource::new("exact")
                .with_generated(200)
                .with_limits(PaginationLimits::new(100, None, false, "")),
        );
        let source = managed(&mock, &fast_config());

        let papers = source.fetch_all("q", Some(500), &Extra::new()).await.unwrap();
        assert_eq!(papers.len(), 200);
        assert_eq!(offset_calls(&mock), vec![(100, 0), (100, 100), (100, 200)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_all_respects_configured_cap() {
        let mock = Arc::new(
            MockSource::new("capped")
                .with_generated(100)
                .with_limits(PaginationLimits::new(10, None, false, "")),
        );
        let mut config = fast_config();
        config.pagination.sources.insert("capped".into(), 25);
        let source = managed(&mock, &config);
        assert_eq!(source.default_cap(), 25);
        assert_eq!(source.source().id(), "capped");

        let papers = source.fetch_all("q", None, &Extra::new()).await.unwrap();
        assert_eq!(papers.len(), 25);
        let papers = source.fetch_all("q", Some(1000), &Extra::new()).await.unwrap();
        assert_eq!(papers.len(), 25);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_all_clamps_to_offset_limit() {
        let mock = Arc::new(
            MockSource::new("shallow")
                .with_generated(100)
                .with_limits(PaginationLimits::new(20, Some(40), false, "")),
        );
        let source = managed(&mock, &fast_config());

        let papers = source.fetch_all("q", Some(90), &Extra::new()).await.unwrap();
        assert_eq!(papers.len(), 40);
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_all_uses_cursor_beyond_offset_limit() {
        let mock = Arc::new(
            MockSource::new("deep")
                .with_generated(90)
                .with_limits(PaginationLimits::new(20, Some(40), true, "")),
        );
        let source = managed(&mock, &fast_config());

        let papers = source.fetch_all("q", Some(50), &Extra::new()).await.unwrap();
        assert_eq!(papers.len(), 50);
        assert!(mock
            .calls()
            .iter()
            .all(|c| matches!(c, MockCall::CursorPage { .. })));
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_is_retried() {
        let mock = Arc::new(MockSource::new("flaky").with_generated(5));
        mock.fail_next([SourceError::http(503, "unavailable")]);
        let source = managed(&mock, &fast_config());

        let papers = source.fetch_all("q", Some(5), &Extra::new()).await.unwrap();
        assert_eq!(papers.len(), 5);
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_failure_is_not_retried() {
        let mock = Arc::new(MockSource::new("locked").with_generated(5));
        mock.fail_always(SourceError::Auth("bad key".into()));
        let source = managed(&mock, &fast_config());

        let err = source.fetch_all("q", Some(5), &Extra::new()).await.unwrap_err();
        assert_eq!(err, SourceError::Auth("bad key".into()));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempt_times_out_and_retries() {
        let mock = Arc::new(
            MockSource::new("slow")
                .with_generated(1)
                .with_latency(Duration::from_secs(60)),
        );
        let mut config = fast_config();
        config.request_timeout_secs = 1;
        config.retry.max_retries = 1;
        let source = managed(&mock, &config);

        let err = source.get_paper("slow paper 0").await.unwrap_err();
        assert!(matches!(err, SourceError::Timeout(_)));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_are_rate_limited() {
        let mock = Arc::new(
            MockSource::new("paced")
                .with_generated(30)
                .with_limits(PaginationLimits::new(10, None, false, "")),
        );
        let mut config = fast_config();
        config.rate_limits.sources.insert("paced".into(), 2.0);
        let source = managed(&mock, &config);

        let start = Instant::now();
        let papers = source.fetch_all("q", Some(30), &Extra::new()).await.unwrap();
        assert_eq!(papers.len(), 30);
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_with_cursor_streams_pages() {
        let mock = Arc::new(
            MockSource::new("cursor")
                .with_generated(25)
                .with_limits(PaginationLimits::new(10, None, true, "")),
        );
        let source = managed(&mock, &fast_config());
        let extra = Extra::new();

        let mut stream = source.search_with_cursor("q", 15, &extra);
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.title, "cursor paper 0");
        assert_eq!(mock.call_count(), 1);

        let rest: Vec<_> = stream.collect().await;
        assert_eq!(rest.len(), 14);
        assert_eq!(
            mock.calls(),
            vec![
                MockCall::CursorPage { limit: 10, cursor: None },
                MockCall::CursorPage { limit: 5, cursor: Some("10".into()) },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_with_cursor_unsupported() {
        let mock = Arc::new(
            MockSource::new("plain").with_limits(PaginationLimits::new(10, None, false, "")),
        );
        let source = managed(&mock, &fast_config());
        let extra = Extra::new();

        let items: Vec<_> = source.search_with_cursor("q", 10, &extra).collect().await;
        assert_eq!(items, vec![Err(SourceError::NotImplemented)]);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_citations_require_capability() {
        let mock = Arc::new(
            MockSource::new("nocite")
                .with_generated(3)
                .with_capabilities(SourceCapabilities::SEARCH),
        );
        let source = managed(&mock, &fast_config());

        assert_eq!(
            source.get_citations("x", 10, 0).await.unwrap_err(),
            SourceError::NotImplemented
        );
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn test_invalid_rate_is_rejected() {
        let mut config = Config::default();
        config.rate_limits.sources.insert("bad".into(), -1.0);
        let result = ManagedSource::new(Arc::new(MockSource::new("bad")), &config);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
