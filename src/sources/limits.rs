//! Static pagination limits of the supported provider APIs.

use serde::Serialize;

/// Capability descriptor for a provider's listing API.
///
/// This is configuration, not runtime state: it never changes for the
/// lifetime of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginationLimits {
    /// Largest page a single request may ask for
    pub per_request_max: usize,
    /// Deepest reachable offset, `None` when unbounded
    pub offset_max: Option<usize>,
    /// Whether the provider offers cursor continuation
    pub cursor_support: bool,
    /// Free-form description of the provider's limits
    pub note: &'static str,
}

impl PaginationLimits {
    pub const fn new(
        per_request_max: usize,
        offset_max: Option<usize>,
        cursor_support: bool,
        note: &'static str,
    ) -> Self {
        Self {
            per_request_max,
            offset_max,
            cursor_support,
            note,
        }
    }
}

impl Default for PaginationLimits {
    fn default() -> Self {
        DEFAULT_LIMITS
    }
}

const DEFAULT_LIMITS: PaginationLimits =
    PaginationLimits::new(100, None, false, "Unknown provider, conservative defaults");

const API_LIMITS: &[(&str, PaginationLimits)] = &[
    (
        "openalex",
        PaginationLimits::new(200, Some(10_000), true, "per_page max 200; use cursor=* beyond 10k"),
    ),
    (
        "semantic_scholar",
        PaginationLimits::new(100, Some(1_000), false, "offset + limit must stay below 1000"),
    ),
    (
        "crossref",
        PaginationLimits::new(
            1_000,
            Some(10_000),
            true,
            "rows max 1000; cursors expire after 5 minutes",
        ),
    ),
    ("pubmed", PaginationLimits::new(200, Some(9_999), false, "esearch retstart capped below 10k")),
    ("arxiv", PaginationLimits::new(2_000, None, false, "Rate limit: 1 request per 3 seconds")),
    ("core", PaginationLimits::new(100, Some(10_000), false, "scroll API not used")),
    ("dblp", PaginationLimits::new(1_000, Some(10_000), false, "h max 1000, f max 10000")),
    (
        "doaj",
        PaginationLimits::new(100, Some(1_000), false, "pageSize max 100, first 1000 results only"),
    ),
    ("medrxiv", PaginationLimits::new(100, None, true, "date-window cursor, 100 per page")),
    ("elsevier", PaginationLimits::new(25, Some(5_000), false, "Scopus search start max 5000")),
    ("google_scholar", PaginationLimits::new(20, Some(1_000), false, "SerpAPI num max 20")),
    ("wos", PaginationLimits::new(50, Some(100_000), false, "firstRecord max 100000")),
];

/// Look up the limits for a provider, falling back to conservative defaults
pub fn api_limits(provider: &str) -> PaginationLimits {
    API_LIMITS
        .iter()
        .find(|(name, _)| *name == provider)
        .map(|(_, limits)| *limits)
        .unwrap_or(DEFAULT_LIMITS)
}

/// Names of all providers with known limits
pub fn known_providers() -> impl Iterator<Item = &'static str> {
    API_LIMITS.iter().map(|(name, _)| *name)
}
