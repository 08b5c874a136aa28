//! Pagination planning for one provider's listing API.
//!
//! The planner only decides *how* to page; [`crate::sources::ManagedSource`]
//! issues the requests.

use crate::sources::PaginationLimits;

/// How a provider listing is walked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStrategy {
    /// Numeric offset paging
    Offset,
    /// Continuation-token paging
    Cursor,
}

/// The outcome of planning a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagePlan {
    pub strategy: PageStrategy,
    /// Most records the fetch may return
    pub cap: usize,
    /// Largest page a single request may ask for
    pub page_size: usize,
}

impl PagePlan {
    /// Size of the next request given how many records are already collected
    pub fn next_request(&self, collected: usize) -> usize {
        self.page_size.min(self.cap.saturating_sub(collected))
    }
}

/// Plan a fetch of up to `requested` records.
///
/// The cap is `requested` bounded by `default_cap` (or `default_cap` itself
/// when nothing, or zero, was requested). A cap beyond a finite `offset_max` switches to
/// cursor paging when the provider offers it and is otherwise clamped to
/// `offset_max`.
pub fn plan(
    provider: &str,
    limits: &PaginationLimits,
    requested: Option<usize>,
    default_cap: usize,
) -> PagePlan {
    let mut cap = requested
        .filter(|&n| n > 0)
        .unwrap_or(default_cap)
        .min(default_cap);
    let page_size = limits.per_request_max.max(1);
    let mut strategy = PageStrategy::Offset;

    if let Some(offset_max) = limits.offset_max {
        if cap > offset_max {
            if limits.cursor_support {
                tracing::debug!(
                    "[{}] {} results exceed offset limit {}, using cursor pagination",
                    provider,
                    cap,
                    offset_max
                );
                strategy = PageStrategy::Cursor;
            } else {
                tracing::warn!(
                    "[{}] Requested {} results but the API only reaches offset {} ({}); clamping",
                    provider,
                    cap,
                    offset_max,
                    limits.note
                );
                cap = offset_max;
            }
        }
    }

    PagePlan {
        strategy,
        cap,
        page_size,
    }
}
