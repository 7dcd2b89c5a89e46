use crate::api::models::{AnonRecord, PageRef};
use std::collections::HashMap;
use std::sync::Arc;

/// Which data source feeds the table and stats panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Aggregated,
    PerPage,
}

/// Aggregated record set, loaded at most once per session. `Failed` is
/// distinct from `NotLoaded` so the renderer shows "no data" instead of an
/// infinite loading state, and so the coordinator never implicitly refetches.
#[derive(Debug, Clone, Default)]
pub enum AggregatedState {
    #[default]
    NotLoaded,
    Loaded(Arc<Vec<AnonRecord>>),
    Failed,
}

/// Resolved per-page cache entry. In-flight requests live in the loader's
/// coalescing map, not here; the cache only ever holds terminal outcomes.
#[derive(Debug, Clone)]
pub enum PageState {
    Loaded(Arc<Vec<AnonRecord>>),
    Failed,
}

/// Identity of an async request, captured at dispatch time. A response is
/// applied only while its token still matches the session; anything else is
/// a stale response and is dropped before touching state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestToken {
    epoch: u64,
}

/// Per-session view state for one open result set. Created by `open`,
/// discarded in full by `close` or a superseding `open`; no cross-session
/// reuse of cached pages.
#[derive(Debug, Default)]
pub struct ResultSession {
    epoch: u64,
    task_id: Option<String>,
    page_list: Vec<PageRef>,
    pages_resolved: bool,
    selected_index: Option<usize>,
    active_tab: Tab,
    aggregated: AggregatedState,
    // page_count from the aggregated response, used for stats when task
    // metadata failed and the page list is empty.
    page_count_hint: Option<u32>,
    page_cache: HashMap<u32, PageState>,
}

impl ResultSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset every field to defaults and start a new session for `task_id`.
    /// Bumping the epoch invalidates all tokens handed out for the previous
    /// session, so late resolutions cannot leak into this one.
    pub fn open(&mut self, task_id: &str) -> RequestToken {
        self.epoch += 1;
        self.task_id = Some(task_id.to_string());
        self.page_list = Vec::new();
        self.pages_resolved = false;
        self.selected_index = None;
        self.active_tab = Tab::Aggregated;
        self.aggregated = AggregatedState::NotLoaded;
        self.page_count_hint = None;
        self.page_cache = HashMap::new();
        self.token()
    }

    /// Discard the session entirely, clearing all cached collections.
    pub fn close(&mut self) {
        self.epoch += 1;
        self.task_id = None;
        self.page_list = Vec::new();
        self.pages_resolved = false;
        self.selected_index = None;
        self.active_tab = Tab::Aggregated;
        self.aggregated = AggregatedState::NotLoaded;
        self.page_count_hint = None;
        self.page_cache = HashMap::new();
    }

    pub fn token(&self) -> RequestToken {
        RequestToken { epoch: self.epoch }
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        token.epoch == self.epoch
    }

    pub fn is_open(&self) -> bool {
        self.task_id.is_some()
    }

    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    pub fn page_list(&self) -> &[PageRef] {
        &self.page_list
    }

    /// Whether the task-metadata fetch has completed (successfully or not).
    /// Before that, the index stays unset and the strip renders "loading".
    pub fn pages_resolved(&self) -> bool {
        self.pages_resolved
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected_index
    }

    pub fn active_tab(&self) -> Tab {
        self.active_tab
    }

    pub fn aggregated(&self) -> &AggregatedState {
        &self.aggregated
    }

    pub fn selected_page(&self) -> Option<&PageRef> {
        self.selected_index.and_then(|i| self.page_list.get(i))
    }

    pub fn current_page_number(&self) -> Option<u32> {
        self.selected_page().map(|p| p.page_number)
    }

    /// Page count for the stats line: the session's page list when resolved,
    /// otherwise the aggregated response's hint.
    pub fn page_count(&self) -> Option<usize> {
        if !self.page_list.is_empty() {
            Some(self.page_list.len())
        } else {
            self.page_count_hint.map(|n| n as usize)
        }
    }

    /// Populate the page list from resolved task metadata. Applied once per
    /// session; a stale token or an already-populated list is a no-op.
    pub fn apply_page_list(&mut self, token: RequestToken, pages: Vec<PageRef>) -> bool {
        if !self.is_current(token) || self.pages_resolved {
            return false;
        }
        self.page_list = pages;
        self.pages_resolved = true;
        self.selected_index = if self.page_list.is_empty() {
            None
        } else {
            Some(0)
        };
        true
    }

    /// Record a failed metadata fetch: the page list stays empty and the
    /// dependent panes render their explicit "no pages" state.
    pub fn apply_page_list_failure(&mut self, token: RequestToken) -> bool {
        if !self.is_current(token) || self.pages_resolved {
            return false;
        }
        self.pages_resolved = true;
        true
    }

    pub fn apply_aggregated(
        &mut self,
        token: RequestToken,
        records: Vec<AnonRecord>,
        page_count: Option<u32>,
    ) -> bool {
        if !self.is_current(token) {
            return false;
        }
        self.aggregated = AggregatedState::Loaded(Arc::new(records));
        self.page_count_hint = page_count;
        true
    }

    pub fn apply_aggregated_failure(&mut self, token: RequestToken) -> bool {
        if !self.is_current(token) {
            return false;
        }
        self.aggregated = AggregatedState::Failed;
        true
    }

    /// Record a resolved per-page fetch. First writer wins: a slot that is
    /// already resolved is never overwritten, which keeps repeated or raced
    /// applications idempotent.
    pub fn apply_page(&mut self, token: RequestToken, page_number: u32, state: PageState) -> bool {
        if !self.is_current(token) {
            return false;
        }
        self.page_cache.entry(page_number).or_insert(state);
        true
    }

    pub fn cached_page(&self, page_number: u32) -> Option<&PageState> {
        self.page_cache.get(&page_number)
    }

    /// Clamp-select a page by index. Out-of-range indices snap to the
    /// nearest valid bound; a no-op when the page list is empty.
    pub fn select_page(&mut self, index: usize) {
        if self.page_list.is_empty() {
            return;
        }
        self.selected_index = Some(index.min(self.page_list.len() - 1));
    }

    /// Advance to the next page, saturating at the last index.
    pub fn next_page(&mut self) {
        if let Some(index) = self.selected_index {
            self.select_page(index.saturating_add(1));
        }
    }

    /// Step back to the previous page, saturating at index zero.
    pub fn prev_page(&mut self) {
        if let Some(index) = self.selected_index {
            self.select_page(index.saturating_sub(1));
        }
    }

    pub fn set_tab(&mut self, tab: Tab) {
        self.active_tab = tab;
    }
}
