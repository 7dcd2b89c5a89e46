use crate::api::client::AnonApiClient;
use crate::api::models::AnonRecord;
use crate::core::loader::RecordLoader;
use crate::core::session::{AggregatedState, PageState, ResultSession, Tab};
use crate::error::{AppError, ViewError};

const EMPTY_RECORDS: &[AnonRecord] = &[];

/// Record source feeding the data panel, resolved from session state by
/// `(active_tab, selected_index)` alone.
#[derive(Debug, Clone, Copy)]
pub enum RecordSource<'a> {
    Loading,
    Failed,
    Records(&'a [AnonRecord]),
}

/// Page figure for the stats line: total pages on the aggregated tab, the
/// single current page number on the per-page tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFigure {
    Total(usize),
    Current(u32),
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelStats {
    pub total: usize,
    pub anonymized: usize,
    pub pages: PageFigure,
}

/// Pure projection of the current session state for the data panel.
#[derive(Debug, Clone, Copy)]
pub struct PanelView<'a> {
    pub tab: Tab,
    pub source: RecordSource<'a>,
    pub stats: PanelStats,
}

/// A downloaded mapping artifact ready to be written to disk.
#[derive(Debug, Clone)]
pub struct MappingExport {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// The result-view coordinator: owns the session state and the loader, and
/// translates transitions (open, page nav, tab switch) into the loads they
/// require. Rendering reads projections; it never mutates state.
pub struct ResultView {
    session: ResultSession,
    loader: RecordLoader,
}

impl ResultView {
    pub fn new(client: AnonApiClient) -> Self {
        Self {
            session: ResultSession::new(),
            loader: RecordLoader::new(client),
        }
    }

    pub fn session(&self) -> &ResultSession {
        &self.session
    }

    /// Open a result set: reset the session, then fetch task metadata and
    /// the aggregated record set in parallel. Either fetch may fail without
    /// affecting the other; failures become state markers, never errors.
    pub async fn open(&mut self, task_id: &str) {
        let token = self.session.open(task_id);

        let (pages, aggregated) = tokio::join!(
            self.loader.fetch_task_pages(task_id),
            self.loader.fetch_aggregated(task_id),
        );

        match pages {
            Ok(pages) => self.session.apply_page_list(token, pages),
            Err(_) => self.session.apply_page_list_failure(token),
        };
        match aggregated {
            Ok((records, page_count)) => {
                self.session.apply_aggregated(token, records, page_count)
            }
            Err(_) => self.session.apply_aggregated_failure(token),
        };
    }

    pub fn close(&mut self) {
        self.session.close();
    }

    pub async fn select_page(&mut self, index: usize) {
        self.session.select_page(index);
        self.ensure_current_data().await;
    }

    pub async fn next_page(&mut self) {
        self.session.next_page();
        self.ensure_current_data().await;
    }

    pub async fn prev_page(&mut self) {
        self.session.prev_page();
        self.ensure_current_data().await;
    }

    /// Switch tabs, loading the target tab's data on a cache miss. A switch
    /// to the already-active tab is a no-op.
    pub async fn set_tab(&mut self, tab: Tab) {
        if self.session.active_tab() == tab {
            return;
        }
        self.session.set_tab(tab);
        self.ensure_current_data().await;
    }

    /// Load whatever the current `(active_tab, selected_index)` needs and is
    /// not yet cached. Aggregated data is fetched only from the NotLoaded
    /// state; a Failed marker stays failed until the next open.
    async fn ensure_current_data(&mut self) {
        match self.session.active_tab() {
            Tab::Aggregated => {
                if matches!(self.session.aggregated(), AggregatedState::NotLoaded) {
                    self.load_aggregated().await;
                }
            }
            Tab::PerPage => {
                if let Some(page_number) = self.session.current_page_number() {
                    if self.session.cached_page(page_number).is_none() {
                        self.load_page(page_number).await;
                    }
                }
            }
        }
    }

    async fn load_aggregated(&mut self) {
        let Some(task_id) = self.session.task_id().map(str::to_string) else {
            return;
        };
        let token = self.session.token();
        match self.loader.fetch_aggregated(&task_id).await {
            Ok((records, page_count)) => {
                self.session.apply_aggregated(token, records, page_count)
            }
            Err(_) => self.session.apply_aggregated_failure(token),
        };
    }

    async fn load_page(&mut self, page_number: u32) {
        let Some(task_id) = self.session.task_id().map(str::to_string) else {
            return;
        };
        let token = self.session.token();
        let state = match self.loader.fetch_page(&task_id, page_number).await {
            Ok(records) => PageState::Loaded(records),
            Err(_) => PageState::Failed,
        };
        self.session.apply_page(token, page_number, state);
    }

    /// Exchange the selected page's image reference for a fresh presigned
    /// URL. Re-requested on every call: the link is time-limited. `None`
    /// means the preview pane shows its placeholder.
    pub async fn preview_url(&self) -> Option<String> {
        let page = self.session.selected_page()?;
        self.loader.fetch_preview_url(&page.image_ref).await.ok()
    }

    /// Download the mapping artifact for the current tab's scope: the whole
    /// document on the aggregated tab, the selected page on the per-page
    /// tab. Failure leaves view state unchanged.
    pub async fn export_mapping(&self) -> Result<MappingExport, AppError> {
        let task_id = self
            .session
            .task_id()
            .ok_or(ViewError::NoSession)?
            .to_string();

        let page = match self.session.active_tab() {
            Tab::Aggregated => None,
            Tab::PerPage => self.session.current_page_number(),
        };

        let bytes = self
            .loader
            .fetch_mapping(&task_id, page)
            .await
            .map_err(|e| ViewError::MappingDownload {
                reason: e.to_string(),
            })?;

        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let file_name = match page {
            Some(page_number) => {
                format!("{}-anon-mapping-page-{}-{}.bin", task_id, page_number, timestamp)
            }
            None => format!("{}-anon-mapping-{}.bin", task_id, timestamp),
        };

        Ok(MappingExport { file_name, bytes })
    }

    /// Project the data panel for the current `(active_tab, selected_index)`.
    pub fn panel(&self) -> PanelView<'_> {
        let tab = self.session.active_tab();
        let source = match tab {
            Tab::Aggregated => match self.session.aggregated() {
                AggregatedState::NotLoaded => RecordSource::Loading,
                AggregatedState::Failed => RecordSource::Failed,
                AggregatedState::Loaded(records) => RecordSource::Records(records),
            },
            Tab::PerPage => match self.session.current_page_number() {
                None if !self.session.pages_resolved() => RecordSource::Loading,
                None => RecordSource::Records(EMPTY_RECORDS),
                Some(page_number) => match self.session.cached_page(page_number) {
                    None => RecordSource::Loading,
                    Some(PageState::Failed) => RecordSource::Failed,
                    Some(PageState::Loaded(records)) => RecordSource::Records(records),
                },
            },
        };

        let (total, anonymized) = match source {
            RecordSource::Records(records) => (
                records.len(),
                records.iter().filter(|r| r.is_anonymized()).count(),
            ),
            _ => (0, 0),
        };

        let pages = match tab {
            Tab::Aggregated => match self.session.page_count() {
                Some(count) => PageFigure::Total(count),
                None => PageFigure::Unknown,
            },
            Tab::PerPage => match self.session.current_page_number() {
                Some(page_number) => PageFigure::Current(page_number),
                None => PageFigure::Unknown,
            },
        };

        PanelView {
            tab,
            source,
            stats: PanelStats {
                total,
                anonymized,
                pages,
            },
        }
    }
}
