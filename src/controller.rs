// src/controller.rs
use anyhow::{bail, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use crate::export;
use crate::filter::{normalize_input, normalize_search, DateRange, FilterCriteria};
use crate::session::{RawSession, SessionRecord, SessionRepository};
use crate::sinks::DisplaySink;
use crate::sort::SortKey;
use crate::state::{HistoryView, ResultSummary};
use crate::ui_state::{
    PageUrl, UiStateStore, ViewMode, LAST_EXERCISE_FILTER_KEY, VIEW_PREFERENCE_KEY,
};

/// Owns the filter criteria and drives the filter/sort pipeline.
///
/// All mutations go through the shared `HistoryView` lock, so passes are
/// applied and rendered in the order the triggering calls were made. Search
/// input is debounced on a tokio task, which means `set_search` must be called
/// from inside a tokio runtime.
#[derive(Clone)]
pub struct FilterStateController {
    view: Arc<Mutex<HistoryView>>,
    display: Arc<dyn DisplaySink>,
    store: Arc<dyn UiStateStore>,
    page_url: Arc<Mutex<PageUrl>>,
    pending_search: Arc<Mutex<Option<JoinHandle<()>>>>,
    search_debounce: Duration,
    default_view: ViewMode,
}

impl FilterStateController {
    /// Ingests the initial sessions, seeds the criteria from the persisted
    /// workout (URL) and exercise (store) selections and renders once.
    pub fn new(
        initial: &[RawSession],
        display: Arc<dyn DisplaySink>,
        store: Arc<dyn UiStateStore>,
        page_url: PageUrl,
        search_debounce: Duration,
    ) -> Self {
        let criteria = FilterCriteria {
            workout: page_url.workout_filter(),
            exercise: read_persisted(store.as_ref(), LAST_EXERCISE_FILTER_KEY)
                .as_deref()
                .and_then(normalize_input),
            ..FilterCriteria::default()
        };
        let view = HistoryView::new(SessionRepository::from_raw(initial), criteria);
        display.render(view.displayed(), &view.summary());
        info!(
            "History loaded with {} sessions ({} shown).",
            view.repository().len(),
            view.displayed().len()
        );

        Self {
            view: Arc::new(Mutex::new(view)),
            display,
            store,
            page_url: Arc::new(Mutex::new(page_url)),
            pending_search: Arc::new(Mutex::new(None)),
            search_debounce,
            default_view: ViewMode::default(),
        }
    }

    #[must_use]
    pub fn with_default_view(mut self, default_view: ViewMode) -> Self {
        self.default_view = default_view;
        self
    }

    async fn mutate<F>(&self, update: F) -> ResultSummary
    where
        F: FnOnce(&mut HistoryView) -> ResultSummary,
    {
        let mut view = self.view.lock().await;
        let summary = update(&mut *view);
        self.display.render(view.displayed(), &summary);
        summary
    }

    pub async fn set_workout_filter(&self, value: &str) -> ResultSummary {
        let workout = normalize_input(value);
        self.page_url
            .lock()
            .await
            .set_workout_filter(workout.as_deref());
        self.mutate(|view| view.update_criteria(|criteria| criteria.workout = workout))
            .await
    }

    pub async fn set_exercise_filter(&self, value: &str) -> ResultSummary {
        let exercise = normalize_input(value);
        let persisted = match &exercise {
            Some(name) => self.store.set(LAST_EXERCISE_FILTER_KEY, name),
            None => self.store.remove(LAST_EXERCISE_FILTER_KEY),
        };
        if let Err(e) = persisted {
            warn!("Could not persist exercise filter: {}", e);
        }
        self.mutate(|view| view.update_criteria(|criteria| criteria.exercise = exercise))
            .await
    }

    pub async fn set_date_filter(&self, value: &str) -> ResultSummary {
        self.set_date_range(DateRange::from_control_value(value))
            .await
    }

    pub async fn set_date_range(&self, date_range: DateRange) -> ResultSummary {
        self.mutate(|view| view.update_criteria(|criteria| criteria.date_range = date_range))
            .await
    }

    pub async fn set_sort(&self, value: &str) -> ResultSummary {
        let sort = SortKey::from_control_value(value);
        self.mutate(|view| view.update_criteria(|criteria| criteria.sort = sort))
            .await
    }

    /// Schedules the search criterion. Each call restarts the debounce window,
    /// so only the last value of a burst reaches the pipeline.
    pub async fn set_search(&self, value: &str) {
        let search = normalize_search(value);
        let view = Arc::clone(&self.view);
        let display = Arc::clone(&self.display);
        let delay = self.search_debounce;

        let mut pending = self.pending_search.lock().await;
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        *pending = Some(tokio::spawn(async move {
            time::sleep(delay).await;
            let mut view = view.lock().await;
            debug!("Applying debounced search {:?}", search);
            let summary = view.update_criteria(|criteria| criteria.search = search);
            display.render(view.displayed(), &summary);
        }));
    }

    /// Drops the search criterion immediately, cancelling any pending keystroke.
    pub async fn clear_search(&self) -> ResultSummary {
        self.cancel_pending_search().await;
        self.mutate(|view| view.update_criteria(|criteria| criteria.search = None))
            .await
    }

    /// Resets every criterion to its default and forgets the persisted selections.
    pub async fn clear_all(&self) -> ResultSummary {
        self.cancel_pending_search().await;
        self.forget_persisted_filters().await;
        self.mutate(HistoryView::reset_criteria).await
    }

    /// Re-ingests the repository wholesale and re-runs the pipeline.
    pub async fn replace_sessions(&self, raw: &[RawSession]) -> ResultSummary {
        self.mutate(|view| view.replace_sessions(raw)).await
    }

    /// Empties the repository and resets the criteria.
    pub async fn clear_sessions(&self) -> ResultSummary {
        self.cancel_pending_search().await;
        self.forget_persisted_filters().await;
        self.mutate(HistoryView::clear_sessions).await
    }

    pub async fn criteria(&self) -> FilterCriteria {
        self.view.lock().await.criteria().clone()
    }

    pub async fn displayed(&self) -> Vec<SessionRecord> {
        self.view.lock().await.displayed().to_vec()
    }

    pub async fn summary(&self) -> ResultSummary {
        self.view.lock().await.summary()
    }

    pub async fn session_count(&self) -> usize {
        self.view.lock().await.repository().len()
    }

    pub async fn session(&self, id: &str) -> Option<SessionRecord> {
        self.view.lock().await.repository().get(id).cloned()
    }

    pub async fn toggle_expanded(&self, id: &str) -> Option<bool> {
        self.view.lock().await.toggle_expanded(id)
    }

    pub async fn page_url(&self) -> PageUrl {
        self.page_url.lock().await.clone()
    }

    #[must_use]
    pub fn view_mode(&self) -> ViewMode {
        read_persisted(self.store.as_ref(), VIEW_PREFERENCE_KEY)
            .and_then(|value| value.parse().ok())
            .unwrap_or(self.default_view)
    }

    pub fn set_view_mode(&self, mode: ViewMode) {
        if let Err(e) = self.store.set(VIEW_PREFERENCE_KEY, mode.as_ref()) {
            warn!("Could not persist view preference: {}", e);
        }
    }

    /// JSON export of the sessions currently displayed.
    pub async fn export_json(&self) -> Result<String> {
        let view = self.view.lock().await;
        if view.displayed().is_empty() {
            bail!("No data to export. Please adjust your filters.");
        }
        let document = export::build_document(view.displayed(), view.criteria(), Utc::now());
        export::to_json(&document)
    }

    pub async fn export_csv(&self) -> Result<String> {
        let view = self.view.lock().await;
        if view.displayed().is_empty() {
            bail!("No data to export. Please adjust your filters.");
        }
        export::to_csv(view.displayed())
    }

    #[must_use]
    pub fn export_file_name(&self, extension: &str) -> String {
        export::file_name(Utc::now(), extension)
    }

    async fn forget_persisted_filters(&self) {
        self.page_url.lock().await.set_workout_filter(None);
        if let Err(e) = self.store.remove(LAST_EXERCISE_FILTER_KEY) {
            warn!("Could not clear persisted exercise filter: {}", e);
        }
    }

    async fn cancel_pending_search(&self) {
        if let Some(pending) = self.pending_search.lock().await.take() {
            pending.abort();
        }
    }

    /// Cancels the pending search debounce. Call on teardown.
    pub async fn shutdown(&self) {
        self.cancel_pending_search().await;
    }
}

fn read_persisted(store: &dyn UiStateStore, key: &str) -> Option<String> {
    store.get(key).unwrap_or_else(|e| {
        warn!("Could not read persisted '{}': {}", key, e);
        None
    })
}
