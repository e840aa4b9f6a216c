use anyhow::{Context, Result};
// Use anyhow::Result as standard Result for the composition layer
use std::sync::Arc;
use tracing::info;

// --- Declare modules ---
mod config;
pub mod controller;
pub mod export;
pub mod filter;
pub mod history_client;
pub mod operations;
pub mod session;
pub mod sinks;
pub mod sort;
pub mod state;
pub mod ui_state;

// --- Expose public types ---
pub use config::{
    get_config_path as get_config_path_util,
    load_config as load_config_util,
    save_config as save_config_util,
    Config,
    Error as ConfigError,
};

pub use controller::FilterStateController;
pub use filter::{DateRange, FilterCriteria};
pub use history_client::{
    ApiError, ClearHistoryResponse, ErrorCategory, HistoryApi, HistoryClient, HistoryPayload,
};
pub use operations::{
    confirmation_matches, AsyncOperationManager, ClearOutcome, ClearState, OperationTimings,
    RefreshOutcome, CONFIRMATION_PHRASE,
};
pub use session::{RawExerciseLog, RawSession, SessionRecord, SessionRepository};
pub use sinks::{DisplaySink, Notification, NotificationSink, NotificationSlot, Severity};
pub use sort::SortKey;
pub use state::{EmptyState, HistoryView, ResultSummary};
pub use ui_state::{
    get_state_db_path as get_state_db_path_util, MemoryStore, PageUrl, SqliteStore, StoreError,
    UiStateStore, ViewMode,
};

/// The assembled history page: filter controller plus async operations,
/// sharing one repository.
pub struct HistoryDashboard {
    config: Config,
    controller: FilterStateController,
    operations: AsyncOperationManager,
}

impl HistoryDashboard {
    /// Loads the config, opens the persisted UI state and builds the HTTP client.
    ///
    /// # Errors
    ///
    /// Fails when the config cannot be read, the state database cannot be
    /// opened, the page URL is invalid or the HTTP client cannot be built.
    pub fn initialize(
        initial: &[RawSession],
        page_url: &str,
        display: Arc<dyn DisplaySink>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        let config_path = get_config_path_util().context("Failed to determine config path")?;
        let config = load_config_util(&config_path).with_context(|| {
            format!("Failed to load config from {}", config_path.display())
        })?;

        let db_path = ui_state::get_state_db_path().context("Failed to determine UI state path")?;
        let store = SqliteStore::open(&db_path).with_context(|| {
            format!("Failed to open UI state database at {}", db_path.display())
        })?;
        let page_url = PageUrl::parse(page_url).context("Failed to parse page URL")?;
        let api = HistoryClient::new(&config.api_base_url, config.request_timeout())?;

        info!(
            "Dashboard initialized against {} (config {}, state {})",
            config.api_base_url,
            config_path.display(),
            db_path.display()
        );
        Ok(Self::assemble(
            config,
            initial,
            page_url,
            Arc::new(api),
            Arc::new(store),
            display,
            notifications,
        ))
    }

    /// Wires already-built collaborators together. Used directly by tests.
    pub fn assemble(
        config: Config,
        initial: &[RawSession],
        page_url: PageUrl,
        api: Arc<dyn HistoryApi>,
        store: Arc<dyn UiStateStore>,
        display: Arc<dyn DisplaySink>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        let controller = FilterStateController::new(
            initial,
            display,
            store,
            page_url,
            config.search_debounce(),
        )
        .with_default_view(config.default_view);
        let operations = AsyncOperationManager::new(
            api,
            controller.clone(),
            notifications,
            OperationTimings::from(&config),
        );
        Self {
            config,
            controller,
            operations,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn controller(&self) -> &FilterStateController {
        &self.controller
    }

    #[must_use]
    pub const fn operations(&self) -> &AsyncOperationManager {
        &self.operations
    }

    /// Cancels every pending timer and scheduled reload.
    pub async fn shutdown(&self) {
        self.operations.shutdown().await;
        info!("Dashboard shut down.");
    }
}
