// src/operations.rs
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::controller::FilterStateController;
use crate::history_client::{ApiError, ClearHistoryResponse, HistoryApi};
use crate::sinks::{Notification, NotificationSink, NotificationSlot, Severity};

/// Phrase the operator must type before history can be cleared.
pub const CONFIRMATION_PHRASE: &str = "CLEAR HISTORY";

const GENERIC_CLEAR_FAILURE: &str = "Failed to clear workout history. Please try again.";
const REFRESH_FAILURE: &str = "Failed to refresh workout history. Please try again.";

/// Trimmed, case-insensitive comparison against [`CONFIRMATION_PHRASE`].
#[must_use]
pub fn confirmation_matches(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case(CONFIRMATION_PHRASE)
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ClearState {
    #[default]
    Idle,
    ConfirmPending,
    InFlight {
        generation: u64,
    },
    Succeeded {
        sessions_deleted: u64,
    },
    /// Always retryable: the dialog stays open with its input intact.
    Failed(ApiError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearOutcome {
    NotConfirmed,
    NothingToClear,
    Cleared { sessions_deleted: u64 },
    NothingDeleted,
    Failed(ApiError),
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed { sessions: usize },
    Failed(ApiError),
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationTimings {
    pub clear_timeout: Duration,
    pub auto_refresh_after: Duration,
    pub reload_delay: Duration,
}

impl Default for OperationTimings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for OperationTimings {
    fn from(config: &Config) -> Self {
        Self {
            clear_timeout: config.clear_timeout(),
            auto_refresh_after: config.auto_refresh_after(),
            reload_delay: config.reload_delay(),
        }
    }
}

#[derive(Debug, Default)]
struct ClearDialog {
    state: ClearState,
    input: String,
    generation: u64,
}

impl ClearDialog {
    const fn accepts_input(&self) -> bool {
        matches!(self.state, ClearState::ConfirmPending | ClearState::Failed(_))
    }

    fn confirm_enabled(&self) -> bool {
        self.accepts_input() && confirmation_matches(&self.input)
    }

    fn reset(&mut self) {
        self.state = ClearState::Idle;
        self.input.clear();
    }
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs the network operations against the history API and turns every
/// result into exactly one notification. Nothing here returns an error to
/// the caller; failures come back as outcomes.
#[derive(Clone)]
pub struct AsyncOperationManager {
    api: Arc<dyn HistoryApi>,
    controller: FilterStateController,
    notifications: Arc<dyn NotificationSink>,
    dialog: Arc<Mutex<ClearDialog>>,
    last_refresh: Arc<Mutex<Instant>>,
    refresh_in_flight: Arc<AtomicBool>,
    pending_reload: Arc<Mutex<Option<JoinHandle<()>>>>,
    timings: OperationTimings,
}

impl AsyncOperationManager {
    pub fn new(
        api: Arc<dyn HistoryApi>,
        controller: FilterStateController,
        notifications: Arc<dyn NotificationSink>,
        timings: OperationTimings,
    ) -> Self {
        Self {
            api,
            controller,
            notifications,
            dialog: Arc::new(Mutex::new(ClearDialog::default())),
            last_refresh: Arc::new(Mutex::new(Instant::now())),
            refresh_in_flight: Arc::new(AtomicBool::new(false)),
            pending_reload: Arc::new(Mutex::new(None)),
            timings,
        }
    }

    #[must_use]
    pub const fn controller(&self) -> &FilterStateController {
        &self.controller
    }

    fn notify(&self, message: impl Into<String>, severity: Severity, slot: NotificationSlot) {
        self.notifications
            .notify(Notification::new(message, severity).in_slot(slot));
    }

    // --- Refresh ---

    /// Re-fetches the full history and replaces the repository on success.
    /// On failure the repository is left as it was.
    pub async fn refresh(&self) -> RefreshOutcome {
        self.fetch_and_replace(true).await
    }

    /// Refreshes when the page becomes visible and the last successful
    /// refresh is at least `auto_refresh_after` old.
    pub async fn on_visibility_change(&self, hidden: bool) -> Option<RefreshOutcome> {
        if hidden {
            return None;
        }
        let since_refresh = self.last_refresh.lock().await.elapsed();
        if since_refresh < self.timings.auto_refresh_after {
            return None;
        }
        info!(
            "Page visible again after {:?} without refresh, reloading history.",
            since_refresh
        );
        Some(self.refresh().await)
    }

    async fn fetch_and_replace(&self, announce: bool) -> RefreshOutcome {
        if self.refresh_in_flight.swap(true, Ordering::SeqCst) {
            debug!("Refresh already in flight, skipping.");
            return RefreshOutcome::AlreadyRunning;
        }
        let _in_flight = InFlightGuard(&self.refresh_in_flight);

        match self.api.fetch_history().await {
            Ok(raw) => {
                let summary = self.controller.replace_sessions(&raw).await;
                *self.last_refresh.lock().await = Instant::now();
                info!("History refreshed: {} sessions.", summary.total);
                if announce {
                    self.notify(
                        "Workout history refreshed successfully",
                        Severity::Success,
                        NotificationSlot::Refresh,
                    );
                }
                RefreshOutcome::Refreshed {
                    sessions: summary.total,
                }
            }
            Err(api_error) => {
                error!("Failed to refresh workout history: {}", api_error);
                self.notify(REFRESH_FAILURE, Severity::Error, NotificationSlot::Refresh);
                RefreshOutcome::Failed(api_error)
            }
        }
    }

    // --- Clear history ---

    /// Opens the confirmation dialog. Refuses (with a warning) when there is nothing to clear.
    pub async fn open_clear_dialog(&self) -> bool {
        let count = self.controller.session_count().await;
        if count == 0 {
            self.notify(
                "No workout history to clear. Start tracking some workouts first!",
                Severity::Warning,
                NotificationSlot::ClearHistory,
            );
            return false;
        }

        let mut dialog = self.dialog.lock().await;
        if matches!(dialog.state, ClearState::InFlight { .. }) {
            return false;
        }
        dialog.reset();
        dialog.state = ClearState::ConfirmPending;
        debug!("Clear history dialog opened for {} sessions.", count);
        true
    }

    /// Records the confirmation input and returns whether confirm is now enabled.
    /// Input is ignored while the dialog is closed or a request is in flight.
    pub async fn update_confirmation(&self, input: &str) -> bool {
        let mut dialog = self.dialog.lock().await;
        if !dialog.accepts_input() {
            return false;
        }
        dialog.input = input.to_string();
        dialog.confirm_enabled()
    }

    pub async fn confirm_enabled(&self) -> bool {
        self.dialog.lock().await.confirm_enabled()
    }

    /// False while the DELETE is in flight.
    pub async fn controls_enabled(&self) -> bool {
        !matches!(self.dialog.lock().await.state, ClearState::InFlight { .. })
    }

    pub async fn clear_state(&self) -> ClearState {
        self.dialog.lock().await.state.clone()
    }

    /// Whether the "clear all history" trigger should be enabled.
    pub async fn clear_control_enabled(&self) -> bool {
        self.controls_enabled().await && self.controller.session_count().await > 0
    }

    /// Closes the dialog and resets its input. Refused while a request is in
    /// flight. `true` means focus goes back to the trigger.
    pub async fn close_clear_dialog(&self) -> bool {
        let mut dialog = self.dialog.lock().await;
        if matches!(dialog.state, ClearState::InFlight { .. }) {
            return false;
        }
        dialog.reset();
        true
    }

    /// Issues the DELETE once the phrase is confirmed and resolves it against
    /// the configured timeout.
    pub async fn confirm_clear_history(&self) -> ClearOutcome {
        let generation = {
            let mut dialog = self.dialog.lock().await;
            if !dialog.confirm_enabled() {
                return ClearOutcome::NotConfirmed;
            }
            if self.controller.session_count().await == 0 {
                dialog.reset();
                drop(dialog);
                self.notify(
                    "No workout history to clear.",
                    Severity::Warning,
                    NotificationSlot::ClearHistory,
                );
                return ClearOutcome::NothingToClear;
            }
            dialog.generation += 1;
            dialog.state = ClearState::InFlight {
                generation: dialog.generation,
            };
            dialog.generation
        };

        info!("Clearing workout history (operation {}).", generation);
        self.notify(
            "Clearing workout history...",
            Severity::Info,
            NotificationSlot::ClearHistory,
        );

        // Elapsing drops the request future, so a late response can never land
        let result = match time::timeout(self.timings.clear_timeout, self.api.clear_history()).await {
            Ok(response) => response.and_then(ClearHistoryResponse::into_deleted_count),
            Err(_) => {
                warn!(
                    "Clear history timed out after {:?} (operation {}).",
                    self.timings.clear_timeout, generation
                );
                Err(ApiError::Timeout)
            }
        };

        let mut dialog = self.dialog.lock().await;
        if dialog.state != (ClearState::InFlight { generation }) {
            warn!("Ignoring stale clear-history result for operation {}.", generation);
            return ClearOutcome::Stale;
        }

        match result {
            Ok(0) => {
                dialog.reset();
                dialog.state = ClearState::Succeeded { sessions_deleted: 0 };
                drop(dialog);
                self.notify(
                    "No workout sessions were found to delete.",
                    Severity::Warning,
                    NotificationSlot::ClearHistory,
                );
                ClearOutcome::NothingDeleted
            }
            Ok(sessions_deleted) => {
                dialog.reset();
                dialog.state = ClearState::Succeeded { sessions_deleted };
                drop(dialog);
                self.controller.clear_sessions().await;
                self.notify(
                    format!(
                        "Successfully cleared {} workout session{}",
                        sessions_deleted,
                        if sessions_deleted == 1 { "" } else { "s" }
                    ),
                    Severity::Success,
                    NotificationSlot::ClearHistory,
                );
                self.schedule_reload().await;
                ClearOutcome::Cleared { sessions_deleted }
            }
            Err(api_error) => {
                error!("Failed to clear workout history: {}", api_error);
                dialog.state = ClearState::Failed(api_error.clone());
                drop(dialog);
                self.notify(
                    clear_error_message(&api_error),
                    Severity::Error,
                    NotificationSlot::ClearHistory,
                );
                ClearOutcome::Failed(api_error)
            }
        }
    }

    // Full reload after the success message had time to show
    async fn schedule_reload(&self) {
        let manager = self.clone();
        let delay = self.timings.reload_delay;
        let mut pending = self.pending_reload.lock().await;
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        *pending = Some(tokio::spawn(async move {
            time::sleep(delay).await;
            manager.fetch_and_replace(false).await;
        }));
    }

    /// Cancels the scheduled reload and the pending search debounce.
    pub async fn shutdown(&self) {
        if let Some(reload) = self.pending_reload.lock().await.take() {
            reload.abort();
        }
        self.controller.shutdown().await;
    }
}

/// Server-provided rejection texts are only shown when they look like a sentence.
#[must_use]
pub fn clear_error_message(api_error: &ApiError) -> String {
    match api_error {
        ApiError::Rejected(message) if (11..200).contains(&message.chars().count()) => {
            message.clone()
        }
        ApiError::Rejected(_) => GENERIC_CLEAR_FAILURE.to_string(),
        other => other.to_string(),
    }
}
