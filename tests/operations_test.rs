use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use workout_history_lib::{
    confirmation_matches, ApiError, AsyncOperationManager, ClearHistoryResponse, ClearOutcome,
    ClearState, ErrorCategory, NotificationSlot, OperationTimings, RefreshOutcome, Severity,
};

mod common;
use common::{
    raw_session, sample_sessions, test_controller, ClearBehavior, FakeApi, RecordingDisplay,
    RecordingNotifications,
};

const TIMEOUT_MESSAGE: &str = "Request timed out. The operation may still be in progress. Please refresh the page to check the status.";

struct Harness {
    manager: AsyncOperationManager,
    api: Arc<FakeApi>,
    notifications: Arc<RecordingNotifications>,
    display: Arc<RecordingDisplay>,
}

fn create_harness(api: FakeApi) -> Result<Harness> {
    let api = Arc::new(api);
    let notifications = Arc::new(RecordingNotifications::default());
    let display = Arc::new(RecordingDisplay::default());
    let controller = test_controller(&sample_sessions(), display.clone())?;
    let manager = AsyncOperationManager::new(
        api.clone(),
        controller,
        notifications.clone(),
        OperationTimings::default(),
    );
    Ok(Harness {
        manager,
        api,
        notifications,
        display,
    })
}

async fn open_and_confirm(manager: &AsyncOperationManager) -> bool {
    assert!(manager.open_clear_dialog().await);
    manager.update_confirmation("clear history").await
}

#[test]
fn test_confirmation_phrase() {
    assert!(confirmation_matches("CLEAR HISTORY"));
    assert!(confirmation_matches("  clear history "));
    assert!(confirmation_matches("Clear History"));
    assert!(!confirmation_matches("CLEAR HISTOR"));
    assert!(!confirmation_matches("CLEAR  HISTORY"));
    assert!(!confirmation_matches(""));
}

#[test]
fn test_status_mapping() {
    assert_eq!(ApiError::from_status(200, "OK"), None);
    assert_eq!(ApiError::from_status(404, "Not Found"), Some(ApiError::NotFound));
    assert_eq!(ApiError::from_status(401, "Unauthorized"), Some(ApiError::Unauthorized));
    assert_eq!(ApiError::from_status(403, "Forbidden"), Some(ApiError::Unauthorized));
    assert_eq!(ApiError::from_status(500, "Internal Server Error"), Some(ApiError::Server));

    let bad_gateway = ApiError::from_status(502, "Bad Gateway").expect("502 is an error");
    assert_eq!(bad_gateway.to_string(), "HTTP 502: Bad Gateway");
    assert_eq!(bad_gateway.category(), ErrorCategory::Generic);
    assert_eq!(ApiError::Timeout.category(), ErrorCategory::Timeout);
    assert_eq!(
        ApiError::Network("connection refused".into()).to_string(),
        "Network error: Unable to connect to server. Please check your internet connection."
    );
}

#[test]
fn test_clear_response_parsing() -> Result<()> {
    let ok: ClearHistoryResponse = serde_json::from_str(r#"{"success": true}"#)?;
    assert_eq!(ok.into_deleted_count(), Ok(0));

    let rejected: ClearHistoryResponse =
        serde_json::from_str(r#"{"success": false, "message": "Database is locked"}"#)?;
    assert_eq!(
        rejected.into_deleted_count(),
        Err(ApiError::Rejected("Database is locked".into()))
    );

    let bare: ClearHistoryResponse = serde_json::from_str(r#"{"success": false}"#)?;
    assert_eq!(
        bare.into_deleted_count(),
        Err(ApiError::Rejected("Unknown error occurred".into()))
    );

    assert!(serde_json::from_str::<ClearHistoryResponse>(r#"{"sessions_deleted": 3}"#).is_err());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_clear_success_empties_history_then_reloads_quietly() -> Result<()> {
    let api = FakeApi::deleting(3);
    api.set_history(Ok(vec![raw_session("9", "1", "Fresh", None, &[])]));
    let harness = create_harness(api)?;
    let manager = &harness.manager;

    assert!(open_and_confirm(manager).await);
    let outcome = manager.confirm_clear_history().await;
    assert_eq!(outcome, ClearOutcome::Cleared { sessions_deleted: 3 });

    assert_eq!(manager.controller().session_count().await, 0);
    assert_eq!(manager.clear_state().await, ClearState::Succeeded { sessions_deleted: 3 });
    assert!(!manager.clear_control_enabled().await);
    let last = harness.notifications.last().expect("success notification");
    assert_eq!(last.message, "Successfully cleared 3 workout sessions");
    assert_eq!(last.severity, Severity::Success);
    assert_eq!(last.slot, Some(NotificationSlot::ClearHistory));
    assert_eq!(harness.api.fetch_calls(), 0);

    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert_eq!(harness.api.fetch_calls(), 1);
    assert_eq!(manager.controller().session_count().await, 1);
    assert_eq!(harness.display.last_ids(), vec!["9"]);
    // The reload does not announce itself
    assert_eq!(harness.notifications.with_severity(Severity::Success).len(), 1);
    assert!(manager.clear_control_enabled().await);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_clear_reporting_zero_deletions_keeps_history() -> Result<()> {
    let harness = create_harness(FakeApi::deleting(0))?;
    let manager = &harness.manager;

    assert!(open_and_confirm(manager).await);
    assert_eq!(manager.confirm_clear_history().await, ClearOutcome::NothingDeleted);

    assert_eq!(manager.controller().session_count().await, 4);
    let last = harness.notifications.last().expect("warning notification");
    assert_eq!(last.message, "No workout sessions were found to delete.");
    assert_eq!(last.severity, Severity::Warning);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(harness.api.fetch_calls(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_clear_single_session_message() -> Result<()> {
    let harness = create_harness(FakeApi::deleting(1))?;
    assert!(open_and_confirm(&harness.manager).await);
    harness.manager.confirm_clear_history().await;

    let success = harness.notifications.with_severity(Severity::Success);
    assert_eq!(success[0].message, "Successfully cleared 1 workout session");
    harness.manager.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_clear_times_out_and_stays_retryable() -> Result<()> {
    let harness = create_harness(FakeApi::new(Vec::new(), ClearBehavior::Hang))?;
    let manager = &harness.manager;

    assert!(open_and_confirm(manager).await);
    let outcome = manager.confirm_clear_history().await;
    assert_eq!(outcome, ClearOutcome::Failed(ApiError::Timeout));

    assert_eq!(manager.clear_state().await, ClearState::Failed(ApiError::Timeout));
    assert_eq!(manager.controller().session_count().await, 4);
    assert!(manager.controls_enabled().await);
    // Input survives so the operator can retry straight away
    assert!(manager.confirm_enabled().await);
    let last = harness.notifications.last().expect("timeout notification");
    assert_eq!(last.message, TIMEOUT_MESSAGE);
    assert_eq!(last.severity, Severity::Error);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_clear_locks_the_dialog() -> Result<()> {
    let response = Ok(ClearHistoryResponse {
        success: true,
        sessions_deleted: Some(4),
        ..Default::default()
    });
    let harness = create_harness(FakeApi::new(
        Vec::new(),
        ClearBehavior::RespondAfter(Duration::from_secs(1), response),
    ))?;
    let manager = harness.manager.clone();

    assert!(open_and_confirm(&manager).await);
    let in_flight = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.confirm_clear_history().await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(manager.clear_state().await, ClearState::InFlight { generation: 1 });
    assert!(!manager.controls_enabled().await);
    assert!(!manager.clear_control_enabled().await);
    assert!(!manager.close_clear_dialog().await);
    assert!(!manager.update_confirmation("").await);
    assert!(!manager.open_clear_dialog().await);
    assert_eq!(manager.confirm_clear_history().await, ClearOutcome::NotConfirmed);
    let progress = harness.notifications.last().expect("progress notification");
    assert_eq!(progress.message, "Clearing workout history...");
    assert_eq!(progress.severity, Severity::Info);

    assert_eq!(in_flight.await?, ClearOutcome::Cleared { sessions_deleted: 4 });
    assert_eq!(harness.api.clear_calls(), 1);
    assert!(manager.controls_enabled().await);
    assert!(manager.close_clear_dialog().await);
    assert_eq!(manager.clear_state().await, ClearState::Idle);
    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_confirm_requires_phrase() -> Result<()> {
    let harness = create_harness(FakeApi::deleting(4))?;
    let manager = &harness.manager;

    assert_eq!(manager.confirm_clear_history().await, ClearOutcome::NotConfirmed);
    assert!(manager.open_clear_dialog().await);
    assert!(!manager.update_confirmation("clear").await);
    assert_eq!(manager.confirm_clear_history().await, ClearOutcome::NotConfirmed);
    assert_eq!(harness.api.clear_calls(), 0);
    assert!(harness.notifications.all().is_empty());

    assert!(manager.close_clear_dialog().await);
    assert!(!manager.update_confirmation("CLEAR HISTORY").await);
    Ok(())
}

#[tokio::test]
async fn test_server_rejections() -> Result<()> {
    let rejecting = |error: &str| {
        FakeApi::new(
            Vec::new(),
            ClearBehavior::Respond(Ok(ClearHistoryResponse {
                success: false,
                error: Some(error.to_string()),
                ..Default::default()
            })),
        )
    };

    let harness = create_harness(rejecting("Database is locked right now"))?;
    assert!(open_and_confirm(&harness.manager).await);
    harness.manager.confirm_clear_history().await;
    let last = harness.notifications.last().expect("error notification");
    assert_eq!(last.message, "Database is locked right now");

    let harness = create_harness(rejecting("oops"))?;
    assert!(open_and_confirm(&harness.manager).await);
    let outcome = harness.manager.confirm_clear_history().await;
    assert_eq!(outcome, ClearOutcome::Failed(ApiError::Rejected("oops".into())));
    let last = harness.notifications.last().expect("error notification");
    assert_eq!(last.message, "Failed to clear workout history. Please try again.");
    assert_eq!(harness.manager.controller().session_count().await, 4);

    let harness = create_harness(FakeApi::new(
        Vec::new(),
        ClearBehavior::Respond(Err(ApiError::NotFound)),
    ))?;
    assert!(open_and_confirm(&harness.manager).await);
    harness.manager.confirm_clear_history().await;
    let last = harness.notifications.last().expect("error notification");
    assert_eq!(last.message, "Clear history endpoint not found. Please contact support.");
    Ok(())
}

#[tokio::test]
async fn test_clear_dialog_refused_without_history() -> Result<()> {
    let harness = create_harness(FakeApi::deleting(0))?;
    let manager = &harness.manager;
    manager.controller().clear_sessions().await;

    assert!(!manager.open_clear_dialog().await);
    let last = harness.notifications.last().expect("warning notification");
    assert_eq!(
        last.message,
        "No workout history to clear. Start tracking some workouts first!"
    );
    assert_eq!(last.severity, Severity::Warning);
    assert!(!manager.clear_control_enabled().await);
    Ok(())
}

#[tokio::test]
async fn test_confirm_after_history_emptied_warns_without_request() -> Result<()> {
    let harness = create_harness(FakeApi::deleting(4))?;
    let manager = &harness.manager;

    assert!(open_and_confirm(manager).await);
    manager.controller().clear_sessions().await;

    assert_eq!(manager.confirm_clear_history().await, ClearOutcome::NothingToClear);
    assert_eq!(harness.api.clear_calls(), 0);
    assert_eq!(manager.clear_state().await, ClearState::Idle);
    let last = harness.notifications.last().expect("warning notification");
    assert_eq!(last.message, "No workout history to clear.");
    assert_eq!(last.severity, Severity::Warning);
    assert!(harness.notifications.with_severity(Severity::Error).is_empty());
    Ok(())
}

#[tokio::test]
async fn test_refresh_replaces_history_or_keeps_it_on_failure() -> Result<()> {
    let api = FakeApi::deleting(0);
    api.set_history(Ok(vec![
        raw_session("a", "1", "Fresh", None, &[]),
        raw_session("b", "1", "Fresh", None, &[]),
    ]));
    let harness = create_harness(api)?;
    let manager = &harness.manager;

    assert_eq!(manager.refresh().await, RefreshOutcome::Refreshed { sessions: 2 });
    let last = harness.notifications.last().expect("refresh notification");
    assert_eq!(last.message, "Workout history refreshed successfully");
    assert_eq!(last.slot, Some(NotificationSlot::Refresh));

    harness
        .api
        .set_history(Err(ApiError::Network("connection refused".into())));
    let outcome = manager.refresh().await;
    assert_eq!(
        outcome,
        RefreshOutcome::Failed(ApiError::Network("connection refused".into()))
    );
    assert_eq!(manager.controller().session_count().await, 2);
    let last = harness.notifications.last().expect("refresh notification");
    assert_eq!(last.message, "Failed to refresh workout history. Please try again.");
    assert_eq!(last.severity, Severity::Error);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_visibility_refresh_after_five_minutes() -> Result<()> {
    let harness = create_harness(FakeApi::deleting(0))?;
    let manager = &harness.manager;

    assert_eq!(manager.on_visibility_change(true).await, None);
    assert_eq!(manager.on_visibility_change(false).await, None);

    tokio::time::advance(Duration::from_secs(299)).await;
    assert_eq!(manager.on_visibility_change(false).await, None);

    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(
        manager.on_visibility_change(false).await,
        Some(RefreshOutcome::Refreshed { sessions: 0 })
    );
    assert_eq!(harness.api.fetch_calls(), 1);
    assert_eq!(manager.on_visibility_change(false).await, None);
    Ok(())
}
