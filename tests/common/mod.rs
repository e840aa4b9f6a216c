// Shared fakes for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use workout_history_lib::{
    ApiError, ClearHistoryResponse, DisplaySink, FilterStateController, HistoryApi, MemoryStore,
    Notification, NotificationSink, PageUrl, RawExerciseLog, RawSession, ResultSummary,
    SessionRecord, Severity,
};

pub const PAGE_URL: &str = "http://localhost:5000/history";

pub fn exercise(name: &str) -> RawExerciseLog {
    RawExerciseLog {
        exercise_name: name.to_string(),
        ..Default::default()
    }
}

pub fn raw_session(
    id: &str,
    workout_id: &str,
    workout_name: &str,
    timestamp: Option<&str>,
    exercises: &[&str],
) -> RawSession {
    RawSession {
        id: id.to_string(),
        workout_id: workout_id.to_string(),
        workout_name: workout_name.to_string(),
        timestamp: timestamp.map(str::to_string),
        exercises: exercises.iter().map(|name| exercise(name)).collect(),
    }
}

pub fn local_time(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Local> {
    local_time_with_seconds(y, m, d, h, min, 0)
}

pub fn local_time_with_seconds(
    y: i32,
    m: u32,
    d: u32,
    h: u32,
    min: u32,
    sec: u32,
) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(y, m, d, h, min, sec)
        .single()
        .expect("unambiguous local time")
}

/// Four sessions with distinct workouts, exercises and timestamps.
pub fn sample_sessions() -> Vec<RawSession> {
    vec![
        raw_session(
            "1",
            "10",
            "Push Day",
            Some("2024-06-10T08:00:00Z"),
            &["Bench Press", "Overhead Press"],
        ),
        raw_session(
            "2",
            "20",
            "Pull Day",
            Some("2024-06-11T08:00:00Z"),
            &["Deadlift"],
        ),
        raw_session(
            "3",
            "10",
            "Push Day",
            Some("2024-06-12T08:00:00Z"),
            &["Bench Press Incline", "Dips", "Push-ups"],
        ),
        raw_session("4", "30", "Leg Day", None, &["Squat"]),
    ]
}

pub fn ids(sessions: &[SessionRecord]) -> Vec<String> {
    sessions.iter().map(|session| session.id.clone()).collect()
}

#[derive(Default)]
pub struct RecordingDisplay {
    renders: Mutex<Vec<(Vec<String>, ResultSummary)>>,
}

impl RecordingDisplay {
    pub fn render_count(&self) -> usize {
        self.renders.lock().unwrap().len()
    }

    pub fn last_ids(&self) -> Vec<String> {
        self.renders
            .lock()
            .unwrap()
            .last()
            .map(|(ids, _)| ids.clone())
            .unwrap_or_default()
    }
}

impl DisplaySink for RecordingDisplay {
    fn render(&self, sessions: &[SessionRecord], summary: &ResultSummary) {
        self.renders
            .lock()
            .unwrap()
            .push((ids(sessions), summary.clone()));
    }
}

#[derive(Default)]
pub struct RecordingNotifications {
    received: Mutex<Vec<Notification>>,
}

impl RecordingNotifications {
    pub fn all(&self) -> Vec<Notification> {
        self.received.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Notification> {
        self.received.lock().unwrap().last().cloned()
    }

    pub fn with_severity(&self, severity: Severity) -> Vec<Notification> {
        self.all()
            .into_iter()
            .filter(|notification| notification.severity == severity)
            .collect()
    }
}

impl NotificationSink for RecordingNotifications {
    fn notify(&self, notification: Notification) {
        self.received.lock().unwrap().push(notification);
    }
}

pub enum ClearBehavior {
    Respond(Result<ClearHistoryResponse, ApiError>),
    RespondAfter(Duration, Result<ClearHistoryResponse, ApiError>),
    Hang,
}

pub struct FakeApi {
    history: Mutex<Result<Vec<RawSession>, ApiError>>,
    clear: Mutex<ClearBehavior>,
    fetch_calls: AtomicUsize,
    clear_calls: AtomicUsize,
}

impl FakeApi {
    pub fn new(history: Vec<RawSession>, clear: ClearBehavior) -> Self {
        Self {
            history: Mutex::new(Ok(history)),
            clear: Mutex::new(clear),
            fetch_calls: AtomicUsize::new(0),
            clear_calls: AtomicUsize::new(0),
        }
    }

    pub fn deleting(count: u64) -> Self {
        Self::new(
            Vec::new(),
            ClearBehavior::Respond(Ok(ClearHistoryResponse {
                success: true,
                sessions_deleted: Some(count),
                ..Default::default()
            })),
        )
    }

    pub fn set_history(&self, history: Result<Vec<RawSession>, ApiError>) {
        *self.history.lock().unwrap() = history;
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn clear_calls(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HistoryApi for FakeApi {
    async fn fetch_history(&self) -> Result<Vec<RawSession>, ApiError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.history.lock().unwrap().clone()
    }

    async fn clear_history(&self) -> Result<ClearHistoryResponse, ApiError> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        let (delay, response) = match &*self.clear.lock().unwrap() {
            ClearBehavior::Respond(response) => (None, Some(response.clone())),
            ClearBehavior::RespondAfter(delay, response) => (Some(*delay), Some(response.clone())),
            ClearBehavior::Hang => (None, None),
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match response {
            Some(response) => response,
            None => std::future::pending().await,
        }
    }
}

pub fn test_controller(
    initial: &[RawSession],
    display: Arc<RecordingDisplay>,
) -> anyhow::Result<FilterStateController> {
    Ok(FilterStateController::new(
        initial,
        display,
        Arc::new(MemoryStore::new()),
        PageUrl::parse(PAGE_URL)?,
        Duration::from_millis(300),
    ))
}
