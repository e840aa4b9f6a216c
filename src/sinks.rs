// src/sinks.rs
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::session::SessionRecord;
use crate::state::ResultSummary;

/// Paints the ordered result list. Called under the history lock, once per pipeline pass.
pub trait DisplaySink: Send + Sync {
    fn render(&self, sessions: &[SessionRecord], summary: &ResultSummary);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
    Warning,
    Info,
}

/// Async operation a notification belongs to. A sink replaces the previous
/// notification of the same slot instead of stacking another one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationSlot {
    Refresh,
    ClearHistory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
    pub slot: Option<NotificationSlot>,
}

impl Notification {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
            slot: None,
        }
    }

    #[must_use]
    pub fn in_slot(mut self, slot: NotificationSlot) -> Self {
        self.slot = Some(slot);
        self
    }
}

/// Toast/alert rendering. Auto-dismiss timing is the sink's business.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}
