// src/export.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::filter::FilterCriteria;
use crate::session::SessionRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedSession {
    pub id: String,
    pub workout_name: String,
    pub timestamp: Option<String>, // RFC 3339, empty for unknown
    pub exercise_count: usize,
}

impl From<&SessionRecord> for ExportedSession {
    fn from(session: &SessionRecord) -> Self {
        Self {
            id: session.id.clone(),
            workout_name: session.workout_name.clone(),
            timestamp: session.timestamp.map(|ts| ts.to_rfc3339()),
            exercise_count: session.exercise_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub export_date: DateTime<Utc>,
    pub total_sessions: usize,
    pub filters: FilterCriteria,
    pub sessions: Vec<ExportedSession>,
}

#[must_use]
pub fn build_document(
    sessions: &[SessionRecord],
    criteria: &FilterCriteria,
    now: DateTime<Utc>,
) -> ExportDocument {
    ExportDocument {
        export_date: now,
        total_sessions: sessions.len(),
        filters: criteria.clone(),
        sessions: sessions.iter().map(ExportedSession::from).collect(),
    }
}

pub fn to_json(document: &ExportDocument) -> Result<String> {
    serde_json::to_string_pretty(document).context("Failed to serialize history export to JSON")
}

pub fn to_csv(sessions: &[SessionRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for session in sessions {
        writer
            .serialize(ExportedSession::from(session))
            .with_context(|| format!("Failed to write session {} to CSV", session.id))?;
    }
    let bytes = writer
        .into_inner()
        .context("Failed to flush CSV export buffer")?;
    String::from_utf8(bytes).context("CSV export produced invalid UTF-8")
}

/// `workout-history-YYYY-MM-DD.<extension>`
#[must_use]
pub fn file_name(now: DateTime<Utc>, extension: &str) -> String {
    format!("workout-history-{}.{}", now.format("%Y-%m-%d"), extension)
}
