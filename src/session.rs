// src/session.rs
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

// Naive formats are read as local wall-clock time, the way the page renders them
const NAIVE_TIMESTAMP_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

// Ids arrive as strings from the DOM dataset and as numbers from the API
#[derive(Deserialize)]
#[serde(untagged)]
enum Identifier {
    Text(String),
    Number(i64),
    Other(IgnoredAny),
}

fn identifier<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Identifier>::deserialize(deserializer)? {
        Some(Identifier::Text(text)) => text,
        Some(Identifier::Number(number)) => number.to_string(),
        Some(Identifier::Other(_)) | None => String::new(),
    })
}

// Anything that is neither text nor an epoch number becomes an unknown timestamp
fn timestamp_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Identifier>::deserialize(deserializer)? {
        Some(Identifier::Text(text)) => Some(text),
        // Epoch numbers are seconds
        Some(Identifier::Number(seconds)) => {
            DateTime::from_timestamp(seconds, 0).map(|dt| dt.to_rfc3339())
        }
        Some(Identifier::Other(_)) | None => None,
    })
}

fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Identifier>::deserialize(deserializer)? {
        Some(Identifier::Text(text)) => Some(text),
        Some(Identifier::Number(number)) => Some(number.to_string()),
        Some(Identifier::Other(_)) | None => None,
    })
}

fn list_or_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn text_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_text(deserializer)?.unwrap_or_default())
}

/// One exercise-log entry nested under a session, as delivered by the page or the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawExerciseLog {
    #[serde(alias = "exerciseName", alias = "name", default, deserialize_with = "text_or_empty")]
    pub exercise_name: String,
    #[serde(default, deserialize_with = "optional_text")]
    pub details: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub notes: Option<String>,
}

/// One workout session before ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSession {
    /// Empty when the source record carries no usable id.
    #[serde(default, deserialize_with = "identifier")]
    pub id: String,
    #[serde(alias = "workoutId", default, deserialize_with = "identifier")]
    pub workout_id: String,
    #[serde(alias = "workoutName", default, deserialize_with = "text_or_empty")]
    pub workout_name: String,
    #[serde(default, deserialize_with = "timestamp_text")]
    pub timestamp: Option<String>,
    #[serde(
        alias = "exerciseLogs",
        alias = "exercise_logs",
        default,
        deserialize_with = "list_or_empty"
    )]
    pub exercises: Vec<RawExerciseLog>,
}

/// An ingested, immutable workout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionRecord {
    pub id: String,
    pub workout_id: String,
    pub workout_name: String,
    /// `None` when the source timestamp could not be parsed.
    pub timestamp: Option<DateTime<Utc>>,
    pub exercise_count: usize,
    pub exercise_names: Vec<String>,
    /// Lower-cased blob of workout name, exercise names, details and notes.
    pub search_text: String,
}

impl SessionRecord {
    #[must_use]
    pub fn from_raw(raw: &RawSession) -> Self {
        let timestamp = match raw.timestamp.as_deref() {
            Some(value) => {
                let parsed = parse_timestamp(value);
                if parsed.is_none() {
                    warn!(
                        "Session {} has an unparseable timestamp '{}'. Treating it as unknown.",
                        raw.id, value
                    );
                }
                parsed
            }
            None => None,
        };

        Self {
            id: raw.id.clone(),
            workout_id: raw.workout_id.clone(),
            workout_name: raw.workout_name.clone(),
            timestamp,
            exercise_count: raw.exercises.len(),
            exercise_names: raw
                .exercises
                .iter()
                .map(|log| log.exercise_name.clone())
                .collect(),
            search_text: build_search_text(raw),
        }
    }
}

/// Joins workout name, exercise names, details and notes (each group space-joined)
/// and lower-cases the result.
#[must_use]
pub fn build_search_text(raw: &RawSession) -> String {
    fn join<'a>(parts: impl Iterator<Item = &'a str>) -> String {
        parts
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    let names = join(raw.exercises.iter().map(|log| log.exercise_name.as_str()));
    let details = join(raw.exercises.iter().filter_map(|log| log.details.as_deref()));
    let notes = join(raw.exercises.iter().filter_map(|log| log.notes.as_deref()));

    format!("{} {} {} {}", raw.workout_name.trim(), names, details, notes).to_lowercase()
}

/// Parses a session timestamp. Returns `None` instead of failing on bad input.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_TIMESTAMP_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc));
        }
    }

    // Date-only values are UTC midnight
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|date| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

/// Holds the sessions of the current page load. Always replaced wholesale.
#[derive(Debug, Default, Clone)]
pub struct SessionRepository {
    sessions: Vec<SessionRecord>,
}

impl SessionRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a repository from raw records in one step.
    #[must_use]
    pub fn from_raw(raw: &[RawSession]) -> Self {
        let mut repository = Self::new();
        repository.ingest(raw);
        repository
    }

    /// Replaces the stored sessions with freshly ingested `raw` records.
    /// Records without an id and later duplicates of an id are dropped.
    pub fn ingest(&mut self, raw: &[RawSession]) -> &[SessionRecord] {
        let mut seen = HashSet::with_capacity(raw.len());
        self.sessions = raw
            .iter()
            .filter(|session| {
                if session.id.trim().is_empty() {
                    warn!(
                        "Session '{}' has no id and was skipped during ingest.",
                        session.workout_name
                    );
                    return false;
                }
                let fresh = seen.insert(session.id.as_str());
                if !fresh {
                    warn!("Duplicate session id '{}' skipped during ingest.", session.id);
                }
                fresh
            })
            .map(SessionRecord::from_raw)
            .collect();
        debug!("Ingested {} sessions.", self.sessions.len());
        &self.sessions
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }

    #[must_use]
    pub fn sessions(&self) -> &[SessionRecord] {
        &self.sessions
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&SessionRecord> {
        self.sessions.iter().find(|session| session.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
