// src/filter.rs
use chrono::{DateTime, Datelike, Duration, Local, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use tracing::warn;

use crate::session::SessionRecord;
use crate::sort::SortKey;

/// Date window a session must fall into.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DateRange {
    #[default]
    #[strum(to_string = "none", serialize = "")]
    None,
    Today,
    Week,
    Month,
    Quarter,
}

impl DateRange {
    /// Parses the value of the date-range control. Unknown values mean no filter.
    #[must_use]
    pub fn from_control_value(value: &str) -> Self {
        value.trim().parse().unwrap_or_else(|_| {
            warn!("Unknown date range '{}', ignoring date filter.", value);
            Self::None
        })
    }

    /// Human label shown in the active-filter summary.
    #[must_use]
    pub const fn label(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Today => Some("Today"),
            Self::Week => Some("This Week"),
            Self::Month => Some("This Month"),
            Self::Quarter => Some("Last 3 Months"),
        }
    }

    /// Inclusive lower bound of the range, evaluated against `now`.
    #[must_use]
    pub fn start(self, now: DateTime<Local>) -> Option<DateTime<Utc>> {
        let today = now.date_naive();
        let start_date = match self {
            Self::None => return None,
            Self::Today => today,
            // Most recent Sunday
            Self::Week => today - Duration::days(i64::from(today.weekday().num_days_from_sunday())),
            Self::Month => today.with_day(1).unwrap_or(today),
            Self::Quarter => today.checked_sub_months(Months::new(3)).unwrap_or(today),
        };
        Some(local_midnight(start_date))
    }
}

fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&naive)
        .earliest()
        // Midnight can fall into a DST gap
        .or_else(|| Local.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .map_or_else(|| Utc.from_utc_datetime(&naive), |dt| dt.with_timezone(&Utc))
}

/// The complete filter and sort selection. `None` fields mean "no filter".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    pub workout: Option<String>,
    pub exercise: Option<String>,
    pub date_range: DateRange,
    pub search: Option<String>,
    pub sort: SortKey,
}

impl FilterCriteria {
    /// True when any filter (sort excluded) narrows the result.
    #[must_use]
    pub fn has_active_filters(&self) -> bool {
        self.workout.is_some()
            || self.exercise.is_some()
            || self.date_range != DateRange::None
            || self.search.is_some()
    }

    #[must_use]
    pub fn active_filter_labels(&self) -> Vec<String> {
        let mut labels = Vec::new();
        if let Some(workout) = &self.workout {
            labels.push(format!("Workout: {workout}"));
        }
        if let Some(exercise) = &self.exercise {
            labels.push(format!("Exercise: {exercise}"));
        }
        if let Some(label) = self.date_range.label() {
            labels.push(format!("Date: {label}"));
        }
        if let Some(search) = &self.search {
            labels.push(format!("Search: \"{search}\""));
        }
        labels
    }
}

/// Trim + lower-case, used for every filter comparison.
#[must_use]
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Boundary normalization for workout and exercise control values.
#[must_use]
pub fn normalize_input(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Boundary normalization for the search box. Done once per input, not per session.
#[must_use]
pub fn normalize_search(value: &str) -> Option<String> {
    let normalized = normalize(value);
    (!normalized.is_empty()).then_some(normalized)
}

/// Filters `sessions` with the current local time as reference.
#[must_use]
pub fn apply(sessions: &[SessionRecord], criteria: &FilterCriteria) -> Vec<SessionRecord> {
    apply_at(sessions, criteria, Local::now())
}

/// Filters `sessions` in fixed order: workout, exercise, date range, search.
/// The input is left untouched and the relative order of kept sessions is preserved.
#[must_use]
pub fn apply_at(
    sessions: &[SessionRecord],
    criteria: &FilterCriteria,
    now: DateTime<Local>,
) -> Vec<SessionRecord> {
    let workout = criteria.workout.as_deref().map(normalize);
    let exercise = criteria.exercise.as_deref().map(normalize);
    let date_start = criteria.date_range.start(now);
    let search = criteria.search.as_deref();

    sessions
        .iter()
        .filter(|session| workout.as_deref().map_or(true, |w| matches_workout(session, w)))
        .filter(|session| exercise.as_deref().map_or(true, |e| matches_exercise(session, e)))
        .filter(|session| date_start.map_or(true, |start| matches_date(session, start)))
        .filter(|session| search.map_or(true, |s| session.search_text.contains(s)))
        .cloned()
        .collect()
}

// The workout control may carry either the id or the display name
fn matches_workout(session: &SessionRecord, workout: &str) -> bool {
    normalize(&session.workout_id) == workout || normalize(&session.workout_name) == workout
}

// Exact match so "Bench Press" does not pick up "Bench Press Incline"
fn matches_exercise(session: &SessionRecord, exercise: &str) -> bool {
    session
        .exercise_names
        .iter()
        .any(|name| normalize(name) == exercise)
}

fn matches_date(session: &SessionRecord, start: DateTime<Utc>) -> bool {
    session.timestamp.map_or(false, |timestamp| timestamp >= start)
}
