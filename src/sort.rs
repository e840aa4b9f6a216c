// src/sort.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use tracing::warn;

use crate::session::SessionRecord;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SortKey {
    #[default]
    DateDesc,
    DateAsc,
    WorkoutName,
    ExerciseCount,
    ExerciseName,
}

impl SortKey {
    /// Parses the value of the sort control, falling back to newest-first.
    #[must_use]
    pub fn from_control_value(value: &str) -> Self {
        value.trim().parse().unwrap_or_else(|_| {
            warn!("Unknown sort key '{}', using {}.", value, Self::default());
            Self::default()
        })
    }
}

/// Returns a sorted copy of `sessions`. The sort is stable, so sessions that
/// compare equal keep their incoming order.
#[must_use]
pub fn apply(sessions: &[SessionRecord], key: SortKey) -> Vec<SessionRecord> {
    let mut sorted = sessions.to_vec();
    sorted.sort_by(|a, b| compare(a, b, key));
    sorted
}

#[must_use]
pub fn compare(a: &SessionRecord, b: &SessionRecord, key: SortKey) -> Ordering {
    match key {
        SortKey::DateDesc => compare_timestamps(a.timestamp, b.timestamp, true),
        SortKey::DateAsc => compare_timestamps(a.timestamp, b.timestamp, false),
        SortKey::WorkoutName => locale_compare(&a.workout_name, &b.workout_name),
        SortKey::ExerciseCount => b.exercise_count.cmp(&a.exercise_count),
        SortKey::ExerciseName => match (first_exercise_name(a), first_exercise_name(b)) {
            (Some(x), Some(y)) => locale_compare(x, y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    }
}

// Unknown timestamps go last in either direction
fn compare_timestamps(
    a: Option<DateTime<Utc>>,
    b: Option<DateTime<Utc>>,
    descending: bool,
) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) if descending => y.cmp(&x),
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Case-folded comparison with a plain comparison as tie-break, so "apple"
/// sorts next to "Apple" rather than after "Zebra".
#[must_use]
pub fn locale_compare(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn first_exercise_name(session: &SessionRecord) -> Option<&str> {
    session
        .exercise_names
        .iter()
        .map(String::as_str)
        .filter(|name| !name.trim().is_empty())
        .min_by(|x, y| locale_compare(x, y))
}
