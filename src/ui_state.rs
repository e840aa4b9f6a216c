// src/ui_state.rs
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;
use url::Url;

pub const LAST_EXERCISE_FILTER_KEY: &str = "lastExerciseFilter";
pub const VIEW_PREFERENCE_KEY: &str = "historyViewPreference";
pub const WORKOUT_QUERY_PARAM: &str = "workout_id";

const STATE_DB_FILE_NAME: &str = "ui_state.sqlite";
const APP_DATA_DIR: &str = "workout-history";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to get application data directory")]
    DataDir,
    #[error("I/O error accessing UI state store")]
    Io(#[from] std::io::Error),
    #[error("UI state database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Invalid page URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("UI state store lock poisoned")]
    Poisoned,
}

/// Key-value persistence for small UI selections.
pub trait UiStateStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

/// Store that lives as long as the process, like browser session storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl UiStateStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        values.remove(key);
        Ok(())
    }
}

/// Gets the path to the UI state database within the app's data directory.
/// Creates the directory if it doesn't exist.
pub fn get_state_db_path() -> Result<PathBuf, StoreError> {
    let data_dir = dirs::data_dir().ok_or(StoreError::DataDir)?;
    let app_dir = data_dir.join(APP_DATA_DIR);
    if !app_dir.exists() {
        std::fs::create_dir_all(&app_dir)?;
    }
    Ok(app_dir.join(STATE_DB_FILE_NAME))
}

/// SQLite-backed store, survives restarts.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// Creates the key-value table if it doesn't exist.
pub fn init_db(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS ui_state (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

impl UiStateStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let value = conn
            .query_row(
                "SELECT value FROM ui_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            "INSERT INTO ui_state (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute("DELETE FROM ui_state WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// The page address. Carries the selected workout filter so it survives
/// reloads and bookmarks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageUrl {
    url: Url,
}

impl PageUrl {
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        Ok(Self {
            url: Url::parse(raw)?,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    #[must_use]
    pub fn workout_filter(&self) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == WORKOUT_QUERY_PARAM)
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    /// Sets or removes `workout_id`, keeping every other query parameter.
    pub fn set_workout_filter(&mut self, workout: Option<&str>) {
        let retained: Vec<(String, String)> = self
            .url
            .query_pairs()
            .filter(|(key, _)| key != WORKOUT_QUERY_PARAM)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        self.url.set_query(None);
        if retained.is_empty() && workout.is_none() {
            return;
        }

        let mut pairs = self.url.query_pairs_mut();
        pairs.extend_pairs(retained.iter());
        if let Some(workout) = workout {
            pairs.append_pair(WORKOUT_QUERY_PARAM, workout);
        }
    }
}

impl From<Url> for PageUrl {
    fn from(url: Url) -> Self {
        Self { url }
    }
}
