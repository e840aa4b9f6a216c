// src/history_client.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::session::RawSession;

pub const HISTORY_PATH: &str = "/api/workout/history";
pub const CLEAR_HISTORY_PATH: &str = "/api/workout/history/clear";

/// User-facing category of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Auth,
    Server,
    NotFound,
    Timeout,
    Generic,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Network error: Unable to connect to server. Please check your internet connection.")]
    Network(String),
    #[error("Clear history endpoint not found. Please contact support.")]
    NotFound,
    #[error("You are not authorized to perform this action. Please sign in again.")]
    Unauthorized,
    #[error("Server error occurred. Please try again later.")]
    Server,
    #[error("HTTP {status}: {reason}")]
    Http { status: u16, reason: String },
    #[error("Invalid response from server")]
    InvalidResponse(String),
    #[error("{0}")]
    Rejected(String),
    #[error("Request timed out. The operation may still be in progress. Please refresh the page to check the status.")]
    Timeout,
}

impl ApiError {
    /// Maps a non-2xx status to its error. `None` for success statuses.
    #[must_use]
    pub fn from_status(status: u16, reason: &str) -> Option<Self> {
        match status {
            200..=299 => None,
            404 => Some(Self::NotFound),
            401 | 403 => Some(Self::Unauthorized),
            500 => Some(Self::Server),
            _ => Some(Self::Http {
                status,
                reason: reason.to_string(),
            }),
        }
    }

    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Network(_) => ErrorCategory::Network,
            Self::NotFound => ErrorCategory::NotFound,
            Self::Unauthorized => ErrorCategory::Auth,
            Self::Server => ErrorCategory::Server,
            Self::Timeout => ErrorCategory::Timeout,
            Self::Http { .. } | Self::InvalidResponse(_) | Self::Rejected(_) => {
                ErrorCategory::Generic
            }
        }
    }
}

/// Body of `DELETE /api/workout/history/clear`. `success` is mandatory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearHistoryResponse {
    pub success: bool,
    #[serde(default)]
    pub sessions_deleted: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ClearHistoryResponse {
    /// Number of deleted sessions, or the server's rejection as an error.
    pub fn into_deleted_count(self) -> Result<u64, ApiError> {
        if self.success {
            Ok(self.sessions_deleted.unwrap_or(0))
        } else {
            Err(ApiError::Rejected(
                self.error
                    .or(self.message)
                    .unwrap_or_else(|| "Unknown error occurred".to_string()),
            ))
        }
    }
}

/// `GET /api/workout/history` returns either a bare list or a wrapped one.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum HistoryPayload {
    Sessions(Vec<RawSession>),
    Wrapped { sessions: Vec<RawSession> },
}

impl HistoryPayload {
    #[must_use]
    pub fn into_sessions(self) -> Vec<RawSession> {
        match self {
            Self::Sessions(sessions) | Self::Wrapped { sessions } => sessions,
        }
    }
}

/// The two history endpoints the dashboard consumes.
#[async_trait]
pub trait HistoryApi: Send + Sync {
    async fn fetch_history(&self) -> Result<Vec<RawSession>, ApiError>;
    async fn clear_history(&self) -> Result<ClearHistoryResponse, ApiError>;
}

pub struct HistoryClient {
    http_client: Client,
    base_url: String,
}

impl HistoryClient {
    /// Builds a client for `base_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns `anyhow::Error` if the underlying HTTP client cannot be constructed.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to build HTTP client for history API")?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn map_transport_error(err: &reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Network(err.to_string())
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    match ApiError::from_status(status.as_u16(), status.canonical_reason().unwrap_or("")) {
        None => Ok(response),
        Some(api_error) => {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error body".to_string());
            error!("History API returned status {}. Body: {}", status, body);
            Err(api_error)
        }
    }
}

#[async_trait]
impl HistoryApi for HistoryClient {
    async fn fetch_history(&self) -> Result<Vec<RawSession>, ApiError> {
        let url = self.endpoint(HISTORY_PATH);
        info!("Sending GET to {}", url);

        let response = self
            .http_client
            .get(&url)
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .await
            .map_err(|e| map_transport_error(&e))?;
        let response = check_status(response).await?;

        let payload: HistoryPayload = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        let sessions = payload.into_sessions();
        debug!("Received {} sessions from {}", sessions.len(), url);
        Ok(sessions)
    }

    async fn clear_history(&self) -> Result<ClearHistoryResponse, ApiError> {
        let url = self.endpoint(CLEAR_HISTORY_PATH);
        info!("Sending DELETE to {}", url);

        let response = self
            .http_client
            .delete(&url)
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .await
            .map_err(|e| map_transport_error(&e))?;
        let response = check_status(response).await?;

        let body: ClearHistoryResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        info!(
            "Clear history answered success={} sessions_deleted={:?}",
            body.success, body.sessions_deleted
        );
        Ok(body)
    }
}
