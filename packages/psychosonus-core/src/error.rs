//! Centralized error types for the Psychosonus core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors to appropriate HTTP status codes
//! - Implements `IntoResponse` for automatic JSON error responses
//!
//! Resolution and session faults never reach callers directly: the
//! coordinator recovers from them by advancing. Only queue, precondition
//! and scheduling faults surface through [`PsychosonusError`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::resolver::{ExtractError, ResolveError, SearchError};
use crate::services::bridge::BridgeError;
use crate::session::SessionError;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths (HTTP responses, event payloads, chat replies).
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;
}

impl ErrorCode for ResolveError {
    fn code(&self) -> &'static str {
        match self {
            Self::NoMatchFound { .. } => "no_match_found",
            Self::ExtractionFailed { .. } => "extraction_failed",
        }
    }
}

impl ErrorCode for SearchError {
    fn code(&self) -> &'static str {
        match self {
            Self::Spawn(_) => "search_spawn_failed",
            Self::Timeout(_) => "search_timeout",
            Self::Process(_) => "search_process_failed",
            Self::Http(_) => "search_http_failed",
            Self::Auth(_) => "search_auth_failed",
            Self::Parse(_) => "search_parse_failed",
        }
    }
}

impl ErrorCode for ExtractError {
    fn code(&self) -> &'static str {
        match self {
            Self::Spawn(_) => "extract_spawn_failed",
            Self::Timeout(_) => "extract_timeout",
            Self::Process(_) => "extract_process_failed",
        }
    }
}

impl ErrorCode for SessionError {
    fn code(&self) -> &'static str {
        match self {
            Self::Connect(_) => "session_connect_failed",
            Self::Spawn(_) => "player_spawn_failed",
            Self::PlayerExited(_) => "player_exited",
            Self::Signal(_) => "player_signal_failed",
            Self::Unsupported(_) => "unsupported",
            Self::NotActive => "stream_not_active",
        }
    }
}

impl ErrorCode for BridgeError {
    fn code(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "scheduling_timeout",
            Self::Closed => "coordinator_unavailable",
        }
    }
}

/// Application-wide error type for the Psychosonus server.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum PsychosonusError {
    /// Enqueue rejected because the queue is at capacity. Queue unchanged.
    #[error("Queue is full (capacity {0})")]
    QueueFull(usize),

    /// Removal index outside the queued range. Queue unchanged.
    #[error("Invalid queue index: {0}")]
    InvalidIndex(usize),

    /// Operation needs a connected voice session.
    #[error("Not connected to a voice channel")]
    NotConnected,

    /// Skip requested while no stream is active.
    #[error("Nothing is playing")]
    NothingPlaying,

    /// Pause requested while no stream is playing.
    #[error("Nothing to pause")]
    NothingToPause,

    /// Resume requested while the stream is not paused.
    #[error("Playback is not paused")]
    NotPaused,

    /// Force-play requested while the coordinator is not idle.
    #[error("Already playing")]
    AlreadyPlaying,

    /// Force-play requested with nothing queued.
    #[error("Queue is empty")]
    QueueEmpty,

    /// The coordinator did not acknowledge a scheduled call in time.
    #[error("Coordinator did not respond within {0}ms")]
    SchedulingTimeout(u64),

    /// The coordinator loop is no longer running.
    #[error("Coordinator unavailable: {0}")]
    Unavailable(String),

    /// Voice session fault surfaced by a control call (e.g. connect).
    #[error("Session error: {0}")]
    Session(String),

    /// Catalog search failed.
    #[error("Search failed: {0}")]
    Search(String),

    /// Requested backend is not configured.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Client sent an invalid or malformed request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Server configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PsychosonusError {
    /// Returns a machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::QueueFull(_) => "queue_full",
            Self::InvalidIndex(_) => "invalid_index",
            Self::NotConnected => "not_connected",
            Self::NothingPlaying => "nothing_playing",
            Self::NothingToPause => "nothing_to_pause",
            Self::NotPaused => "not_paused",
            Self::AlreadyPlaying => "already_playing",
            Self::QueueEmpty => "queue_empty",
            Self::SchedulingTimeout(_) => "scheduling_timeout",
            Self::Unavailable(_) => "coordinator_unavailable",
            Self::Session(_) => "session_error",
            Self::Search(_) => "search_failed",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Configuration(_) => "configuration_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidIndex(_) | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::QueueFull(_)
            | Self::NotConnected
            | Self::NothingPlaying
            | Self::NothingToPause
            | Self::NotPaused
            | Self::AlreadyPlaying
            | Self::QueueEmpty => StatusCode::CONFLICT,
            Self::SchedulingTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Session(_) | Self::Search(_) => StatusCode::BAD_GATEWAY,
            Self::Unavailable(_) | Self::ServiceUnavailable(_) | Self::Configuration(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type PsychosonusResult<T> = Result<T, PsychosonusError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for PsychosonusError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<BridgeError> for PsychosonusError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Timeout(t) => Self::SchedulingTimeout(t.as_millis() as u64),
            BridgeError::Closed => Self::Unavailable(err.to_string()),
        }
    }
}

impl From<SessionError> for PsychosonusError {
    fn from(err: SessionError) -> Self {
        Self::Session(err.to_string())
    }
}

impl From<SearchError> for PsychosonusError {
    fn from(err: SearchError) -> Self {
        Self::Search(err.to_string())
    }
}
