//! Collaborator traits for catalog search and stream extraction.
//!
//! The resolver depends on these rather than on concrete adapters so tests
//! can drive the waterfall with in-memory stubs.

use async_trait::async_trait;
use thiserror::Error;

use crate::track::Track;

/// Failures of a catalog search backend.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("failed to start search process: {0}")]
    Spawn(String),

    #[error("search timed out after {0}s")]
    Timeout(u64),

    #[error("search process failed: {0}")]
    Process(String),

    #[error("search request failed: {0}")]
    Http(String),

    #[error("catalog authentication failed: {0}")]
    Auth(String),

    #[error("unreadable search response: {0}")]
    Parse(String),
}

/// Failures of a stream extraction backend.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    #[error("failed to start extraction process: {0}")]
    Spawn(String),

    #[error("extraction timed out after {0}s")]
    Timeout(u64),

    #[error("extraction process failed: {0}")]
    Process(String),
}

/// Searches a catalog for tracks matching free text.
#[async_trait]
pub trait TrackSearch: Send + Sync {
    /// Returns at most `limit` tracks, best match first.
    ///
    /// An empty list means "no results" and is not an error.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>, SearchError>;
}

/// Turns a playable page URL into a direct media stream URL.
#[async_trait]
pub trait StreamExtractor: Send + Sync {
    /// Extracts a stream URL using the given format preference.
    ///
    /// `Ok(None)` means the backend ran but produced no URL for this format.
    async fn extract(&self, url: &str, format: &str) -> Result<Option<String>, ExtractError>;
}
