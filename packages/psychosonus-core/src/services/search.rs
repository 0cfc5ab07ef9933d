//! Catalog search routing for clients.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{PsychosonusError, PsychosonusResult};
use crate::protocol_constants::{
    DEFAULT_API_SEARCH_LIMIT, MAX_API_SEARCH_LIMIT, MERGED_RESULT_CAP, MERGED_SPOTIFY_LIMIT,
    MERGED_YOUTUBE_LIMIT,
};
use crate::resolver::{SearchError, TrackSearch};
use crate::track::Track;

/// Which catalog a client search goes to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogSource {
    /// Spotify (when configured) followed by YouTube, merged.
    #[default]
    All,
    Youtube,
    Spotify,
}

/// Routes client searches to the configured catalogs.
#[derive(Clone)]
pub struct SearchService {
    youtube: Arc<dyn TrackSearch>,
    spotify: Option<Arc<dyn TrackSearch>>,
}

impl SearchService {
    pub fn new(youtube: Arc<dyn TrackSearch>, spotify: Option<Arc<dyn TrackSearch>>) -> Self {
        Self { youtube, spotify }
    }

    #[must_use]
    pub fn spotify_enabled(&self) -> bool {
        self.spotify.is_some()
    }

    /// Searches `source` for `query`.
    ///
    /// Blank queries return no results. For a single catalog `limit`
    /// defaults to 5 and is clamped to `1..=25`. See [`Self::search_all`]
    /// for the combined source.
    pub async fn search(
        &self,
        query: &str,
        limit: Option<usize>,
        source: CatalogSource,
    ) -> PsychosonusResult<Vec<Track>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        if source == CatalogSource::All {
            return self.search_all(query, limit).await;
        }
        let limit = limit
            .unwrap_or(DEFAULT_API_SEARCH_LIMIT)
            .clamp(1, MAX_API_SEARCH_LIMIT);

        let backend = match source {
            CatalogSource::All | CatalogSource::Youtube => &self.youtube,
            CatalogSource::Spotify => self.spotify.as_ref().ok_or_else(|| {
                PsychosonusError::ServiceUnavailable("Spotify is not configured".into())
            })?,
        };

        Ok(backend.search(query, limit).await?)
    }

    /// Queries Spotify (if configured) and YouTube together and returns
    /// Spotify results first.
    ///
    /// Without `limit` each catalog is asked for its merged default and the
    /// list is capped at 10; with `limit` both are asked for `limit` and the
    /// list is capped at `limit`. A failing catalog is logged and skipped;
    /// the request fails only when every catalog failed.
    async fn search_all(&self, query: &str, limit: Option<usize>) -> PsychosonusResult<Vec<Track>> {
        let (spotify_limit, youtube_limit, cap) = match limit {
            Some(limit) => {
                let limit = limit.clamp(1, MAX_API_SEARCH_LIMIT);
                (limit, limit, limit)
            }
            None => (MERGED_SPOTIFY_LIMIT, MERGED_YOUTUBE_LIMIT, MERGED_RESULT_CAP),
        };

        let spotify = async {
            match &self.spotify {
                Some(backend) => Some(backend.search(query, spotify_limit).await),
                None => None,
            }
        };
        let (spotify, youtube) = tokio::join!(spotify, self.youtube.search(query, youtube_limit));

        let mut results = Vec::new();
        let mut succeeded = false;
        let mut last_error: Option<SearchError> = None;
        for (catalog, outcome) in [("Spotify", spotify), ("YouTube", Some(youtube))] {
            match outcome {
                Some(Ok(tracks)) => {
                    succeeded = true;
                    results.extend(tracks);
                }
                Some(Err(e)) => {
                    log::warn!("[Search] {} search for '{}' failed: {}", catalog, query, e);
                    last_error = Some(e);
                }
                None => {}
            }
        }

        if let (false, Some(e)) = (succeeded, last_error) {
            return Err(e.into());
        }
        results.truncate(cap);
        Ok(results)
    }
}
