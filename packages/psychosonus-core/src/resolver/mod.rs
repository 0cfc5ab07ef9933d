//! Source resolution: turns a [`Track`] into a playable stream URL.
//!
//! Metadata-only tracks go through a fixed waterfall of search queries;
//! the first query that yields results decides the match. The matched (or
//! directly playable) URL is then handed to stream extraction, retrying
//! with ranked fallback formats until one produces a URL.
//!
//! The resolver holds no mutable state and is safe to share between
//! concurrently running resolution workers.

mod spotify;
mod traits;
mod ytdlp;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol_constants::{DEFAULT_FALLBACK_FORMATS, DEFAULT_PRIMARY_FORMAT};
use crate::track::{OriginKind, Track};

pub use spotify::{SpotifyCatalog, SpotifyConfig};
pub use traits::{ExtractError, SearchError, StreamExtractor, TrackSearch};
pub use ytdlp::{YtDlpClient, YtDlpConfig};

/// Terminal resolution failures. Both make the coordinator skip the track.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no playable match for '{title}' by '{artist}'")]
    NoMatchFound { title: String, artist: String },

    #[error("could not extract a stream from {url} after {attempts} attempts")]
    ExtractionFailed { url: String, attempts: usize },
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    /// Page URL the stream was extracted from (cached on the track).
    pub source_url: String,
    /// Direct media URL handed to the session.
    pub stream_url: String,
    /// Format selector that produced `stream_url`.
    pub format: String,
}

/// Tunables for the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverConfig {
    /// Results requested per waterfall query.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Format tried first for every extraction.
    #[serde(default = "default_primary_format")]
    pub primary_format: String,

    /// Formats tried in order when the primary one fails.
    #[serde(default = "default_fallback_formats")]
    pub fallback_formats: Vec<String>,
}

fn default_search_limit() -> usize {
    3
}

fn default_primary_format() -> String {
    DEFAULT_PRIMARY_FORMAT.to_string()
}

fn default_fallback_formats() -> Vec<String> {
    DEFAULT_FALLBACK_FORMATS
        .iter()
        .map(|f| (*f).to_string())
        .collect()
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            search_limit: default_search_limit(),
            primary_format: default_primary_format(),
            fallback_formats: default_fallback_formats(),
        }
    }
}

/// Builds the ordered, de-duplicated list of search queries for a track.
///
/// Order: `artist title`, `title artist`, `title`, `artist - title`.
/// Blank variants and repeats of an earlier variant are dropped.
pub fn query_variants(title: &str, artist: &str) -> Vec<String> {
    let candidates = [
        format!("{artist} {title}"),
        format!("{title} {artist}"),
        title.to_string(),
        format!("{artist} - {title}"),
    ];

    let mut variants: Vec<String> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let trimmed = candidate.trim();
        if trimmed.is_empty() || trimmed == "-" {
            continue;
        }
        if variants.iter().any(|v| v == trimmed) {
            continue;
        }
        variants.push(trimmed.to_string());
    }
    variants
}

/// Resolves tracks to stream URLs via injected search and extraction backends.
pub struct SourceResolver {
    search: Arc<dyn TrackSearch>,
    extractor: Arc<dyn StreamExtractor>,
    config: ResolverConfig,
}

impl SourceResolver {
    pub fn new(
        search: Arc<dyn TrackSearch>,
        extractor: Arc<dyn StreamExtractor>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            search,
            extractor,
            config,
        }
    }

    /// Resolves a track to a stream URL.
    ///
    /// A track whose match was already cached skips the search waterfall.
    pub async fn resolve(&self, track: &Track) -> Result<ResolvedSource, ResolveError> {
        let source_url = match (track.origin_kind(), track.resolved_playback_url()) {
            (_, Some(cached)) => cached.to_string(),
            (OriginKind::DirectlyPlayable, None) => track.origin_url().to_string(),
            (OriginKind::MetadataOnly, None) => self.find_match(track).await?,
        };

        self.extract_with_fallbacks(source_url).await
    }

    /// Runs the search waterfall; the first non-empty result list wins.
    async fn find_match(&self, track: &Track) -> Result<String, ResolveError> {
        for query in query_variants(track.title(), track.artist()) {
            log::debug!("[Resolver] Searching for '{}'", query);

            let results = match self.search.search(&query, self.config.search_limit).await {
                Ok(results) => results,
                Err(e) => {
                    log::warn!("[Resolver] Search for '{}' failed: {}", query, e);
                    continue;
                }
            };

            if let Some(first) = results.first() {
                log::info!(
                    "[Resolver] Matched '{}' to {} via '{}'",
                    track.title(),
                    first.origin_url(),
                    query
                );
                return Ok(first.origin_url().to_string());
            }
        }

        log::warn!(
            "[Resolver] No match for '{}' by '{}'",
            track.title(),
            track.artist()
        );
        Err(ResolveError::NoMatchFound {
            title: track.title().to_string(),
            artist: track.artist().to_string(),
        })
    }

    async fn extract_with_fallbacks(
        &self,
        source_url: String,
    ) -> Result<ResolvedSource, ResolveError> {
        let formats = std::iter::once(&self.config.primary_format)
            .chain(self.config.fallback_formats.iter());

        let mut attempts = 0;
        for format in formats {
            attempts += 1;
            match self.extractor.extract(&source_url, format).await {
                Ok(Some(stream_url)) if !stream_url.trim().is_empty() => {
                    if attempts > 1 {
                        log::info!(
                            "[Resolver] Extracted {} with fallback format '{}'",
                            source_url,
                            format
                        );
                    }
                    return Ok(ResolvedSource {
                        source_url,
                        stream_url: stream_url.trim().to_string(),
                        format: format.clone(),
                    });
                }
                Ok(_) => {
                    log::debug!(
                        "[Resolver] Format '{}' produced no URL for {}",
                        format,
                        source_url
                    );
                }
                Err(e) => {
                    log::debug!(
                        "[Resolver] Format '{}' failed for {}: {}",
                        format,
                        source_url,
                        e
                    );
                }
            }
        }

        log::warn!(
            "[Resolver] Extraction failed for {} after {} attempts",
            source_url,
            attempts
        );
        Err(ResolveError::ExtractionFailed {
            url: source_url,
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Search stub answering from a query → results table and recording calls.
    #[derive(Default)]
    struct MockSearch {
        results: HashMap<String, Vec<Track>>,
        failing: Vec<String>,
        calls: Mutex<Vec<String>>,
    }

    impl MockSearch {
        fn with_result(mut self, query: &str, url: &str) -> Self {
            let track = Track::new("m", "match", url, OriginKind::DirectlyPlayable);
            self.results.insert(query.to_string(), vec![track]);
            self
        }

        fn failing_on(mut self, query: &str) -> Self {
            self.failing.push(query.to_string());
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl TrackSearch for MockSearch {
        async fn search(&self, query: &str, _limit: usize) -> Result<Vec<Track>, SearchError> {
            self.calls.lock().push(query.to_string());
            if self.failing.iter().any(|q| q == query) {
                return Err(SearchError::Process("boom".into()));
            }
            Ok(self.results.get(query).cloned().unwrap_or_default())
        }
    }

    /// Extractor stub that succeeds only for listed formats.
    #[derive(Default)]
    struct MockExtractor {
        working_formats: Vec<String>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl MockExtractor {
        fn working(formats: &[&str]) -> Self {
            Self {
                working_formats: formats.iter().map(|f| f.to_string()).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl StreamExtractor for MockExtractor {
        async fn extract(&self, url: &str, format: &str) -> Result<Option<String>, ExtractError> {
            self.calls.lock().push((url.to_string(), format.to_string()));
            if self.working_formats.iter().any(|f| f == format) {
                Ok(Some(format!("https://cdn.example/{format}")))
            } else if format == "worst" {
                Ok(None)
            } else {
                Err(ExtractError::Process("format unavailable".into()))
            }
        }
    }

    fn resolver(search: Arc<MockSearch>, extractor: Arc<MockExtractor>) -> SourceResolver {
        SourceResolver::new(search, extractor, ResolverConfig::default())
    }

    fn spotify_track() -> Track {
        Track::new(
            "sp1",
            "Song X",
            "https://open.spotify.com/track/sp1",
            OriginKind::MetadataOnly,
        )
        .with_artist("Artist Y")
    }

    #[test]
    fn query_variants_follow_fixed_order() {
        assert_eq!(
            query_variants("Song X", "Artist Y"),
            vec![
                "Artist Y Song X",
                "Song X Artist Y",
                "Song X",
                "Artist Y - Song X"
            ]
        );
    }

    #[test]
    fn query_variants_skip_blank_and_duplicate_entries() {
        assert_eq!(query_variants("Song", ""), vec!["Song", "- Song"]);
        assert!(query_variants("  ", " ").is_empty());
    }

    #[tokio::test]
    async fn waterfall_stops_at_first_non_empty_variant() {
        let search = Arc::new(
            MockSearch::default()
                .with_result("Song X", "https://www.youtube.com/watch?v=third")
                .with_result("Artist Y - Song X", "https://www.youtube.com/watch?v=fourth"),
        );
        let extractor = Arc::new(MockExtractor::working(&["bestaudio/best"]));

        let resolved = resolver(search.clone(), extractor)
            .resolve(&spotify_track())
            .await
            .unwrap();

        assert_eq!(resolved.source_url, "https://www.youtube.com/watch?v=third");
        assert_eq!(
            search.calls(),
            vec!["Artist Y Song X", "Song X Artist Y", "Song X"]
        );
    }

    #[tokio::test]
    async fn last_variant_match_is_used() {
        let search = Arc::new(
            MockSearch::default()
                .with_result("Artist Y - Song X", "https://www.youtube.com/watch?v=fourth"),
        );
        let extractor = Arc::new(MockExtractor::working(&["bestaudio/best"]));

        let resolved = resolver(search.clone(), extractor.clone())
            .resolve(&spotify_track())
            .await
            .unwrap();

        assert_eq!(resolved.source_url, "https://www.youtube.com/watch?v=fourth");
        assert_eq!(search.calls().len(), 4);
        assert_eq!(
            extractor.calls.lock()[0].0,
            "https://www.youtube.com/watch?v=fourth"
        );
    }

    #[tokio::test]
    async fn search_errors_count_as_empty_results() {
        let search = Arc::new(
            MockSearch::default()
                .failing_on("Artist Y Song X")
                .with_result("Song X Artist Y", "https://www.youtube.com/watch?v=second"),
        );
        let extractor = Arc::new(MockExtractor::working(&["bestaudio/best"]));

        let resolved = resolver(search, extractor)
            .resolve(&spotify_track())
            .await
            .unwrap();

        assert_eq!(resolved.source_url, "https://www.youtube.com/watch?v=second");
    }

    #[tokio::test]
    async fn all_variants_empty_yields_no_match_without_extraction() {
        let search = Arc::new(MockSearch::default());
        let extractor = Arc::new(MockExtractor::working(&["bestaudio/best"]));

        let err = resolver(search.clone(), extractor.clone())
            .resolve(&spotify_track())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ResolveError::NoMatchFound {
                title: "Song X".into(),
                artist: "Artist Y".into()
            }
        );
        assert_eq!(search.calls().len(), 4);
        assert!(extractor.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn directly_playable_skips_search() {
        let search = Arc::new(MockSearch::default());
        let extractor = Arc::new(MockExtractor::working(&["bestaudio/best"]));
        let track = Track::new(
            "yt1",
            "Clip",
            "https://www.youtube.com/watch?v=yt1",
            OriginKind::DirectlyPlayable,
        );

        let resolved = resolver(search.clone(), extractor)
            .resolve(&track)
            .await
            .unwrap();

        assert!(search.calls().is_empty());
        assert_eq!(resolved.source_url, "https://www.youtube.com/watch?v=yt1");
        assert_eq!(resolved.stream_url, "https://cdn.example/bestaudio/best");
        assert_eq!(resolved.format, "bestaudio/best");
    }

    #[tokio::test]
    async fn cached_match_skips_search_for_metadata_only_track() {
        let search = Arc::new(MockSearch::default());
        let extractor = Arc::new(MockExtractor::working(&["bestaudio/best"]));
        let track = spotify_track().with_resolved_url("https://www.youtube.com/watch?v=cached");

        let resolved = resolver(search.clone(), extractor)
            .resolve(&track)
            .await
            .unwrap();

        assert!(search.calls().is_empty());
        assert_eq!(resolved.source_url, "https://www.youtube.com/watch?v=cached");
    }

    #[tokio::test]
    async fn extraction_falls_back_in_rank_order() {
        let search = Arc::new(MockSearch::default());
        let extractor = Arc::new(MockExtractor::working(&["best[height<=480]"]));
        let track = Track::new("v", "t", "https://www.youtube.com/watch?v=v", OriginKind::DirectlyPlayable);

        let resolved = resolver(search, extractor.clone())
            .resolve(&track)
            .await
            .unwrap();

        assert_eq!(resolved.format, "best[height<=480]");
        let tried: Vec<String> = extractor.calls.lock().iter().map(|(_, f)| f.clone()).collect();
        assert_eq!(
            tried,
            vec![
                "bestaudio/best",
                "bestaudio[ext=m4a]",
                "bestaudio[ext=webm]",
                "best[height<=480]"
            ]
        );
    }

    #[tokio::test]
    async fn every_format_failing_yields_extraction_failed() {
        let search = Arc::new(MockSearch::default());
        let extractor = Arc::new(MockExtractor::default());
        let track = Track::new("v", "t", "https://www.youtube.com/watch?v=v", OriginKind::DirectlyPlayable);

        let err = resolver(search, extractor).resolve(&track).await.unwrap_err();

        assert_eq!(
            err,
            ResolveError::ExtractionFailed {
                url: "https://www.youtube.com/watch?v=v".into(),
                attempts: 5
            }
        );
    }
}
