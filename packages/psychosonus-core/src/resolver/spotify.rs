//! Spotify Web API catalog search (metadata only).
//!
//! Spotify tracks cannot be streamed directly; results are produced as
//! [`OriginKind::MetadataOnly`] and matched to a playable source by the
//! resolver's search waterfall.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{header, Client, StatusCode, Url};
use serde::{Deserialize, Serialize};

use super::traits::{SearchError, TrackSearch};
use crate::protocol_constants::{
    MAX_ARTIST_CHARS, MAX_TITLE_CHARS, SPOTIFY_HTTP_TIMEOUT_SECS, SPOTIFY_PLACEHOLDER_CLIENT_ID,
    SPOTIFY_PLACEHOLDER_CLIENT_SECRET, SPOTIFY_SEARCH_URL, SPOTIFY_TOKEN_EXPIRY_MARGIN_SECS,
    SPOTIFY_TOKEN_URL, UNKNOWN_ARTIST, UNKNOWN_TITLE,
};
use crate::track::{OriginKind, Track};
use crate::utils::{format_duration_millis, truncate_chars};

/// Client credentials for the Spotify Web API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,

    /// Market used to filter search results.
    #[serde(default = "default_market")]
    pub market: String,
}

fn default_market() -> String {
    "US".to_string()
}

impl SpotifyConfig {
    /// Returns `true` if both credentials are present and not sample placeholders.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        let id = self.client_id.trim();
        let secret = self.client_secret.trim();
        !id.is_empty()
            && !secret.is_empty()
            && id != SPOTIFY_PLACEHOLDER_CLIENT_ID
            && secret != SPOTIFY_PLACEHOLDER_CLIENT_SECRET
    }
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Catalog search backed by the Spotify Web API.
pub struct SpotifyCatalog {
    http: Client,
    config: SpotifyConfig,
    token: Mutex<Option<CachedToken>>,
}

impl SpotifyCatalog {
    /// Creates a catalog client. Fails only if the HTTP client cannot be built.
    pub fn new(config: SpotifyConfig) -> Result<Self, SearchError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(SPOTIFY_HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| SearchError::Http(e.to_string()))?;

        Ok(Self {
            http,
            config,
            token: Mutex::new(None),
        })
    }

    /// Returns a valid access token, requesting a new one if the cached
    /// token is missing or about to expire.
    async fn access_token(&self) -> Result<String, SearchError> {
        let cached = self
            .token
            .lock()
            .as_ref()
            .filter(|t| Instant::now() < t.expires_at)
            .map(|t| t.access_token.clone());

        match cached {
            Some(token) => Ok(token),
            None => self.refresh_token().await,
        }
    }

    async fn refresh_token(&self) -> Result<String, SearchError> {
        log::debug!("[Spotify] Requesting access token");

        let response = self
            .http
            .post(SPOTIFY_TOKEN_URL)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(|e| SearchError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SearchError::Auth(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(e.to_string()))?;

        let lifetime = body
            .expires_in
            .saturating_sub(SPOTIFY_TOKEN_EXPIRY_MARGIN_SECS);
        *self.token.lock() = Some(CachedToken {
            access_token: body.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(lifetime),
        });

        Ok(body.access_token)
    }

    fn search_url(&self, query: &str, limit: usize) -> Result<Url, SearchError> {
        let limit = limit.to_string();
        Url::parse_with_params(
            SPOTIFY_SEARCH_URL,
            &[
                ("q", query),
                ("type", "track"),
                ("limit", limit.as_str()),
                ("market", self.config.market.as_str()),
            ],
        )
        .map_err(|e| SearchError::Parse(e.to_string()))
    }

    async fn send_search(&self, url: &Url, token: &str) -> Result<reqwest::Response, SearchError> {
        self.http
            .get(url.clone())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SearchError::Http(e.to_string()))
    }
}

#[async_trait]
impl TrackSearch for SpotifyCatalog {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>, SearchError> {
        let url = self.search_url(query, limit)?;

        let token = self.access_token().await?;
        let mut response = self.send_search(&url, &token).await?;

        // Tokens can be revoked before their advertised expiry.
        if response.status() == StatusCode::UNAUTHORIZED {
            log::info!("[Spotify] Token rejected, refreshing");
            let token = self.refresh_token().await?;
            response = self.send_search(&url, &token).await?;
        }

        if !response.status().is_success() {
            return Err(SearchError::Http(format!(
                "search returned {}",
                response.status()
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(e.to_string()))?;

        let tracks = body.into_tracks();
        log::debug!("[Spotify] '{}' returned {} results", query, tracks.len());
        Ok(tracks)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Response Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    tracks: Option<TrackPage>,
}

#[derive(Debug, Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<TrackItem>,
}

#[derive(Debug, Deserialize)]
struct TrackItem {
    id: Option<String>,
    name: Option<String>,
    #[serde(default)]
    artists: Vec<ArtistItem>,
    #[serde(default)]
    duration_ms: Option<u64>,
    #[serde(default)]
    external_urls: ExternalUrls,
}

#[derive(Debug, Deserialize)]
struct ArtistItem {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalUrls {
    spotify: Option<String>,
}

impl SearchResponse {
    fn into_tracks(self) -> Vec<Track> {
        self.tracks
            .map(|page| page.items)
            .unwrap_or_default()
            .into_iter()
            .filter_map(TrackItem::into_track)
            .collect()
    }
}

impl TrackItem {
    fn into_track(self) -> Option<Track> {
        let id = self.id.filter(|id| !id.is_empty())?;
        let url = self
            .external_urls
            .spotify
            .unwrap_or_else(|| format!("https://open.spotify.com/track/{id}"));

        let artist = if self.artists.is_empty() {
            UNKNOWN_ARTIST.to_string()
        } else {
            self.artists
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let title = self.name.unwrap_or_else(|| UNKNOWN_TITLE.to_string());

        let mut track = Track::new(
            id,
            truncate_chars(&title, MAX_TITLE_CHARS),
            url,
            OriginKind::MetadataOnly,
        )
        .with_artist(truncate_chars(&artist, MAX_ARTIST_CHARS));
        if let Some(ms) = self.duration_ms {
            track = track.with_duration(format_duration_millis(ms));
        }
        Some(track)
    }
}
