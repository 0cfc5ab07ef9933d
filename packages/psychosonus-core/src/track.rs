//! Track value type.
//!
//! A [`Track`] is created by a search backend or parsed from a client
//! payload, and is never modified afterwards except to cache the URL the
//! resolver matched it to.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol_constants::{UNKNOWN_ARTIST, UNKNOWN_DURATION};

/// How a track's origin URL relates to something the player can stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginKind {
    /// The origin URL can be handed straight to stream extraction.
    #[default]
    #[serde(alias = "youtube")]
    DirectlyPlayable,
    /// The origin is a catalog entry; a playable source must be searched for.
    #[serde(alias = "spotify")]
    MetadataOnly,
}

/// A playable or resolvable unit of music.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "TrackPayload")]
pub struct Track {
    id: String,
    title: String,
    artist: String,
    duration: String,
    #[serde(rename = "url")]
    origin_url: String,
    #[serde(rename = "source")]
    origin_kind: OriginKind,
    #[serde(rename = "resolvedUrl", skip_serializing_if = "Option::is_none")]
    resolved_playback_url: Option<String>,
}

impl Track {
    /// Creates a track with unknown artist and duration.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        origin_url: impl Into<String>,
        origin_kind: OriginKind,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: UNKNOWN_ARTIST.to_string(),
            duration: UNKNOWN_DURATION.to_string(),
            origin_url: origin_url.into(),
            origin_kind,
            resolved_playback_url: None,
        }
    }

    /// Sets the artist.
    #[must_use]
    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = artist.into();
        self
    }

    /// Sets the formatted duration (`mm:ss` or `Unknown`).
    #[must_use]
    pub fn with_duration(mut self, duration: impl Into<String>) -> Self {
        self.duration = duration.into();
        self
    }

    /// Returns a copy with the resolved playback URL cached.
    #[must_use]
    pub fn with_resolved_url(mut self, url: impl Into<String>) -> Self {
        self.resolved_playback_url = Some(url.into());
        self
    }

    pub(crate) fn cache_resolved_url(&mut self, url: String) {
        self.resolved_playback_url = Some(url);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn duration(&self) -> &str {
        &self.duration
    }

    pub fn origin_url(&self) -> &str {
        &self.origin_url
    }

    pub fn origin_kind(&self) -> OriginKind {
        self.origin_kind
    }

    pub fn resolved_playback_url(&self) -> Option<&str> {
        self.resolved_playback_url.as_deref()
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.title, self.artist)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client Payload
// ─────────────────────────────────────────────────────────────────────────────

/// Wire form of a track as submitted by clients.
///
/// Accepts the dashboard's historical field names (`source: "youtube"`,
/// `youtube_url`) alongside the current ones.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPayload {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    pub url: String,
    #[serde(default)]
    pub source: OriginKind,
    #[serde(default, alias = "youtube_url", alias = "youtubeUrl")]
    pub resolved_url: Option<String>,
}

/// Reasons a client payload is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackPayloadError {
    #[error("track field `{0}` must not be empty")]
    EmptyField(&'static str),
    #[error("track field `{0}` must be an http(s) URL")]
    NotHttpUrl(&'static str),
}

fn is_http_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    ["http://", "https://"]
        .iter()
        .any(|scheme| lower.strip_prefix(scheme).is_some_and(|rest| !rest.is_empty()))
}

impl TryFrom<TrackPayload> for Track {
    type Error = TrackPayloadError;

    fn try_from(payload: TrackPayload) -> Result<Self, Self::Error> {
        let id = payload.id.trim();
        let title = payload.title.trim();
        let url = payload.url.trim();
        if id.is_empty() {
            return Err(TrackPayloadError::EmptyField("id"));
        }
        if title.is_empty() {
            return Err(TrackPayloadError::EmptyField("title"));
        }
        if url.is_empty() {
            return Err(TrackPayloadError::EmptyField("url"));
        }
        if !is_http_url(url) {
            return Err(TrackPayloadError::NotHttpUrl("url"));
        }
        let resolved_url = payload
            .resolved_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        if resolved_url.as_deref().is_some_and(|u| !is_http_url(u)) {
            return Err(TrackPayloadError::NotHttpUrl("resolvedUrl"));
        }

        let artist = payload
            .artist
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
        let duration = payload
            .duration
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_DURATION.to_string());

        Ok(Self {
            id: id.to_string(),
            title: title.to_string(),
            artist,
            duration,
            origin_url: url.to_string(),
            origin_kind: payload.source,
            resolved_playback_url: resolved_url,
        })
    }
}
