//! Fixed constants that should NOT be changed.
//!
//! These values define the shape of data exchanged with clients and
//! third-party services. Tunable behaviour lives in [`crate::state::Config`].

// ─────────────────────────────────────────────────────────────────────────────
// Application Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Application name used in log banners and the health endpoint.
pub const APP_NAME: &str = "Psychosonus";

/// Service identifier returned by `/health`.
///
/// Dashboards probe `/health` and expect this exact string.
pub const SERVICE_ID: &str = "psychosonus";

// ─────────────────────────────────────────────────────────────────────────────
// Track Metadata
// ─────────────────────────────────────────────────────────────────────────────

/// Display value for tracks whose length is not known.
pub const UNKNOWN_DURATION: &str = "Unknown";

/// Fallback artist name when a search backend reports none.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Fallback title when a search backend reports none.
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// Uploader names that carry no artist information.
///
/// When a search result's uploader is one of these (or equals the title)
/// and the title contains `" - "`, the artist is taken from the title.
pub const GENERIC_UPLOADERS: [&str; 2] = ["Various Artists", UNKNOWN_ARTIST];

/// Maximum title length kept from search results (characters).
pub const MAX_TITLE_CHARS: usize = 100;

/// Maximum artist length kept from search results (characters).
pub const MAX_ARTIST_CHARS: usize = 50;

// ─────────────────────────────────────────────────────────────────────────────
// YouTube / yt-dlp
// ─────────────────────────────────────────────────────────────────────────────

/// Watch URL prefix; search result ids are appended to it.
pub const YOUTUBE_WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// Primary yt-dlp format selector for audio extraction.
pub const DEFAULT_PRIMARY_FORMAT: &str = "bestaudio/best";

/// Ranked yt-dlp format selectors tried when the primary format fails.
pub const DEFAULT_FALLBACK_FORMATS: [&str; 4] = [
    "bestaudio[ext=m4a]",
    "bestaudio[ext=webm]",
    "best[height<=480]",
    "worst",
];

// ─────────────────────────────────────────────────────────────────────────────
// Spotify Web API
// ─────────────────────────────────────────────────────────────────────────────

/// Client-credentials token endpoint.
pub const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Track search endpoint.
pub const SPOTIFY_SEARCH_URL: &str = "https://api.spotify.com/v1/search";

/// Seconds subtracted from a token's lifetime before it is considered expired.
pub const SPOTIFY_TOKEN_EXPIRY_MARGIN_SECS: u64 = 60;

/// HTTP timeout for Spotify requests (seconds).
pub const SPOTIFY_HTTP_TIMEOUT_SECS: u64 = 10;

/// Placeholder values shipped in sample configs; treated as "not configured".
pub const SPOTIFY_PLACEHOLDER_CLIENT_ID: &str = "SPOTIFY_CLIENT_ID_GOES_HERE";
pub const SPOTIFY_PLACEHOLDER_CLIENT_SECRET: &str = "SPOTIFY_CLIENT_SECRET_GOES_HERE";

// ─────────────────────────────────────────────────────────────────────────────
// Player Process
// ─────────────────────────────────────────────────────────────────────────────

/// Placeholder substituted with the resolved stream URL in player arguments.
pub const PLAYER_URL_PLACEHOLDER: &str = "{url}";

/// Placeholder substituted with the connected channel name in player arguments.
pub const PLAYER_CHANNEL_PLACEHOLDER: &str = "{channel}";

// ─────────────────────────────────────────────────────────────────────────────
// HTTP API
// ─────────────────────────────────────────────────────────────────────────────

/// Default result count for `/api/search`.
pub const DEFAULT_API_SEARCH_LIMIT: usize = 5;

/// Upper bound on `/api/search` result count.
pub const MAX_API_SEARCH_LIMIT: usize = 25;

/// Per-catalog and merged result counts for a combined search without an
/// explicit limit.
pub const MERGED_SPOTIFY_LIMIT: usize = 5;
pub const MERGED_YOUTUBE_LIMIT: usize = 8;
pub const MERGED_RESULT_CAP: usize = 10;

/// Number of entries shown by the `queue` chat command.
pub const QUEUE_DISPLAY_LIMIT: usize = 10;
