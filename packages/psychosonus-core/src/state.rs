//! Core configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol_constants::PLAYER_URL_PLACEHOLDER;
use crate::resolver::{ResolverConfig, SpotifyConfig, YtDlpConfig};
use crate::services::CoordinatorSettings;
use crate::session::PlayerConfig;

/// Configuration for the Psychosonus playback service.
///
/// All fields have sensible defaults; a partial YAML/JSON document only
/// needs to name what it changes.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    // Server
    /// Preferred port for the HTTP/WS server (0 = auto-allocate).
    pub preferred_port: u16,

    // Queue
    /// Maximum number of queued tracks (the current track is not counted).
    pub max_queue_size: usize,

    // Coordinator
    /// How long a request handler waits for the coordinator loop (milliseconds).
    pub bridge_timeout_ms: u64,

    /// Capacity of the coordinator's command inbox.
    pub inbox_capacity: usize,

    /// Consecutive failed tracks after which auto-advance stops.
    pub max_consecutive_failures: u32,

    // Events
    /// Capacity of the event broadcast channel.
    pub event_channel_capacity: usize,

    // Chat commands
    /// Prefix that marks text as a command.
    pub command_prefix: String,

    // Collaborators
    pub resolver: ResolverConfig,
    pub ytdlp: YtDlpConfig,
    pub player: PlayerConfig,

    /// Spotify credentials. Catalog search is disabled when absent.
    pub spotify: Option<SpotifyConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preferred_port: 8888,
            max_queue_size: 100,
            bridge_timeout_ms: 10_000,
            inbox_capacity: 64,
            max_consecutive_failures: 5,
            event_channel_capacity: 256,
            command_prefix: "!".to_string(),
            resolver: ResolverConfig::default(),
            ytdlp: YtDlpConfig::default(),
            player: PlayerConfig::default(),
            spotify: None,
        }
    }
}

impl Config {
    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_queue_size == 0 {
            return Err("max_queue_size must be >= 1".to_string());
        }
        if self.bridge_timeout_ms == 0 {
            return Err("bridge_timeout_ms must be >= 1".to_string());
        }
        if self.inbox_capacity == 0 {
            return Err("inbox_capacity must be >= 1 (mpsc::channel panics on 0)".to_string());
        }
        if self.max_consecutive_failures == 0 {
            return Err("max_consecutive_failures must be >= 1".to_string());
        }
        if self.event_channel_capacity == 0 {
            return Err(
                "event_channel_capacity must be >= 1 (broadcast::channel panics on 0)".to_string(),
            );
        }
        if self.command_prefix.trim().is_empty() {
            return Err("command_prefix must not be empty".to_string());
        }
        if self.resolver.search_limit == 0 {
            return Err("resolver.search_limit must be >= 1".to_string());
        }
        if self.resolver.primary_format.trim().is_empty() {
            return Err("resolver.primary_format must not be empty".to_string());
        }
        if self.ytdlp.program.trim().is_empty() {
            return Err("ytdlp.program must not be empty".to_string());
        }
        if self.ytdlp.timeout_secs == 0 {
            return Err("ytdlp.timeout_secs must be >= 1".to_string());
        }
        if self.player.program.trim().is_empty() {
            return Err("player.program must not be empty".to_string());
        }
        if !self
            .player
            .args
            .iter()
            .any(|a| a.contains(PLAYER_URL_PLACEHOLDER))
        {
            return Err(format!(
                "player.args must contain the {} placeholder",
                PLAYER_URL_PLACEHOLDER
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn bridge_timeout(&self) -> Duration {
        Duration::from_millis(self.bridge_timeout_ms)
    }

    #[must_use]
    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            inbox_capacity: self.inbox_capacity,
            max_consecutive_failures: self.max_consecutive_failures,
        }
    }

    /// Spotify credentials if present and not placeholders.
    #[must_use]
    pub fn spotify_credentials(&self) -> Option<&SpotifyConfig> {
        self.spotify.as_ref().filter(|s| s.is_configured())
    }
}
