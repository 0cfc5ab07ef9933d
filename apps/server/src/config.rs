//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::Path;

use anyhow::{Context, Result};
use psychosonus_core::protocol_constants::{
    SPOTIFY_PLACEHOLDER_CLIENT_ID, SPOTIFY_PLACEHOLDER_CLIENT_SECRET,
};
use psychosonus_core::resolver::{SpotifyConfig, YtDlpConfig};
use psychosonus_core::{PlayerConfig, ResolverConfig};
use serde::Deserialize;

/// Spotify application credentials.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SpotifySection {
    pub client_id: String,
    pub client_secret: String,
    pub market: String,
}

impl Default for SpotifySection {
    fn default() -> Self {
        Self {
            client_id: SPOTIFY_PLACEHOLDER_CLIENT_ID.to_string(),
            client_secret: SPOTIFY_PLACEHOLDER_CLIENT_SECRET.to_string(),
            market: "US".to_string(),
        }
    }
}

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind the HTTP server to.
    /// Override: `PSYCHOSONUS_BIND_PORT`
    pub bind_port: u16,

    /// Maximum number of queued tracks.
    /// Override: `PSYCHOSONUS_MAX_QUEUE_SIZE`
    pub max_queue_size: usize,

    /// Prefix for chat commands sent to `/api/command`.
    pub command_prefix: String,

    /// How long HTTP handlers wait for the coordinator (milliseconds).
    pub bridge_timeout_ms: u64,

    /// Failed tracks in a row before auto-advance stops.
    pub max_consecutive_failures: u32,

    /// Path to the yt-dlp executable.
    /// Override: `PSYCHOSONUS_YTDLP_PATH`
    pub ytdlp_path: String,

    /// Timeout for a single yt-dlp invocation (seconds).
    pub ytdlp_timeout_secs: u64,

    /// Format selectors tried when extracting a stream.
    pub resolver: ResolverConfig,

    /// Audio player command.
    pub player: PlayerConfig,

    /// Spotify credentials. Overrides: `PSYCHOSONUS_SPOTIFY_CLIENT_ID`,
    /// `PSYCHOSONUS_SPOTIFY_CLIENT_SECRET`
    pub spotify: SpotifySection,

    /// Voice channel to join at startup.
    pub channel: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let ytdlp = YtDlpConfig::default();
        Self {
            bind_port: 8888,
            max_queue_size: 100,
            command_prefix: "!".to_string(),
            bridge_timeout_ms: 10_000,
            max_consecutive_failures: 5,
            ytdlp_path: ytdlp.program,
            ytdlp_timeout_secs: ytdlp.timeout_secs,
            resolver: ResolverConfig::default(),
            player: PlayerConfig::default(),
            spotify: SpotifySection::default(),
            channel: None,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(port) = var("PSYCHOSONUS_BIND_PORT").and_then(|v| v.parse().ok()) {
            self.bind_port = port;
        }

        if let Some(size) = var("PSYCHOSONUS_MAX_QUEUE_SIZE").and_then(|v| v.parse().ok()) {
            self.max_queue_size = size;
        }

        if let Some(id) = var("PSYCHOSONUS_SPOTIFY_CLIENT_ID") {
            self.spotify.client_id = id;
        }

        if let Some(secret) = var("PSYCHOSONUS_SPOTIFY_CLIENT_SECRET") {
            self.spotify.client_secret = secret;
        }

        if let Some(path) = var("PSYCHOSONUS_YTDLP_PATH").filter(|p| !p.trim().is_empty()) {
            self.ytdlp_path = path;
        }

        // PSYCHOSONUS_LOG_LEVEL is handled by clap via #[arg(env = ...)] in main.rs
    }

    /// Spotify credentials, or `None` if unset or still the placeholders.
    fn spotify_config(&self) -> Option<SpotifyConfig> {
        let config = SpotifyConfig {
            client_id: self.spotify.client_id.clone(),
            client_secret: self.spotify.client_secret.clone(),
            market: self.spotify.market.clone(),
        };
        if config.is_configured() {
            return Some(config);
        }
        if self.spotify.client_id == SPOTIFY_PLACEHOLDER_CLIENT_ID
            || self.spotify.client_secret == SPOTIFY_PLACEHOLDER_CLIENT_SECRET
        {
            log::warn!(
                "Spotify credentials are placeholders; set PSYCHOSONUS_SPOTIFY_CLIENT_ID and \
                 PSYCHOSONUS_SPOTIFY_CLIENT_SECRET to enable Spotify search"
            );
        }
        None
    }

    /// Converts to psychosonus-core's Config type.
    pub fn to_core_config(&self) -> psychosonus_core::Config {
        psychosonus_core::Config {
            preferred_port: self.bind_port,
            max_queue_size: self.max_queue_size,
            bridge_timeout_ms: self.bridge_timeout_ms,
            max_consecutive_failures: self.max_consecutive_failures,
            command_prefix: self.command_prefix.clone(),
            resolver: self.resolver.clone(),
            ytdlp: YtDlpConfig {
                program: self.ytdlp_path.clone(),
                timeout_secs: self.ytdlp_timeout_secs,
            },
            player: self.player.clone(),
            spotify: self.spotify_config(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_core_defaults() {
        let core = ServerConfig::default().to_core_config();
        assert_eq!(core.preferred_port, 8888);
        assert_eq!(core.max_queue_size, 100);
        assert!(core.spotify.is_none());
        assert!(core.validate().is_ok());
    }

    #[test]
    fn yaml_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "bind_port: 9000\nmax_queue_size: 20\nytdlp_path: /opt/bin/yt-dlp\nchannel: lounge\n\
             spotify:\n  client_id: abc\n  client_secret: def\n"
        )
        .unwrap();

        let config = ServerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.bind_port, 9000);
        assert_eq!(config.channel.as_deref(), Some("lounge"));

        let core = config.to_core_config();
        assert_eq!(core.max_queue_size, 20);
        assert_eq!(core.ytdlp.program, "/opt/bin/yt-dlp");
        let spotify = core.spotify.unwrap();
        assert_eq!(spotify.client_id, "abc");
        assert_eq!(spotify.market, "US");
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        assert!(ServerConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bind_port: [not a port").unwrap();
        assert!(ServerConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = ServerConfig::default();
        config.apply_overrides(vars(&[
            ("PSYCHOSONUS_BIND_PORT", "7000"),
            ("PSYCHOSONUS_MAX_QUEUE_SIZE", "3"),
            ("PSYCHOSONUS_SPOTIFY_CLIENT_ID", "id"),
            ("PSYCHOSONUS_SPOTIFY_CLIENT_SECRET", "secret"),
            ("PSYCHOSONUS_YTDLP_PATH", "/usr/local/bin/yt-dlp"),
        ]));

        assert_eq!(config.bind_port, 7000);
        assert_eq!(config.max_queue_size, 3);
        assert_eq!(config.ytdlp_path, "/usr/local/bin/yt-dlp");
        assert!(config.to_core_config().spotify.is_some());
    }

    #[test]
    fn unparsable_env_values_are_ignored() {
        let mut config = ServerConfig::default();
        config.apply_overrides(vars(&[("PSYCHOSONUS_BIND_PORT", "not-a-port")]));
        assert_eq!(config.bind_port, 8888);
    }

    #[test]
    fn placeholder_credentials_disable_spotify() {
        let config = ServerConfig::default();
        assert_eq!(config.spotify.client_id, SPOTIFY_PLACEHOLDER_CLIENT_ID);
        assert!(config.to_core_config().spotify.is_none());
    }
}
