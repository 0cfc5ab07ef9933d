//! `yt-dlp` command-line adapter for search and stream extraction.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use super::traits::{ExtractError, SearchError, StreamExtractor, TrackSearch};
use crate::protocol_constants::{
    GENERIC_UPLOADERS, MAX_ARTIST_CHARS, MAX_TITLE_CHARS, UNKNOWN_ARTIST, UNKNOWN_TITLE,
    YOUTUBE_WATCH_URL,
};
use crate::track::{OriginKind, Track};
use crate::utils::{format_duration_secs, truncate_chars};

/// Where to find `yt-dlp` and how long to let it run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YtDlpConfig {
    #[serde(default = "default_program")]
    pub program: String,

    /// Upper bound for a single invocation; the child is killed afterwards.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_program() -> String {
    "yt-dlp".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Runs `yt-dlp` as a child process for each request.
#[derive(Debug, Clone)]
pub struct YtDlpClient {
    config: YtDlpConfig,
}

/// Why a single `yt-dlp` run did not produce output.
enum RunError {
    Spawn(String),
    Timeout(u64),
    Failed(String),
}

impl RunError {
    fn into_search(self) -> SearchError {
        match self {
            Self::Spawn(e) => SearchError::Spawn(e),
            Self::Timeout(s) => SearchError::Timeout(s),
            Self::Failed(e) => SearchError::Process(e),
        }
    }

    fn into_extract(self) -> ExtractError {
        match self {
            Self::Spawn(e) => ExtractError::Spawn(e),
            Self::Timeout(s) => ExtractError::Timeout(s),
            Self::Failed(e) => ExtractError::Process(e),
        }
    }
}

impl YtDlpClient {
    #[must_use]
    pub fn new(config: YtDlpConfig) -> Self {
        Self { config }
    }

    /// Runs `yt-dlp` with `args` and returns its stdout.
    async fn run(&self, args: &[&str]) -> Result<String, RunError> {
        let mut command = Command::new(&self.config.program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|e| RunError::Spawn(format!("{}: {}", self.config.program, e)))?;

        let timeout = Duration::from_secs(self.config.timeout_secs);
        // Dropping the future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(RunError::Failed(e.to_string())),
            Err(_) => {
                log::warn!(
                    "[YtDlp] Killed after {}s: {}",
                    self.config.timeout_secs,
                    args.join(" ")
                );
                return Err(RunError::Timeout(self.config.timeout_secs));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr.lines().last().unwrap_or("").trim().to_string();
            return Err(RunError::Failed(format!("{}: {}", output.status, message)));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl TrackSearch for YtDlpClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>, SearchError> {
        let target = format!("ytsearch{}:{}", limit, query);
        let stdout = self
            .run(&["--flat-playlist", "--dump-json", "--no-warnings", &target])
            .await
            .map_err(RunError::into_search)?;

        let tracks = parse_search_output(&stdout);
        log::debug!("[YtDlp] '{}' returned {} results", query, tracks.len());
        Ok(tracks)
    }
}

#[async_trait]
impl StreamExtractor for YtDlpClient {
    async fn extract(&self, url: &str, format: &str) -> Result<Option<String>, ExtractError> {
        let stdout = self
            .run(&extract_args(url, format))
            .await
            .map_err(RunError::into_extract)?;

        Ok(first_url_line(&stdout))
    }
}

/// `--` ends option parsing so a URL can never be read as a yt-dlp flag.
fn extract_args<'a>(url: &'a str, format: &'a str) -> [&'a str; 7] {
    [
        "-f",
        format,
        "--get-url",
        "--no-playlist",
        "--no-warnings",
        "--",
        url,
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// Output Parsing
// ─────────────────────────────────────────────────────────────────────────────

/// One line of `--dump-json` output. Only the fields we read are declared.
#[derive(Debug, Deserialize)]
struct SearchEntry {
    id: Option<String>,
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
}

/// Parses newline-delimited JSON search output. Unreadable lines and
/// entries without an id are skipped.
fn parse_search_output(stdout: &str) -> Vec<Track> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str::<SearchEntry>(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::debug!("[YtDlp] Skipping unreadable result line: {}", e);
                None
            }
        })
        .filter_map(entry_to_track)
        .collect()
}

fn entry_to_track(entry: SearchEntry) -> Option<Track> {
    let id = entry.id.filter(|id| !id.trim().is_empty())?;
    let raw_title = entry
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());
    let uploader = entry
        .uploader
        .or(entry.channel)
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());

    let (artist, title) = split_artist_title(&uploader, &raw_title);

    Some(
        Track::new(
            id.clone(),
            truncate_chars(&title, MAX_TITLE_CHARS),
            format!("{YOUTUBE_WATCH_URL}{id}"),
            OriginKind::DirectlyPlayable,
        )
        .with_artist(truncate_chars(&artist, MAX_ARTIST_CHARS))
        .with_duration(format_duration_secs(entry.duration)),
    )
}

/// Takes the artist from an `"Artist - Title"` video title when the
/// uploader carries no artist information.
fn split_artist_title(uploader: &str, title: &str) -> (String, String) {
    let generic = GENERIC_UPLOADERS.contains(&uploader) || uploader == title;
    if generic {
        if let Some((artist, rest)) = title.split_once(" - ") {
            let (artist, rest) = (artist.trim(), rest.trim());
            if !artist.is_empty() && !rest.is_empty() {
                return (artist.to_string(), rest.to_string());
            }
        }
    }
    (uploader.to_string(), title.to_string())
}

fn first_url_line(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}
