//! Session backed by an external player process.
//!
//! Audio decoding and output are delegated entirely to the configured
//! player command (ffplay by default). One child process runs per stream;
//! a waiter task owns the child and fires the completion event when it
//! exits or is told to stop. A second task drains the player's stderr so a
//! chatty player can never block on a full pipe.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::oneshot;

use super::{completion_pair, CompletionReceiver, CompletionSender, Session, SessionError, SessionProvider};
use crate::protocol_constants::{PLAYER_CHANNEL_PLACEHOLDER, PLAYER_URL_PLACEHOLDER};
use crate::runtime::{TaskSpawner, TokioSpawner};
use crate::utils::truncate_chars;

/// Bytes of player stderr retained for exit diagnostics.
const STDERR_TAIL_BYTES: usize = 4096;

/// Longest stderr line quoted in a `PlayerExited` error.
const STDERR_DETAIL_CHARS: usize = 200;

/// How long the waiter lets the stderr drain catch up after the player exits.
const STDERR_FLUSH_GRACE: Duration = Duration::from_millis(500);

/// Player command line. `{url}` and `{channel}` in `args` are substituted
/// per stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerConfig {
    #[serde(default = "default_program")]
    pub program: String,

    #[serde(default = "default_args")]
    pub args: Vec<String>,
}

fn default_program() -> String {
    "ffplay".to_string()
}

fn default_args() -> Vec<String> {
    [
        "-nodisp",
        "-autoexit",
        "-loglevel",
        "error",
        "-reconnect",
        "1",
        "-reconnect_streamed",
        "1",
        "-reconnect_delay_max",
        "5",
        "-af",
        "volume=0.5",
        PLAYER_URL_PLACEHOLDER,
    ]
    .iter()
    .map(|a| (*a).to_string())
    .collect()
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
        }
    }
}

impl PlayerConfig {
    /// Returns the argument list with placeholders substituted.
    fn render_args(&self, url: &str, channel: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace(PLAYER_URL_PLACEHOLDER, url)
                    .replace(PLAYER_CHANNEL_PLACEHOLDER, channel)
            })
            .collect()
    }
}

/// Creates [`ProcessSession`]s. Connecting is local bookkeeping only.
///
/// Player watchers run on `spawner`.
#[derive(Clone)]
pub struct ProcessSessionProvider {
    config: PlayerConfig,
    spawner: TokioSpawner,
}

impl ProcessSessionProvider {
    #[must_use]
    pub fn new(config: PlayerConfig, spawner: TokioSpawner) -> Self {
        Self { config, spawner }
    }
}

#[async_trait]
impl SessionProvider for ProcessSessionProvider {
    async fn connect(&self, channel: &str) -> Result<Box<dyn Session>, SessionError> {
        let channel = channel.trim();
        if channel.is_empty() {
            return Err(SessionError::Connect("channel name is empty".into()));
        }

        let session = ProcessSession::new(
            self.config.clone(),
            self.spawner.clone(),
            channel.to_string(),
        );
        log::info!(
            "[Session] Connected to '{}' (session {})",
            channel,
            session.id
        );
        Ok(Box::new(session))
    }
}

/// The running player for the current stream.
struct ActivePlayer {
    pid: Option<u32>,
    stop_tx: Option<oneshot::Sender<()>>,
    exited: Arc<AtomicBool>,
    paused: bool,
}

impl ActivePlayer {
    fn is_running(&self) -> bool {
        !self.exited.load(Ordering::Acquire)
    }
}

/// A voice session whose audio is produced by a child process.
pub struct ProcessSession {
    id: String,
    channel: String,
    config: PlayerConfig,
    spawner: TokioSpawner,
    active: Option<ActivePlayer>,
}

impl ProcessSession {
    fn new(config: PlayerConfig, spawner: TokioSpawner, channel: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            channel,
            config,
            spawner,
            active: None,
        }
    }

    fn running_player(&mut self) -> Result<&mut ActivePlayer, SessionError> {
        self.active
            .as_mut()
            .filter(|p| p.is_running())
            .ok_or(SessionError::NotActive)
    }
}

#[async_trait]
impl Session for ProcessSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn channel(&self) -> &str {
        &self.channel
    }

    fn play(&mut self, url: &str) -> Result<CompletionReceiver, SessionError> {
        self.stop();

        let args = self.config.render_args(url, &self.channel);
        let mut child = Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SessionError::Spawn(format!("{}: {}", self.config.program, e)))?;

        let pid = child.id();
        let exited = Arc::new(AtomicBool::new(false));
        let (stop_tx, stop_rx) = oneshot::channel();
        let (completion_tx, completion_rx) = completion_pair();

        let stderr_tail = child.stderr.take().map(|stderr| {
            let (tail_tx, tail_rx) = oneshot::channel();
            self.spawner.spawn(drain_stderr(stderr, tail_tx));
            tail_rx
        });

        self.spawner.spawn(watch_player(
            child,
            stop_rx,
            Arc::clone(&exited),
            completion_tx,
            stderr_tail,
        ));

        log::debug!("[Session] Player started (pid {:?}) on '{}'", pid, self.channel);
        self.active = Some(ActivePlayer {
            pid,
            stop_tx: Some(stop_tx),
            exited,
            paused: false,
        });
        Ok(completion_rx)
    }

    fn stop(&mut self) {
        if let Some(mut player) = self.active.take() {
            if let Some(stop_tx) = player.stop_tx.take() {
                let _ = stop_tx.send(());
            }
        }
    }

    fn pause(&mut self) -> Result<(), SessionError> {
        let player = self.running_player()?;
        if player.paused {
            return Ok(());
        }
        signal_player(player.pid, Signal::Stop)?;
        player.paused = true;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), SessionError> {
        let player = self.running_player()?;
        if !player.paused {
            return Ok(());
        }
        signal_player(player.pid, Signal::Continue)?;
        player.paused = false;
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|p| p.is_running() && !p.paused)
    }

    fn is_paused(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|p| p.is_running() && p.paused)
    }

    async fn disconnect(&mut self) {
        self.stop();
        log::info!(
            "[Session] Disconnected from '{}' (session {})",
            self.channel,
            self.id
        );
    }
}

/// Waits for the player to exit or for a stop request, then fires the
/// completion event exactly once.
async fn watch_player(
    mut child: Child,
    stop_rx: oneshot::Receiver<()>,
    exited: Arc<AtomicBool>,
    completion: CompletionSender,
    stderr_tail: Option<oneshot::Receiver<String>>,
) {
    let outcome = tokio::select! {
        status = child.wait() => match status {
            Ok(status) if status.success() => None,
            Ok(status) => {
                let detail = match collect_tail(stderr_tail).await {
                    Some(line) => format!(" ({})", line),
                    None => String::new(),
                };
                Some(SessionError::PlayerExited(format!("{}{}", status, detail)))
            }
            Err(e) => Some(SessionError::PlayerExited(e.to_string())),
        },
        // Fires on explicit stop and when the session is dropped.
        _ = stop_rx => {
            if let Err(e) = child.kill().await {
                log::warn!("[Session] Failed to kill player: {}", e);
            }
            None
        }
    };

    exited.store(true, Ordering::Release);
    if let Some(err) = &outcome {
        log::warn!("[Session] {}", err);
    }
    completion.fire(outcome);
}

/// Reads stderr until EOF, keeping only the last [`STDERR_TAIL_BYTES`],
/// then sends the last non-empty line.
async fn drain_stderr(mut stderr: ChildStderr, tail_tx: oneshot::Sender<String>) {
    let mut tail: Vec<u8> = Vec::with_capacity(STDERR_TAIL_BYTES);
    let mut buf = [0u8; 1024];
    loop {
        match stderr.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                tail.extend_from_slice(&buf[..n]);
                if tail.len() > STDERR_TAIL_BYTES {
                    let excess = tail.len() - STDERR_TAIL_BYTES;
                    tail.drain(..excess);
                }
            }
            Err(e) => {
                log::debug!("[Session] Player stderr read failed: {}", e);
                break;
            }
        }
    }
    let _ = tail_tx.send(last_line(&String::from_utf8_lossy(&tail)));
}

fn last_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .map(|l| truncate_chars(l, STDERR_DETAIL_CHARS))
        .unwrap_or_default()
}

async fn collect_tail(stderr_tail: Option<oneshot::Receiver<String>>) -> Option<String> {
    let tail_rx = stderr_tail?;
    match tokio::time::timeout(STDERR_FLUSH_GRACE, tail_rx).await {
        Ok(Ok(line)) if !line.is_empty() => Some(line),
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pause / Resume Signals
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Signal {
    Stop,
    Continue,
}

#[cfg(unix)]
fn signal_player(pid: Option<u32>, signal: Signal) -> Result<(), SessionError> {
    let pid = pid.ok_or(SessionError::NotActive)?;
    let pid = libc::pid_t::try_from(pid).map_err(|e| SessionError::Signal(e.to_string()))?;
    let signo = match signal {
        Signal::Stop => libc::SIGSTOP,
        Signal::Continue => libc::SIGCONT,
    };

    // SAFETY: `kill` has no memory-safety preconditions; an invalid pid
    // only yields an error return.
    let rc = unsafe { libc::kill(pid, signo) };
    if rc == 0 {
        Ok(())
    } else {
        Err(SessionError::Signal(
            std::io::Error::last_os_error().to_string(),
        ))
    }
}

#[cfg(not(unix))]
fn signal_player(_pid: Option<u32>, signal: Signal) -> Result<(), SessionError> {
    Err(SessionError::Unsupported(match signal {
        Signal::Stop => "pause",
        Signal::Continue => "resume",
    }))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn shell(script: &str) -> PlayerConfig {
        PlayerConfig {
            program: "sh".into(),
            args: vec!["-c".into(), script.into(), "player".into(), "{url}".into()],
        }
    }

    async fn connect(config: PlayerConfig) -> Box<dyn Session> {
        ProcessSessionProvider::new(config, TokioSpawner::current())
            .connect("general")
            .await
            .unwrap()
    }

    #[test]
    fn render_args_substitutes_placeholders() {
        let config = PlayerConfig {
            program: "player".into(),
            args: vec!["--out={channel}".into(), "{url}".into()],
        };
        assert_eq!(
            config.render_args("https://cdn.example/a", "lounge"),
            vec!["--out=lounge", "https://cdn.example/a"]
        );
    }

    #[test]
    fn default_player_args_contain_url_placeholder() {
        assert!(PlayerConfig::default()
            .args
            .iter()
            .any(|a| a == PLAYER_URL_PLACEHOLDER));
    }

    #[tokio::test]
    async fn connect_rejects_blank_channel() {
        let result = ProcessSessionProvider::new(PlayerConfig::default(), TokioSpawner::current())
            .connect("  ")
            .await;
        assert!(matches!(result, Err(SessionError::Connect(_))));
    }

    #[tokio::test]
    async fn sessions_get_distinct_ids() {
        let a = connect(shell("exit 0")).await;
        let b = connect(shell("exit 0")).await;
        assert_ne!(a.id(), b.id());
        assert_eq!(a.channel(), "general");
    }

    #[tokio::test]
    async fn natural_end_fires_clean_completion() {
        let mut session = connect(shell("exit 0")).await;
        let done = session.play("https://cdn.example/a").unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(5), done)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, None);
        assert!(!session.is_playing());
    }

    #[tokio::test]
    async fn failing_player_reports_exit() {
        let mut session = connect(shell("echo 'decode error' >&2; exit 3")).await;
        let done = session.play("https://cdn.example/a").unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(5), done)
            .await
            .unwrap()
            .unwrap();
        match outcome {
            Some(SessionError::PlayerExited(detail)) => assert!(detail.contains("decode error")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn player_flooding_stderr_still_completes() {
        let mut session = connect(shell("head -c 300000 /dev/zero >&2; exit 0")).await;
        let done = session.play("https://cdn.example/a").unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(5), done)
            .await
            .expect("player blocked on stderr")
            .unwrap();
        assert_eq!(outcome, None);
    }

    #[tokio::test]
    async fn exit_detail_is_last_line_of_bounded_tail() {
        let mut session = connect(shell(
            "head -c 300000 /dev/zero | tr '\\0' 'x' >&2; echo >&2; echo 'stream gone' >&2; exit 1",
        ))
        .await;
        let done = session.play("https://cdn.example/a").unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(5), done)
            .await
            .unwrap()
            .unwrap();
        match outcome {
            Some(SessionError::PlayerExited(detail)) => {
                assert!(detail.ends_with("(stream gone)"), "detail: {}", detail);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn last_line_skips_trailing_blank_lines() {
        assert_eq!(last_line("first\nsecond\n\n  \n"), "second");
        assert_eq!(last_line(""), "");
    }

    #[tokio::test]
    async fn stop_kills_player_and_fires_completion() {
        let mut session = connect(shell("sleep 30")).await;
        let done = session.play("https://cdn.example/a").unwrap();
        assert!(session.is_playing());

        session.stop();

        let outcome = tokio::time::timeout(Duration::from_secs(5), done)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, None);
        assert!(!session.is_playing());
    }

    #[tokio::test]
    async fn pause_and_resume_toggle_state() {
        let mut session = connect(shell("sleep 30")).await;
        let _done = session.play("https://cdn.example/a").unwrap();

        session.pause().unwrap();
        assert!(session.is_paused());
        assert!(!session.is_playing());

        session.resume().unwrap();
        assert!(session.is_playing());

        session.disconnect().await;
        assert!(!session.is_playing());
        assert!(!session.is_paused());
    }

    #[tokio::test]
    async fn pause_without_stream_is_not_active() {
        let mut session = connect(shell("exit 0")).await;
        assert_eq!(session.pause(), Err(SessionError::NotActive));
    }

    #[tokio::test]
    async fn missing_player_binary_is_spawn_error() {
        let mut session = connect(PlayerConfig {
            program: "psychosonus-no-such-player".into(),
            args: vec!["{url}".into()],
        })
        .await;
        assert!(matches!(
            session.play("https://cdn.example/a"),
            Err(SessionError::Spawn(_))
        ));
    }
}
