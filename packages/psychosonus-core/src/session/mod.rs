//! Voice session abstraction.
//!
//! A [`SessionProvider`] connects to a named channel and yields a
//! [`Session`]; the session plays one stream at a time. Every call to
//! [`Session::play`] hands back a [`CompletionReceiver`] that resolves
//! exactly once, when the stream ends for any reason (natural end, player
//! failure, or [`Session::stop`]).

mod process;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;

pub use process::{PlayerConfig, ProcessSession, ProcessSessionProvider};

/// Errors raised by a voice session or its media player.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("failed to connect to channel: {0}")]
    Connect(String),

    #[error("failed to start player: {0}")]
    Spawn(String),

    #[error("player exited abnormally: {0}")]
    PlayerExited(String),

    #[error("failed to signal player: {0}")]
    Signal(String),

    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),

    #[error("no active stream")]
    NotActive,
}

// ─────────────────────────────────────────────────────────────────────────────
// Completion Signal
// ─────────────────────────────────────────────────────────────────────────────

/// Receiving half of a stream's completion event.
///
/// Resolves to `None` for a clean end (including stop) and
/// `Some(error)` when the player failed.
pub type CompletionReceiver = oneshot::Receiver<Option<SessionError>>;

/// Sending half of a stream's completion event. Consumed on fire, so it
/// can only fire once.
#[derive(Debug)]
pub struct CompletionSender(oneshot::Sender<Option<SessionError>>);

impl CompletionSender {
    /// Fires the event. A dropped receiver is ignored.
    pub fn fire(self, error: Option<SessionError>) {
        let _ = self.0.send(error);
    }
}

/// Creates a linked completion sender/receiver pair.
#[must_use]
pub fn completion_pair() -> (CompletionSender, CompletionReceiver) {
    let (tx, rx) = oneshot::channel();
    (CompletionSender(tx), rx)
}

// ─────────────────────────────────────────────────────────────────────────────
// Traits
// ─────────────────────────────────────────────────────────────────────────────

/// One connected voice session. Owned exclusively by the coordinator loop.
#[async_trait]
pub trait Session: Send {
    /// Unique id of this connection.
    fn id(&self) -> &str;

    /// Channel this session is connected to.
    fn channel(&self) -> &str;

    /// Starts streaming `url`, replacing any previous stream.
    ///
    /// The returned receiver resolves exactly once when this stream ends.
    fn play(&mut self, url: &str) -> Result<CompletionReceiver, SessionError>;

    /// Stops the active stream, firing its completion event. No-op when idle.
    fn stop(&mut self);

    fn pause(&mut self) -> Result<(), SessionError>;

    fn resume(&mut self) -> Result<(), SessionError>;

    /// `true` while a stream is running and not paused.
    fn is_playing(&self) -> bool;

    fn is_paused(&self) -> bool;

    /// Stops any stream and leaves the channel.
    async fn disconnect(&mut self);
}

/// Factory for voice sessions.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn connect(&self, channel: &str) -> Result<Box<dyn Session>, SessionError>;
}
