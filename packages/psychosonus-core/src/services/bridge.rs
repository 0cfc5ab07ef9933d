//! Cross-domain handle onto a running coordinator.
//!
//! Request handlers run on arbitrary runtime threads and hold a cloned
//! [`CoordinatorHandle`]. Queue reads and writes go straight to the shared
//! [`TrackQueue`]; everything that touches the session is sent to the
//! coordinator loop as a message and awaited with a bounded timeout.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

use super::coordinator::{
    Command, ConnectOutcome, CoordinatorChannels, CoordinatorStatus, PauseToggle, PlaybackState,
};
use crate::error::{PsychosonusError, PsychosonusResult};
use crate::events::{EventEmitter, QueueEvent};
use crate::queue::{QueueEntry, TrackQueue};
use crate::track::Track;
use crate::utils::now_millis;

/// Failure to get an acknowledgment from the coordinator loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("coordinator did not acknowledge within {0:?}")]
    Timeout(Duration),

    #[error("coordinator loop has stopped")]
    Closed,
}

/// Result of an accepted enqueue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueOutcome {
    pub accepted: bool,
    /// `true` if this enqueue started playback on an idle session.
    pub playback_started: bool,
    /// Zero-based position among queued items.
    pub position: usize,
    pub queue_size: usize,
}

/// Public status view served by `/api/status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStatus {
    pub connected: bool,
    pub channel: Option<String>,
    pub session_id: Option<String>,
    pub state: PlaybackState,
    pub playing: bool,
    pub paused: bool,
    pub queue_size: usize,
    pub current_track: Option<Track>,
}

/// Cloneable handle for request handlers.
#[derive(Clone)]
pub struct CoordinatorHandle {
    queue: Arc<TrackQueue>,
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<CoordinatorStatus>,
    emitter: Arc<dyn EventEmitter>,
    timeout: Duration,
}

impl CoordinatorHandle {
    /// Wraps the endpoints of a spawned coordinator.
    pub fn new(
        queue: Arc<TrackQueue>,
        channels: &CoordinatorChannels,
        emitter: Arc<dyn EventEmitter>,
        timeout: Duration,
    ) -> Self {
        Self {
            queue,
            commands: channels.commands.clone(),
            status: channels.status.clone(),
            emitter,
            timeout,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queue (direct)
    // ─────────────────────────────────────────────────────────────────────────

    /// Enqueues a track and, if the session is idle, nudges playback.
    ///
    /// The enqueue is committed before the nudge is sent; a nudge that is
    /// not acknowledged in time is logged and does not fail the call.
    pub async fn enqueue(&self, track: Track) -> PsychosonusResult<EnqueueOutcome> {
        let added = track.clone();
        if !self.queue.enqueue(track) {
            log::info!("[Bridge] Rejected '{}': queue full", added);
            return Err(PsychosonusError::QueueFull(self.queue.capacity()));
        }

        let queue_size = self.queue.size();
        let position = queue_size.saturating_sub(1);
        log::info!("[Bridge] Queued '{}' at position {}", added, position + 1);
        self.emitter.emit_queue(QueueEvent::Added {
            track: added,
            position,
            queue_size,
            timestamp: now_millis(),
        });

        let playback_started = if self.should_autoplay() {
            match self.request(|reply| Command::Kick { reply }).await {
                Ok(started) => started,
                Err(e) => {
                    let err = PsychosonusError::from(e);
                    log::warn!("[Bridge] Autoplay trigger not delivered: {}", err);
                    false
                }
            }
        } else {
            false
        };

        Ok(EnqueueOutcome {
            accepted: true,
            playback_started,
            position,
            queue_size,
        })
    }

    /// Removes the queued track at `index` (current excluded).
    pub fn remove_at(&self, index: usize) -> PsychosonusResult<()> {
        if !self.queue.remove_at(index) {
            return Err(PsychosonusError::InvalidIndex(index));
        }
        self.emitter.emit_queue(QueueEvent::Removed {
            index,
            queue_size: self.queue.size(),
            timestamp: now_millis(),
        });
        Ok(())
    }

    /// Drops every queued track. The current track keeps playing.
    pub fn clear(&self) {
        self.queue.clear();
        self.emitter.emit_queue(QueueEvent::Cleared {
            timestamp: now_millis(),
        });
    }

    pub fn snapshot(&self) -> Vec<QueueEntry> {
        self.queue.snapshot()
    }

    pub fn size(&self) -> usize {
        self.queue.size()
    }

    pub fn current(&self) -> Option<Track> {
        self.queue.current()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Controls (scheduled on the loop)
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn connect(&self, channel: &str) -> PsychosonusResult<ConnectOutcome> {
        let channel = channel.to_string();
        self.request(|reply| Command::Connect { channel, reply })
            .await?
    }

    pub async fn disconnect(&self) -> PsychosonusResult<()> {
        self.request(|reply| Command::Disconnect { reply }).await?
    }

    /// Ends the current track; the coordinator advances on its own.
    pub async fn skip(&self) -> PsychosonusResult<Track> {
        self.request(|reply| Command::Skip { reply }).await?
    }

    /// Stops playback and clears the queue.
    pub async fn stop(&self) -> PsychosonusResult<()> {
        self.request(|reply| Command::Stop { reply }).await?
    }

    pub async fn pause(&self) -> PsychosonusResult<()> {
        self.request(|reply| Command::Pause { reply }).await?
    }

    pub async fn resume(&self) -> PsychosonusResult<()> {
        self.request(|reply| Command::Resume { reply }).await?
    }

    pub async fn toggle_pause(&self) -> PsychosonusResult<PauseToggle> {
        self.request(|reply| Command::TogglePause { reply }).await?
    }

    /// Starts playback of the queue on an idle session.
    pub async fn force_play(&self) -> PsychosonusResult<()> {
        self.request(|reply| Command::ForcePlay { reply }).await?
    }

    pub fn status(&self) -> PlayerStatus {
        let status = self.status.borrow().clone();
        PlayerStatus {
            connected: status.connected(),
            channel: status.channel,
            session_id: status.session_id,
            state: status.state,
            playing: status.playing,
            paused: status.paused,
            queue_size: self.queue.size(),
            current_track: self.queue.current(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn should_autoplay(&self) -> bool {
        let status = self.status.borrow();
        status.connected() && status.state == PlaybackState::Idle
    }

    /// Sends a command and awaits its reply, both bounded by the timeout.
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, BridgeError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let command = build(reply_tx);

        let exchange = async {
            self.commands
                .send(command)
                .await
                .map_err(|_| BridgeError::Closed)?;
            reply_rx.await.map_err(|_| BridgeError::Closed)
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!(
                    "[Bridge] Coordinator did not respond within {:?}",
                    self.timeout
                );
                Err(BridgeError::Timeout(self.timeout))
            }
        }
    }
}
