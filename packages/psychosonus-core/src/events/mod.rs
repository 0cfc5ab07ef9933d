//! Event system for real-time client communication.
//!
//! This module provides:
//! - [`EventEmitter`] trait for domain services to emit events
//! - [`BroadcastEventBridge`] for WebSocket transport
//! - Event types for playback and queue changes

mod bridge;
mod emitter;

pub use bridge::BroadcastEventBridge;
pub use emitter::{EventEmitter, LoggingEventEmitter, NoopEventEmitter};

use serde::Serialize;

use crate::services::PlaybackState;
use crate::track::Track;

/// Events broadcast to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "category", rename_all = "camelCase")]
pub enum BroadcastEvent {
    /// Session and playback progress.
    Playback(PlaybackEvent),

    /// Queue contents changed.
    Queue(QueueEvent),
}

/// Events emitted by the playback coordinator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlaybackEvent {
    /// A voice session was established.
    #[serde(rename_all = "camelCase")]
    Connected {
        channel: String,
        session_id: String,
        timestamp: u64,
    },

    /// The voice session ended.
    #[serde(rename_all = "camelCase")]
    Disconnected {
        channel: String,
        session_id: String,
        timestamp: u64,
    },

    /// The coordinator moved to a new state.
    #[serde(rename_all = "camelCase")]
    StateChanged {
        state: PlaybackState,
        /// Track being resolved or played, if any.
        track_id: Option<String>,
        timestamp: u64,
    },

    /// A track started streaming.
    #[serde(rename_all = "camelCase")]
    NowPlaying {
        track: Track,
        /// Page URL the stream was extracted from.
        source_url: String,
        timestamp: u64,
    },

    /// A track was dropped without playing.
    TrackSkipped {
        track: Track,
        reason: String,
        timestamp: u64,
    },

    /// The queue ran dry after a track ended.
    QueueEmpty { timestamp: u64 },

    /// Too many consecutive tracks failed; auto-advance stopped.
    AutoAdvanceHalted {
        failures: u32,
        remaining: usize,
        timestamp: u64,
    },

    Paused { timestamp: u64 },

    Resumed { timestamp: u64 },

    /// Playback was stopped and the queue cleared.
    Stopped { timestamp: u64 },
}

/// Events emitted when the queue is changed by a client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum QueueEvent {
    #[serde(rename_all = "camelCase")]
    Added {
        track: Track,
        /// Zero-based position among queued items.
        position: usize,
        queue_size: usize,
        timestamp: u64,
    },

    #[serde(rename_all = "camelCase")]
    Removed {
        index: usize,
        queue_size: usize,
        timestamp: u64,
    },

    Cleared { timestamp: u64 },
}
