//! Psychosonus Core - shared library for the Psychosonus music bot.
//!
//! This crate keeps a shared track queue, finds a playable stream for each
//! track, and drives a voice session through it one track at a time. It is
//! used by the headless server binary and by anything else that wants to
//! embed the playback coordinator.
//!
//! # Architecture
//!
//! - [`queue`]: Bounded FIFO of pending tracks plus the current track
//! - [`resolver`]: Source resolution waterfall (search, then stream extraction)
//! - [`session`]: Voice session abstraction and the player-process implementation
//! - [`services`]: The coordinator state machine, its handle, and catalog search
//! - [`commands`]: Chat-style text commands
//! - [`events`]: Event system for real-time client communication
//! - [`api`]: HTTP/WebSocket surface
//! - [`state`]: Configuration
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! - [`TaskSpawner`](runtime::TaskSpawner): Spawning background tasks
//! - [`EventEmitter`](events::EventEmitter): Emitting domain events
//! - [`TrackSearch`](resolver::TrackSearch) / [`StreamExtractor`](resolver::StreamExtractor):
//!   Catalog and stream backends
//! - [`SessionProvider`](session::SessionProvider) / [`Session`](session::Session):
//!   Voice connections

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod events;
pub mod protocol_constants;
pub mod queue;
pub mod resolver;
pub mod runtime;
pub mod services;
pub mod session;
pub mod state;
pub mod track;
pub mod utils;

// Re-export commonly used types at the crate root
pub use commands::{CommandKind, CommandRegistry, CommandReply, ParsedCommand};
pub use error::{ErrorCode, PsychosonusError, PsychosonusResult};
pub use events::{BroadcastEvent, BroadcastEventBridge, EventEmitter, PlaybackEvent, QueueEvent};
pub use queue::{QueueEntry, TrackQueue};
pub use resolver::{ResolveError, ResolvedSource, ResolverConfig, SourceResolver};
pub use runtime::{TaskSpawner, TokioSpawner};
pub use session::{PlayerConfig, Session, SessionError, SessionProvider};
pub use state::Config;
pub use track::{OriginKind, Track};
pub use utils::now_millis;

// Re-export service types
pub use services::{
    CatalogSource, CoordinatorHandle, PlaybackCoordinator, PlaybackState, PlayerStatus,
    SearchService,
};

// Re-export bootstrap types
pub use bootstrap::{bootstrap_services, bootstrap_services_with, Backends, BootstrappedServices};

// Re-export API types
pub use api::{start_server, AppState, AppStateBuilder, ServerError, WsConnectionManager};
