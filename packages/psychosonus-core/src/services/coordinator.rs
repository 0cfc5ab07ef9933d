//! Playback coordinator: the single-owner state machine that drains the queue.
//!
//! One loop task owns the voice session and the playback state. It reacts
//! to two inboxes:
//! - a bounded command inbox fed by [`CoordinatorHandle`](super::CoordinatorHandle),
//!   each command carrying a reply channel
//! - an unbounded internal inbox carrying resolution results and completion
//!   events, so neither can ever be dropped
//!
//! Resolution runs on spawned worker tasks; the loop only awaits its inboxes.
//! Every internal event is tagged with the generation it was started under.
//! Stop, disconnect and each new resolution bump the generation, which makes
//! any late result from an abandoned track harmless.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::error::{PsychosonusError, PsychosonusResult};
use crate::events::{EventEmitter, PlaybackEvent};
use crate::queue::TrackQueue;
use crate::resolver::{ResolveError, ResolvedSource, SourceResolver};
use crate::runtime::{TaskSpawner, TokioSpawner};
use crate::session::{CompletionReceiver, Session, SessionError, SessionProvider};
use crate::track::Track;
use crate::utils::now_millis;

/// Coordinator state. Only the loop writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackState {
    #[default]
    Idle,
    Resolving,
    Playing,
    Advancing,
}

/// Snapshot of the loop's state, published after every handled message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorStatus {
    pub state: PlaybackState,
    pub channel: Option<String>,
    pub session_id: Option<String>,
    pub playing: bool,
    pub paused: bool,
}

impl CoordinatorStatus {
    #[must_use]
    pub fn connected(&self) -> bool {
        self.channel.is_some()
    }
}

/// Result of a successful connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectOutcome {
    pub channel: String,
    pub session_id: String,
    /// `true` when the session was already on this channel.
    pub already_connected: bool,
}

/// What a pause toggle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PauseToggle {
    Paused,
    Resumed,
}

type Reply<T> = oneshot::Sender<PsychosonusResult<T>>;

/// External requests, each answered exactly once on its reply channel.
pub(crate) enum Command {
    /// Autoplay trigger. Replies whether playback started.
    Kick { reply: oneshot::Sender<bool> },
    Connect {
        channel: String,
        reply: Reply<ConnectOutcome>,
    },
    Disconnect { reply: Reply<()> },
    Skip { reply: Reply<Track> },
    Stop { reply: Reply<()> },
    Pause { reply: Reply<()> },
    Resume { reply: Reply<()> },
    TogglePause { reply: Reply<PauseToggle> },
    ForcePlay { reply: Reply<()> },
}

/// Results produced off the loop and fed back into it.
enum InternalEvent {
    Resolved {
        generation: u64,
        track: Track,
        result: Result<ResolvedSource, ResolveError>,
    },
    Completed {
        generation: u64,
        error: Option<SessionError>,
    },
}

/// Collaborators the coordinator drives.
#[derive(Clone)]
pub struct CoordinatorDeps {
    pub queue: Arc<TrackQueue>,
    pub resolver: Arc<SourceResolver>,
    pub provider: Arc<dyn SessionProvider>,
    pub emitter: Arc<dyn EventEmitter>,
}

/// Tunables for the loop.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorSettings {
    pub inbox_capacity: usize,
    /// Consecutive failed tracks after which auto-advance halts.
    pub max_consecutive_failures: u32,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            inbox_capacity: 64,
            max_consecutive_failures: 5,
        }
    }
}

/// Endpoints of a running coordinator loop.
pub struct CoordinatorChannels {
    pub(crate) commands: mpsc::Sender<Command>,
    pub(crate) status: watch::Receiver<CoordinatorStatus>,
    /// Resolves once the loop has released its session and exited.
    pub exited: oneshot::Receiver<()>,
}

/// The loop-owned state machine.
pub struct PlaybackCoordinator {
    deps: CoordinatorDeps,
    spawner: TokioSpawner,
    max_consecutive_failures: u32,

    state: PlaybackState,
    session: Option<Box<dyn Session>>,
    generation: u64,
    consecutive_failures: u32,
    /// Track currently being resolved or played.
    active_track: Option<Track>,

    status_tx: watch::Sender<CoordinatorStatus>,
    internal_tx: mpsc::UnboundedSender<InternalEvent>,
}

impl PlaybackCoordinator {
    /// Spawns the coordinator loop and returns its endpoints.
    ///
    /// The loop runs until `cancel` fires or every command sender is dropped.
    pub fn spawn(
        deps: CoordinatorDeps,
        settings: CoordinatorSettings,
        spawner: TokioSpawner,
        cancel: CancellationToken,
    ) -> CoordinatorChannels {
        let (command_tx, command_rx) = mpsc::channel(settings.inbox_capacity.max(1));
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(CoordinatorStatus::default());
        let (exited_tx, exited_rx) = oneshot::channel();

        let coordinator = Self {
            deps,
            spawner: spawner.clone(),
            max_consecutive_failures: settings.max_consecutive_failures.max(1),
            state: PlaybackState::Idle,
            session: None,
            generation: 0,
            consecutive_failures: 0,
            active_track: None,
            status_tx,
            internal_tx,
        };

        spawner.spawn(coordinator.run(command_rx, internal_rx, cancel, exited_tx));

        CoordinatorChannels {
            commands: command_tx,
            status: status_rx,
            exited: exited_rx,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut internal: mpsc::UnboundedReceiver<InternalEvent>,
        cancel: CancellationToken,
        exited: oneshot::Sender<()>,
    ) {
        log::info!("[Coordinator] Loop started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(event) = internal.recv() => self.handle_internal(event),
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
            }
            self.publish_status();
        }

        self.release_session().await;
        self.publish_status();
        log::info!("[Coordinator] Loop exited");
        let _ = exited.send(());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────────

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Kick { reply } => {
                let started = self.try_autoplay();
                self.respond(reply, started);
            }
            Command::Connect { channel, reply } => {
                let result = self.connect(channel).await;
                self.respond(reply, result);
            }
            Command::Disconnect { reply } => {
                let result = self.disconnect().await;
                self.respond(reply, result);
            }
            Command::Skip { reply } => {
                let result = self.skip();
                self.respond(reply, result);
            }
            Command::Stop { reply } => {
                let result = self.stop();
                self.respond(reply, result);
            }
            Command::Pause { reply } => {
                let result = self.pause();
                self.respond(reply, result);
            }
            Command::Resume { reply } => {
                let result = self.resume();
                self.respond(reply, result);
            }
            Command::TogglePause { reply } => {
                let result = self.toggle_pause();
                self.respond(reply, result);
            }
            Command::ForcePlay { reply } => {
                let result = self.force_play();
                self.respond(reply, result);
            }
        }
    }

    /// Publishes status before replying so callers observe the new state.
    fn respond<T>(&self, reply: oneshot::Sender<T>, value: T) {
        self.publish_status();
        let _ = reply.send(value);
    }

    /// Starts the next track if idle, connected and the queue has items.
    fn try_autoplay(&mut self) -> bool {
        if self.state != PlaybackState::Idle || self.session.is_none() || self.deps.queue.is_empty()
        {
            return false;
        }
        self.play_next();
        self.state == PlaybackState::Resolving
    }

    async fn connect(&mut self, channel: String) -> PsychosonusResult<ConnectOutcome> {
        let channel = channel.trim().to_string();
        if channel.is_empty() {
            return Err(PsychosonusError::InvalidRequest(
                "channel must not be empty".into(),
            ));
        }

        let existing = self
            .session
            .as_ref()
            .map(|s| (s.channel().to_string(), s.id().to_string()));
        if let Some((current_channel, session_id)) = existing {
            if current_channel == channel {
                return Ok(ConnectOutcome {
                    channel,
                    session_id,
                    already_connected: true,
                });
            }
            log::info!(
                "[Coordinator] Moving from '{}' to '{}'",
                current_channel,
                channel
            );
            self.release_session().await;
        }

        let session = self.deps.provider.connect(&channel).await?;
        let session_id = session.id().to_string();
        self.session = Some(session);

        log::info!("[Coordinator] Connected to '{}'", channel);
        self.deps.emitter.emit_playback(PlaybackEvent::Connected {
            channel: channel.clone(),
            session_id: session_id.clone(),
            timestamp: now_millis(),
        });

        self.try_autoplay();

        Ok(ConnectOutcome {
            channel,
            session_id,
            already_connected: false,
        })
    }

    async fn disconnect(&mut self) -> PsychosonusResult<()> {
        if self.session.is_none() {
            return Err(PsychosonusError::NotConnected);
        }
        self.release_session().await;
        Ok(())
    }

    fn skip(&mut self) -> PsychosonusResult<Track> {
        let session = self
            .session
            .as_mut()
            .ok_or(PsychosonusError::NotConnected)?;
        let active = session.is_playing() || session.is_paused();
        if self.state != PlaybackState::Playing || !active {
            return Err(PsychosonusError::NothingPlaying);
        }

        // Completion fires through the normal path and advances the queue.
        session.stop();

        let track = self
            .active_track
            .clone()
            .ok_or(PsychosonusError::NothingPlaying)?;
        log::info!("[Coordinator] Skipping '{}'", track);
        self.deps.emitter.emit_playback(PlaybackEvent::TrackSkipped {
            track: track.clone(),
            reason: "skipped by request".into(),
            timestamp: now_millis(),
        });
        Ok(track)
    }

    fn stop(&mut self) -> PsychosonusResult<()> {
        let session = self
            .session
            .as_mut()
            .ok_or(PsychosonusError::NotConnected)?;
        session.stop();

        self.generation += 1;
        self.deps.queue.clear();
        self.deps.queue.clear_current();
        self.active_track = None;
        self.consecutive_failures = 0;
        self.set_state(PlaybackState::Idle);

        log::info!("[Coordinator] Stopped and cleared queue");
        self.deps.emitter.emit_playback(PlaybackEvent::Stopped {
            timestamp: now_millis(),
        });
        Ok(())
    }

    fn pause(&mut self) -> PsychosonusResult<()> {
        let session = self
            .session
            .as_mut()
            .ok_or(PsychosonusError::NotConnected)?;
        if !session.is_playing() {
            return Err(PsychosonusError::NothingToPause);
        }
        session.pause()?;
        self.deps.emitter.emit_playback(PlaybackEvent::Paused {
            timestamp: now_millis(),
        });
        Ok(())
    }

    fn resume(&mut self) -> PsychosonusResult<()> {
        let session = self
            .session
            .as_mut()
            .ok_or(PsychosonusError::NotConnected)?;
        if !session.is_paused() {
            return Err(PsychosonusError::NotPaused);
        }
        session.resume()?;
        self.deps.emitter.emit_playback(PlaybackEvent::Resumed {
            timestamp: now_millis(),
        });
        Ok(())
    }

    fn toggle_pause(&mut self) -> PsychosonusResult<PauseToggle> {
        let paused = self
            .session
            .as_ref()
            .ok_or(PsychosonusError::NotConnected)?
            .is_paused();
        if paused {
            self.resume().map(|()| PauseToggle::Resumed)
        } else {
            self.pause().map(|()| PauseToggle::Paused)
        }
    }

    fn force_play(&mut self) -> PsychosonusResult<()> {
        if self.session.is_none() {
            return Err(PsychosonusError::NotConnected);
        }
        if self.state != PlaybackState::Idle {
            return Err(PsychosonusError::AlreadyPlaying);
        }
        if self.deps.queue.is_empty() {
            return Err(PsychosonusError::QueueEmpty);
        }
        self.play_next();
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal Events
    // ─────────────────────────────────────────────────────────────────────────

    fn handle_internal(&mut self, event: InternalEvent) {
        match event {
            InternalEvent::Resolved {
                generation,
                track,
                result,
            } => {
                if generation != self.generation || self.state != PlaybackState::Resolving {
                    log::debug!(
                        "[Coordinator] Discarding stale resolution for '{}' (generation {})",
                        track,
                        generation
                    );
                    return;
                }
                match result {
                    Ok(resolved) => self.begin_playback(track, resolved),
                    Err(e) => self.skip_failed(track, e.to_string()),
                }
            }
            InternalEvent::Completed { generation, error } => {
                if generation != self.generation || self.state != PlaybackState::Playing {
                    log::debug!(
                        "[Coordinator] Discarding stale completion (generation {})",
                        generation
                    );
                    return;
                }
                match (&error, &self.active_track) {
                    (Some(e), Some(track)) => {
                        log::warn!("[Coordinator] '{}' ended with error: {}", track, e)
                    }
                    (None, Some(track)) => log::info!("[Coordinator] Finished '{}'", track),
                    _ => {}
                }
                self.set_state(PlaybackState::Advancing);
                self.play_next();
            }
        }
    }

    /// Dequeues the next track and starts resolving it, or goes idle.
    fn play_next(&mut self) {
        match self.deps.queue.dequeue_next() {
            Some(track) => self.start_resolution(track),
            None => {
                self.active_track = None;
                self.set_state(PlaybackState::Idle);
                log::info!("[Coordinator] Queue empty");
                self.deps.emitter.emit_playback(PlaybackEvent::QueueEmpty {
                    timestamp: now_millis(),
                });
            }
        }
    }

    fn start_resolution(&mut self, track: Track) {
        self.generation += 1;
        let generation = self.generation;
        self.active_track = Some(track.clone());
        self.set_state(PlaybackState::Resolving);

        log::info!("[Coordinator] Resolving '{}'", track);
        let resolver = Arc::clone(&self.deps.resolver);
        let internal_tx = self.internal_tx.clone();
        self.spawner.spawn(async move {
            let result = resolver.resolve(&track).await;
            let _ = internal_tx.send(InternalEvent::Resolved {
                generation,
                track,
                result,
            });
        });
    }

    fn begin_playback(&mut self, track: Track, resolved: ResolvedSource) {
        self.deps
            .queue
            .cache_resolved_url(track.id(), &resolved.source_url);

        let started = match self.session.as_mut() {
            Some(session) => session.play(&resolved.stream_url),
            None => Err(SessionError::NotActive),
        };

        match started {
            Ok(completion) => {
                self.consecutive_failures = 0;
                let track = track.with_resolved_url(resolved.source_url.clone());
                self.active_track = Some(track.clone());
                self.set_state(PlaybackState::Playing);
                self.watch_completion(completion);

                log::info!(
                    "[Coordinator] Now playing '{}' ({})",
                    track,
                    resolved.format
                );
                self.deps.emitter.emit_playback(PlaybackEvent::NowPlaying {
                    track,
                    source_url: resolved.source_url,
                    timestamp: now_millis(),
                });
            }
            Err(e) => self.skip_failed(track, e.to_string()),
        }
    }

    /// Forwards the stream's single completion event into the loop.
    fn watch_completion(&self, completion: CompletionReceiver) {
        let generation = self.generation;
        let internal_tx = self.internal_tx.clone();
        self.spawner.spawn(async move {
            // A dropped sender means the stream is gone; treat it as ended.
            let error = completion.await.unwrap_or(None);
            let _ = internal_tx.send(InternalEvent::Completed { generation, error });
        });
    }

    /// Drops a track that could not be started and moves on, unless too
    /// many tracks in a row have failed.
    fn skip_failed(&mut self, track: Track, reason: String) {
        log::warn!("[Coordinator] Skipping '{}': {}", track, reason);
        self.deps.emitter.emit_playback(PlaybackEvent::TrackSkipped {
            track,
            reason,
            timestamp: now_millis(),
        });

        self.consecutive_failures += 1;
        self.set_state(PlaybackState::Advancing);

        if self.consecutive_failures >= self.max_consecutive_failures {
            let failures = self.consecutive_failures;
            let remaining = self.deps.queue.size();
            self.consecutive_failures = 0;
            self.active_track = None;
            self.set_state(PlaybackState::Idle);

            log::warn!(
                "[Coordinator] {} tracks failed in a row, halting auto-advance ({} still queued)",
                failures,
                remaining
            );
            self.deps
                .emitter
                .emit_playback(PlaybackEvent::AutoAdvanceHalted {
                    failures,
                    remaining,
                    timestamp: now_millis(),
                });
            return;
        }

        self.play_next();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Stops and disconnects the session, forcing `Idle`. Queued items stay.
    async fn release_session(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        session.stop();
        session.disconnect().await;

        self.generation += 1;
        self.deps.queue.clear_current();
        self.active_track = None;
        self.consecutive_failures = 0;
        self.set_state(PlaybackState::Idle);

        log::info!("[Coordinator] Disconnected from '{}'", session.channel());
        self.deps.emitter.emit_playback(PlaybackEvent::Disconnected {
            channel: session.channel().to_string(),
            session_id: session.id().to_string(),
            timestamp: now_millis(),
        });
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state == state {
            return;
        }
        log::debug!("[Coordinator] {:?} -> {:?}", self.state, state);
        self.state = state;
        self.deps.emitter.emit_playback(PlaybackEvent::StateChanged {
            state,
            track_id: self.active_track.as_ref().map(|t| t.id().to_string()),
            timestamp: now_millis(),
        });
    }

    fn publish_status(&self) {
        let status = CoordinatorStatus {
            state: self.state,
            channel: self.session.as_ref().map(|s| s.channel().to_string()),
            session_id: self.session.as_ref().map(|s| s.id().to_string()),
            playing: self.session.as_ref().is_some_and(|s| s.is_playing()),
            paused: self.session.as_ref().is_some_and(|s| s.is_paused()),
        };
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Scriptable collaborators shared by coordinator, bridge, command and API tests.

    use super::*;
    use crate::events::QueueEvent;
    use crate::resolver::{
        ExtractError, ResolverConfig, SearchError, StreamExtractor, TrackSearch,
    };
    use crate::session::{completion_pair, CompletionSender};
    use crate::track::OriginKind;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    // ── Session ──────────────────────────────────────────────────────────────

    /// Shared view into the mock sessions a provider handed out.
    #[derive(Default)]
    pub struct SessionRecorder {
        pub plays: Mutex<Vec<String>>,
        active: Mutex<Option<CompletionSender>>,
        paused: AtomicBool,
        pub fail_play: AtomicBool,
        pub connects: AtomicUsize,
        pub disconnects: AtomicUsize,
    }

    impl SessionRecorder {
        /// Ends the current stream as if the player finished.
        pub fn finish(&self, error: Option<SessionError>) -> bool {
            match self.active.lock().take() {
                Some(sender) => {
                    sender.fire(error);
                    true
                }
                None => false,
            }
        }

        pub fn play_count(&self) -> usize {
            self.plays.lock().len()
        }
    }

    pub struct MockProvider {
        pub recorder: Arc<SessionRecorder>,
    }

    #[async_trait]
    impl SessionProvider for MockProvider {
        async fn connect(&self, channel: &str) -> Result<Box<dyn Session>, SessionError> {
            let n = self.recorder.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockSession {
                id: format!("session-{n}"),
                channel: channel.to_string(),
                recorder: Arc::clone(&self.recorder),
            }))
        }
    }

    struct MockSession {
        id: String,
        channel: String,
        recorder: Arc<SessionRecorder>,
    }

    #[async_trait]
    impl Session for MockSession {
        fn id(&self) -> &str {
            &self.id
        }

        fn channel(&self) -> &str {
            &self.channel
        }

        fn play(&mut self, url: &str) -> Result<CompletionReceiver, SessionError> {
            if self.recorder.fail_play.load(Ordering::SeqCst) {
                return Err(SessionError::Spawn("mock player refused".into()));
            }
            self.stop();
            self.recorder.plays.lock().push(url.to_string());
            let (tx, rx) = completion_pair();
            *self.recorder.active.lock() = Some(tx);
            self.recorder.paused.store(false, Ordering::SeqCst);
            Ok(rx)
        }

        fn stop(&mut self) {
            self.recorder.paused.store(false, Ordering::SeqCst);
            self.recorder.finish(None);
        }

        fn pause(&mut self) -> Result<(), SessionError> {
            if self.recorder.active.lock().is_none() {
                return Err(SessionError::NotActive);
            }
            self.recorder.paused.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn resume(&mut self) -> Result<(), SessionError> {
            if self.recorder.active.lock().is_none() {
                return Err(SessionError::NotActive);
            }
            self.recorder.paused.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn is_playing(&self) -> bool {
            self.recorder.active.lock().is_some() && !self.recorder.paused.load(Ordering::SeqCst)
        }

        fn is_paused(&self) -> bool {
            self.recorder.active.lock().is_some() && self.recorder.paused.load(Ordering::SeqCst)
        }

        async fn disconnect(&mut self) {
            self.stop();
            self.recorder.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }

    // ── Resolution ───────────────────────────────────────────────────────────

    /// Search stub keyed by exact query text.
    #[derive(Default)]
    pub struct StubSearch {
        pub results: Mutex<HashMap<String, Vec<Track>>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl StubSearch {
        pub fn hit(&self, query: &str, url: &str) {
            let track = Track::new("hit", query, url, OriginKind::DirectlyPlayable);
            self.results.lock().insert(query.to_string(), vec![track]);
        }
    }

    #[async_trait]
    impl TrackSearch for StubSearch {
        async fn search(&self, query: &str, _limit: usize) -> Result<Vec<Track>, SearchError> {
            self.calls.lock().push(query.to_string());
            Ok(self.results.lock().get(query).cloned().unwrap_or_default())
        }
    }

    /// Extractor that maps any URL to a CDN URL, optionally gated so tests
    /// can hold a resolution in flight.
    pub struct StubExtractor {
        pub gate: Option<Arc<Semaphore>>,
        pub fail_urls: Mutex<Vec<String>>,
    }

    impl StubExtractor {
        pub fn open() -> Self {
            Self {
                gate: None,
                fail_urls: Mutex::new(Vec::new()),
            }
        }

        pub fn gated(gate: Arc<Semaphore>) -> Self {
            Self {
                gate: Some(gate),
                fail_urls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl StreamExtractor for StubExtractor {
        async fn extract(&self, url: &str, _format: &str) -> Result<Option<String>, ExtractError> {
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await.map_err(|e| ExtractError::Process(e.to_string()))?;
            }
            if self.fail_urls.lock().iter().any(|u| u == url) {
                return Err(ExtractError::Process("unavailable".into()));
            }
            Ok(Some(format!("{url}#stream")))
        }
    }

    // ── Events ───────────────────────────────────────────────────────────────

    #[derive(Default)]
    pub struct RecordingEmitter {
        pub playback: Mutex<Vec<PlaybackEvent>>,
        pub queue: Mutex<Vec<QueueEvent>>,
    }

    impl RecordingEmitter {
        /// State transitions in order, with the track they concerned.
        pub fn transitions(&self) -> Vec<(PlaybackState, Option<String>)> {
            self.playback
                .lock()
                .iter()
                .filter_map(|e| match e {
                    PlaybackEvent::StateChanged {
                        state, track_id, ..
                    } => Some((*state, track_id.clone())),
                    _ => None,
                })
                .collect()
        }

        pub fn count(&self, pred: impl Fn(&PlaybackEvent) -> bool) -> usize {
            self.playback.lock().iter().filter(|e| pred(e)).count()
        }
    }

    impl EventEmitter for RecordingEmitter {
        fn emit_playback(&self, event: PlaybackEvent) {
            self.playback.lock().push(event);
        }

        fn emit_queue(&self, event: QueueEvent) {
            self.queue.lock().push(event);
        }
    }

    // ── Harness ──────────────────────────────────────────────────────────────

    pub struct Harness {
        pub queue: Arc<TrackQueue>,
        pub recorder: Arc<SessionRecorder>,
        pub search: Arc<StubSearch>,
        pub extractor: Arc<StubExtractor>,
        pub events: Arc<RecordingEmitter>,
        pub cancel: CancellationToken,
        pub channels: CoordinatorChannels,
    }

    impl Harness {
        pub fn new(max_consecutive_failures: u32) -> Self {
            Self::with_extractor(StubExtractor::open(), max_consecutive_failures)
        }

        pub fn with_extractor(extractor: StubExtractor, max_consecutive_failures: u32) -> Self {
            let queue = Arc::new(TrackQueue::new(100));
            let recorder = Arc::new(SessionRecorder::default());
            let search = Arc::new(StubSearch::default());
            let extractor = Arc::new(extractor);
            let events = Arc::new(RecordingEmitter::default());
            let cancel = CancellationToken::new();

            let resolver = Arc::new(SourceResolver::new(
                search.clone(),
                extractor.clone(),
                ResolverConfig {
                    fallback_formats: Vec::new(),
                    ..ResolverConfig::default()
                },
            ));
            let deps = CoordinatorDeps {
                queue: Arc::clone(&queue),
                resolver,
                provider: Arc::new(MockProvider {
                    recorder: Arc::clone(&recorder),
                }),
                emitter: events.clone(),
            };
            let channels = PlaybackCoordinator::spawn(
                deps,
                CoordinatorSettings {
                    inbox_capacity: 16,
                    max_consecutive_failures,
                },
                TokioSpawner::current(),
                cancel.clone(),
            );

            Self {
                queue,
                recorder,
                search,
                extractor,
                events,
                cancel,
                channels,
            }
        }

        pub async fn send<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> PsychosonusResult<T> {
            let (tx, rx) = oneshot::channel();
            self.channels
                .commands
                .send(build(tx))
                .await
                .map_err(|_| PsychosonusError::Internal("loop gone".into()))?;
            rx.await
                .map_err(|_| PsychosonusError::Internal("no reply".into()))?
        }

        pub async fn kick(&self) -> bool {
            let (tx, rx) = oneshot::channel();
            self.channels
                .commands
                .send(Command::Kick { reply: tx })
                .await
                .ok();
            rx.await.unwrap_or(false)
        }

        pub async fn connect(&self, channel: &str) -> PsychosonusResult<ConnectOutcome> {
            let channel = channel.to_string();
            self.send(|reply| Command::Connect { channel, reply }).await
        }

        /// Waits until the published status satisfies `pred`.
        pub async fn wait_for(&self, pred: impl Fn(&CoordinatorStatus) -> bool) -> CoordinatorStatus {
            let mut rx = self.channels.status.clone();
            let status = tokio::time::timeout(std::time::Duration::from_secs(5), rx.wait_for(|s| pred(s)))
                .await
                .expect("status condition not reached in time")
                .expect("coordinator loop exited");
            status.clone()
        }

        /// Waits until the recorder reports `n` started streams.
        pub async fn wait_for_plays(&self, n: usize) {
            tokio::time::timeout(std::time::Duration::from_secs(5), async {
                while self.recorder.play_count() < n {
                    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                }
            })
            .await
            .expect("expected plays did not happen in time");
        }
    }

    pub fn yt(id: &str) -> Track {
        Track::new(
            id,
            format!("Video {id}"),
            format!("https://www.youtube.com/watch?v={id}"),
            OriginKind::DirectlyPlayable,
        )
    }

    pub fn catalog(id: &str, title: &str, artist: &str) -> Track {
        Track::new(
            id,
            title,
            format!("https://open.spotify.com/track/{id}"),
            OriginKind::MetadataOnly,
        )
        .with_artist(artist)
    }
}
