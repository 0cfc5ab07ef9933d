//! Application bootstrap and dependency wiring.
//!
//! This module is the composition root: the single place where the queue,
//! resolver, session provider and coordinator are instantiated and wired
//! together.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::api::WsConnectionManager;
use crate::error::{PsychosonusError, PsychosonusResult};
use crate::events::{BroadcastEventBridge, EventEmitter, LoggingEventEmitter};
use crate::queue::TrackQueue;
use crate::resolver::{
    SourceResolver, SpotifyCatalog, StreamExtractor, TrackSearch, YtDlpClient,
};
use crate::runtime::TokioSpawner;
use crate::services::{
    CoordinatorDeps, CoordinatorHandle, PlaybackCoordinator, SearchService,
};
use crate::session::{ProcessSessionProvider, SessionProvider};
use crate::state::Config;

/// How long shutdown waits for the coordinator loop to release its session.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// External backends the core drives.
///
/// [`bootstrap_services`] fills this with the yt-dlp, Spotify and player
/// process adapters; tests substitute their own.
#[derive(Clone)]
pub struct Backends {
    pub youtube: Arc<dyn TrackSearch>,
    pub extractor: Arc<dyn StreamExtractor>,
    pub spotify: Option<Arc<dyn TrackSearch>>,
    pub provider: Arc<dyn SessionProvider>,
}

impl Backends {
    /// Builds the production adapters described by `config`.
    pub fn from_config(config: &Config, spawner: &TokioSpawner) -> PsychosonusResult<Self> {
        let ytdlp = Arc::new(YtDlpClient::new(config.ytdlp.clone()));

        let spotify = match config.spotify_credentials() {
            Some(credentials) => {
                let catalog = SpotifyCatalog::new(credentials.clone()).map_err(|e| {
                    PsychosonusError::Configuration(format!("Spotify client: {}", e))
                })?;
                log::info!("[Bootstrap] Spotify catalog enabled");
                Some(Arc::new(catalog) as Arc<dyn TrackSearch>)
            }
            None => {
                log::info!("[Bootstrap] Spotify catalog disabled (no credentials)");
                None
            }
        };

        Ok(Self {
            youtube: Arc::clone(&ytdlp) as Arc<dyn TrackSearch>,
            extractor: ytdlp,
            spotify,
            provider: Arc::new(ProcessSessionProvider::new(
                config.player.clone(),
                spawner.clone(),
            )),
        })
    }
}

/// Container for all bootstrapped services.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// Handle request handlers use to reach the coordinator.
    pub handle: CoordinatorHandle,
    pub search: SearchService,
    /// Event fan-out for WebSocket clients.
    pub event_bridge: Arc<BroadcastEventBridge>,
    pub ws_manager: Arc<WsConnectionManager>,
    pub config: Arc<Config>,
    pub spawner: TokioSpawner,
    /// Cancelled on shutdown; stops the coordinator loop and the server.
    pub cancel_token: CancellationToken,
    coordinator_exited: Arc<Mutex<Option<oneshot::Receiver<()>>>>,
}

impl BootstrappedServices {
    /// Stops the coordinator, closes event feeds and waits for the loop to
    /// release its session.
    pub async fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");

        self.cancel_token.cancel();

        let closed = self.ws_manager.close_all();
        if closed > 0 {
            log::info!("[Bootstrap] Closed {} WebSocket connection(s)", closed);
        }

        let exited = self.coordinator_exited.lock().take();
        if let Some(exited) = exited {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, exited).await {
                Ok(_) => log::info!("[Bootstrap] Coordinator stopped"),
                Err(_) => log::warn!(
                    "[Bootstrap] Coordinator did not stop within {:?}",
                    SHUTDOWN_TIMEOUT
                ),
            }
        }

        log::info!("[Bootstrap] Shutdown complete");
    }
}

/// Bootstraps all services with the production backends.
///
/// # Errors
///
/// Returns [`PsychosonusError::Configuration`] if `config` is invalid or a
/// backend cannot be constructed.
pub fn bootstrap_services(
    config: &Config,
    spawner: TokioSpawner,
) -> PsychosonusResult<BootstrappedServices> {
    config.validate().map_err(PsychosonusError::Configuration)?;
    let backends = Backends::from_config(config, &spawner)?;
    bootstrap_services_with(config, spawner, backends)
}

/// Bootstraps all services around the given backends.
///
/// Wiring order:
///
/// 1. Event bridge (logging emitter attached)
/// 2. Queue and resolver
/// 3. Coordinator loop (spawned)
/// 4. Handle and search service
pub fn bootstrap_services_with(
    config: &Config,
    spawner: TokioSpawner,
    backends: Backends,
) -> PsychosonusResult<BootstrappedServices> {
    config.validate().map_err(PsychosonusError::Configuration)?;

    let event_bridge = Arc::new(BroadcastEventBridge::new(config.event_channel_capacity));
    event_bridge.set_external_emitter(Arc::new(LoggingEventEmitter));
    let emitter = Arc::clone(&event_bridge) as Arc<dyn EventEmitter>;

    let cancel_token = CancellationToken::new();
    let queue = Arc::new(TrackQueue::new(config.max_queue_size));
    let resolver = Arc::new(SourceResolver::new(
        Arc::clone(&backends.youtube),
        Arc::clone(&backends.extractor),
        config.resolver.clone(),
    ));

    let channels = PlaybackCoordinator::spawn(
        CoordinatorDeps {
            queue: Arc::clone(&queue),
            resolver,
            provider: backends.provider,
            emitter: Arc::clone(&emitter),
        },
        config.coordinator_settings(),
        spawner.clone(),
        cancel_token.clone(),
    );

    let handle = CoordinatorHandle::new(queue, &channels, emitter, config.bridge_timeout());
    let search = SearchService::new(backends.youtube, backends.spotify);

    log::info!(
        "[Bootstrap] Services ready (queue capacity {}, bridge timeout {:?})",
        config.max_queue_size,
        config.bridge_timeout()
    );

    Ok(BootstrappedServices {
        handle,
        search,
        event_bridge,
        ws_manager: Arc::new(WsConnectionManager::new()),
        config: Arc::new(config.clone()),
        spawner,
        cancel_token,
        coordinator_exited: Arc::new(Mutex::new(Some(channels.exited))),
    })
}
