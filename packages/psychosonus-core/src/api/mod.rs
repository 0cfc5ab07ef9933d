//! HTTP/WebSocket API layer.
//!
//! Handlers are thin: queue operations go through the [`CoordinatorHandle`],
//! searches through the [`SearchService`], chat text through the
//! [`CommandRegistry`].

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::bootstrap::BootstrappedServices;
use crate::commands::CommandRegistry;
use crate::error::{PsychosonusError, PsychosonusResult};
use crate::events::BroadcastEventBridge;
use crate::services::{CoordinatorHandle, SearchService};
use crate::state::Config;

pub mod http;
pub mod response;
pub mod ws;
pub mod ws_connection;

pub use ws_connection::WsConnectionManager;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),

    #[error("No available ports in range {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub handle: CoordinatorHandle,
    pub search: SearchService,
    pub commands: Arc<CommandRegistry>,
    /// Source of the `/ws` event feed.
    pub event_bridge: Arc<BroadcastEventBridge>,
    pub ws_manager: Arc<WsConnectionManager>,
    pub config: Arc<Config>,
}

/// Builder for constructing an `AppState`.
#[derive(Default)]
pub struct AppStateBuilder {
    handle: Option<CoordinatorHandle>,
    search: Option<SearchService>,
    event_bridge: Option<Arc<BroadcastEventBridge>>,
    ws_manager: Option<Arc<WsConnectionManager>>,
    config: Option<Arc<Config>>,
}

impl AppStateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(mut self, handle: CoordinatorHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn search(mut self, search: SearchService) -> Self {
        self.search = Some(search);
        self
    }

    pub fn event_bridge(mut self, bridge: Arc<BroadcastEventBridge>) -> Self {
        self.event_bridge = Some(bridge);
        self
    }

    pub fn ws_manager(mut self, manager: Arc<WsConnectionManager>) -> Self {
        self.ws_manager = Some(manager);
        self
    }

    /// Defaults to [`Config::default`] when not set.
    pub fn config(mut self, config: Arc<Config>) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the `AppState`, failing if a required part is missing.
    pub fn build(self) -> PsychosonusResult<AppState> {
        fn missing(name: &str) -> PsychosonusError {
            PsychosonusError::Configuration(format!("{} is required", name))
        }

        let config = self.config.unwrap_or_default();
        Ok(AppState {
            handle: self.handle.ok_or_else(|| missing("handle"))?,
            search: self.search.ok_or_else(|| missing("search"))?,
            commands: Arc::new(CommandRegistry::new(config.command_prefix.clone())),
            event_bridge: self.event_bridge.ok_or_else(|| missing("event_bridge"))?,
            ws_manager: self.ws_manager.unwrap_or_default(),
            config,
        })
    }
}

impl AppState {
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }

    /// Builds the API state from bootstrapped services.
    pub fn new(services: &BootstrappedServices) -> Self {
        Self {
            handle: services.handle.clone(),
            search: services.search.clone(),
            commands: Arc::new(CommandRegistry::new(
                services.config.command_prefix.clone(),
            )),
            event_bridge: Arc::clone(&services.event_bridge),
            ws_manager: Arc::clone(&services.ws_manager),
            config: Arc::clone(&services.config),
        }
    }
}

async fn find_available_port(
    start: u16,
    end: u16,
) -> Result<(u16, tokio::net::TcpListener), ServerError> {
    for port in start..=end {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        if let Ok(listener) = tokio::net::TcpListener::bind(&addr).await {
            return Ok((port, listener));
        }
    }
    Err(ServerError::NoAvailablePort { start, end })
}

/// Serves the API until `shutdown` is cancelled.
///
/// Binds the configured port, or the first free port in `49400..=49410`
/// when the configured port is 0.
pub async fn start_server(state: AppState, shutdown: CancellationToken) -> Result<(), ServerError> {
    let preferred_port = state.config.preferred_port;
    let (port, listener) = if preferred_port > 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], preferred_port));
        (preferred_port, tokio::net::TcpListener::bind(&addr).await?)
    } else {
        find_available_port(49400, 49410).await?
    };

    log::info!("[Server] Listening on http://0.0.0.0:{}", port);
    let app = http::create_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    log::info!("[Server] Stopped");
    Ok(())
}
