//! Tracking for live event-feed sockets.
//!
//! Each `/ws` client registers with [`WsConnectionManager`] and holds a
//! [`ConnectionGuard`] for the lifetime of its handler. Shutdown calls
//! [`WsConnectionManager::close_all`], which cancels every guard's token.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::utils::now_millis;

struct ConnectionState {
    connected_at: u64,
}

/// Registry of active event-feed connections.
pub struct WsConnectionManager {
    connections: DashMap<String, ConnectionState>,
    next_id: AtomicU64,
    /// Parent of every connection token. Replaced after `close_all()` so
    /// later clients are not born cancelled.
    global_cancel: RwLock<CancellationToken>,
}

impl WsConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
            global_cancel: RwLock::new(CancellationToken::new()),
        }
    }

    /// Registers a connection; it is unregistered when the guard drops.
    pub fn register(self: &Arc<Self>) -> ConnectionGuard {
        let id = format!("ws-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let cancel_token = self.global_cancel.read().child_token();

        self.connections.insert(
            id.clone(),
            ConnectionState {
                connected_at: now_millis(),
            },
        );
        log::info!(
            "[WS] Listener registered: {} (total: {})",
            id,
            self.connections.len()
        );

        ConnectionGuard {
            id,
            manager: Arc::clone(self),
            cancel_token,
        }
    }

    fn unregister(&self, id: &str) {
        if let Some((_, state)) = self.connections.remove(id) {
            log::info!(
                "[WS] Listener unregistered: {} after {}ms (remaining: {})",
                id,
                now_millis().saturating_sub(state.connected_at),
                self.connections.len()
            );
        }
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Signals every connection to close. Returns how many were signalled.
    pub fn close_all(&self) -> usize {
        let count = self.connections.len();
        let mut guard = self.global_cancel.write();
        guard.cancel();
        *guard = CancellationToken::new();
        if count > 0 {
            log::info!("[WS] Closing {} listener(s)", count);
        }
        count
    }
}

impl Default for WsConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Unregisters its connection on drop.
pub struct ConnectionGuard {
    id: String,
    manager: Arc<WsConnectionManager>,
    cancel_token: CancellationToken,
}

impl ConnectionGuard {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Cancelled by [`WsConnectionManager::close_all`].
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.manager.unregister(&self.id);
    }
}
