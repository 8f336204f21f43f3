use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use {
    tokio::sync::{Mutex, RwLock},
    tokio_util::sync::CancellationToken,
    tracing::info,
};

use pairlink_config::SessionConfig;

use crate::lifecycle::LifecycleManager;

// ── Connected client ─────────────────────────────────────────────────────────

/// Bookkeeping for one open WebSocket, independent of the role it holds.
#[derive(Debug, Clone)]
pub struct ConnectedClient {
    pub conn_id: String,
    pub remote_addr: SocketAddr,
    pub connected_at: Instant,
    pub last_activity: Instant,
}

impl ConnectedClient {
    pub fn new(conn_id: impl Into<String>, remote_addr: SocketAddr) -> Self {
        let now = Instant::now();
        Self {
            conn_id: conn_id.into(),
            remote_addr,
            connected_at: now,
            last_activity: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn connected_for(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

// ── Gateway state ────────────────────────────────────────────────────────────

/// Shared gateway runtime state, wrapped in Arc for use across async tasks.
pub struct GatewayState {
    /// Session state machine. Every transition happens under this lock.
    pub lifecycle: Mutex<LifecycleManager>,
    /// All open WebSocket connections, keyed by conn_id.
    pub clients: RwLock<HashMap<String, ConnectedClient>>,
    /// Server version string.
    pub version: String,
    /// Cancelled once shutdown has started.
    pub shutdown: CancellationToken,
}

impl GatewayState {
    pub fn new(config: &SessionConfig) -> Arc<Self> {
        Self::with_lifecycle(LifecycleManager::from_config(config))
    }

    pub fn with_lifecycle(lifecycle: LifecycleManager) -> Arc<Self> {
        Arc::new(Self {
            lifecycle: Mutex::new(lifecycle),
            clients: RwLock::new(HashMap::new()),
            version: env!("CARGO_PKG_VERSION").to_string(),
            shutdown: CancellationToken::new(),
        })
    }

    pub async fn register_client(&self, client: ConnectedClient) {
        let conn_id = client.conn_id.clone();
        self.clients.write().await.insert(conn_id, client);
    }

    /// Remove a client by conn_id. Returns the removed client if found.
    pub async fn remove_client(&self, conn_id: &str) -> Option<ConnectedClient> {
        self.clients.write().await.remove(conn_id)
    }

    pub async fn touch_client(&self, conn_id: &str) {
        if let Some(client) = self.clients.write().await.get_mut(conn_id) {
            client.touch();
        }
    }

    /// Number of open connections, whatever their role.
    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Code currently accepted for joining.
    pub async fn current_code(&self) -> String {
        self.lifecycle.lock().await.code().to_string()
    }

    /// Tell every participant the server is going away, then cancel all
    /// connection loops. Safe to call more than once.
    pub async fn begin_shutdown(&self, reason: &str) {
        if self.shutdown.is_cancelled() {
            return;
        }
        info!(reason, "shutting down");
        self.lifecycle.lock().await.shutdown(reason);
        self.shutdown.cancel();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {super::*, crate::outbox::Outbox};

    fn addr() -> SocketAddr {
        "127.0.0.1:4000".parse().unwrap()
    }

    #[tokio::test]
    async fn client_bookkeeping() {
        let state = GatewayState::new(&SessionConfig::default());
        state.register_client(ConnectedClient::new("a", addr())).await;
        state.register_client(ConnectedClient::new("b", addr())).await;
        assert_eq!(state.client_count().await, 2);

        state.touch_client("a").await;
        let removed = state.remove_client("a").await.unwrap();
        assert_eq!(removed.conn_id, "a");
        assert!(state.remove_client("a").await.is_none());
        assert_eq!(state.client_count().await, 1);
    }

    #[tokio::test]
    async fn shutdown_cancels_once_and_notifies() {
        let state = GatewayState::new(&SessionConfig::default());
        let (monitor, mut rx) = Outbox::new("m");
        state.lifecycle.lock().await.attach_monitor(&monitor);
        while rx.try_recv().is_ok() {}

        state.begin_shutdown("bye").await;
        state.begin_shutdown("bye again").await;
        assert!(state.shutdown.is_cancelled());
        assert!(state.lifecycle.lock().await.is_shutting_down());

        let mut notices = 0;
        while let Ok(item) = rx.try_recv() {
            if let crate::outbox::Outbound::Frame(json) = item {
                assert!(json.contains("\"reason\":\"bye\""));
                notices += 1;
            }
        }
        assert_eq!(notices, 1);
    }

    #[tokio::test]
    async fn code_is_exposed_for_banner() {
        let state = GatewayState::new(&SessionConfig::default());
        assert!(state.current_code().await.starts_with("SCP-"));
    }
}
