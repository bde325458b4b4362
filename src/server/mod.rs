pub mod builder;
pub mod handler;
pub mod listener;

pub use builder::ServerBuilder;
pub use handler::ConnectionHandler;

use crate::proxy::BackendRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// A running proxy, returned once startup (including priming) has finished.
pub struct ProxyServer {
    local_addr: SocketAddr,
    registry: Arc<BackendRegistry>,
    shutdown_tx: watch::Sender<bool>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl ProxyServer {
    pub(crate) fn new(
        local_addr: SocketAddr,
        registry: Arc<BackendRegistry>,
        shutdown_tx: watch::Sender<bool>,
        accept_task: JoinHandle<()>,
    ) -> Self {
        Self {
            local_addr,
            registry,
            shutdown_tx,
            accept_task: Mutex::new(Some(accept_task)),
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    /// Stop accepting and release the listening socket. Returns once the
    /// socket is closed; sessions already relaying keep running. Calling it
    /// again is a no-op.
    pub async fn close(&self) {
        let _ = self.shutdown_tx.send(true);

        if let Some(task) = self.accept_task.lock().await.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Accept loop task failed");
            }
        }
    }
}
