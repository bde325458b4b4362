// ────────────────────────────────
// src/server/builder.rs
// ────────────────────────────────
use crate::config::Config;
use crate::metrics::MetricsCollector;
use crate::proxy::{
    display_list, BackendRegistry, Connector, ProxyError, RoutingController, TcpConnector,
};
use crate::server::handler::ConnectionHandler;
use crate::server::listener::bind_tcp;
use crate::server::ProxyServer;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Validates configuration, primes the backend order and starts accepting.
pub struct ServerBuilder<C: Connector = TcpConnector> {
    config: Config,
    connector: C,
    metrics: Option<Arc<MetricsCollector>>,
}

impl ServerBuilder<TcpConnector> {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            connector: TcpConnector,
            metrics: None,
        }
    }
}

impl<C: Connector> ServerBuilder<C> {
    /// Swap the outward connector (tests, custom transports).
    pub fn with_connector<D: Connector>(self, connector: D) -> ServerBuilder<D> {
        ServerBuilder {
            config: self.config,
            connector,
            metrics: self.metrics,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Start sequence: validate → normalize (and optionally shuffle) → prime
    /// → bind → accept. Configuration and bind errors are returned before
    /// any connection is accepted; a failed priming probe is only logged.
    pub async fn start(self) -> Result<ProxyServer, ProxyError> {
        let Self {
            config,
            connector,
            metrics,
        } = self;

        config.validate()?;
        let port = config.listen_port()?;

        let registry = Arc::new(BackendRegistry::from_specs(
            config.backend.as_ref(),
            config.shuffle,
        )?);
        tracing::info!(
            backends = %display_list(&registry.current_list()),
            connect_timeout_ms = config.connect_timeout,
            "Backends configured"
        );

        let mut controller =
            RoutingController::new(registry.clone(), connector, config.connect_timeout());
        if let Some(metrics) = metrics {
            metrics.set_backend_count(registry.len());
            controller = controller.with_metrics(metrics);
        }
        let controller = Arc::new(controller);

        controller.prime().await;

        let listener = bind_tcp(config.bind_host(), port).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "Failover proxy listening");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handler = ConnectionHandler::new(controller);
        let accept_task = tokio::spawn(accept_loop(listener, handler, shutdown_rx));

        Ok(ProxyServer::new(local_addr, registry, shutdown_tx, accept_task))
    }
}

async fn accept_loop<C: Connector>(
    listener: TcpListener,
    handler: ConnectionHandler<C>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "Accepted connection");
                    handler.spawn(stream, peer);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Accept error");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            },
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    tracing::info!("Listener closed, no longer accepting connections");
}
