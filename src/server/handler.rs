// src/server/handler.rs
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::proxy::{
    ConnectionSession, Connector, ProxyError, RoutingController, SessionOutcome, TcpConnector,
};

/// Hands each accepted connection to the routing controller on its own task.
pub struct ConnectionHandler<C: Connector = TcpConnector> {
    controller: Arc<RoutingController<C>>,
}

impl<C: Connector> Clone for ConnectionHandler<C> {
    fn clone(&self) -> Self {
        Self {
            controller: self.controller.clone(),
        }
    }
}

impl<C: Connector> ConnectionHandler<C> {
    pub fn new(controller: Arc<RoutingController<C>>) -> Self {
        Self { controller }
    }

    pub fn spawn(&self, stream: TcpStream, peer: SocketAddr) -> JoinHandle<()> {
        let controller = self.controller.clone();
        let mut session = ConnectionSession::new(peer);
        let span = tracing::info_span!("session", id = %session.id(), peer = %peer);

        tokio::spawn(
            async move {
                let metrics = controller.metrics().cloned();
                if let Some(metrics) = &metrics {
                    metrics.session_opened();
                }

                match controller.route(stream, &mut session).await {
                    Ok(SessionOutcome::Relayed { backend, stats }) => {
                        tracing::debug!(
                            backend = %backend,
                            bytes_to_backend = stats.to_backend,
                            bytes_from_backend = stats.from_backend,
                            "Session closed"
                        );
                    }
                    Ok(SessionOutcome::Abandoned) => {}
                    // Already logged by the controller.
                    Err(ProxyError::AllBackendsUnreachable { .. }) => {}
                    Err(err) => {
                        tracing::debug!(%err, state = ?session.state(), "Session ended with error");
                    }
                }

                if let Some(metrics) = &metrics {
                    metrics.session_closed();
                }
            }
            .instrument(span),
        )
    }
}
