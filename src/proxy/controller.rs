// ────────────────────────────────
// src/proxy/controller.rs
// Per-connection probe → rotate → relay orchestration
// ────────────────────────────────

use super::backend::Backend;
use super::pool::BackendRegistry;
use super::prober::{BackendProber, Connector, ProbeOutcome, TcpConnector};
use super::relay::{relay, RelayStats};
use crate::config::ConfigError;
use crate::metrics::MetricsCollector;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

const EARLY_DATA_LIMIT: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("all {attempts} backends unreachable")]
    AllBackendsUnreachable { attempts: usize },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Probing,
    Routed(Backend),
    Dropped,
}

/// One inbound connection from accept until its relay ends or it is dropped.
#[derive(Debug)]
pub struct ConnectionSession {
    id: Uuid,
    peer: SocketAddr,
    state: SessionState,
}

impl ConnectionSession {
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer,
            state: SessionState::Probing,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "Session state change");
        self.state = next;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Routed to `backend`; the relay has finished.
    Relayed { backend: Backend, stats: RelayStats },
    /// The client hung up while backends were still being probed.
    Abandoned,
}

pub struct RoutingController<C: Connector = TcpConnector> {
    registry: Arc<BackendRegistry>,
    prober: BackendProber<C>,
    connect_timeout: Duration,
    metrics: Option<Arc<MetricsCollector>>,
}

impl<C: Connector> RoutingController<C> {
    pub fn new(registry: Arc<BackendRegistry>, connector: C, connect_timeout: Duration) -> Self {
        Self {
            registry,
            prober: BackendProber::new(connector),
            connect_timeout,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.prober = self.prober.with_metrics(metrics.clone());
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    pub fn metrics(&self) -> Option<&Arc<MetricsCollector>> {
        self.metrics.as_ref()
    }

    /// Run one probe/rotate cycle without a client attached, to settle the
    /// preference order before traffic arrives. The connection it opens is
    /// closed straight away.
    pub async fn prime(&self) -> Option<Backend> {
        let snapshot = self.registry.current_list();

        match self.prober.probe(&snapshot, self.connect_timeout).await {
            ProbeOutcome::Success {
                backend,
                stream,
                attempts,
            } => {
                drop(stream);
                let rotated = self.rotate(&backend);
                if let (true, Some(metrics)) = (rotated, &self.metrics) {
                    metrics.record_rotation();
                }
                info!(backend = %backend, attempts, rotated, "Priming probe succeeded");
                Some(backend)
            }
            ProbeOutcome::Exhausted { attempts } => {
                warn!(attempts, "Priming probe found no reachable backend");
                None
            }
        }
    }

    /// Probe for a backend on behalf of `inbound`, then relay.
    ///
    /// Returns `AllBackendsUnreachable` after closing `inbound` when no
    /// backend answers. If the client goes away mid-probe, the in-flight
    /// attempt is dropped and the list is left as it was. Bytes the client
    /// sends while probing are held and written to the backend first.
    pub async fn route(
        &self,
        inbound: TcpStream,
        session: &mut ConnectionSession,
    ) -> Result<SessionOutcome, ProxyError> {
        session.transition(SessionState::Probing);
        let snapshot = self.registry.current_list();
        let mut early = Vec::new();

        let outcome = tokio::select! {
            outcome = self.prober.probe(&snapshot, self.connect_timeout) => outcome,
            _ = watch_client(&inbound, &mut early) => {
                session.transition(SessionState::Dropped);
                debug!("Client disconnected before a backend was found");
                return Ok(SessionOutcome::Abandoned);
            }
        };

        match outcome {
            ProbeOutcome::Success {
                backend,
                mut stream,
                attempts,
            } => {
                session.transition(SessionState::Routed(backend.clone()));
                let rotated = self.rotate(&backend);
                if let Some(metrics) = &self.metrics {
                    metrics.record_routed(&backend.to_string(), rotated);
                }
                info!(backend = %backend, attempts, rotated, "Session routed");

                if !early.is_empty() {
                    stream.write_all(&early).await?;
                }
                let mut stats = relay(inbound, stream).await?;
                stats.to_backend += early.len() as u64;
                if let Some(metrics) = &self.metrics {
                    metrics.record_relayed(stats.to_backend, stats.from_backend);
                }
                debug!(
                    bytes_to_backend = stats.to_backend,
                    bytes_from_backend = stats.from_backend,
                    "Relay finished"
                );

                Ok(SessionOutcome::Relayed { backend, stats })
            }
            ProbeOutcome::Exhausted { attempts } => {
                session.transition(SessionState::Dropped);
                drop(inbound);
                if let Some(metrics) = &self.metrics {
                    metrics.record_dropped();
                }
                warn!(attempts, "All backends unreachable, dropping connection");
                Err(ProxyError::AllBackendsUnreachable { attempts })
            }
        }
    }

    fn rotate(&self, backend: &Backend) -> bool {
        self.registry.rotate(backend)
    }
}

/// Resolves once the client has closed (EOF) or errored. Anything it sends
/// meanwhile is appended to `early`; past `EARLY_DATA_LIMIT` reading stops
/// and TCP backpressure holds the rest.
async fn watch_client(stream: &TcpStream, early: &mut Vec<u8>) {
    let mut buf = [0u8; 1024];
    loop {
        if early.len() >= EARLY_DATA_LIMIT {
            return std::future::pending::<()>().await;
        }
        if stream.readable().await.is_err() {
            return;
        }
        match stream.try_read(&mut buf) {
            Ok(0) => return,
            Ok(n) => early.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
            Err(_) => return,
        }
    }
}
