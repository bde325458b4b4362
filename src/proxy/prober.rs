//
// src/proxy/prober.rs
//

use super::backend::Backend;
use crate::metrics::MetricsCollector;
use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Opens outward connections to backends.
///
/// Implementations must give up after `connect_timeout` and release any
/// half-open resource when they fail.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    async fn connect(&self, backend: &Backend, connect_timeout: Duration)
        -> io::Result<Self::Stream>;
}

/// Plain TCP connector with DNS resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, backend: &Backend, connect_timeout: Duration) -> io::Result<TcpStream> {
        match timeout(connect_timeout, TcpStream::connect(backend.connect_target())).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "connect timeout")),
        }
    }
}

#[derive(Debug)]
pub enum ProbeOutcome<S> {
    /// `backend` accepted the connection after `attempts` tries.
    Success {
        backend: Backend,
        stream: S,
        attempts: usize,
    },
    /// Every backend in the list failed once.
    Exhausted { attempts: usize },
}

impl<S> ProbeOutcome<S> {
    pub fn attempts(&self) -> usize {
        match self {
            ProbeOutcome::Success { attempts, .. } | ProbeOutcome::Exhausted { attempts } => {
                *attempts
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Success { .. })
    }
}

/// Walks a backend list in priority order until one accepts a connection.
pub struct BackendProber<C = TcpConnector> {
    connector: C,
    metrics: Option<Arc<MetricsCollector>>,
}

impl<C: Connector> BackendProber<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Try each backend once, strictly in order, with at most one connect in
    /// flight. Stops at the first success; later candidates are not touched.
    ///
    /// Refusals, DNS failures and timeouts are all treated as "advance to the
    /// next candidate". A timed-out attempt is dropped before the next one
    /// starts, which closes its socket.
    pub async fn probe(&self, list: &[Backend], per_attempt: Duration) -> ProbeOutcome<C::Stream> {
        for (index, backend) in list.iter().enumerate() {
            let attempt = index + 1;
            let started = Instant::now();

            let result = match timeout(per_attempt, self.connector.connect(backend, per_attempt)).await
            {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "connect timeout")),
            };

            if let Some(metrics) = &self.metrics {
                metrics.record_attempt(&backend.to_string(), result.is_ok(), started.elapsed());
            }

            match result {
                Ok(stream) => {
                    debug!(backend = %backend, attempt, "Backend accepted connection");
                    return ProbeOutcome::Success {
                        backend: backend.clone(),
                        stream,
                        attempts: attempt,
                    };
                }
                Err(e) => {
                    debug!(
                        backend = %backend,
                        attempt,
                        error = %e,
                        "Backend attempt failed, trying next"
                    );
                }
            }
        }

        ProbeOutcome::Exhausted {
            attempts: list.len(),
        }
    }
}
