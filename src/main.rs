// src/main.rs
use anyhow::Result;
use hyper::{Body, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use tcp_failover::{
    config,
    metrics::MetricsRegistry,
    server::ServerBuilder,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());

    let config = config::load_config(&config_path).await?;

    // Initialize tracing
    if config.log {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive("tcp_failover=info".parse()?),
            )
            .init();
    }

    info!("Loaded configuration from: {}", config_path);

    let mut builder = ServerBuilder::new(config.clone());

    // Start metrics server if enabled
    if config.metrics.enabled {
        let metrics_registry = MetricsRegistry::new()?;
        builder = builder.with_metrics(metrics_registry.collector());

        let metrics_addr: SocketAddr = ([0, 0, 0, 0], config.metrics.port).into();
        start_metrics_server(metrics_addr, metrics_registry, config.metrics.path.clone());
    }

    let server = builder.start().await?;
    info!(
        "Failover proxy on {} routing to {} backend(s)",
        server.local_addr(),
        server.registry().len()
    );

    shutdown_signal().await;
    server.close().await;

    Ok(())
}

fn start_metrics_server(addr: SocketAddr, registry: MetricsRegistry, path: String) {
    let registry = Arc::new(registry);
    let metrics_path = Arc::new(path);
    let service_path = metrics_path.clone();

    let make_service = hyper::service::make_service_fn(move |_| {
        let registry = registry.clone();
        let path = service_path.clone();

        async move {
            Ok::<_, Infallible>(hyper::service::service_fn(move |req: Request<Body>| {
                let registry = registry.clone();
                let path = path.clone();

                async move {
                    if req.uri().path() != path.as_str() {
                        return Response::builder()
                            .status(StatusCode::NOT_FOUND)
                            .body(Body::from("Not Found"));
                    }

                    match registry.gather() {
                        Ok(metrics) => Response::builder()
                            .status(StatusCode::OK)
                            .header("Content-Type", "text/plain; version=0.0.4")
                            .body(Body::from(metrics)),
                        Err(e) => Response::builder()
                            .status(StatusCode::INTERNAL_SERVER_ERROR)
                            .body(Body::from(e.to_string())),
                    }
                }
            }))
        }
    });

    info!(
        "Metrics server listening on http://{}{}",
        addr,
        metrics_path.as_str()
    );

    tokio::spawn(async move {
        match Server::try_bind(&addr) {
            Ok(server) => {
                if let Err(e) = server.serve(make_service).await {
                    error!("Metrics server error: {}", e);
                }
            }
            Err(e) => error!("Metrics server failed to bind {}: {}", addr, e),
        }
    });
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
