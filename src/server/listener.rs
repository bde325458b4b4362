// ────────────────────────────────
// src/server/listener.rs
// Encapsulates low‑level TCP bind so bind failures surface as ProxyError.
// ────────────────────────────────
use crate::proxy::ProxyError;
use tokio::net::TcpListener;

pub async fn bind_tcp(host: &str, port: u16) -> Result<TcpListener, ProxyError> {
    TcpListener::bind((host, port))
        .await
        .map_err(|source| ProxyError::Bind {
            addr: format!("{}:{}", host, port),
            source,
        })
}
