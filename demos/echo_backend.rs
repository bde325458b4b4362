//! demos/echo_backend.rs
//! Run: cargo run --example echo_backend -- <port> [name]
//!
//! A TCP echo server to stand behind the failover proxy. Start two of them,
//! point the proxy at both, then stop one to watch traffic move over.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let port: u16 = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "8001".into())
        .parse()?;
    let name = std::env::args()
        .nth(2)
        .or_else(|| std::env::var("BACKEND_NAME").ok())
        .unwrap_or_else(|| format!("backend-{port}"));

    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let sessions = Arc::new(AtomicU64::new(0));

    println!("Echo backend '{}' on {}", name, listener.local_addr()?);

    loop {
        let (mut stream, peer) = listener.accept().await?;
        let n = sessions.fetch_add(1, Ordering::SeqCst) + 1;
        let name = name.clone();

        tokio::spawn(async move {
            println!("[{}] session {} from {}", name, n, peer);
            let mut buf = vec![0u8; 8192];
            loop {
                match stream.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(read) => {
                        if stream.write_all(&buf[..read]).await.is_err() {
                            break;
                        }
                    }
                }
            }
            println!("[{}] session {} closed", name, n);
        });
    }
}
