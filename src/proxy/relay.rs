//
// src/proxy/relay.rs
//

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const RELAY_BUF_SIZE: usize = 8192;

/// Byte counts for one finished relay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub to_backend: u64,
    pub from_backend: u64,
}

/// Forward bytes in both directions until either side closes or errors, then
/// shut down and close both connections. Payload is not inspected.
pub async fn relay<A, B>(inbound: A, outbound: B) -> io::Result<RelayStats>
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_read, mut client_write) = tokio::io::split(inbound);
    let (mut backend_read, mut backend_write) = tokio::io::split(outbound);
    let mut to_backend = 0u64;
    let mut from_backend = 0u64;

    let finished = tokio::select! {
        result = pump(&mut client_read, &mut backend_write, &mut to_backend) => result,
        result = pump(&mut backend_read, &mut client_write, &mut from_backend) => result,
    };

    // The peer may already be gone; closing is best effort.
    let _ = client_write.shutdown().await;
    let _ = backend_write.shutdown().await;

    finished?;
    Ok(RelayStats {
        to_backend,
        from_backend,
    })
}

/// Copy until EOF, counting each chunk once it has been written.
async fn pump<R, W>(reader: &mut R, writer: &mut W, copied: &mut u64) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; RELAY_BUF_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
        *copied += n as u64;
    }
}
