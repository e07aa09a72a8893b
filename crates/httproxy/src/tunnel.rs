//! CONNECT tunneling: once the origin side is up, the proxy gets out of
//! the way and copies bytes in both directions until either side closes,
//! errors, or goes idle for too long.

use std::net::SocketAddr;
use std::time::Duration;

use smol::io::{AsyncReadExt, AsyncWriteExt};
use smol::net::TcpStream;

use crate::net::{connect_with_timeout, write_status_line, ConnectError};
use crate::parser::Request;
use crate::sink;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const IDLE_TIMEOUT: Duration = Duration::from_secs(300);
const COPY_CHUNK: usize = 8192;

/// Establishes the origin connection for a CONNECT request, acknowledges
/// it to the client, and then tunnels bytes until the connection ends.
pub async fn relay_connect(mut client: TcpStream, client_peer: SocketAddr, req: &Request) -> anyhow::Result<()> {
    let origin = match connect_with_timeout(&req.host, req.port, CONNECT_TIMEOUT).await {
        Ok(stream) => stream,
        Err(ConnectError::TimedOut) => {
            write_status_line(&mut client, 504, "Gateway Timeout").await.ok();
            sink::log_error(&format!("Timed out connecting to {}:{}", req.host, req.port));
            return Ok(());
        }
        Err(ConnectError::Failed(err)) => {
            write_status_line(&mut client, 502, "Bad Gateway").await.ok();
            sink::log_error(&format!("Failed to connect to {}:{}: {err}", req.host, req.port));
            return Ok(());
        }
    };

    client
        .write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n")
        .await?;
    client.flush().await?;

    sink::log_allowed(client_peer, &req.host, req.port, &req.request_line, "200", 0);

    tunnel(client, origin).await;
    Ok(())
}

async fn tunnel(client: TcpStream, origin: TcpStream) {
    let client_read = client.clone();
    let origin_write = origin.clone();
    let origin_read = origin;
    let client_write = client;

    let client_to_origin = smol::spawn(copy_until_idle(client_read, origin_write));
    let origin_to_client = smol::spawn(copy_until_idle(origin_read, client_write));

    // Whichever direction finishes first ends the tunnel; `or` drops (and
    // so cancels) the task that's still running, which closes its stream
    // clones once nothing else references them.
    smol::future::or(client_to_origin, origin_to_client).await;
}

async fn copy_until_idle(mut from: TcpStream, mut to: TcpStream) {
    enum Outcome {
        Read(std::io::Result<usize>),
        TimedOut,
    }

    let mut buf = [0u8; COPY_CHUNK];
    loop {
        let read_fut = async { Outcome::Read(from.read(&mut buf).await) };
        let timeout_fut = async {
            smol::Timer::after(IDLE_TIMEOUT).await;
            Outcome::TimedOut
        };

        let n = match smol::future::or(read_fut, timeout_fut).await {
            Outcome::Read(Ok(0)) | Outcome::TimedOut => return,
            Outcome::Read(Ok(n)) => n,
            Outcome::Read(Err(_)) => return,
        };

        if to.write_all(&buf[..n]).await.is_err() {
            return;
        }
    }
}
