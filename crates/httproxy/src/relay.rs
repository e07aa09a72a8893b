//! Plain HTTP relay: forward the client's raw request bytes to the origin
//! and stream its response straight back, chunk by chunk, rather than
//! buffering the whole thing.

use std::net::SocketAddr;
use std::time::Duration;

use smol::io::{AsyncReadExt, AsyncWriteExt};
use smol::net::TcpStream;

use crate::net::{connect_with_timeout, write_status_line, ConnectError};
use crate::parser::Request;
use crate::sink;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const CHUNK_SIZE: usize = 8192;

/// Relays a non-CONNECT request to `req.host:req.port` and streams the
/// response back to `client`. Connect failures are reported to the client
/// as 502/504 and logged, never propagated as a hard error — one bad
/// origin must not take down the accept loop.
pub async fn relay_http(client: &mut TcpStream, client_peer: SocketAddr, req: &Request) -> anyhow::Result<()> {
    let mut origin = match connect_with_timeout(&req.host, req.port, CONNECT_TIMEOUT).await {
        Ok(stream) => stream,
        Err(ConnectError::TimedOut) => {
            write_status_line(client, 504, "Gateway Timeout").await.ok();
            sink::log_error(&format!("Timed out connecting to {}:{}", req.host, req.port));
            return Ok(());
        }
        Err(ConnectError::Failed(err)) => {
            write_status_line(client, 502, "Bad Gateway").await.ok();
            sink::log_error(&format!("Failed to connect to {}:{}: {err}", req.host, req.port));
            return Ok(());
        }
    };

    origin.write_all(&req.raw).await?;
    origin.flush().await?;

    let mut buf = [0u8; CHUNK_SIZE];
    let mut total = 0u64;
    let mut status_code: Option<String> = None;

    loop {
        let n = origin.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        if status_code.is_none() {
            status_code = Some(extract_status_code(&buf[..n]));
        }
        client.write_all(&buf[..n]).await?;
        total += n as u64;
    }
    client.flush().await.ok();

    sink::log_allowed(
        client_peer,
        &req.host,
        req.port,
        &req.request_line,
        status_code.as_deref().unwrap_or("000"),
        total,
    );
    Ok(())
}

/// Pulls the status code out of the first chunk of the response, if that
/// chunk happens to contain the whole status line. A response whose status
/// line straddles two reads falls back to `000` — extracting it would mean
/// buffering until a CRLF shows up, which defeats the point of streaming.
fn extract_status_code(chunk: &[u8]) -> String {
    let text = String::from_utf8_lossy(chunk);
    let Some(line) = text.split("\r\n").next() else {
        return "000".to_string();
    };
    if !line.starts_with("HTTP/") {
        return "000".to_string();
    }
    match line.split_whitespace().nth(1) {
        Some(code) if code.len() == 3 && code.bytes().all(|b| b.is_ascii_digit()) => code.to_string(),
        _ => "000".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_status_from_full_line() {
        assert_eq!(extract_status_code(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n"), "200");
        assert_eq!(extract_status_code(b"HTTP/1.1 404 Not Found\r\n\r\n"), "404");
    }

    #[test]
    fn falls_back_on_split_status_line() {
        assert_eq!(extract_status_code(b"HTTP/1.1 2"), "000");
    }

    #[test]
    fn falls_back_on_non_status_chunk() {
        assert_eq!(extract_status_code(b"not an http response"), "000");
    }
}
