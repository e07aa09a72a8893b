//! Small helpers shared by the HTTP relay and the CONNECT tunnel: a timed
//! outbound connect, and the bare-bones error status lines the wire
//! protocol expects with no headers and no body.

use std::time::Duration;

use smol::io::AsyncWriteExt;
use smol::net::TcpStream;

pub enum ConnectError {
    TimedOut,
    Failed(std::io::Error),
}

pub async fn connect_with_timeout(
    host: &str,
    port: u16,
    timeout: Duration,
) -> Result<TcpStream, ConnectError> {
    enum Outcome {
        Connected(std::io::Result<TcpStream>),
        TimedOut,
    }

    let addr = format!("{host}:{port}");
    let connect_fut = async { Outcome::Connected(TcpStream::connect(addr.as_str()).await) };
    let timeout_fut = async {
        smol::Timer::after(timeout).await;
        Outcome::TimedOut
    };

    match smol::future::or(connect_fut, timeout_fut).await {
        Outcome::Connected(Ok(stream)) => Ok(stream),
        Outcome::Connected(Err(err)) => Err(ConnectError::Failed(err)),
        Outcome::TimedOut => Err(ConnectError::TimedOut),
    }
}

/// Writes an exact `HTTP/1.1 <code> <reason>\r\n\r\n` line with no headers
/// and no body, matching the wire form used for 502/504 error framing.
pub async fn write_status_line(stream: &mut TcpStream, code: u16, reason: &str) -> anyhow::Result<()> {
    let line = format!("HTTP/1.1 {code} {reason}\r\n\r\n");
    stream.write_all(line.as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}
