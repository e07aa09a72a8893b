//! Accept loop and supervisor: binds the listener, polls it with a short
//! timeout so shutdown is noticed promptly, admits connections through a
//! non-blocking limiter (shedding, not queueing, once it's full), and
//! drains in-flight handlers before the process exits.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use smol::net::{TcpListener, TcpStream};

use crate::config::Config;
use crate::filter::HostFilter;
use crate::limiter::ConnectionLimiter;
use crate::parser;
use crate::reader;
use crate::relay;
use crate::shutdown::GracefulShutdown;
use crate::sink;
use crate::tunnel;

const ACCEPT_POLL: Duration = Duration::from_secs(1);

pub async fn run(config: Config, shutdown: GracefulShutdown) -> Result<()> {
    let bind_addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(bind_addr.as_str()).await?;
    sink::log_info(&format!("Proxy server started on {bind_addr}"));

    let filter = Arc::new(HostFilter::open(config.blocked_domains_file.clone()));
    let limiter = ConnectionLimiter::new(config.thread_pool_size.max(1));

    loop {
        match accept_tick(&listener, &shutdown).await {
            Tick::Shutdown => break,
            Tick::Idle => continue,
            Tick::Error(err) => {
                sink::log_error(&format!("Error accepting connection: {err}"));
                continue;
            }
            Tick::Connection(stream, peer) => {
                let Some(permit) = limiter.try_acquire() else {
                    drop(stream);
                    sink::log_warning("Connection rejected: thread pool full");
                    continue;
                };

                let filter = filter.clone();
                let shutdown = shutdown.clone();
                smol::spawn(async move {
                    let _permit = permit;
                    let _inflight = shutdown.inflight_guard();
                    if let Err(err) = handle_client(stream, peer, &filter).await {
                        sink::log_error(&format!("Error handling client {peer}: {err}"));
                    }
                })
                .detach();
            }
        }
    }

    shutdown.wait_inflight_zero().await;
    sink::log_info("Proxy server shut down");
    Ok(())
}

enum Tick {
    Connection(TcpStream, SocketAddr),
    Idle,
    Shutdown,
    Error(std::io::Error),
}

async fn accept_tick(listener: &TcpListener, shutdown: &GracefulShutdown) -> Tick {
    let accept_fut = async {
        match listener.accept().await {
            Ok((stream, peer)) => Tick::Connection(stream, peer),
            Err(err) => Tick::Error(err),
        }
    };
    let idle_fut = async {
        smol::Timer::after(ACCEPT_POLL).await;
        Tick::Idle
    };
    let shutdown_fut = async {
        shutdown.wait_shutting_down().await;
        Tick::Shutdown
    };
    smol::future::or(accept_fut, smol::future::or(idle_fut, shutdown_fut)).await
}

async fn handle_client(mut stream: TcpStream, peer: SocketAddr, filter: &HostFilter) -> Result<()> {
    let raw = match reader::read_request(&mut stream).await {
        Ok(raw) => raw,
        Err(err) => {
            sink::log_error(&format!("Failed to read request from {peer}: {err}"));
            return Ok(());
        }
    };

    let req = match parser::parse_request(&raw) {
        Ok(req) => req,
        Err(err) => {
            sink::log_error(&format!("Failed to parse request from {peer}: {err}"));
            return Ok(());
        }
    };

    filter.reload_if_changed();

    if filter.is_blocked(&req.host) {
        sink::log_blocked(peer, &req.host, req.port, &req.request_line);
        write_blocked(&mut stream).await?;
        return Ok(());
    }

    if req.method == "CONNECT" {
        tunnel::relay_connect(stream, peer, &req).await
    } else {
        relay::relay_http(&mut stream, peer, &req).await
    }
}

async fn write_blocked(stream: &mut TcpStream) -> Result<()> {
    use smol::io::AsyncWriteExt;
    stream
        .write_all(
            b"HTTP/1.1 403 Forbidden\r\n\
              Content-Type: text/plain\r\n\
              Content-Length: 13\r\n\
              Connection: close\r\n\r\n\
              Access Denied",
        )
        .await?;
    stream.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use smol::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn blocked_host_gets_403_and_never_reaches_origin() {
        smol::block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let rules_path = dir.path().join("blocked.txt");
            std::fs::write(&rules_path, "blocked.test\n").unwrap();
            let filter = HostFilter::open(&rules_path);

            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();

            let server = smol::spawn(async move {
                let (stream, peer) = listener.accept().await.unwrap();
                handle_client(stream, peer, &filter).await.unwrap();
            });

            let mut client = TcpStream::connect(addr).await.unwrap();
            client
                .write_all(b"GET / HTTP/1.1\r\nHost: blocked.test\r\n\r\n")
                .await
                .unwrap();

            let mut response = Vec::new();
            client.read_to_end(&mut response).await.unwrap();
            server.await;

            let response = String::from_utf8_lossy(&response);
            assert!(response.starts_with("HTTP/1.1 403 Forbidden"));
            assert!(response.ends_with("Access Denied"));
        });
    }

    #[test]
    fn allowed_request_is_relayed_to_origin() {
        smol::block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let rules_path = dir.path().join("blocked.txt");
            std::fs::write(&rules_path, "").unwrap();
            let filter = HostFilter::open(&rules_path);

            // Stub origin server.
            let origin_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let origin_addr = origin_listener.local_addr().unwrap();
            smol::spawn(async move {
                let (mut stream, _) = origin_listener.accept().await.unwrap();
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await.unwrap();
                stream
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi")
                    .await
                    .unwrap();
                stream.flush().await.unwrap();
            })
            .detach();

            let proxy_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let proxy_addr = proxy_listener.local_addr().unwrap();
            let server = smol::spawn(async move {
                let (stream, peer) = proxy_listener.accept().await.unwrap();
                handle_client(stream, peer, &filter).await.unwrap();
            });

            let mut client = TcpStream::connect(proxy_addr).await.unwrap();
            let request = format!(
                "GET http://127.0.0.1:{}/ HTTP/1.1\r\nHost: 127.0.0.1:{}\r\n\r\n",
                origin_addr.port(),
                origin_addr.port()
            );
            client.write_all(request.as_bytes()).await.unwrap();

            let mut response = Vec::new();
            client.read_to_end(&mut response).await.unwrap();
            server.await;

            let response = String::from_utf8_lossy(&response);
            assert!(response.starts_with("HTTP/1.1 200 OK"));
            assert!(response.ends_with("hi"));
        });
    }
}
