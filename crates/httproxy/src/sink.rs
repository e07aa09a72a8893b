//! Structured events for every decision the proxy makes, rendered through
//! the process-wide logger installed by [`crate::logging`].

use std::net::SocketAddr;

/// A request (or CONNECT) that was allowed through, after the fact: size is
/// the number of response bytes relayed to the client (0 for a CONNECT
/// tunnel, whose only "response" is the fixed acknowledgement line).
pub fn log_allowed(client: SocketAddr, host: &str, port: u16, request_line: &str, status: &str, size: u64) {
    log::info!(
        "ALLOWED | {}:{} -> {host}:{port} | {request_line} | {status} | {size} bytes",
        client.ip(),
        client.port()
    );
}

pub fn log_blocked(client: SocketAddr, host: &str, port: u16, request_line: &str) {
    log::warn!(
        "BLOCKED | {}:{} -> {host}:{port} | {request_line}",
        client.ip(),
        client.port()
    );
}

pub fn log_info(message: &str) {
    log::info!("{message}");
}

pub fn log_warning(message: &str) {
    log::warn!("{message}");
}

pub fn log_error(message: &str) {
    log::error!("{message}");
}
