//! Forwarding HTTP proxy: accepts client connections, filters them by
//! destination host, and either relays a single HTTP exchange or tunnels a
//! `CONNECT` session. See [`server::run`] for the accept loop.

pub mod bootstrap;
pub mod cmd;
pub mod config;
pub mod filter;
pub mod limiter;
pub mod logging;
pub mod net;
pub mod parser;
pub mod reader;
pub mod relay;
pub mod server;
pub mod shutdown;
pub mod sink;
pub mod tunnel;

use anyhow::Result;

/// Runs the proxy to completion: bootstrap (CLI + config + logging), install
/// the shutdown signal handler, run the accept loop until told to stop, then
/// drain in-flight handlers before returning.
pub async fn run() -> Result<()> {
    let bootstrap::Bootstrap { config, .. } = bootstrap::init()?;
    let shutdown = shutdown::init()?;
    server::run(config, shutdown).await
}
