use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use raftkv::config::{RaftConfig, Roster};
use raftkv::logging;
use raftkv::raft::Peer;
use raftkv::transport::HttpTransport;

/// One node of a replicated in-memory key/value store.
#[derive(Debug, Parser)]
struct Args {
    /// This peer's position in the roster file.
    #[arg(long)]
    index: usize,

    /// Path to the cluster membership file (one `scheme:host:port` per line).
    #[arg(long)]
    roster: PathBuf,

    /// Optional TOML file with `RaftConfig` overrides.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    let roster = Roster::load(&args.roster, args.index)?;
    let config = RaftConfig::load(args.config.as_deref())?;
    let bind_addr = listen_addr(&roster.me)?;

    tracing::info!(addr = %roster.me, fellows = ?roster.fellows, "starting peer");

    let transport = Arc::new(HttpTransport::new(Duration::from_millis(config.requests_timeout_ms)));
    let peer = Peer::new(roster, config, transport);
    peer.spawn_background();

    let app = raftkv::api::router(peer);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(%bind_addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// `addr` is `scheme://host:port` (e.g. `http://127.0.0.1:5000`); axum binds
/// to the `host:port` part regardless of scheme.
fn listen_addr(addr: &str) -> Result<std::net::SocketAddr> {
    let without_scheme = addr.split("://").last().unwrap_or(addr);
    Ok(without_scheme.parse()?)
}
