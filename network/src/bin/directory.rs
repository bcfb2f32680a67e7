// SPDX-License-Identifier: MIT OR Apache-2.0

use anyhow::Result;
use clap::Parser;
use sevenkor_network::config::NetConfig;
use sevenkor_network::directory::{routes, LobbyStore};
use sevenkor_network::sweeper::{Expire, Sweeper};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// HTTP port to listen on (overrides SEVENKOR_HTTP_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut cfg = NetConfig::from_env();
    if let Some(port) = args.port {
        cfg.http_port = port;
    }

    info!("Starting 7KOR session directory");

    let store = Arc::new(LobbyStore::new(cfg.session_ttl()));
    let sweeper = Sweeper::spawn(cfg.sweep_interval(), vec![store.clone() as Arc<dyn Expire>]);

    let (addr, server) = warp::serve(routes(store, cfg.relay_coords()))
        .try_bind_with_graceful_shutdown(([0, 0, 0, 0], cfg.http_port), async {
            let _ = tokio::signal::ctrl_c().await;
        })?;

    info!("Session directory listening on {}", addr);
    server.await;

    info!("Shutting down");
    sweeper.shutdown().await;

    Ok(())
}
