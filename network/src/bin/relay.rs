// SPDX-License-Identifier: MIT OR Apache-2.0

use anyhow::{Context, Result};
use clap::Parser;
use sevenkor_network::config::NetConfig;
use sevenkor_network::net_util::CancellationToken;
use sevenkor_network::relay::{run_control_loop, run_state_loop, ControlRegistry, StateRegistry};
use sevenkor_network::sweeper::{Expire, Sweeper};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// UDP port for the control channel (overrides SEVENKOR_CONTROL_PORT)
    #[arg(long)]
    control_port: Option<u16>,

    /// UDP port for the state channel (overrides SEVENKOR_STATE_PORT)
    #[arg(long)]
    state_port: Option<u16>,

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
    if let Some(port) = args.control_port {
        cfg.control_port = port;
    }
    if let Some(port) = args.state_port {
        cfg.state_port = port;
    }

    info!("Starting 7KOR datagram relay");

    // failing to bind is the only fatal error this service has
    let control_socket = UdpSocket::bind(("0.0.0.0", cfg.control_port))
        .await
        .with_context(|| format!("failed to bind control port {}", cfg.control_port))?;
    let state_socket = UdpSocket::bind(("0.0.0.0", cfg.state_port))
        .await
        .with_context(|| format!("failed to bind state port {}", cfg.state_port))?;
    info!(
        control = cfg.control_port,
        state = cfg.state_port,
        "Relay listening"
    );

    let control_registry = Arc::new(ControlRegistry::new(cfg.registration_ttl()));
    let state_registry = Arc::new(StateRegistry::new(cfg.registration_ttl()));

    let token = CancellationToken::new();
    let control_task = tokio::spawn(run_control_loop(
        control_socket,
        control_registry.clone(),
        token.clone(),
    ));
    let state_task = tokio::spawn(run_state_loop(
        state_socket,
        state_registry.clone(),
        token.clone(),
    ));

    let sweeper = Sweeper::spawn(
        cfg.sweep_interval(),
        vec![
            control_registry as Arc<dyn Expire>,
            state_registry as Arc<dyn Expire>,
        ],
    );

    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    token.cancel();
    let _ = control_task.await;
    let _ = state_task.await;
    sweeper.shutdown().await;

    Ok(())
}
