//! Combate battle server entry point.
//!
//! Binds the listener, installs tracing, and hands the socket to the gateway.
//! All battle rules live in `combate-battle`; this binary is transport only.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;

mod gateway;

#[derive(Parser, Debug)]
#[command(name = "combate-server", about = "Authoritative websocket battle server")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:3001")]
    addr: String,

    /// Seconds a player may hold the turn before forfeiting.
    /// Turns are untimed when unset.
    #[arg(long)]
    turn_timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "combate_server=info".into()),
        )
        .init();

    let args = Args::parse();
    let listener = TcpListener::bind(&args.addr)
        .await
        .with_context(|| format!("failed to bind {}", args.addr))?;
    tracing::info!(addr = %args.addr, "listening");

    gateway::run(listener, args.turn_timeout_secs.map(Duration::from_secs)).await
}
