mod cli;
mod config;
mod log;
mod observer;

use std::net::Ipv4Addr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use cardsync_proto::server::BROADCAST_ADDR;
use cardsync_proto::Client;
use cli::Cli;
use config::ClientConfig;
use observer::ClientObserver;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    log::setup_logger()?;

    let config_path = cli.config.clone().unwrap_or_else(ClientConfig::default_path);
    let mut cfg = ClientConfig::load(&config_path)?;
    if let Some(port) = cli.discovery_port {
        cfg.discovery_port = port;
    }
    if let Some(port) = cli.control_port {
        cfg.control_port = port;
    }
    cfg.loopback |= cli.loopback;

    let broadcast_ip = if cfg.loopback { Ipv4Addr::LOCALHOST } else { BROADCAST_ADDR };
    ::log::info!(
        "starting cardsync-client: discovery={} control={} broadcast={broadcast_ip}",
        cfg.discovery_port,
        cfg.control_port,
    );

    let observer = Arc::new(ClientObserver::new());
    let client = Client::new(cfg.discovery_port, cfg.control_port, broadcast_ip, observer);
    client.start()?;

    tokio::signal::ctrl_c().await?;
    ::log::info!("ctrl-c received, disconnecting");
    client.stop().await;
    Ok(())
}
