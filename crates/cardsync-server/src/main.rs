mod cli;
mod config;
mod console;
mod log;
mod observer;
mod vision_sim;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::io::{stdin, BufReader};
use tokio_util::sync::CancellationToken;

use cardsync_proto::Server;
use cli::Cli;
use config::ServerConfig;
use console::ConsoleAction;
use observer::ServerObserver;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    log::setup_logger()?;

    let config_path = cli.config.clone().unwrap_or_else(ServerConfig::default_path);
    let mut cfg = ServerConfig::load(&config_path)?;
    if let Some(port) = cli.discovery_port {
        cfg.discovery_port = port;
    }
    if let Some(port) = cli.control_port {
        cfg.control_port = port;
    }

    ::log::info!(
        "starting {} (firmware {}) on discovery={} control={}",
        cfg.device_name,
        cfg.firmware_version,
        cfg.discovery_port,
        cfg.control_port,
    );
    let peers = Arc::new(cardsync_proto::PeerTable::new());
    let observer =
        Arc::new(ServerObserver::new(peers.clone(), cfg.device_name.clone(), cfg.firmware_version.clone()));
    let mut server =
        Server::with_peer_table(cfg.discovery_port, cfg.control_port, peers, observer);
    server.start().await?;

    let vision_cancel = CancellationToken::new();
    let vision_task =
        tokio::spawn(vision_sim::run(server.peers(), vision_cancel.clone()));

    let mut stdin_reader = BufReader::new(stdin());
    ::log::info!("admin console ready; type shutdown, reboot, or check-for-updates");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                ::log::info!("ctrl-c received, shutting down");
                break;
            }
            line = console::read_and_broadcast(&mut stdin_reader, &server.peers()) => {
                match line {
                    Ok(Some(ConsoleAction::Continue)) => {}
                    Ok(Some(ConsoleAction::Shutdown)) => {
                        ::log::info!("shutdown command issued from console");
                        break;
                    }
                    Ok(None) => {
                        ::log::info!("stdin closed, shutting down");
                        break;
                    }
                    Err(e) => {
                        ::log::warn!("admin console read error: {e}");
                        break;
                    }
                }
            }
        }
    }

    vision_cancel.cancel();
    let _ = vision_task.await;
    server.stop().await;
    Ok(())
}
