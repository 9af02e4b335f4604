use std::path::PathBuf;

use clap::Parser;

/// Card-scan client viewer: discovery, connect, and logged application
/// traffic in place of a UI.
#[derive(Debug, Parser)]
#[command(name = "cardsync-client", version, about)]
pub struct Cli {
    /// Path to a TOML config file; a default is written if none exists.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the discovery (UDP broadcast) port from the config file.
    #[arg(long)]
    pub discovery_port: Option<u16>,

    /// Override this client's own control port from the config file.
    #[arg(long)]
    pub control_port: Option<u16>,

    /// Advertise to 127.0.0.1 instead of 255.255.255.255, for local testing.
    #[arg(long)]
    pub loopback: bool,
}
