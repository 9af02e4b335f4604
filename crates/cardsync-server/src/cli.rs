use std::path::PathBuf;

use clap::Parser;

/// Card-scan server device: discovery, control, and the admin console.
#[derive(Debug, Parser)]
#[command(name = "cardsync-server", version, about)]
pub struct Cli {
    /// Path to a TOML config file; a default is written if none exists.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the discovery (UDP broadcast) port from the config file.
    #[arg(long)]
    pub discovery_port: Option<u16>,

    /// Override the control port from the config file.
    #[arg(long)]
    pub control_port: Option<u16>,
}
