//! Interactive admin console: reads commands from stdin and turns them into
//! `CommandMessage` broadcasts to every connected peer.

use std::sync::Arc;

use cardsync_proto::message::CommandMessage;
use cardsync_proto::peer::PeerTable;
use tokio::io::{AsyncBufReadExt, BufReader};

/// What the console decided after reading one line: either broadcast a
/// command and keep running, or shut the server down.
pub enum ConsoleAction {
    Continue,
    Shutdown,
}

const KNOWN_COMMANDS: &[&str] = &["shutdown", "reboot", "check-for-updates"];

/// Read one admin command from stdin, broadcast it, and report whether the
/// server should keep running. Returns `Ok(None)` on EOF (stdin closed).
pub async fn read_and_broadcast(
    stdin: &mut BufReader<tokio::io::Stdin>,
    peers: &Arc<PeerTable>,
) -> std::io::Result<Option<ConsoleAction>> {
    let mut line = String::new();
    let bytes_read = stdin.read_line(&mut line).await?;
    if bytes_read == 0 {
        return Ok(None);
    }

    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(Some(ConsoleAction::Continue));
    };
    let params: Vec<String> = words.map(str::to_string).collect();

    if !KNOWN_COMMANDS.contains(&command) {
        log::warn!("unrecognized admin command {command:?}; known commands: {KNOWN_COMMANDS:?}");
        return Ok(Some(ConsoleAction::Continue));
    }

    let message = CommandMessage { command: command.to_string(), params };
    for peer in peers.snapshot() {
        if let Err(e) = peer.send_message(&message).await {
            log::warn!("failed to broadcast command {command:?}: {e}");
        }
    }
    log::info!("broadcast command {command:?} to {} peer(s)", peers.len());

    Ok(Some(if command == "shutdown" { ConsoleAction::Shutdown } else { ConsoleAction::Continue }))
}
