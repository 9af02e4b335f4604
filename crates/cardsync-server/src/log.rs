//! Structured logging setup: a colored terminal logger plus a file logger
//! living next to the executable. No frontend/backend split here — there's
//! no UI process to separate from.

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};

pub fn setup_logger() -> Result<()> {
    let log_dir = log_dir()?;
    std::fs::create_dir_all(&log_dir).context("failed to create log directory")?;
    let log_file =
        File::create(log_dir.join("server.log")).context("failed to create server.log")?;

    let file_config = ConfigBuilder::new()
        .set_time_offset_to_local()
        .unwrap_or_else(|builder| builder)
        .build();
    let term_config = ConfigBuilder::new()
        .set_time_offset_to_local()
        .unwrap_or_else(|builder| builder)
        .build();

    let loggers: Vec<Box<dyn SharedLogger>> = vec![
        TermLogger::new(LevelFilter::Info, term_config, TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(LevelFilter::Debug, file_config, log_file),
    ];

    CombinedLogger::init(loggers).context("failed to install combined logger")?;
    log::info!("cardsync-server logging initialized, writing to {log_dir:?}");
    Ok(())
}

fn log_dir() -> Result<PathBuf> {
    let exe_path = std::env::current_exe().context("failed to resolve executable path")?;
    let exe_dir = exe_path.parent().unwrap_or_else(|| std::path::Path::new(".")).to_path_buf();
    Ok(exe_dir.join("logs"))
}
