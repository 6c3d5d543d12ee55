//! `tightfit chat`: Talk to the compression bot from the terminal.

use std::path::PathBuf;
use std::sync::Arc;

use tightfit_channels::{ChannelRegistry, CliChannel, CompressionBot};
use tightfit_config::AppConfig;
use tightfit_encoders::CodecRouter;
use tightfit_engine::Compressor;

pub async fn run(output_dir: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let encoder = Arc::new(CodecRouter::from_config(&config));
    let compressor = Arc::new(Compressor::from_config(&config, encoder)?);
    let sessions = tightfit_sessions::from_config(&config.sessions);
    let bot = Arc::new(CompressionBot::new(compressor, sessions, config.bot.clone()));

    let mut registry = ChannelRegistry::new();
    registry.register(Arc::new(CliChannel::new(&output_dir)));

    println!();
    println!("  tightfit - interactive mode");
    println!();
    println!("  Limit:    {} bytes", config.limits.hard_max_bytes);
    println!("  Replies:  {}", output_dir.display());
    println!();
    println!("  Type '{}' to enable compression,", config.bot.enable_phrase);
    println!("  then '/file <path>' to compress a file.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    tightfit_channels::runner::run(Arc::new(registry), bot)
        .await
        .map_err(|e| format!("Channel error: {e}"))?;

    println!();
    println!("  Goodbye! 👋");
    println!();

    Ok(())
}
