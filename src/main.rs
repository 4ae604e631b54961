//! vidsink command-line encoder
//!
//! Streams image sequences into ffmpeg using format descriptors.
//!
//! # Usage
//!
//! ```bash
//! vidsink encode --input frames/ --output out.mp4 --format video/h264-mp4 -w crf=23
//! vidsink formats
//! vidsink widgets --format video/h264-mp4
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use vidsink::adapters::tracing_log;
use vidsink::cli::{commands, Cli, Commands};
use vidsink::config_initialization::initialize_configuration;

/// Main entry point for the vidsink CLI application
fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    let config = initialize_configuration(&cli).context("Failed to load configuration")?;
    tracing_log::init(&config.logging).context("Failed to initialise logging")?;

    info!("Starting vidsink {}", env!("CARGO_PKG_VERSION"));

    // Execute the requested command
    match cli.command {
        Commands::Encode(args) => {
            info!("Executing encode command");
            commands::encode(args, &config)?;
        }
        Commands::Formats => commands::formats(&config)?,
        Commands::Widgets(args) => commands::widgets(args, &config)?,
    }

    Ok(())
}
