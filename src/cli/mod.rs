//! CLI module for vidsink
//!
//! This module handles command-line argument parsing and command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::adapters::tracing_log::LogFormat;

pub mod args;
pub mod commands;

pub use args::{EncodeArgs, WidgetsArgs};

/// vidsink streaming encoder
///
/// Streams image sequences into ffmpeg (and gifski) using data-driven
/// format descriptors.
#[derive(Parser, Debug)]
#[command(name = "vidsink")]
#[command(about = "Stream frames into external video encoders")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Configuration file (default: ./vidsink.toml when present)
    #[arg(long, env = "VIDSINK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level or filter directive
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum, global = true)]
    pub log_format: Option<LogFormat>,

    /// Directory of format descriptors
    #[arg(long, global = true)]
    pub formats_dir: Option<PathBuf>,

    /// ffmpeg executable
    #[arg(long, global = true)]
    pub ffmpeg: Option<PathBuf>,

    /// gifski executable
    #[arg(long, global = true)]
    pub gifski: Option<PathBuf>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Encode a directory of images into a video
    Encode(args::EncodeArgs),
    /// List available formats
    Formats,
    /// Show the widget defaults of a format
    Widgets(args::WidgetsArgs),
}
