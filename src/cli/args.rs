//! Command-line argument definitions

use std::path::PathBuf;

use clap::Args;

use crate::app::encode_interactor::DEFAULT_FRAME_RATE;
use crate::domain::model::WidgetValue;

/// Arguments for the encode command
#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Directory of input images, encoded in file-name order
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output file path
    #[arg(short, long)]
    pub output: PathBuf,

    /// Format name
    #[arg(short, long, default_value = "video/h264-mp4")]
    pub format: String,

    /// Frames per second (clamped to 1-120)
    #[arg(short = 'r', long, default_value_t = DEFAULT_FRAME_RATE)]
    pub frame_rate: f64,

    /// Play the sequence forward then backward
    #[arg(long)]
    pub pingpong: bool,

    /// Format widget value as name=value (repeatable)
    #[arg(short, long = "widget", value_parser = parse_widget)]
    pub widgets: Vec<(String, WidgetValue)>,

    /// Raw interleaved f32le audio to mux into the result
    #[arg(long, requires = "sample_rate")]
    pub audio: Option<PathBuf>,

    /// Audio sample rate in Hz
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Audio channel count
    #[arg(long, default_value_t = 2)]
    pub channels: usize,

    /// Metadata text embedded as the container comment
    #[arg(long)]
    pub metadata: Option<String>,

    /// Feed frames in chunks of this size through one batch session
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Replace an existing output file
    #[arg(long)]
    pub overwrite: bool,
}

/// Arguments for the widgets command
#[derive(Args, Debug)]
pub struct WidgetsArgs {
    /// Format name
    #[arg(short, long)]
    pub format: String,
}

/// Parse a `name=value` widget assignment
pub fn parse_widget(raw: &str) -> Result<(String, WidgetValue), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("widget name must not be empty".to_string());
    }
    Ok((name.to_string(), WidgetValue::parse_literal(value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_widget() {
        assert_eq!(parse_widget("crf=23").unwrap(), ("crf".to_string(), WidgetValue::Int(23)));
        assert_eq!(
            parse_widget("preset=slow").unwrap(),
            ("preset".to_string(), WidgetValue::String("slow".to_string()))
        );
        assert!(parse_widget("crf").is_err());
        assert!(parse_widget("=1").is_err());
    }

    #[test]
    fn test_encode_defaults() {
        use crate::cli::{Cli, Commands};
        use clap::Parser;

        let cli = Cli::try_parse_from(["vidsink", "encode", "-i", "frames", "-o", "out.mp4"]).unwrap();
        let Commands::Encode(args) = cli.command else {
            panic!("expected the encode command");
        };
        assert_eq!(args.frame_rate, 25.0);
        assert_eq!(args.format, "video/h264-mp4");
        assert_eq!(args.channels, 2);
    }
}
