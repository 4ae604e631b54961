//! Error handling module for vidsink

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for vidsink operations
#[derive(Error, Debug)]
pub enum EncodeError {
    /// No descriptor with that name exists in the format catalog
    #[error("Video format not found: {name}")]
    MissingFormat { name: String },

    /// Descriptor document could not be interpreted
    #[error("Invalid format descriptor '{name}': {message}")]
    InvalidFormatDescriptor { name: String, message: String },

    /// A widget has neither a caller value nor a declared default
    #[error("No value provided for format widget '{widget}' and no default is declared")]
    MissingWidgetValue { widget: String },

    /// A caller value does not fit the widget's declared type
    #[error("Invalid value for format widget '{widget}': {message}")]
    InvalidWidgetValue { widget: String, message: String },

    /// Frame channel count is neither RGB nor RGBA
    #[error("Unsupported pixel format: frames with {channels} channels cannot be encoded (expected 3 or 4)")]
    UnsupportedPixelFormat { channels: usize },

    /// Frame buffer does not match its declared geometry
    #[error("Invalid frame: {message}")]
    InvalidFrame { message: String },

    /// Encoder executable could not be started
    #[error("Failed to launch encoder '{program}': {message}")]
    EncoderLaunchFailure { program: String, message: String },

    /// Encoder exited while frames were still being written
    #[error("{}", broken_pipe_message(.partial_output, .output_path, .diagnostics))]
    EncoderBrokenPipe {
        output_path: PathBuf,
        partial_output: bool,
        diagnostics: String,
    },

    /// Encoder exited unsuccessfully after its input was closed
    #[error("An error occurred in the encoder subprocess ({status}):\n{diagnostics}")]
    EncoderFailure { status: String, diagnostics: String },

    /// Whole-stream analysis pass failed
    #[error("An error occurred in the encoder pre-pass:\n{diagnostics}")]
    PrePassFailure { diagnostics: String },

    /// Audio muxing subprocess failed
    #[error("An error occurred while muxing audio:\n{diagnostics}")]
    MuxError { diagnostics: String },

    /// A batch session with this id is already being advanced
    #[error("Batch session '{session_id}' is already being advanced by another caller")]
    DuplicateSession { session_id: String },

    /// Operation not valid in the session's current state
    #[error("Encode session is {state}; cannot {operation}")]
    InvalidSessionState { state: String, operation: String },

    /// Ping-pong ordering needs the whole sequence up front
    #[error("pingpong is incompatible with batched output (session '{session_id}')")]
    PingPongWithBatch { session_id: String },

    /// Output already exists and the overwrite policy forbids replacing it
    #[error("Output file already exists: {path}")]
    OutputExists { path: PathBuf },

    /// Configuration loading error
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn broken_pipe_message(partial_output: &bool, output_path: &Path, diagnostics: &str) -> String {
    if *partial_output {
        format!(
            "The encoder subprocess exited early but an output file already exists at {} \
             (it may hold partial output; re-encoding would overwrite it):\n{}",
            output_path.display(),
            diagnostics
        )
    } else {
        format!("An error occurred in the encoder subprocess:\n{}", diagnostics)
    }
}

/// Result type alias for vidsink operations
pub type EncodeResult<T> = std::result::Result<T, EncodeError>;
