//! vidsink streaming encoder library
//!
//! Streams in-memory frames (and optionally an audio waveform) into external
//! encoder processes described by data-driven format descriptors.

pub mod adapters;
pub mod app;
pub mod batch;
pub mod cli;
pub mod config_initialization;
pub mod domain;
pub mod engine;
pub mod error;
pub mod format;
pub mod frames;
pub mod output;
pub mod ports;

// Re-export commonly used types
pub use app::{EncodeInteractor, EncodeReport, EncodeRequest};
pub use domain::model::{AudioWaveform, Frame, WidgetValue};
pub use engine::{EncodeSession, SessionConfig};
pub use error::{EncodeError, EncodeResult};
