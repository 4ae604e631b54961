// Domain models - Core types and data structures

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

use crate::error::{EncodeError, EncodeResult};

/// Pixel samples of a single frame, row-major HWC
#[derive(Debug, Clone, PartialEq)]
pub enum FramePixels {
    /// 8-bit samples, already in output range
    U8(Vec<u8>),
    /// Normalised samples in `[0, 1]`, as produced by tensor pipelines
    F32(Vec<f32>),
}

impl FramePixels {
    fn len(&self) -> usize {
        match self {
            FramePixels::U8(data) => data.len(),
            FramePixels::F32(data) => data.len(),
        }
    }
}

/// One raw input frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub pixels: FramePixels,
}

impl Frame {
    /// Create a frame from 8-bit samples
    pub fn from_u8(width: usize, height: usize, channels: usize, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            channels,
            pixels: FramePixels::U8(data),
        }
    }

    /// Create a frame from normalised float samples
    pub fn from_f32(width: usize, height: usize, channels: usize, data: Vec<f32>) -> Self {
        Self {
            width,
            height,
            channels,
            pixels: FramePixels::F32(data),
        }
    }

    /// Number of samples the declared geometry requires
    pub fn expected_len(&self) -> usize {
        self.width * self.height * self.channels
    }

    /// Check that the sample buffer matches the declared geometry
    pub fn validate(&self) -> EncodeResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(EncodeError::InvalidFrame {
                message: format!("frame has empty dimensions {}x{}", self.width, self.height),
            });
        }
        if self.pixels.len() != self.expected_len() {
            return Err(EncodeError::InvalidFrame {
                message: format!(
                    "{}x{}x{} frame carries {} samples, expected {}",
                    self.width,
                    self.height,
                    self.channels,
                    self.pixels.len(),
                    self.expected_len()
                ),
            });
        }
        Ok(())
    }

    /// Serialise samples to 8-bit bytes
    ///
    /// Float samples are scaled by 255, clamped and truncated.
    pub fn into_bytes(self) -> Vec<u8> {
        match self.pixels {
            FramePixels::U8(data) => data,
            FramePixels::F32(data) => data
                .into_iter()
                .map(|v| (v * 255.0).clamp(0.0, 255.0) as u8)
                .collect(),
        }
    }
}

/// Raw pixel layout handed to the encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
    Rgba,
}

impl PixelFormat {
    /// Select the layout for a channel count
    pub fn from_channels(channels: usize) -> EncodeResult<Self> {
        match channels {
            3 => Ok(PixelFormat::Rgb24),
            4 => Ok(PixelFormat::Rgba),
            other => Err(EncodeError::UnsupportedPixelFormat { channels: other }),
        }
    }

    /// ffmpeg `-pix_fmt` name
    pub fn as_ffmpeg(&self) -> &'static str {
        match self {
            PixelFormat::Rgb24 => "rgb24",
            PixelFormat::Rgba => "rgba",
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
            PixelFormat::Rgba => 4,
        }
    }

    pub fn has_alpha(&self) -> bool {
        matches!(self, PixelFormat::Rgba)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_ffmpeg())
    }
}

/// Output geometry of an adapted frame stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: usize,
    pub height: usize,
    pub pixel_format: PixelFormat,
}

impl FrameGeometry {
    /// ffmpeg `-s` argument
    pub fn dimensions(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Bytes in one adapted frame
    pub fn frame_size(&self) -> usize {
        self.width * self.height * self.pixel_format.channels()
    }
}

/// A resolved widget value
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl WidgetValue {
    /// Interpret a loosely typed literal, e.g. from the command line
    pub fn parse_literal(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed {
            "true" | "True" => return WidgetValue::Bool(true),
            "false" | "False" => return WidgetValue::Bool(false),
            _ => {}
        }
        if let Ok(int) = trimmed.parse::<i64>() {
            return WidgetValue::Int(int);
        }
        if let Ok(float) = trimmed.parse::<f64>() {
            return WidgetValue::Float(float);
        }
        WidgetValue::String(raw.to_string())
    }

    /// Text used when substituted into an argument list
    pub fn render(&self) -> String {
        match self {
            WidgetValue::Bool(true) => "True".to_string(),
            WidgetValue::Bool(false) => "False".to_string(),
            WidgetValue::Int(v) => v.to_string(),
            WidgetValue::Float(v) if v.fract() == 0.0 && v.is_finite() => format!("{:.1}", v),
            WidgetValue::Float(v) => v.to_string(),
            WidgetValue::String(v) => v.clone(),
        }
    }
}

impl fmt::Display for WidgetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// Encoder profile after widget resolution
#[derive(Debug, Clone, PartialEq)]
pub struct FormatDescriptor {
    pub name: String,
    pub container_ext: String,
    pub main_pass_args: Vec<String>,
    pub pre_pass_args: Option<Vec<String>>,
    pub secondary_pass_args: Option<Vec<String>>,
    pub audio_pass_args: Option<Vec<String>>,
    /// Extra inputs placed between the raw video input and the main pass
    pub inputs_main_pass: Option<Vec<String>>,
    pub alignment: usize,
    pub environment_overrides: HashMap<String, String>,
    pub save_metadata: bool,
    pub widget_defaults: BTreeMap<String, WidgetValue>,
}

impl FormatDescriptor {
    pub const DEFAULT_ALIGNMENT: usize = 8;

    pub fn has_pre_pass(&self) -> bool {
        self.pre_pass_args.is_some()
    }

    pub fn has_secondary_pass(&self) -> bool {
        self.secondary_pass_args.is_some()
    }
}

/// Fully resolved encoder invocation
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeArguments {
    pub program: PathBuf,
    /// Raw-video input description, ending with `-i -`
    pub input_args: Vec<String>,
    pub extra_input_args: Vec<String>,
    pub output_args: Vec<String>,
    pub environment: HashMap<String, String>,
}

impl EncodeArguments {
    /// Build the raw-video input arguments for a geometry and frame rate
    pub fn raw_video_input(geometry: &FrameGeometry, frame_rate: f64) -> Vec<String> {
        vec![
            "-v".to_string(),
            "error".to_string(),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            geometry.pixel_format.as_ffmpeg().to_string(),
            "-s".to_string(),
            geometry.dimensions(),
            "-r".to_string(),
            crate::domain::rules::format_frame_rate(frame_rate),
            "-i".to_string(),
            "-".to_string(),
        ]
    }

    /// Arguments (without program) for the plain invocation
    pub fn command_args(&self) -> Vec<String> {
        let mut args = self.input_args.clone();
        args.extend(self.extra_input_args.iter().cloned());
        args.extend(self.output_args.iter().cloned());
        args
    }

    /// Arguments with a metadata sidecar as the leading input
    pub fn command_args_with_metadata(&self, sidecar: &std::path::Path) -> Vec<String> {
        let mut args = vec!["-i".to_string(), sidecar.to_string_lossy().into_owned()];
        args.extend(self.command_args());
        args.push("-metadata".to_string());
        args.push("creation_time=now".to_string());
        args
    }
}

/// Lifecycle of a streaming encode session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    AwaitingFrame,
    Draining,
    Finalized,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Created => "created",
            SessionState::AwaitingFrame => "awaiting a frame",
            SessionState::Draining => "draining",
            SessionState::Finalized => "finalized",
            SessionState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Audio samples, interleaved by channel
#[derive(Debug, Clone, PartialEq)]
pub struct AudioWaveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: usize,
}

impl AudioWaveform {
    pub fn interleaved(samples: Vec<f32>, sample_rate: u32, channels: usize) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Interleave one buffer per channel
    ///
    /// Shorter channels are padded with silence.
    pub fn from_planar(planes: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let channels = planes.len();
        let frames = planes.iter().map(Vec::len).max().unwrap_or(0);
        let mut samples = Vec::with_capacity(frames * channels);
        for i in 0..frames {
            for plane in &planes {
                samples.push(plane.get(i).copied().unwrap_or(0.0));
            }
        }
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        if self.channels == 0 || self.sample_rate == 0 {
            return 0.0;
        }
        (self.samples.len() / self.channels) as f64 / self.sample_rate as f64
    }

    /// Samples as little-endian `f32le` bytes
    pub fn to_f32le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
}

/// Everything the mux stage needs for one call
#[derive(Debug, Clone)]
pub struct AudioMuxRequest {
    pub source_video_path: PathBuf,
    pub waveform: AudioWaveform,
    pub frames_written: u64,
    pub frame_rate: f64,
}

impl AudioMuxRequest {
    pub fn min_duration_seconds(&self) -> f64 {
        crate::domain::rules::min_audio_duration(self.frames_written, self.frame_rate)
    }
}

#[cfg(test)]
mod tests;
