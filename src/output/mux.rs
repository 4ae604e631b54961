//! Audio mux stage
//!
//! Adds an audio track to a finished video by re-encoding only the audio
//! stream. The muxed file replaces the original on success; on failure the
//! silent video stays where it was.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::domain::model::AudioMuxRequest;
use crate::engine::process::{EncoderProcess, OutputMode};
use crate::error::{EncodeError, EncodeResult};

/// Audio codec used when a format does not declare an audio pass
pub const DEFAULT_AUDIO_PASS: [&str; 2] = ["-c:a", "libopus"];

/// Runs ffmpeg to combine a video file with a raw waveform
#[derive(Debug, Clone)]
pub struct AudioMuxer {
    ffmpeg: PathBuf,
    environment: HashMap<String, String>,
}

impl AudioMuxer {
    pub fn new(ffmpeg: impl Into<PathBuf>, environment: HashMap<String, String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            environment,
        }
    }

    /// Mux `request.waveform` into `request.source_video_path`
    pub fn mux(&self, request: &AudioMuxRequest, audio_pass: Option<&[String]>) -> EncodeResult<()> {
        let audio_pass = match audio_pass {
            Some(args) => args.to_vec(),
            None => {
                warn!("Format has no audio pass, defaulting to {}", DEFAULT_AUDIO_PASS.join(" "));
                DEFAULT_AUDIO_PASS.iter().map(|arg| arg.to_string()).collect()
            }
        };
        let muxed_path = muxed_path(&request.source_video_path);
        let args = build_mux_args(request, &audio_pass, &muxed_path);
        info!(
            sample_rate = request.waveform.sample_rate,
            channels = request.waveform.channels,
            min_duration = request.min_duration_seconds(),
            "Muxing audio into {}",
            request.source_video_path.display()
        );

        let mut process = EncoderProcess::launch(&self.ffmpeg, &args, &self.environment, OutputMode::Discard)?;
        let write_result = process.write(&request.waveform.to_f32le_bytes());
        let output = process.wait()?;

        // With -shortest ffmpeg may stop reading once the video ends
        if let Err(e) = &write_result {
            debug!("audio input closed early: {}", e);
        }
        if !output.status.success() {
            discard_partial(&muxed_path);
            let mut diagnostics = output.diagnostics;
            if let (true, Err(e)) = (diagnostics.is_empty(), write_result) {
                diagnostics = e.to_string();
            }
            return Err(EncodeError::MuxError { diagnostics });
        }
        if !output.diagnostics.is_empty() {
            warn!("{}: {}", output.label, output.diagnostics.trim_end());
        }

        replace_file(&request.source_video_path, &muxed_path)?;
        Ok(())
    }
}

/// Full ffmpeg argument list for one mux call
pub fn build_mux_args(request: &AudioMuxRequest, audio_pass: &[String], muxed_path: &Path) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-v".into(),
        "error".into(),
        "-i".into(),
        request.source_video_path.to_string_lossy().into_owned(),
        "-ar".into(),
        request.waveform.sample_rate.to_string(),
        "-ac".into(),
        request.waveform.channels.to_string(),
        "-y".into(),
        "-f".into(),
        "f32le".into(),
        "-i".into(),
        "-".into(),
        "-c:v".into(),
        "copy".into(),
    ];
    args.extend(audio_pass.iter().cloned());
    args.extend([
        "-af".to_string(),
        format!("apad=whole_dur={}", request.min_duration_seconds()),
        "-shortest".to_string(),
        muxed_path.to_string_lossy().into_owned(),
    ]);
    args
}

/// Sibling path the muxed file is written to before it replaces the video
pub fn muxed_path(video: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match video.extension() {
        Some(ext) => format!("{}-audio.{}", stem, ext.to_string_lossy()),
        None => format!("{}-audio", stem),
    };
    video.with_file_name(name)
}

/// Move `replacement` over `original`
///
/// A missing original is not an error.
pub fn replace_file(original: &Path, replacement: &Path) -> EncodeResult<()> {
    match fs::remove_file(original) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("{} already gone before replace", original.display());
        }
        Err(e) => return Err(e.into()),
    }
    fs::rename(replacement, original)?;
    Ok(())
}

fn discard_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Could not remove partial mux output {}: {}", path.display(), e);
        }
    }
}
