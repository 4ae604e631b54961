// Encode interactor - Orchestrates the save-video use case

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::batch::{BatchContinuationManager, ChunkOutcome};
use crate::domain::model::*;
use crate::domain::rules::clamp_frame_rate;
use crate::engine::{run_pre_pass, EncodeSession, SecondaryStage, SessionConfig};
use crate::error::{EncodeError, EncodeResult};
use crate::format::FormatResolver;
use crate::frames::FrameAdapter;
use crate::output::{prepare_output, AudioMuxer, OverwritePolicy};
use crate::ports::{ContinuationSignal, FormatCatalog};

/// Frame rate used when the caller does not pick one
pub const DEFAULT_FRAME_RATE: f64 = 25.0;

/// Executables and scratch space used by encodes
#[derive(Debug, Clone)]
pub struct EncoderTools {
    pub ffmpeg: PathBuf,
    /// Second-stage encoder for chained formats
    pub gifski: Option<PathBuf>,
    /// Directory for metadata sidecars
    pub temp_dir: PathBuf,
}

/// Position of one invocation inside a batch session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchChunk {
    pub session_id: String,
    pub is_final_chunk: bool,
}

/// Encode request
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    pub output_path: PathBuf,
    pub format_name: String,
    pub frame_rate: f64,
    pub pingpong: bool,
    pub widget_values: HashMap<String, WidgetValue>,
    /// Opaque text embedded as the container comment
    pub metadata: Option<String>,
    pub audio: Option<AudioWaveform>,
    pub batch: Option<BatchChunk>,
    pub overwrite: OverwritePolicy,
}

impl EncodeRequest {
    pub fn new(output_path: impl Into<PathBuf>, format_name: impl Into<String>) -> Self {
        Self {
            output_path: output_path.into(),
            format_name: format_name.into(),
            frame_rate: DEFAULT_FRAME_RATE,
            pingpong: false,
            widget_values: HashMap::new(),
            metadata: None,
            audio: None,
            batch: None,
            overwrite: OverwritePolicy::Never,
        }
    }
}

/// What happened to the audio track
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioOutcome {
    NotRequested,
    Muxed,
    /// The silent video was kept
    Failed(String),
}

/// Encode response
#[derive(Debug, Clone, PartialEq)]
pub enum EncodeReport {
    /// No frames and no live session; nothing was written
    Skipped,
    /// A batch chunk was accepted and more are expected
    Pending { frames_written: u64 },
    Completed {
        output_path: PathBuf,
        frames_written: u64,
        audio: AudioOutcome,
    },
}

/// Interactor for the encode use case
pub struct EncodeInteractor {
    resolver: FormatResolver,
    batches: BatchContinuationManager,
    tools: EncoderTools,
}

impl EncodeInteractor {
    /// Create new encode interactor with injected ports
    pub fn new(catalog: Arc<dyn FormatCatalog>, signal: Arc<dyn ContinuationSignal>, tools: EncoderTools) -> Self {
        Self {
            resolver: FormatResolver::new(catalog),
            batches: BatchContinuationManager::new(signal),
            tools,
        }
    }

    pub fn resolver(&self) -> &FormatResolver {
        &self.resolver
    }

    pub fn batches(&self) -> &BatchContinuationManager {
        &self.batches
    }

    pub fn tools(&self) -> &EncoderTools {
        &self.tools
    }

    /// Names of every available format
    pub fn list_formats(&self) -> EncodeResult<Vec<String>> {
        self.resolver.catalog().list()
    }

    /// Declared widget defaults of a format
    pub fn widget_defaults(&self, format_name: &str) -> EncodeResult<BTreeMap<String, WidgetValue>> {
        self.resolver.widget_defaults(format_name)
    }

    /// Encode `frames` as described by `request`
    pub fn encode<'f, I>(&self, request: EncodeRequest, frames: I) -> EncodeResult<EncodeReport>
    where
        I: IntoIterator<Item = Frame>,
        I::IntoIter: 'f,
    {
        self.try_encode(request, frames.into_iter().map(Ok))
    }

    /// Encode frames from a source that can fail part way
    ///
    /// A source error aborts the encode: the encoder is terminated without
    /// being finalised and no audio is muxed.
    pub fn try_encode<'f, I>(&self, request: EncodeRequest, frames: I) -> EncodeResult<EncodeReport>
    where
        I: IntoIterator<Item = EncodeResult<Frame>>,
        I::IntoIter: 'f,
    {
        let continuing = request
            .batch
            .as_ref()
            .map_or(false, |chunk| self.batches.is_active(&chunk.session_id));
        let mut frames = frames.into_iter().peekable();
        if frames.peek().is_none() && !continuing {
            info!("No frames to encode, skipping {}", request.output_path.display());
            return Ok(EncodeReport::Skipped);
        }

        let frame_rate = clamp_frame_rate(request.frame_rate);
        if let (true, Some(chunk)) = (request.pingpong, &request.batch) {
            return Err(EncodeError::PingPongWithBatch {
                session_id: chunk.session_id.clone(),
            });
        }

        let descriptor = self.resolver.resolve(&request.format_name, &request.widget_values)?;
        if !continuing {
            prepare_output(&request.output_path, request.overwrite)?;
        }
        info!(
            format_name = %descriptor.name,
            output = %request.output_path.display(),
            frame_rate,
            "Encoding video"
        );

        let adapted = match FrameAdapter::new(descriptor.alignment, request.pingpong).try_adapt(frames) {
            Ok(adapted) => adapted,
            Err(e) => {
                if let (true, Some(chunk)) = (continuing, &request.batch) {
                    self.batches.discard(&chunk.session_id);
                }
                return Err(e);
            }
        };
        let (frames, session_config): (Box<dyn Iterator<Item = EncodeResult<Vec<u8>>> + 'f>, _) = match adapted {
            Some(adapted) => {
                let arguments = self.arguments(&descriptor, &adapted.geometry, frame_rate);
                let config = self.session_config(&request, &descriptor, arguments.clone())?;
                let frames: Box<dyn Iterator<Item = EncodeResult<Vec<u8>>> + 'f> = match &descriptor.pre_pass_args {
                    Some(pre_pass) => {
                        let buffered = adapted.collect::<EncodeResult<Vec<_>>>()?;
                        run_pre_pass(&arguments, pre_pass, &buffered)?;
                        Box::new(buffered.into_iter().map(Ok))
                    }
                    None => Box::new(adapted),
                };
                (frames, Some(config))
            }
            None => (Box::new(std::iter::empty()), None),
        };

        let frames_written = match &request.batch {
            Some(chunk) => {
                let launch = || match session_config {
                    Some(config) => EncodeSession::start(config),
                    None => Err(EncodeError::InvalidSessionState {
                        state: "missing".to_string(),
                        operation: "continue without frames".to_string(),
                    }),
                };
                match self
                    .batches
                    .advance(&chunk.session_id, frames, chunk.is_final_chunk, launch)?
                {
                    ChunkOutcome::Pending { frames_written } => return Ok(EncodeReport::Pending { frames_written }),
                    ChunkOutcome::Complete { frames_written } => frames_written,
                }
            }
            None => {
                let Some(config) = session_config else {
                    return Ok(EncodeReport::Skipped);
                };
                let mut session = EncodeSession::start(config)?;
                for frame in frames {
                    session.feed(&frame?)?;
                }
                session.finish()?
            }
        };

        let audio = match request.audio {
            Some(waveform) => self.mux_audio(&descriptor, &request.output_path, waveform, frames_written, frame_rate),
            None => AudioOutcome::NotRequested,
        };

        Ok(EncodeReport::Completed {
            output_path: request.output_path,
            frames_written,
            audio,
        })
    }

    /// Main-pass invocation for the adapted geometry
    ///
    /// The environment holds only the descriptor overrides; the child
    /// inherits everything else from this process.
    fn arguments(&self, descriptor: &FormatDescriptor, geometry: &FrameGeometry, frame_rate: f64) -> EncodeArguments {
        EncodeArguments {
            program: self.tools.ffmpeg.clone(),
            input_args: EncodeArguments::raw_video_input(geometry, frame_rate),
            extra_input_args: descriptor.inputs_main_pass.clone().unwrap_or_default(),
            output_args: descriptor.main_pass_args.clone(),
            environment: descriptor.environment_overrides.clone(),
        }
    }

    fn session_config(
        &self,
        request: &EncodeRequest,
        descriptor: &FormatDescriptor,
        arguments: EncodeArguments,
    ) -> EncodeResult<SessionConfig> {
        let secondary = match &descriptor.secondary_pass_args {
            Some(args) => {
                let program = self.tools.gifski.clone().ok_or_else(|| EncodeError::EncoderLaunchFailure {
                    program: "gifski".to_string(),
                    message: format!("format '{}' needs gifski; install it or configure its path", descriptor.name),
                })?;
                Some(SecondaryStage {
                    program,
                    args: args.clone(),
                })
            }
            None => None,
        };
        Ok(SessionConfig {
            arguments,
            output_path: request.output_path.clone(),
            metadata: request.metadata.clone(),
            save_metadata: descriptor.save_metadata,
            metadata_dir: self.tools.temp_dir.clone(),
            secondary,
        })
    }

    fn mux_audio(
        &self,
        descriptor: &FormatDescriptor,
        output_path: &std::path::Path,
        waveform: AudioWaveform,
        frames_written: u64,
        frame_rate: f64,
    ) -> AudioOutcome {
        let request = AudioMuxRequest {
            source_video_path: output_path.to_path_buf(),
            waveform,
            frames_written,
            frame_rate,
        };
        let muxer = AudioMuxer::new(self.tools.ffmpeg.clone(), descriptor.environment_overrides.clone());
        match muxer.mux(&request, descriptor.audio_pass_args.as_deref()) {
            Ok(()) => AudioOutcome::Muxed,
            Err(e) => {
                warn!("Audio mux failed, keeping the silent video: {}", e);
                AudioOutcome::Failed(e.to_string())
            }
        }
    }
}
