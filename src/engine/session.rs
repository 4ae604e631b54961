//! Streaming encode session
//!
//! A session launches the encoder once, accepts frames one at a time through
//! [`EncodeSession::feed`] and finalises exactly once through
//! [`EncodeSession::finish`]. Writes block on the OS pipe, so an encoder that
//! reads slowly throttles the producer.

use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::domain::model::{EncodeArguments, SessionState};
use crate::engine::chained::{combined_diagnostics, ChainedEncoder, SecondaryStage};
use crate::engine::metadata::write_sidecar;
use crate::engine::process::{EncoderProcess, OutputMode};
use crate::error::{EncodeError, EncodeResult};

/// Everything needed to launch a session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub arguments: EncodeArguments,
    pub output_path: PathBuf,
    /// Opaque metadata embedded as the container comment
    pub metadata: Option<String>,
    pub save_metadata: bool,
    /// Directory receiving the metadata sidecar
    pub metadata_dir: PathBuf,
    pub secondary: Option<SecondaryStage>,
}

enum Pipeline {
    Single(EncoderProcess),
    Chained(ChainedEncoder),
}

impl Pipeline {
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        match self {
            Pipeline::Single(process) => process.write(bytes),
            Pipeline::Chained(chain) => chain.write(bytes),
        }
    }

    fn has_exited(&mut self) -> bool {
        let status = match self {
            Pipeline::Single(process) => process.try_exit_status(),
            Pipeline::Chained(chain) => chain.try_exit_status(),
        };
        // A process we cannot query is treated as gone
        !matches!(status, Ok(None))
    }

    /// Wait for every stage and return the labelled diagnostics
    fn collect_diagnostics(self) -> EncodeResult<String> {
        match self {
            Pipeline::Single(process) => Ok(process.wait()?.diagnostics),
            Pipeline::Chained(chain) => {
                let (first, second) = chain.wait()?;
                Ok(combined_diagnostics(&first, &second))
            }
        }
    }
}

/// One in-progress or completed encode
pub struct EncodeSession {
    config: SessionConfig,
    state: SessionState,
    pipeline: Option<Pipeline>,
    sidecar: Option<NamedTempFile>,
    frames_written: u64,
}

impl EncodeSession {
    /// Create a session without launching anything
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: SessionState::Created,
            pipeline: None,
            sidecar: None,
            frames_written: 0,
        }
    }

    /// Create and launch a session
    pub fn start(config: SessionConfig) -> EncodeResult<Self> {
        let mut session = Self::new(config);
        session.launch()?;
        Ok(session)
    }

    /// Launch the encoder process(es)
    pub fn launch(&mut self) -> EncodeResult<()> {
        if self.state != SessionState::Created {
            return Err(self.state_error("launch"));
        }
        let result = self.launch_pipeline();
        match result {
            Ok(pipeline) => {
                self.pipeline = Some(pipeline);
                self.state = SessionState::AwaitingFrame;
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    fn launch_pipeline(&mut self) -> EncodeResult<Pipeline> {
        let output = self.config.output_path.to_string_lossy().into_owned();

        if let Some(secondary) = &self.config.secondary {
            if self.config.save_metadata {
                debug!("metadata is not embedded in chained encodes");
            }
            let chain = ChainedEncoder::launch(&self.config.arguments, secondary, &self.config.output_path)?;
            return Ok(Pipeline::Chained(chain));
        }

        if self.config.save_metadata {
            let comment = self.config.metadata.as_deref().unwrap_or("{}");
            let sidecar = write_sidecar(&self.config.metadata_dir, comment)?;
            let mut args = self.config.arguments.command_args_with_metadata(sidecar.path());
            args.push(output);
            debug!(sidecar = %sidecar.path().display(), "launching encoder with metadata");
            let process = EncoderProcess::launch(
                &self.config.arguments.program,
                &args,
                &self.config.arguments.environment,
                OutputMode::Discard,
            )?;
            self.sidecar = Some(sidecar);
            return Ok(Pipeline::Single(process));
        }

        self.launch_plain().map(Pipeline::Single)
    }

    fn launch_plain(&self) -> EncodeResult<EncoderProcess> {
        let mut args = self.config.arguments.command_args();
        args.push(self.config.output_path.to_string_lossy().into_owned());
        EncoderProcess::launch(
            &self.config.arguments.program,
            &args,
            &self.config.arguments.environment,
            OutputMode::Discard,
        )
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn output_path(&self) -> &Path {
        &self.config.output_path
    }

    /// Whether the running encoder was launched with the metadata sidecar
    pub fn is_embedding_metadata(&self) -> bool {
        self.sidecar.is_some()
    }

    /// Whether the encoder has terminated while the session is still open
    pub fn encoder_exited(&mut self) -> bool {
        match self.pipeline.as_mut() {
            Some(pipeline) => pipeline.has_exited(),
            None => false,
        }
    }

    /// Write one frame to the encoder
    ///
    /// Blocks until the pipe accepts the whole buffer.
    pub fn feed(&mut self, frame: &[u8]) -> EncodeResult<()> {
        if self.state != SessionState::AwaitingFrame {
            return Err(self.state_error("feed a frame"));
        }
        self.state = SessionState::Draining;
        match self.write_frame(frame) {
            Ok(()) => {
                self.frames_written += 1;
                self.state = SessionState::AwaitingFrame;
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    fn write_frame(&mut self, frame: &[u8]) -> EncodeResult<()> {
        loop {
            let pipeline = self
                .pipeline
                .as_mut()
                .ok_or_else(|| EncodeError::InvalidSessionState {
                    state: SessionState::Failed.to_string(),
                    operation: "feed a frame".to_string(),
                })?;

            let write_error = if pipeline.has_exited() {
                None
            } else {
                match pipeline.write(frame) {
                    Ok(()) => return Ok(()),
                    Err(e) => Some(e),
                }
            };
            if let Some(e) = &write_error {
                debug!("encoder input write failed: {}", e);
            }

            let Some(pipeline) = self.pipeline.take() else {
                continue;
            };
            let diagnostics = pipeline.collect_diagnostics()?;
            let partial_output = self.config.output_path.exists();

            if self.sidecar.is_some() && !partial_output {
                // Embedding metadata is best effort
                warn!(
                    frames_lost = self.frames_written,
                    "An error occurred when saving with metadata, retrying without it: {}",
                    diagnostics.trim_end()
                );
                self.sidecar = None;
                self.pipeline = Some(Pipeline::Single(self.launch_plain()?));
                continue;
            }

            return Err(EncodeError::EncoderBrokenPipe {
                output_path: self.config.output_path.clone(),
                partial_output,
                diagnostics,
            });
        }
    }

    /// Close the input, wait for the encoder and return the frame count
    ///
    /// Calling it again after success returns the same count.
    pub fn finish(&mut self) -> EncodeResult<u64> {
        match self.state {
            SessionState::Finalized => return Ok(self.frames_written),
            SessionState::AwaitingFrame => {}
            _ => return Err(self.state_error("finish")),
        }
        self.state = SessionState::Draining;

        let result = match self.pipeline.take() {
            Some(Pipeline::Single(process)) => Self::finish_single(process),
            Some(Pipeline::Chained(chain)) => chain.finish(),
            None => Ok(()),
        };
        self.sidecar = None;

        match result {
            Ok(()) => {
                self.state = SessionState::Finalized;
                info!(
                    frames = self.frames_written,
                    output = %self.config.output_path.display(),
                    "Encode finished"
                );
                Ok(self.frames_written)
            }
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    fn finish_single(process: EncoderProcess) -> EncodeResult<()> {
        let output = process.wait()?;
        if !output.status.success() {
            return Err(EncodeError::EncoderFailure {
                status: output.status.to_string(),
                diagnostics: output.diagnostics,
            });
        }
        if !output.diagnostics.is_empty() {
            warn!("{}: {}", output.label, output.diagnostics.trim_end());
        }
        Ok(())
    }

    fn state_error(&self, operation: &str) -> EncodeError {
        EncodeError::InvalidSessionState {
            state: self.state.to_string(),
            operation: operation.to_string(),
        }
    }
}

impl std::fmt::Debug for EncodeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodeSession")
            .field("output_path", &self.config.output_path)
            .field("state", &self.state)
            .field("frames_written", &self.frames_written)
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn sh_arguments(script: &str) -> EncodeArguments {
        EncodeArguments {
            program: "sh".into(),
            input_args: vec!["-c".to_string(), script.to_string()],
            extra_input_args: vec![],
            output_args: vec![],
            environment: HashMap::new(),
        }
    }

    fn config(arguments: EncodeArguments, dir: &TempDir) -> SessionConfig {
        SessionConfig {
            arguments,
            output_path: dir.path().join("out.bin"),
            metadata: None,
            save_metadata: false,
            metadata_dir: dir.path().join("temp"),
            secondary: None,
        }
    }

    fn wait_for_exit(session: &mut EncodeSession) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !session.encoder_exited() {
            assert!(Instant::now() < deadline, "encoder never exited");
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_frames_reach_output_in_order() {
        let dir = TempDir::new().unwrap();
        let mut session = EncodeSession::start(config(sh_arguments("cat > \"$0\""), &dir)).unwrap();
        assert_eq!(session.state(), SessionState::AwaitingFrame);

        for value in 0u8..3 {
            session.feed(&[value; 6]).unwrap();
        }
        assert_eq!(session.finish().unwrap(), 3);
        assert_eq!(session.state(), SessionState::Finalized);

        let written = fs::read(dir.path().join("out.bin")).unwrap();
        assert_eq!(written, [[0u8; 6], [1u8; 6], [2u8; 6]].concat());
    }

    #[test]
    fn test_finish_is_idempotent_and_closes_session() {
        let dir = TempDir::new().unwrap();
        let mut session = EncodeSession::start(config(sh_arguments("cat > \"$0\""), &dir)).unwrap();
        session.feed(&[9u8; 4]).unwrap();

        assert_eq!(session.finish().unwrap(), 1);
        assert_eq!(session.finish().unwrap(), 1);
        assert!(matches!(
            session.feed(&[0u8; 4]),
            Err(EncodeError::InvalidSessionState { .. })
        ));
    }

    #[test]
    fn test_nonzero_exit_at_finish_is_encoder_failure() {
        let dir = TempDir::new().unwrap();
        let script = "cat > /dev/null; echo 'Unknown encoder' >&2; exit 2";
        let mut session = EncodeSession::start(config(sh_arguments(script), &dir)).unwrap();
        session.feed(&[0u8; 4]).unwrap();

        match session.finish().unwrap_err() {
            EncodeError::EncoderFailure { diagnostics, .. } => assert!(diagnostics.contains("Unknown encoder")),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[test]
    fn test_dead_encoder_without_output_is_broken_pipe() {
        let dir = TempDir::new().unwrap();
        let mut session = EncodeSession::start(config(sh_arguments("echo 'bad option' >&2; exit 1"), &dir)).unwrap();
        wait_for_exit(&mut session);

        match session.feed(&[0u8; 4]).unwrap_err() {
            EncodeError::EncoderBrokenPipe {
                partial_output,
                diagnostics,
                ..
            } => {
                assert!(!partial_output);
                assert!(diagnostics.contains("bad option"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(session.state(), SessionState::Failed);
        assert!(session.finish().is_err());
    }

    #[test]
    fn test_dead_encoder_with_partial_output() {
        let dir = TempDir::new().unwrap();
        let mut session = EncodeSession::start(config(sh_arguments("echo partial > \"$0\"; exit 1"), &dir)).unwrap();
        wait_for_exit(&mut session);

        let err = session.feed(&[0u8; 4]).unwrap_err();
        assert!(matches!(err, EncodeError::EncoderBrokenPipe { partial_output: true, .. }));
        assert!(err.to_string().contains("partial"));
    }

    #[test]
    fn test_metadata_rejection_falls_back_to_plain_invocation() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("encoder.sh");
        fs::write(
            &script,
            "#!/bin/sh\nif [ \"$1\" = \"-i\" ]; then echo 'metadata rejected' >&2; exit 1; fi\nfor last; do :; done\ncat > \"$last\"\n",
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let arguments = EncodeArguments {
            program: script,
            input_args: vec![],
            extra_input_args: vec![],
            output_args: vec![],
            environment: HashMap::new(),
        };
        let mut cfg = config(arguments, &dir);
        cfg.save_metadata = true;
        cfg.metadata = Some("{\"prompt\": \"x\"}".to_string());

        let mut session = EncodeSession::start(cfg).unwrap();
        assert!(session.is_embedding_metadata());
        wait_for_exit(&mut session);

        session.feed(&[1u8; 3]).unwrap();
        session.feed(&[2u8; 3]).unwrap();
        assert!(!session.is_embedding_metadata());
        assert_eq!(session.finish().unwrap(), 2);
        assert_eq!(fs::read(dir.path().join("out.bin")).unwrap(), [[1u8; 3], [2u8; 3]].concat());
    }

    #[test]
    fn test_chained_stages_produce_output() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(sh_arguments("cat"), &dir);
        cfg.secondary = Some(SecondaryStage {
            program: "sh".into(),
            args: vec!["-c".to_string(), "cat > \"$2\"".to_string()],
        });

        let mut session = EncodeSession::start(cfg).unwrap();
        session.feed(b"abc").unwrap();
        session.feed(b"def").unwrap();
        assert_eq!(session.finish().unwrap(), 2);
        assert_eq!(fs::read(dir.path().join("out.bin")).unwrap(), b"abcdef");
    }
}
