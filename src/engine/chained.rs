//! Two-stage encoder bridge
//!
//! The first stage (ffmpeg) emits yuv4mpeg on stdout. That pipe is handed
//! directly to the second stage (e.g. gifski) as its stdin, so intermediate
//! frames never pass back through this process.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tracing::{info, warn};

use crate::domain::model::EncodeArguments;
use crate::engine::process::{EncoderProcess, OutputMode, ProcessOutput};
use crate::error::{EncodeError, EncodeResult};

/// Program and arguments of the second stage
#[derive(Debug, Clone, PartialEq)]
pub struct SecondaryStage {
    pub program: PathBuf,
    pub args: Vec<String>,
}

/// Both stages of a chained encode
pub struct ChainedEncoder {
    first: EncoderProcess,
    second: EncoderProcess,
}

impl ChainedEncoder {
    pub fn launch(arguments: &EncodeArguments, secondary: &SecondaryStage, output_path: &Path) -> EncodeResult<Self> {
        let mut first_args = arguments.command_args();
        first_args.extend(["-f", "yuv4mpegpipe", "-"].map(String::from));
        let mut first = EncoderProcess::launch(
            &arguments.program,
            &first_args,
            &arguments.environment,
            OutputMode::Pipe,
        )?;
        let intermediate = first.take_stdout().ok_or_else(|| EncodeError::EncoderLaunchFailure {
            program: arguments.program.display().to_string(),
            message: "first stage output is not piped".to_string(),
        })?;

        let mut second_args = secondary.args.clone();
        second_args.extend([
            "-q".to_string(),
            "-o".to_string(),
            output_path.to_string_lossy().into_owned(),
            "-".to_string(),
        ]);
        let second = EncoderProcess::launch_with_input(
            &secondary.program,
            &second_args,
            &arguments.environment,
            Stdio::from(intermediate),
            OutputMode::Capture,
        )?;

        Ok(Self { first, second })
    }

    pub fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.first.write(bytes)
    }

    /// Exit status of whichever stage has already stopped
    pub fn try_exit_status(&mut self) -> io::Result<Option<ExitStatus>> {
        match self.first.try_exit_status()? {
            Some(status) => Ok(Some(status)),
            None => self.second.try_exit_status(),
        }
    }

    /// Close the first stage's input and wait for both stages
    pub fn wait(self) -> EncodeResult<(ProcessOutput, ProcessOutput)> {
        let first = self.first.wait()?;
        let second = self.second.wait()?;
        Ok((first, second))
    }

    /// Wait for both stages and check that each succeeded
    pub fn finish(self) -> EncodeResult<()> {
        let (first, second) = self.wait()?;
        for output in [&first, &second] {
            if !output.diagnostics.is_empty() {
                warn!("{}: {}", output.label, output.diagnostics.trim_end());
            }
        }
        if !second.stdout.is_empty() {
            info!("{}: {}", second.label, second.stdout.trim_end());
        }
        let failed = [&first, &second].into_iter().find(|output| !output.status.success());
        if let Some(failed) = failed {
            return Err(EncodeError::EncoderFailure {
                status: format!("{} {}", failed.label, failed.status),
                diagnostics: combined_diagnostics(&first, &second),
            });
        }
        Ok(())
    }
}

/// Both stages' diagnostics, labelled
pub fn combined_diagnostics(first: &ProcessOutput, second: &ProcessOutput) -> String {
    format!(
        "{}: {}\n{}: {}",
        first.label,
        first.diagnostics.trim_end(),
        second.label,
        second.diagnostics.trim_end()
    )
}
