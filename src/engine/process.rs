//! Encoder subprocess handle
//!
//! Owns one child process, its input pipe and background readers for its
//! diagnostic stream (and optionally its standard output). Readers run on
//! their own threads and are joined when the process is waited on.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::error::{EncodeError, EncodeResult};

/// What to do with a child's standard output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Discard it
    Discard,
    /// Leave it piped so it can be handed to another process
    Pipe,
    /// Read it to completion in the background
    Capture,
}

/// Background reader collecting a stream to completion
struct StreamDrain {
    handle: Option<JoinHandle<Vec<u8>>>,
}

impl StreamDrain {
    fn spawn<R: Read + Send + 'static>(label: String, mut reader: R) -> Self {
        let handle = thread::spawn(move || {
            let mut buffer = Vec::new();
            if let Err(e) = reader.read_to_end(&mut buffer) {
                debug!(target: "encoder_stderr", "{}: read error: {}", label, e);
            }
            buffer
        });
        Self { handle: Some(handle) }
    }

    fn collect(&mut self) -> Vec<u8> {
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_default(),
            None => Vec::new(),
        }
    }
}

/// Exit status and collected streams of a finished process
#[derive(Debug)]
pub struct ProcessOutput {
    pub label: String,
    pub status: ExitStatus,
    pub diagnostics: String,
    pub stdout: String,
}

/// A running encoder
pub struct EncoderProcess {
    label: String,
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: StreamDrain,
    stdout: Option<StreamDrain>,
    finished: bool,
}

impl EncoderProcess {
    /// Launch `program` with a piped input stream
    pub fn launch(
        program: &Path,
        args: &[String],
        environment: &HashMap<String, String>,
        output: OutputMode,
    ) -> EncodeResult<Self> {
        Self::launch_with_input(program, args, environment, Stdio::piped(), output)
    }

    /// Launch `program` reading from an arbitrary input
    pub fn launch_with_input(
        program: &Path,
        args: &[String],
        environment: &HashMap<String, String>,
        input: Stdio,
        output: OutputMode,
    ) -> EncodeResult<Self> {
        let label = program_label(program);
        debug!(cmd = %format!("{} {}", program.display(), args.join(" ")), "launching {}", label);

        let stdout = match output {
            OutputMode::Discard => Stdio::null(),
            OutputMode::Pipe | OutputMode::Capture => Stdio::piped(),
        };
        let mut child = Command::new(program)
            .args(args)
            .envs(environment)
            .stdin(input)
            .stdout(stdout)
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| launch_failure(program, e))?;

        let stdin = child.stdin.take();
        let stderr = match child.stderr.take() {
            Some(stderr) => StreamDrain::spawn(format!("{} stderr", label), stderr),
            None => StreamDrain { handle: None },
        };
        let stdout = match output {
            OutputMode::Capture => child
                .stdout
                .take()
                .map(|stdout| StreamDrain::spawn(format!("{} stdout", label), stdout)),
            OutputMode::Discard | OutputMode::Pipe => None,
        };

        Ok(Self {
            label,
            child,
            stdin,
            stderr,
            stdout,
            finished: false,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Hand the piped standard output to the caller
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Blocking write of one buffer to the input pipe
    ///
    /// Returns once the OS pipe has accepted every byte.
    pub fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self.stdin.as_mut() {
            Some(stdin) => stdin.write_all(bytes),
            None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "encoder input is closed")),
        }
    }

    /// Exit status if the process has already terminated
    pub fn try_exit_status(&mut self) -> io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Close the input pipe so the encoder sees end-of-stream
    pub fn close_input(&mut self) {
        if let Some(mut stdin) = self.stdin.take() {
            if let Err(e) = stdin.flush() {
                debug!("{}: flush on close failed: {}", self.label, e);
            }
        }
    }

    /// Close input, wait for exit and drain every captured stream
    pub fn wait(mut self) -> EncodeResult<ProcessOutput> {
        self.close_input();
        let status = self.child.wait()?;
        self.finished = true;
        let diagnostics = String::from_utf8_lossy(&self.stderr.collect()).into_owned();
        let stdout = match self.stdout.as_mut() {
            Some(drain) => String::from_utf8_lossy(&drain.collect()).into_owned(),
            None => String::new(),
        };
        Ok(ProcessOutput {
            label: self.label.clone(),
            status,
            diagnostics,
            stdout,
        })
    }
}

impl Drop for EncoderProcess {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.stdin.take();
        if let Ok(None) = self.child.try_wait() {
            warn!("{}: killing unfinished encoder process", self.label);
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

/// Short display name for a program path
pub fn program_label(program: &Path) -> String {
    program
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string())
}

fn launch_failure(program: &Path, error: io::Error) -> EncodeError {
    let message = if error.kind() == io::ErrorKind::NotFound {
        "executable not found; install it or configure its path".to_string()
    } else {
        error.to_string()
    };
    EncodeError::EncoderLaunchFailure {
        program: program.display().to_string(),
        message,
    }
}
