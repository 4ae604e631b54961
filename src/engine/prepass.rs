//! Whole-stream analysis pass run before streaming starts

use tracing::{debug, info};

use crate::domain::model::EncodeArguments;
use crate::engine::process::{EncoderProcess, OutputMode};
use crate::error::{EncodeError, EncodeResult};

/// Run the pre-pass over every frame and wait for it to exit
///
/// The pre-pass sees the same raw-video input as the main pass, followed by
/// its own arguments.
pub fn run_pre_pass(arguments: &EncodeArguments, pre_pass: &[String], frames: &[Vec<u8>]) -> EncodeResult<()> {
    let mut args = arguments.input_args.clone();
    args.extend(pre_pass.iter().cloned());
    info!(frames = frames.len(), "Running encoder pre-pass");

    let mut process = EncoderProcess::launch(
        &arguments.program,
        &args,
        &arguments.environment,
        OutputMode::Capture,
    )?;
    let mut write_error = None;
    for frame in frames {
        if let Err(e) = process.write(frame) {
            write_error = Some(e);
            break;
        }
    }

    let output = process.wait()?;
    if let Some(e) = &write_error {
        debug!("pre-pass input closed early: {}", e);
    }
    if !output.status.success() {
        let mut diagnostics = output.diagnostics;
        if let (true, Some(e)) = (diagnostics.is_empty(), write_error) {
            diagnostics = e.to_string();
        }
        return Err(EncodeError::PrePassFailure { diagnostics });
    }
    Ok(())
}
