//! Output file handling and audio muxing

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EncodeError, EncodeResult};

pub mod mux;

pub use mux::AudioMuxer;

/// Overwrite policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwritePolicy {
    /// Refuse to touch an existing file
    #[default]
    Never,
    /// Always overwrite
    Always,
}

/// Make `path` ready to be written under `policy`
///
/// Creates the parent directory and, under [`OverwritePolicy::Always`],
/// removes an existing file so a stale output is never mistaken for a
/// partial encode.
pub fn prepare_output(path: &Path, policy: OverwritePolicy) -> EncodeResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    if path.exists() {
        match policy {
            OverwritePolicy::Never => {
                return Err(EncodeError::OutputExists {
                    path: path.to_path_buf(),
                })
            }
            OverwritePolicy::Always => {
                info!("Overwriting existing output: {}", path.display());
                fs::remove_file(path)?;
            }
        }
    }
    Ok(())
}
