//! Metadata sidecar written next to an encode

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::domain::rules::metadata_sidecar;
use crate::error::EncodeResult;

/// Write `comment` as an ffmpeg metadata document inside `dir`
///
/// The file is removed when the returned handle is dropped.
pub fn write_sidecar(dir: &Path, comment: &str) -> EncodeResult<NamedTempFile> {
    fs::create_dir_all(dir)?;
    let mut file = tempfile::Builder::new()
        .prefix("metadata-")
        .suffix(".txt")
        .tempfile_in(dir)?;
    file.write_all(metadata_sidecar(comment).as_bytes())?;
    file.flush()?;
    Ok(file)
}
