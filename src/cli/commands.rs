//! Command implementations

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::adapters::toml_config::AppConfig;
use crate::adapters::JsonFormatCatalog;
use crate::app::{
    AppContainer, AudioOutcome, BatchChunk, DefaultAppContainer, EncodeInteractor, EncodeReport, EncodeRequest,
};
use crate::cli::args::{EncodeArgs, WidgetsArgs};
use crate::domain::model::{AudioWaveform, Frame};
use crate::error::EncodeError;
use crate::output::OverwritePolicy;
use crate::ports::FormatCatalog;

/// Image extensions picked up from the input directory
const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "tif", "tiff"];

/// Execute the encode command
pub fn encode(args: EncodeArgs, config: &AppConfig) -> Result<()> {
    info!("Starting encode operation");
    info!("Input: {}", args.input.display());
    info!("Output: {}", args.output.display());

    let paths = image_paths(&args.input)?;
    info!("Found {} input images", paths.len());

    let container = DefaultAppContainer::new(config).context("Failed to initialise encoder")?;
    let interactor = container.encode_interactor();

    let mut request = EncodeRequest::new(&args.output, &args.format);
    request.frame_rate = args.frame_rate;
    request.pingpong = args.pingpong;
    request.widget_values = args.widgets.into_iter().collect();
    request.metadata = args.metadata;
    request.overwrite = if args.overwrite {
        OverwritePolicy::Always
    } else {
        config.overwrite
    };
    if let Some(audio) = &args.audio {
        let sample_rate = args
            .sample_rate
            .context("--sample-rate is required with --audio")?;
        request.audio = Some(load_waveform(audio, sample_rate, args.channels)?);
    }

    let report = match args.chunk_size {
        Some(chunk_size) if chunk_size > 0 => {
            let session_id = format!("cli-{}", std::process::id());
            let chunks: Vec<&[PathBuf]> = paths.chunks(chunk_size).collect();
            let mut report = EncodeReport::Skipped;
            for (index, chunk) in chunks.iter().enumerate() {
                let mut chunk_request = request.clone();
                chunk_request.batch = Some(BatchChunk {
                    session_id: session_id.clone(),
                    is_final_chunk: index + 1 == chunks.len(),
                });
                report = encode_images(&interactor, chunk_request, chunk)?;
                debug!("Chunk {} of {}: {:?}", index + 1, chunks.len(), report);
            }
            report
        }
        _ => encode_images(&interactor, request, &paths)?,
    };

    match report {
        EncodeReport::Skipped => warn!("No frames were encoded"),
        EncodeReport::Pending { frames_written } => {
            warn!("Encode left pending after {} frames", frames_written)
        }
        EncodeReport::Completed {
            output_path,
            frames_written,
            audio,
        } => {
            if let AudioOutcome::Failed(message) = &audio {
                warn!("Audio was not added: {}", message);
            }
            info!("Encode operation completed successfully");
            println!("{} ({} frames)", output_path.display(), frames_written);
        }
    }
    Ok(())
}

/// Execute the formats command
pub fn formats(config: &AppConfig) -> Result<()> {
    let catalog = JsonFormatCatalog::new(config.formats_dir());
    let names = catalog.list().context("Failed to list formats")?;
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

/// Execute the widgets command
pub fn widgets(args: WidgetsArgs, config: &AppConfig) -> Result<()> {
    let catalog = JsonFormatCatalog::new(config.formats_dir());
    let template = catalog
        .load(&args.format)
        .with_context(|| format!("Failed to load format '{}'", args.format))?;
    for (name, value) in template.widget_defaults() {
        println!("{} = {}", name, value);
    }
    Ok(())
}

/// Stream the images at `paths` through one encode call
///
/// Images are decoded lazily. A decoding failure aborts the encode without
/// finalising it, and the incomplete output file is removed.
fn encode_images(
    interactor: &EncodeInteractor,
    request: EncodeRequest,
    paths: &[PathBuf],
) -> Result<EncodeReport> {
    let output_path = request.output_path.clone();
    let failure: Rc<RefCell<Option<anyhow::Error>>> = Rc::new(RefCell::new(None));
    let slot = Rc::clone(&failure);
    let frames = paths.iter().map(move |path| {
        load_frame(path).map_err(|e| {
            let message = format!("{:#}", e);
            *slot.borrow_mut() = Some(e);
            EncodeError::InvalidFrame { message }
        })
    });

    let result = interactor.try_encode(request, frames);
    let decode_failure = failure.borrow_mut().take();
    match (result, decode_failure) {
        // Other errors (e.g. an existing output) are raised before any frame is written
        (Err(EncodeError::InvalidFrame { .. }), Some(e)) => {
            remove_incomplete(&output_path);
            Err(e)
        }
        (result, _) => result.context("Encode failed"),
    }
}

fn remove_incomplete(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => warn!("Removed incomplete output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove incomplete output {}: {}", path.display(), e),
    }
}

/// Image files of `dir` sorted by file name
pub fn image_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read input directory {}", dir.display()))? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .map_or(false, |ext| IMAGE_EXTENSIONS.contains(&ext.as_str()));
        if path.is_file() && is_image {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

/// Decode one image into an RGB or RGBA frame
pub fn load_frame(path: &Path) -> Result<Frame> {
    let image = image::open(path).with_context(|| format!("Failed to decode image {}", path.display()))?;
    let (width, height) = (image.width() as usize, image.height() as usize);
    let frame = if image.color().has_alpha() {
        Frame::from_u8(width, height, 4, image.to_rgba8().into_raw())
    } else {
        Frame::from_u8(width, height, 3, image.to_rgb8().into_raw())
    };
    Ok(frame)
}

/// Read raw interleaved little-endian f32 samples
pub fn load_waveform(path: &Path, sample_rate: u32, channels: usize) -> Result<AudioWaveform> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read audio {}", path.display()))?;
    if bytes.len() % 4 != 0 {
        anyhow::bail!("Audio file {} is not a whole number of f32 samples", path.display());
    }
    let samples = bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    Ok(AudioWaveform::interleaved(samples, sample_rate, channels.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_image_paths_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        for name in ["frame_002.png", "frame_001.png", "notes.txt", "frame_010.JPG"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        let names: Vec<String> = image_paths(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["frame_001.png", "frame_002.png", "frame_010.JPG"]);
    }

    #[test]
    fn test_load_frame_keeps_alpha() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.png");
        image::RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 4])).save(&path).unwrap();

        let frame = load_frame(&path).unwrap();
        assert_eq!((frame.width, frame.height, frame.channels), (3, 2, 4));
        assert_eq!(frame.expected_len(), 24);
    }

    #[test]
    fn test_load_waveform() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audio.f32");
        let bytes: Vec<u8> = [0.5f32, -0.5, 0.25, 0.0].iter().flat_map(|s| s.to_le_bytes()).collect();
        fs::write(&path, bytes).unwrap();

        let waveform = load_waveform(&path, 48000, 2).unwrap();
        assert_eq!(waveform.samples, vec![0.5, -0.5, 0.25, 0.0]);
        assert_eq!(waveform.channels, 2);

        fs::write(&path, [0u8; 3]).unwrap();
        assert!(load_waveform(&path, 48000, 2).is_err());
    }
}
