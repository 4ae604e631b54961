//! Frame adaptation: raw frames in, encoder-ready byte buffers out
//!
//! Geometry is taken from the first frame. Later frames are assumed to share
//! it; they are padded with the same plan and only their own buffer length is
//! checked.

use tracing::info;

use crate::domain::model::{Frame, FrameGeometry, PixelFormat};
use crate::domain::rules::PaddingPlan;
use crate::error::{EncodeError, EncodeResult};

pub mod pad;
pub mod pingpong;

pub use pingpong::PingPong;

/// Lazily adapted frame stream plus the geometry the encoder must be told
pub struct AdaptedFrames<'a> {
    pub geometry: FrameGeometry,
    pub padding: Option<PaddingPlan>,
    frames: Box<dyn Iterator<Item = EncodeResult<Vec<u8>>> + 'a>,
}

impl<'a> AdaptedFrames<'a> {
    /// Whether frames are padded to reach the encoder's alignment
    pub fn is_padded(&self) -> bool {
        self.padding.is_some()
    }
}

impl<'a> Iterator for AdaptedFrames<'a> {
    type Item = EncodeResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.frames.next()
    }
}

/// Normalises raw frames for an encoder
#[derive(Debug, Clone, Copy)]
pub struct FrameAdapter {
    alignment: usize,
    pingpong: bool,
}

impl FrameAdapter {
    pub fn new(alignment: usize, pingpong: bool) -> Self {
        Self {
            alignment: alignment.max(1),
            pingpong,
        }
    }

    /// Adapt a frame sequence
    ///
    /// Returns `Ok(None)` for an empty sequence. With ping-pong enabled the
    /// whole sequence is converted before the first frame is returned.
    pub fn adapt<'a, I>(&self, frames: I) -> EncodeResult<Option<AdaptedFrames<'a>>>
    where
        I: IntoIterator<Item = Frame>,
        I::IntoIter: 'a,
    {
        self.try_adapt(frames.into_iter().map(Ok))
    }

    /// Adapt a frame sequence whose source can fail
    ///
    /// A source error is passed through in place of the frame it replaces.
    pub fn try_adapt<'a, I>(&self, frames: I) -> EncodeResult<Option<AdaptedFrames<'a>>>
    where
        I: IntoIterator<Item = EncodeResult<Frame>>,
        I::IntoIter: 'a,
    {
        let mut frames = frames.into_iter().peekable();
        if matches!(frames.peek(), Some(Err(_))) {
            if let Some(Err(e)) = frames.next() {
                return Err(e);
            }
        }
        let Some(Ok(first)) = frames.peek() else {
            return Ok(None);
        };
        first.validate()?;
        let pixel_format = PixelFormat::from_channels(first.channels)?;
        let padding = PaddingPlan::for_dimensions(first.width, first.height, self.alignment);
        let geometry = match &padding {
            Some(plan) => FrameGeometry {
                width: plan.padded_width(first.width),
                height: plan.padded_height(first.height),
                pixel_format,
            },
            None => FrameGeometry {
                width: first.width,
                height: first.height,
                pixel_format,
            },
        };
        if padding.is_some() {
            info!(
                "Output images were not of valid resolution and have had padding applied: {}",
                geometry.dimensions()
            );
        }

        let converted = frames.map(move |frame| frame.and_then(|frame| convert(frame, pixel_format, padding.as_ref())));
        let frames: Box<dyn Iterator<Item = EncodeResult<Vec<u8>>> + 'a> = if self.pingpong {
            let buffers = converted.collect::<EncodeResult<Vec<_>>>()?;
            Box::new(PingPong::new(buffers).map(Ok))
        } else {
            Box::new(converted)
        };

        Ok(Some(AdaptedFrames {
            geometry,
            padding,
            frames,
        }))
    }
}

fn convert(frame: Frame, pixel_format: PixelFormat, padding: Option<&PaddingPlan>) -> EncodeResult<Vec<u8>> {
    frame.validate()?;
    if frame.channels != pixel_format.channels() {
        PixelFormat::from_channels(frame.channels)?;
        return Err(EncodeError::InvalidFrame {
            message: format!(
                "frame has {} channels but the stream started as {}",
                frame.channels, pixel_format
            ),
        });
    }
    let (width, height, channels) = (frame.width, frame.height, frame.channels);
    let bytes = frame.into_bytes();
    Ok(match padding {
        Some(plan) => pad::replicate_pad(&bytes, width, height, channels, plan),
        None => bytes,
    })
}
