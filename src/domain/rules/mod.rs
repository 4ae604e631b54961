// Domain rules - Pure policies shared by the pipeline stages

/// Frame rates outside this range are clamped before launching the encoder
pub const MIN_FRAME_RATE: f64 = 1.0;
pub const MAX_FRAME_RATE: f64 = 120.0;

/// Header line of an ffmpeg metadata sidecar
pub const METADATA_HEADER: &str = ";FFMETADATA1";

/// Clamp a requested frame rate into the supported range
pub fn clamp_frame_rate(frame_rate: f64) -> f64 {
    if frame_rate.is_nan() {
        return MIN_FRAME_RATE;
    }
    frame_rate.clamp(MIN_FRAME_RATE, MAX_FRAME_RATE)
}

/// Render a frame rate the way the encoder expects it on its command line
pub fn format_frame_rate(frame_rate: f64) -> String {
    if frame_rate.fract() == 0.0 {
        format!("{}", frame_rate as i64)
    } else {
        frame_rate.to_string()
    }
}

/// Minimum audio duration for a muxed output, with one second of slack
pub fn min_audio_duration(frames_written: u64, frame_rate: f64) -> f64 {
    frames_written as f64 / frame_rate + 1.0
}

/// Escape text for a line-oriented `key=value` metadata sidecar
///
/// Backslash is escaped first so later escapes are not doubled.
pub fn escape_metadata(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace('#', "\\#")
        .replace('=', "\\=")
        .replace('\n', "\\\n")
}

/// Full sidecar document for a metadata comment
pub fn metadata_sidecar(comment: &str) -> String {
    format!("{}\ncomment={}", METADATA_HEADER, escape_metadata(comment))
}

/// Edge padding needed to bring a frame to an aligned size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaddingPlan {
    pub left: usize,
    pub right: usize,
    pub top: usize,
    pub bottom: usize,
}

impl PaddingPlan {
    /// Plan padding for the given dimensions, or `None` when already aligned
    ///
    /// The odd pixel of an uneven split goes to the trailing edge.
    pub fn for_dimensions(width: usize, height: usize, alignment: usize) -> Option<Self> {
        let alignment = alignment.max(1);
        if width % alignment == 0 && height % alignment == 0 {
            return None;
        }
        let pad_x = (alignment - width % alignment) % alignment;
        let pad_y = (alignment - height % alignment) % alignment;
        Some(Self {
            left: pad_x / 2,
            right: pad_x - pad_x / 2,
            top: pad_y / 2,
            bottom: pad_y - pad_y / 2,
        })
    }

    pub fn padded_width(&self, width: usize) -> usize {
        width + self.left + self.right
    }

    pub fn padded_height(&self, height: usize) -> usize {
        height + self.top + self.bottom
    }
}

/// Length of a ping-pong sequence built from `n` frames
pub fn pingpong_len(n: usize) -> usize {
    if n < 2 {
        n
    } else {
        2 * n - 2
    }
}
