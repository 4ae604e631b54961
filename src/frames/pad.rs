//! Edge-replicating frame padding

use crate::domain::rules::PaddingPlan;

/// Pad an interleaved 8-bit frame by replicating its border pixels
pub fn replicate_pad(data: &[u8], width: usize, height: usize, channels: usize, plan: &PaddingPlan) -> Vec<u8> {
    let out_width = plan.padded_width(width);
    let out_height = plan.padded_height(height);
    let row_bytes = width * channels;
    let mut out = Vec::with_capacity(out_width * out_height * channels);

    for y in 0..out_height {
        let src_y = y.saturating_sub(plan.top).min(height - 1);
        let row = &data[src_y * row_bytes..(src_y + 1) * row_bytes];
        let first = &row[..channels];
        let last = &row[row_bytes - channels..];

        for _ in 0..plan.left {
            out.extend_from_slice(first);
        }
        out.extend_from_slice(row);
        for _ in 0..plan.right {
            out.extend_from_slice(last);
        }
    }
    out
}
