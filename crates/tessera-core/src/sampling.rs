use crate::consts::MAX_SAMPLE_SIZE;

/// Pick the pyramid level for a source drawn at `scale`.
///
/// Returns the largest power of two, strictly below the rounded
/// source/requested ratio, whose downsampled image still meets the requested
/// size. `dpi_factor` (minimum tile DPI / screen DPI) inflates the requested
/// size so tiles are decoded at a minimum density. When the requested
/// dimensions truncate to zero, or the ratio is larger still, the result is
/// capped at [`MAX_SAMPLE_SIZE`], keeping the function monotonic in `scale`.
pub fn calculate_in_sample_size(width: u32, height: u32, scale: f32, dpi_factor: f32) -> u32 {
    let scale = scale * dpi_factor;
    // `as` saturates: negative and NaN scales land on zero.
    let req_width = (width as f32 * scale) as u32;
    let req_height = (height as f32 * scale) as u32;

    if req_width == 0 || req_height == 0 {
        return MAX_SAMPLE_SIZE;
    }

    let mut in_sample_size = 1;
    if height > req_height || width > req_width {
        let height_ratio = (height as f32 / req_height as f32).round() as u32;
        let width_ratio = (width as f32 / req_width as f32).round() as u32;
        in_sample_size = height_ratio.min(width_ratio);
    }

    let mut power = 1;
    while power * 2 < in_sample_size && power < MAX_SAMPLE_SIZE {
        power *= 2;
    }
    power
}
