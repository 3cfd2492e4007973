/// Box-filter downscale: each output cell is the mean of the source pixels
/// it covers.
pub fn resize_average(
    pixels: &[f32],
    width: usize,
    height: usize,
    new_width: usize,
    new_height: usize,
) -> Vec<f32> {
    debug_assert_eq!(pixels.len(), width * height);
    if width == 0 || height == 0 || new_width == 0 || new_height == 0 {
        return vec![0.0; new_width * new_height];
    }
    let scale_x = width as f32 / new_width as f32;
    let scale_y = height as f32 / new_height as f32;
    let mut output = vec![0.0f32; new_width * new_height];
    for ny in 0..new_height {
        let y0 = ((ny as f32 * scale_y).floor() as usize).min(height - 1);
        let y1 = (((ny + 1) as f32 * scale_y).ceil() as usize).clamp(y0 + 1, height);
        for nx in 0..new_width {
            let x0 = ((nx as f32 * scale_x).floor() as usize).min(width - 1);
            let x1 = (((nx + 1) as f32 * scale_x).ceil() as usize).clamp(x0 + 1, width);
            let mut sum = 0.0f32;
            for sy in y0..y1 {
                sum += pixels[sy * width + x0..sy * width + x1].iter().sum::<f32>();
            }
            let count = (y1 - y0) * (x1 - x0);
            output[ny * new_width + nx] = sum / count as f32;
        }
    }
    output
}

pub fn mean_abs_diff(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let total: f32 = a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum();
    Some(total / a.len() as f32)
}
