use std::cmp;

pub fn gaussian_blur_3x3(pixels: &[f32], width: usize, height: usize) -> Vec<f32> {
    debug_assert_eq!(pixels.len(), width * height);
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let kernel = [[1.0f32, 2.0, 1.0], [2.0, 4.0, 2.0], [1.0, 2.0, 1.0]];
    let mut output = vec![0.0f32; pixels.len()];
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0;
            let mut weight = 0.0;
            for (ky, kernel_row) in kernel.iter().enumerate() {
                for (kx, &w) in kernel_row.iter().enumerate() {
                    let oy = y as isize + ky as isize - 1;
                    let ox = x as isize + kx as isize - 1;
                    if oy < 0 || ox < 0 || oy >= height as isize || ox >= width as isize {
                        continue;
                    }
                    sum += pixels[oy as usize * width + ox as usize] * w;
                    weight += w;
                }
            }
            output[y * width + x] = if weight == 0.0 { 0.0 } else { sum / weight };
        }
    }
    output
}

/// `|gx| + |gy|` of the 3x3 Sobel operator; border pixels stay zero.
pub fn sobel_magnitude(pixels: &[f32], width: usize, height: usize) -> Vec<f32> {
    debug_assert_eq!(pixels.len(), width * height);
    let mut output = vec![0.0f32; pixels.len()];
    if width < 3 || height < 3 {
        return output;
    }
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let gx = pixels[(y - 1) * width + (x + 1)]
                + 2.0 * pixels[y * width + (x + 1)]
                + pixels[(y + 1) * width + (x + 1)]
                - pixels[(y - 1) * width + (x - 1)]
                - 2.0 * pixels[y * width + (x - 1)]
                - pixels[(y + 1) * width + (x - 1)];
            let gy = pixels[(y + 1) * width + (x - 1)]
                + 2.0 * pixels[(y + 1) * width + x]
                + pixels[(y + 1) * width + (x + 1)]
                - pixels[(y - 1) * width + (x - 1)]
                - 2.0 * pixels[(y - 1) * width + x]
                - pixels[(y - 1) * width + (x + 1)];
            output[y * width + x] = gx.abs() + gy.abs();
        }
    }
    output
}

pub fn threshold_mask(values: &[f32], threshold: f32) -> Vec<u8> {
    values
        .iter()
        .map(|&v| if v >= threshold { 1 } else { 0 })
        .collect()
}

/// Dilation with a `kernel_width` x `kernel_height` rectangle, repeated
/// `iterations` times. Rectangles compose, so the repeated kernel is applied
/// once as two separable max passes.
pub fn dilate_rect(
    mask: &[u8],
    width: usize,
    height: usize,
    kernel_width: usize,
    kernel_height: usize,
    iterations: usize,
) -> Vec<u8> {
    debug_assert_eq!(mask.len(), width * height);
    let radius_x = (kernel_width / 2) * iterations;
    let radius_y = (kernel_height / 2) * iterations;
    if width == 0 || height == 0 || (radius_x == 0 && radius_y == 0) {
        return mask.to_vec();
    }

    let mut horizontal = vec![0u8; mask.len()];
    for y in 0..height {
        let row = &mask[y * width..(y + 1) * width];
        let prefix = prefix_counts(row.iter().copied());
        for x in 0..width {
            let x0 = x.saturating_sub(radius_x);
            let x1 = cmp::min(width, x + radius_x + 1);
            if prefix[x1] > prefix[x0] {
                horizontal[y * width + x] = 1;
            }
        }
    }

    let mut output = vec![0u8; mask.len()];
    for x in 0..width {
        let prefix = prefix_counts((0..height).map(|y| horizontal[y * width + x]));
        for y in 0..height {
            let y0 = y.saturating_sub(radius_y);
            let y1 = cmp::min(height, y + radius_y + 1);
            if prefix[y1] > prefix[y0] {
                output[y * width + x] = 1;
            }
        }
    }
    output
}

fn prefix_counts(values: impl Iterator<Item = u8>) -> Vec<u32> {
    let mut prefix = vec![0u32];
    let mut total = 0u32;
    for value in values {
        total += (value != 0) as u32;
        prefix.push(total);
    }
    prefix
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentBox {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
    pub area: usize,
}

#[derive(Clone, Copy)]
struct RowRun {
    start: usize,
    end: usize,
    row: usize,
    label: u32,
}

/// Bounding boxes of 8-connected foreground components. For a filled mask
/// these equal the bounding boxes of the external contours.
pub fn component_boxes(mask: &[u8], width: usize, height: usize) -> Vec<ComponentBox> {
    debug_assert_eq!(mask.len(), width * height);
    let mut boxes = Vec::new();
    if width == 0 || height == 0 {
        return boxes;
    }

    let mut runs: Vec<RowRun> = Vec::new();
    let mut offsets = vec![0usize; height + 1];
    for row in 0..height {
        offsets[row] = runs.len();
        let row_data = &mask[row * width..(row + 1) * width];
        let mut x = 0usize;
        while x < width {
            while x < width && row_data[x] == 0 {
                x += 1;
            }
            if x >= width {
                break;
            }
            let start = x;
            while x < width && row_data[x] != 0 {
                x += 1;
            }
            runs.push(RowRun {
                start,
                end: x,
                row,
                label: 0,
            });
        }
    }
    offsets[height] = runs.len();
    if runs.is_empty() {
        return boxes;
    }

    let mut dsu = DisjointSet::new();
    for run in runs.iter_mut() {
        run.label = dsu.make_set();
    }

    for row in 1..height {
        let mut prev = offsets[row - 1];
        let prev_end = offsets[row];
        let mut curr = offsets[row];
        let curr_end = offsets[row + 1];
        while prev < prev_end && curr < curr_end {
            let run_a = runs[prev];
            let run_b = runs[curr];
            if runs_touch(&run_a, &run_b) {
                dsu.union(run_a.label, run_b.label);
            }
            if run_a.end <= run_b.end {
                prev += 1;
            } else {
                curr += 1;
            }
        }
    }

    let mut stats: Vec<Option<ComponentBox>> = vec![None; dsu.len()];
    let mut extents: Vec<(usize, usize)> = vec![(0, 0); dsu.len()];
    for run in runs.iter() {
        let root = dsu.find(run.label) as usize;
        let entry = stats[root].get_or_insert(ComponentBox {
            x: run.start,
            y: run.row,
            width: 0,
            height: 0,
            area: 0,
        });
        let extent = &mut extents[root];
        if entry.area == 0 {
            *extent = (run.end, run.row);
        }
        entry.area += run.end - run.start;
        entry.x = entry.x.min(run.start);
        entry.y = entry.y.min(run.row);
        extent.0 = extent.0.max(run.end);
        extent.1 = extent.1.max(run.row);
    }

    for (root, entry) in stats.into_iter().enumerate() {
        if let Some(mut comp) = entry {
            let (max_x, max_y) = extents[root];
            comp.width = max_x - comp.x;
            comp.height = max_y + 1 - comp.y;
            boxes.push(comp);
        }
    }
    boxes.sort_by_key(|b| (b.y, b.x));
    boxes
}

fn runs_touch(a: &RowRun, b: &RowRun) -> bool {
    // Diagonal neighbours count, hence the inclusive gap of zero columns.
    a.start <= b.end && b.start <= a.end
}

struct DisjointSet {
    parent: Vec<u32>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new() -> Self {
        Self {
            parent: Vec::new(),
            rank: Vec::new(),
        }
    }

    fn len(&self) -> usize {
        self.parent.len()
    }

    fn make_set(&mut self) -> u32 {
        let idx = self.parent.len() as u32;
        self.parent.push(idx);
        self.rank.push(0);
        idx
    }

    fn find(&mut self, x: u32) -> u32 {
        let mut root = x;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }
        let mut node = x;
        while self.parent[node as usize] != root {
            let next = self.parent[node as usize];
            self.parent[node as usize] = root;
            node = next;
        }
        root
    }

    fn union(&mut self, a: u32, b: u32) {
        let mut root_a = self.find(a);
        let mut root_b = self.find(b);
        if root_a == root_b {
            return;
        }
        let rank_a = self.rank[root_a as usize];
        let rank_b = self.rank[root_b as usize];
        if rank_a < rank_b {
            std::mem::swap(&mut root_a, &mut root_b);
        }
        self.parent[root_b as usize] = root_a;
        if rank_a == rank_b {
            self.rank[root_a as usize] = rank_a + 1;
        }
    }
}

/// Otsu's threshold over an 8-bit histogram. Returns `None` when the
/// histogram has a single populated class.
pub fn otsu_threshold(pixels: &[u8]) -> Option<u8> {
    if pixels.is_empty() {
        return None;
    }
    let mut histogram = [0u64; 256];
    for &p in pixels {
        histogram[p as usize] += 1;
    }
    let total = pixels.len() as f64;
    let weighted_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(value, &count)| value as f64 * count as f64)
        .sum();

    let mut background = 0.0f64;
    let mut weighted_background = 0.0f64;
    let mut best_variance = 0.0f64;
    let mut best = None;
    for (value, &count) in histogram.iter().enumerate() {
        background += count as f64;
        if background == 0.0 {
            continue;
        }
        let foreground = total - background;
        if foreground == 0.0 {
            break;
        }
        weighted_background += value as f64 * count as f64;
        let mean_b = weighted_background / background;
        let mean_f = (weighted_total - weighted_background) / foreground;
        let variance = background * foreground * (mean_b - mean_f).powi(2);
        if variance > best_variance {
            best_variance = variance;
            best = Some(value as u8);
        }
    }
    best
}

/// Centered moving average; windows are truncated at both ends.
pub fn moving_average(values: &[f32], window: usize) -> Vec<f32> {
    if window <= 1 || values.is_empty() {
        return values.to_vec();
    }
    let half = window / 2;
    let mut prefix = Vec::with_capacity(values.len() + 1);
    prefix.push(0.0f64);
    for &v in values {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + v as f64);
    }
    (0..values.len())
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = cmp::min(values.len(), i + half + 1);
            ((prefix[end] - prefix[start]) / (end - start) as f64) as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dilation_grows_by_kernel_radius() {
        let (w, h) = (21, 41);
        let mut mask = vec![0u8; w * h];
        mask[20 * w + 10] = 1;
        let dilated = dilate_rect(&mask, w, h, 5, 15, 2);
        let boxes = component_boxes(&dilated, w, h);
        assert_eq!(boxes.len(), 1);
        assert_eq!((boxes[0].x, boxes[0].width), (6, 9));
        assert_eq!((boxes[0].y, boxes[0].height), (6, 29));
    }

    #[test]
    fn diagonal_pixels_join_one_component() {
        let (w, h) = (4, 4);
        let mut mask = vec![0u8; w * h];
        mask[0] = 1;
        mask[w + 1] = 1;
        mask[3 * w + 3] = 1;
        let boxes = component_boxes(&mask, w, h);
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].area, 2);
        assert_eq!((boxes[0].width, boxes[0].height), (2, 2));
    }

    #[test]
    fn otsu_splits_bimodal_values() {
        let mut pixels = vec![20u8; 50];
        pixels.extend(vec![220u8; 50]);
        let t = otsu_threshold(&pixels).unwrap();
        assert!((20..220).contains(&t));
        assert_eq!(otsu_threshold(&[128u8; 10]), None);
    }

    #[test]
    fn moving_average_smooths_spikes() {
        let smoothed = moving_average(&[0.0, 0.0, 5.0, 0.0, 0.0], 5);
        assert!((smoothed[2] - 1.0).abs() < 1e-6);
        assert!((smoothed[0] - 5.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn sobel_responds_to_step_edges() {
        let (w, h) = (6, 3);
        let pixels: Vec<f32> = (0..w * h)
            .map(|i| if i % w < 3 { 0.0 } else { 255.0 })
            .collect();
        let mag = sobel_magnitude(&pixels, w, h);
        assert!(mag[w + 2] > 500.0);
        assert_eq!(mag[w + 4], 0.0);
    }
}
