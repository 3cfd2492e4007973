use feedscout_types::{Column, LumaFrame, LumaPatch, Rect};

use crate::LayoutConfig;
use crate::ops::{component_boxes, dilate_rect, gaussian_blur_3x3, sobel_magnitude, threshold_mask};

/// A detected card bound, in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentedBox {
    pub rect: Rect,
    pub column: Column,
}

/// Column-local box: `(left, top, right, bottom)` with exclusive ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LocalBox {
    left: usize,
    top: usize,
    right: usize,
    bottom: usize,
}

impl LocalBox {
    fn width(&self) -> usize {
        self.right - self.left
    }

    fn height(&self) -> usize {
        self.bottom - self.top
    }
}

struct ColumnMaps {
    width: usize,
    height: usize,
    luma: Vec<u8>,
    edges: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
struct RowProfile {
    edge: f32,
    dark: f32,
    light: f32,
}

pub struct WaterfallSegmenter<'a> {
    config: &'a LayoutConfig,
}

impl<'a> WaterfallSegmenter<'a> {
    pub fn new(config: &'a LayoutConfig) -> Self {
        Self { config }
    }

    /// Card bounds for both columns of `content`, sorted top to bottom.
    pub fn segment(&self, frame: &LumaFrame, content: &Rect) -> Vec<SegmentedBox> {
        let Some(band) = frame.crop(content) else {
            return Vec::new();
        };
        let split = ((band.width as f32 * self.config.column_split_ratio).round() as usize)
            .clamp(1, band.width.max(1));

        let mut boxes = Vec::new();
        let columns = [(Column::Left, 0usize, split), (Column::Right, split, band.width)];
        for (column, x0, x1) in columns {
            if x1 <= x0 {
                continue;
            }
            let Some(patch) = band.sub_patch(x0, 0, x1 - x0, band.height) else {
                continue;
            };
            for local in self.find_cards_in_column(&patch) {
                let rect = Rect::new(
                    patch.origin.0 + local.left as i32,
                    patch.origin.1 + local.top as i32,
                    patch.origin.0 + local.right as i32,
                    patch.origin.1 + local.bottom as i32,
                );
                boxes.push(SegmentedBox { rect, column });
            }
        }
        boxes.sort_by_key(|b| (b.rect.top, b.rect.left));
        boxes
    }

    fn find_cards_in_column(&self, patch: &LumaPatch) -> Vec<LocalBox> {
        if patch.is_empty() {
            return Vec::new();
        }
        let maps = self.column_maps(patch);
        let dilated = dilate_rect(
            &maps.edges,
            maps.width,
            maps.height,
            self.config.dilate_kernel_width as usize,
            self.config.dilate_kernel_height as usize,
            self.config.dilate_iterations as usize,
        );

        let min_area = maps.width as f32 * maps.height as f32 * self.config.min_card_area_ratio;
        let candidates: Vec<LocalBox> = component_boxes(&dilated, maps.width, maps.height)
            .into_iter()
            .map(|c| LocalBox {
                left: c.x,
                top: c.y,
                right: c.x + c.width,
                bottom: c.y + c.height,
            })
            .filter(|b| (b.width() * b.height()) as f32 >= min_area)
            .filter(|b| self.passes_size_filter(b, maps.width))
            .collect();

        let split_limit = self.config.split_height_ratio * maps.width as f32;
        let mut worklist: Vec<(LocalBox, u32)> = candidates.into_iter().map(|b| (b, 0)).collect();
        let mut cards = Vec::new();
        while let Some((current, depth)) = worklist.pop() {
            let too_tall = current.height() as f32 > split_limit;
            if too_tall && depth < self.config.max_split_depth {
                if let Some(split_row) = self.find_gap(&maps, &current) {
                    let upper = LocalBox {
                        bottom: split_row,
                        ..current
                    };
                    let lower = LocalBox {
                        top: split_row,
                        ..current
                    };
                    worklist.push((lower, depth + 1));
                    worklist.push((upper, depth + 1));
                    continue;
                }
            }
            if self.passes_size_filter(&current, maps.width) {
                cards.push(current);
            }
        }
        cards.sort_by_key(|b| b.top);
        cards
    }

    fn passes_size_filter(&self, b: &LocalBox, column_width: usize) -> bool {
        b.width() as f32 >= column_width as f32 * self.config.min_card_width_ratio
            && b.height() >= self.config.min_card_height as usize
    }

    fn column_maps(&self, patch: &LumaPatch) -> ColumnMaps {
        let (width, height) = (patch.width, patch.height);
        let blurred = gaussian_blur_3x3(&patch.to_f32(), width, height);
        let blurred = gaussian_blur_3x3(&blurred, width, height);
        let magnitude = sobel_magnitude(&blurred, width, height);
        ColumnMaps {
            width,
            height,
            luma: patch.data.clone(),
            edges: threshold_mask(&magnitude, self.config.edge_threshold),
        }
    }

    fn row_profile(&self, maps: &ColumnMaps, b: &LocalBox, row: usize) -> RowProfile {
        let span = b.width().max(1) as f32;
        let offset = row * maps.width;
        let mut edge = 0usize;
        let mut dark = 0usize;
        let mut light = 0usize;
        for x in b.left..b.right {
            edge += (maps.edges[offset + x] != 0) as usize;
            let value = maps.luma[offset + x];
            dark += (value < self.config.dark_luma) as usize;
            light += (value > self.config.light_luma) as usize;
        }
        RowProfile {
            edge: edge as f32 / span,
            dark: dark as f32 / span,
            light: light as f32 / span,
        }
    }

    fn is_gap_row(&self, profile: &RowProfile) -> bool {
        profile.edge <= self.config.gap_max_edge_density
            && profile.dark <= self.config.gap_max_dark_density
            && profile.light >= self.config.gap_min_light_density
    }

    /// Row at which `b` splits into two cards, if a clean inter-card margin
    /// exists that leaves both pieces tall enough.
    fn find_gap(&self, maps: &ColumnMaps, b: &LocalBox) -> Option<usize> {
        let profiles: Vec<RowProfile> = (b.top..b.bottom)
            .map(|row| self.row_profile(maps, b, row))
            .collect();
        let min_piece = self.config.min_card_height as usize;
        let min_run = self.config.min_gap_rows as usize;
        let box_height = b.height() as f32;

        let mut best: Option<(f32, usize)> = None;
        let mut idx = 0usize;
        while idx < profiles.len() {
            if !self.is_gap_row(&profiles[idx]) {
                idx += 1;
                continue;
            }
            let start = idx;
            while idx < profiles.len() && self.is_gap_row(&profiles[idx]) {
                idx += 1;
            }
            let run = &profiles[start..idx];
            if run.len() < min_run {
                continue;
            }

            let split = b.top + start + run.len() / 2;
            let upper = split - b.top;
            let lower = b.bottom - split;
            if upper < min_piece || lower < min_piece {
                continue;
            }

            let count = run.len() as f32;
            let edge = run.iter().map(|p| p.edge).sum::<f32>() / count;
            let dark = run.iter().map(|p| p.dark).sum::<f32>() / count;
            let light = run.iter().map(|p| p.light).sum::<f32>() / count;
            let balance = 1.0 - (upper as f32 - lower as f32).abs() / box_height;
            let score = balance + (light - edge - dark);
            if best.is_none_or(|(best_score, _)| score > best_score) {
                best = Some((score, split));
            }
        }
        best.map(|(_, split)| split)
    }
}
