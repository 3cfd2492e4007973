use std::fmt;

use feedscout_types::{LumaFrame, LumaPatch, Rect};

use crate::LayoutConfig;
use crate::ops::{moving_average, otsu_threshold};

const MIN_CROP_WIDTH: usize = 8;
/// Luma offset below the crop mean that counts as ink when Otsu finds a
/// single class.
const FALLBACK_INK_OFFSET: f32 = 24.0;

/// Image, title and meta bands of one card, in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anatomy {
    pub image_rect: Option<Rect>,
    pub title_rect: Rect,
    pub meta_rect: Option<Rect>,
}

impl Anatomy {
    /// Whole card treated as title; used when the bands cannot be resolved.
    pub fn degraded(rect: Rect) -> Self {
        Self {
            image_rect: None,
            title_rect: rect,
            meta_rect: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradeReason {
    EmptyCrop,
    CropTooSmall { width: usize, height: usize },
    NoInk,
    NoTitleBand,
}

impl fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradeReason::EmptyCrop => write!(f, "card lies outside the frame"),
            DegradeReason::CropTooSmall { width, height } => {
                write!(f, "card crop {width}x{height} is too small")
            }
            DegradeReason::NoInk => write!(f, "card crop carries no ink"),
            DegradeReason::NoTitleBand => write!(f, "no text-bearing title band"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnatomyOutcome {
    Resolved(Anatomy),
    Degraded { reason: DegradeReason },
}

impl AnatomyOutcome {
    /// Resolved bands, or the full-card fallback for a degraded outcome.
    pub fn into_anatomy(self, rect: Rect) -> Anatomy {
        match self {
            AnatomyOutcome::Resolved(anatomy) => anatomy,
            AnatomyOutcome::Degraded { .. } => Anatomy::degraded(rect),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, AnatomyOutcome::Degraded { .. })
    }
}

/// Splits a card into image / title / meta bands from row ink projections.
pub struct CardAnatomyResolver<'a> {
    config: &'a LayoutConfig,
}

impl<'a> CardAnatomyResolver<'a> {
    pub fn new(config: &'a LayoutConfig) -> Self {
        Self { config }
    }

    pub fn resolve(&self, frame: &LumaFrame, rect: &Rect) -> AnatomyOutcome {
        match frame.crop(rect) {
            Some(patch) => self.resolve_patch(&patch, rect),
            None => AnatomyOutcome::Degraded {
                reason: DegradeReason::EmptyCrop,
            },
        }
    }

    /// Resolves a crop whose `origin` is the top-left of the clipped card.
    pub fn resolve_patch(&self, patch: &LumaPatch, rect: &Rect) -> AnatomyOutcome {
        let cfg = self.config;
        if patch.width < MIN_CROP_WIDTH || patch.height < cfg.title_min_height as usize {
            return AnatomyOutcome::Degraded {
                reason: DegradeReason::CropTooSmall {
                    width: patch.width,
                    height: patch.height,
                },
            };
        }

        let ink = row_ink(patch);
        let Some((content_top, content_bottom)) = self.content_rows(&ink) else {
            return AnatomyOutcome::Degraded {
                reason: DegradeReason::NoInk,
            };
        };
        let smoothed = moving_average(&ink, cfg.smooth_window as usize);

        let rows = content_bottom - content_top;
        let meta_height = (rows as f32 * cfg.meta_ratio)
            .round()
            .clamp(cfg.meta_min_height as f32, cfg.meta_max_height as f32) as usize;
        let meta_height = meta_height.min(rows / 3);
        let estimate = content_bottom - meta_height;
        let title_bottom = self.refine_boundary(&smoothed, estimate, content_top, content_bottom);

        let Some(title_top) = self.pick_title_top(&ink, content_top, title_bottom) else {
            return AnatomyOutcome::Degraded {
                reason: DegradeReason::NoTitleBand,
            };
        };

        let (left, right) = (patch.origin.0, patch.origin.0 + patch.width as i32);
        let top = patch.origin.1;
        let bottom = patch.origin.1 + patch.height as i32;
        let title_top_abs = top + title_top as i32;
        let title_bottom_abs = top + title_bottom as i32;

        let image_rect = (title_top >= cfg.min_image_height as usize)
            .then(|| Rect::new(left, top, right, title_top_abs));
        let meta_rect = (bottom - title_bottom_abs >= cfg.min_meta_height as i32)
            .then(|| Rect::new(left, title_bottom_abs, right, bottom));

        log::trace!(
            "card {rect}: title rows {title_top}..{title_bottom}, content rows {content_top}..{content_bottom}"
        );
        AnatomyOutcome::Resolved(Anatomy {
            image_rect,
            title_rect: Rect::new(left, title_top_abs, right, title_bottom_abs),
            meta_rect,
        })
    }

    /// First and one-past-last rows with ink above the trim floor. Trimming is
    /// skipped when it would drop more than half of the crop.
    fn content_rows(&self, ink: &[f32]) -> Option<(usize, usize)> {
        let floor = self.config.trim_ink;
        let first = ink.iter().position(|&v| v >= floor)?;
        let last = ink.iter().rposition(|&v| v >= floor)?;
        let (top, bottom) = (first, last + 1);
        if (bottom - top) * 2 < ink.len() {
            return Some((0, ink.len()));
        }
        Some((top, bottom))
    }

    /// Lowest smoothed-ink row within the search radius of `estimate`; ties
    /// resolve to the row closest to the estimate.
    fn refine_boundary(&self, smoothed: &[f32], estimate: usize, lo: usize, hi: usize) -> usize {
        let radius = self.config.boundary_search_radius as usize;
        let start = estimate.saturating_sub(radius).max(lo + 1);
        let end = (estimate + radius).min(hi.saturating_sub(1));
        if start > end {
            return estimate;
        }
        let mut best = estimate.clamp(start, end);
        for row in start..=end {
            let value = smoothed[row];
            let current = smoothed[best];
            let closer = row.abs_diff(estimate) < best.abs_diff(estimate);
            if value < current || (value == current && closer) {
                best = row;
            }
        }
        best
    }

    fn pick_title_top(&self, ink: &[f32], content_top: usize, title_bottom: usize) -> Option<usize> {
        let cfg = self.config;
        let clamp_height = |h: u32| h.clamp(cfg.title_min_height, cfg.title_max_height) as usize;
        let one_line = clamp_height(cfg.title_line_height + cfg.title_padding);
        let two_line = clamp_height(2 * cfg.title_line_height + cfg.title_padding);

        // A window that holds whole title lines has ink in both of its halves.
        let candidate = |height: usize| -> Option<(usize, f32)> {
            let top = title_bottom.checked_sub(height)?;
            if top < content_top {
                return None;
            }
            let density = mean(&ink[top..title_bottom]);
            if density < cfg.title_min_ink {
                return None;
            }
            let middle = top + height / 2;
            let upper: f32 = ink[top..middle].iter().sum();
            let lower: f32 = ink[middle..title_bottom].iter().sum();
            let heavier = upper.max(lower);
            let balance = if heavier > 0.0 { upper.min(lower) / heavier } else { 0.0 };
            Some((top, balance + density))
        };

        let one = candidate(one_line);
        let two = candidate(two_line);
        match (one, two) {
            (Some(one), Some(two)) => Some(if two.1 > one.1 { two.0 } else { one.0 }),
            (Some(one), None) => Some(one.0),
            (None, Some(two)) => Some(two.0),
            (None, None) => title_bottom
                .checked_sub(one_line)
                .filter(|&top| top >= content_top),
        }
    }
}

/// Fraction of ink pixels per row. Ink is the dark class of an Otsu split,
/// or pixels well below the mean when the crop has a single class.
fn row_ink(patch: &LumaPatch) -> Vec<f32> {
    let width = patch.width as f32;
    let cutoff = match otsu_threshold(&patch.data) {
        Some(t) => t as f32 + 0.5,
        None => patch.mean() - FALLBACK_INK_OFFSET,
    };
    (0..patch.height)
        .map(|y| patch.row(y).iter().filter(|&&p| (p as f32) < cutoff).count() as f32 / width)
        .collect()
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}
