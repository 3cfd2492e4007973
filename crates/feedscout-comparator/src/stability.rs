use feedscout_types::LumaFrame;

use crate::ops::{mean_abs_diff, resize_average};

/// Small grayscale copy of a frame used for change detection.
#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    pub width: usize,
    pub height: usize,
    pub cells: Vec<f32>,
}

impl Thumbnail {
    pub fn of(frame: &LumaFrame, width: usize, height: usize) -> Self {
        let patch = frame.to_patch();
        let cells = resize_average(&patch.to_f32(), patch.width, patch.height, width, height);
        Self {
            width,
            height,
            cells,
        }
    }

    /// Mean absolute cell difference; `None` when the grids differ in size.
    pub fn difference(&self, other: &Thumbnail) -> Option<f32> {
        if (self.width, self.height) != (other.width, other.height) {
            return None;
        }
        mean_abs_diff(&self.cells, &other.cells)
    }
}

/// Carried across loop iterations by the driver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StabilityState {
    pub last_thumbnail: Option<Thumbnail>,
    pub consecutive_stable_frames: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilityReport {
    /// Difference against the previous thumbnail, if there was one.
    pub diff: Option<f32>,
    pub stable: bool,
    pub consecutive: u32,
    /// At least `min_stable_frames` stable frames in a row.
    pub settled: bool,
}

#[derive(Debug, Clone)]
pub struct StabilityMonitor {
    grid_width: usize,
    grid_height: usize,
    threshold: f32,
    min_stable_frames: u32,
}

impl StabilityMonitor {
    pub fn new(grid_width: usize, grid_height: usize, threshold: f32, min_stable_frames: u32) -> Self {
        Self {
            grid_width: grid_width.max(1),
            grid_height: grid_height.max(1),
            threshold,
            min_stable_frames,
        }
    }

    pub fn thumbnail(&self, frame: &LumaFrame) -> Thumbnail {
        Thumbnail::of(frame, self.grid_width, self.grid_height)
    }

    /// One step: compares `frame` against the stored thumbnail and returns
    /// the next state. A missing frame resets the streak and the thumbnail.
    pub fn observe(
        &self,
        state: StabilityState,
        frame: Option<&LumaFrame>,
    ) -> (StabilityState, StabilityReport) {
        let Some(frame) = frame else {
            let report = StabilityReport {
                diff: None,
                stable: false,
                consecutive: 0,
                settled: false,
            };
            return (StabilityState::default(), report);
        };

        let thumbnail = self.thumbnail(frame);
        let diff = state
            .last_thumbnail
            .as_ref()
            .and_then(|last| last.difference(&thumbnail));
        let stable = diff.is_some_and(|d| d < self.threshold);
        let consecutive = if stable {
            state.consecutive_stable_frames.saturating_add(1)
        } else {
            0
        };
        let report = StabilityReport {
            diff,
            stable,
            consecutive,
            settled: consecutive >= self.min_stable_frames,
        };
        log::trace!("stability diff={diff:?} consecutive={consecutive}");
        let next = StabilityState {
            last_thumbnail: Some(thumbnail),
            consecutive_stable_frames: consecutive,
        };
        (next, report)
    }

    /// Whether `after` differs visibly from `before`, i.e. a scroll or tap
    /// took effect.
    pub fn changed(&self, before: &Thumbnail, after: &LumaFrame) -> bool {
        before
            .difference(&self.thumbnail(after))
            .is_none_or(|d| d >= self.threshold)
    }
}
