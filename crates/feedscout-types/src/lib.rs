//! Shared domain models for the feedscout workspace.
//!
//! This crate centralizes the lightweight geometry, frame and card types used
//! by the layout, OCR, comparator and application crates. Keep it free of
//! image codecs and platform dependencies so every crate can depend on it.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod text;

pub use text::{cjk_ratio, contains_cjk, is_cjk, normalize_text};

pub type FrameResult<T> = Result<T, FrameError>;

/// Axis-aligned box in client-area pixels of the captured frame.
///
/// `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_size(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self::new(left, top, left + width, top + height)
    }

    pub fn width(&self) -> i32 {
        (self.right - self.left).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.bottom - self.top).max(0)
    }

    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    pub fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    pub fn center(&self) -> (i32, i32) {
        (
            self.left + self.width() / 2,
            self.top + self.height() / 2,
        )
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.left + dx, self.top + dy, self.right + dx, self.bottom + dy)
    }

    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let rect = Rect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        if rect.is_empty() { None } else { Some(rect) }
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }

    /// True when `self` lies inside `outer` shrunk by `margin` on every side.
    pub fn inside(&self, outer: &Rect, margin: i32) -> bool {
        self.left >= outer.left + margin
            && self.top >= outer.top + margin
            && self.right <= outer.right - margin
            && self.bottom <= outer.bottom - margin
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.left, self.top, self.right, self.bottom
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Column {
    Left,
    Right,
}

impl Column {
    pub fn as_str(self) -> &'static str {
        match self {
            Column::Left => "left",
            Column::Right => "right",
        }
    }
}

/// One detected feed item and its sub-parts, built fresh every analysis pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostCard {
    pub rect: Rect,
    pub image_rect: Option<Rect>,
    pub title_rect: Rect,
    pub meta_rect: Option<Rect>,
    pub click_rect: Rect,
    pub column: Column,
}

/// Luminance plane of one captured frame.
#[derive(Clone)]
pub struct LumaFrame {
    width: u32,
    height: u32,
    stride: usize,
    frame_index: Option<u64>,
    data: Arc<[u8]>,
}

impl fmt::Debug for LumaFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LumaFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("bytes", &self.data.len())
            .field("frame_index", &self.frame_index)
            .finish()
    }
}

impl LumaFrame {
    pub fn from_owned(width: u32, height: u32, stride: usize, data: Vec<u8>) -> FrameResult<Self> {
        if stride < width as usize {
            return Err(FrameError::InvalidFrame {
                reason: format!("stride {stride} is smaller than width {width}"),
            });
        }
        let required = stride
            .checked_mul(height as usize)
            .ok_or_else(|| FrameError::InvalidFrame {
                reason: "calculated plane length overflowed".into(),
            })?;
        if data.len() < required {
            return Err(FrameError::InvalidFrame {
                reason: format!(
                    "insufficient plane bytes: got {} expected at least {}",
                    data.len(),
                    required
                ),
            });
        }
        Ok(Self {
            width,
            height,
            stride,
            frame_index: None,
            data: Arc::from(data.into_boxed_slice()),
        })
    }

    /// Converts packed RGB8 pixels using BT.601 integer weights.
    pub fn from_rgb(width: u32, height: u32, rgb: &[u8]) -> FrameResult<Self> {
        let pixels = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| FrameError::InvalidFrame {
                reason: "calculated RGB length overflowed".into(),
            })?;
        if rgb.len() < pixels * 3 {
            return Err(FrameError::InvalidFrame {
                reason: format!(
                    "insufficient RGB bytes: got {} expected at least {}",
                    rgb.len(),
                    pixels * 3
                ),
            });
        }
        let luma = rgb
            .chunks_exact(3)
            .take(pixels)
            .map(|px| {
                let value = 77 * px[0] as u32 + 150 * px[1] as u32 + 29 * px[2] as u32;
                (value >> 8) as u8
            })
            .collect();
        Self::from_owned(width, height, width as usize, luma)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn frame_index(&self) -> Option<u64> {
        self.frame_index
    }

    pub fn with_frame_index(mut self, index: Option<u64>) -> Self {
        self.frame_index = index;
        self
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    pub fn row(&self, y: usize) -> &[u8] {
        let offset = y * self.stride;
        &self.data[offset..offset + self.width as usize]
    }

    /// Copies the part of `rect` that lies inside the frame.
    pub fn crop(&self, rect: &Rect) -> Option<LumaPatch> {
        let clipped = rect.intersect(&self.bounds())?;
        let width = clipped.width() as usize;
        let height = clipped.height() as usize;
        let x0 = clipped.left as usize;
        let mut data = Vec::with_capacity(width * height);
        for y in clipped.top as usize..clipped.bottom as usize {
            data.extend_from_slice(&self.row(y)[x0..x0 + width]);
        }
        Some(LumaPatch {
            origin: (clipped.left, clipped.top),
            width,
            height,
            data,
        })
    }

    pub fn to_patch(&self) -> LumaPatch {
        let width = self.width as usize;
        let height = self.height as usize;
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            data.extend_from_slice(self.row(y));
        }
        LumaPatch {
            origin: (0, 0),
            width,
            height,
            data,
        }
    }
}

/// Owned, tightly packed luminance crop.
#[derive(Debug, Clone, PartialEq)]
pub struct LumaPatch {
    /// Top-left corner of the crop in frame coordinates.
    pub origin: (i32, i32),
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl LumaPatch {
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> FrameResult<Self> {
        if data.len() != width * height {
            return Err(FrameError::InvalidFrame {
                reason: format!(
                    "patch of {width}x{height} needs {} bytes, got {}",
                    width * height,
                    data.len()
                ),
            });
        }
        Ok(Self {
            origin: (0, 0),
            width,
            height,
            data,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    pub fn row(&self, y: usize) -> &[u8] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    /// Sub-crop in patch-local coordinates; the origin stays in frame space.
    pub fn sub_patch(&self, x: usize, y: usize, width: usize, height: usize) -> Option<LumaPatch> {
        let x1 = (x + width).min(self.width);
        let y1 = (y + height).min(self.height);
        if x >= x1 || y >= y1 {
            return None;
        }
        let mut data = Vec::with_capacity((x1 - x) * (y1 - y));
        for row in y..y1 {
            data.extend_from_slice(&self.row(row)[x..x1]);
        }
        Some(LumaPatch {
            origin: (self.origin.0 + x as i32, self.origin.1 + y as i32),
            width: x1 - x,
            height: y1 - y,
            data,
        })
    }

    pub fn to_f32(&self) -> Vec<f32> {
        self.data.iter().map(|&v| v as f32).collect()
    }

    pub fn mean(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().map(|&v| v as u64).sum::<u64>() as f32 / self.data.len() as f32
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid frame: {reason}")]
    InvalidFrame { reason: String },
}
