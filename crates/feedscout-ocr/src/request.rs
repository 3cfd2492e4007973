use feedscout_types::{LumaFrame, LumaPatch, Rect};

use crate::error::OcrError;

/// One recognition call: a frame and the region of it to read.
#[derive(Debug)]
pub struct OcrRequest<'a> {
    frame: &'a LumaFrame,
    region: Rect,
}

impl<'a> OcrRequest<'a> {
    pub fn new(frame: &'a LumaFrame, region: Rect) -> Self {
        Self { frame, region }
    }

    pub fn whole(frame: &'a LumaFrame) -> Self {
        Self::new(frame, frame.bounds())
    }

    pub fn frame(&self) -> &'a LumaFrame {
        self.frame
    }

    pub fn region(&self) -> Rect {
        self.region
    }

    /// Pixels of the region, clipped to the frame.
    pub fn patch(&self) -> Result<LumaPatch, OcrError> {
        self.frame
            .crop(&self.region)
            .ok_or(OcrError::RegionOutOfBounds {
                region: self.region,
                width: self.frame.width(),
                height: self.frame.height(),
            })
    }
}
