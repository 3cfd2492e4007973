use feedscout_types::Rect;

use crate::LayoutConfig;

/// Header, footer and content bands of one frame. All share full width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafeArea {
    pub header: Rect,
    pub footer: Rect,
    pub content: Rect,
}

#[derive(Debug, Clone, Copy)]
pub struct SafeAreaCalculator {
    header_ratio: f32,
    footer_ratio: f32,
}

impl SafeAreaCalculator {
    pub fn new(header_ratio: f32, footer_ratio: f32) -> Self {
        Self {
            header_ratio,
            footer_ratio,
        }
    }

    pub fn from_config(config: &LayoutConfig) -> Self {
        Self::new(config.header_ratio, config.footer_ratio)
    }

    pub fn compute(&self, width: u32, height: u32) -> SafeArea {
        let width = width as i32;
        let height = height as i32;
        let header_h = ((height as f32 * self.header_ratio) as i32).clamp(0, height);
        let footer_h = ((height as f32 * self.footer_ratio) as i32).clamp(0, height - header_h);
        SafeArea {
            header: Rect::new(0, 0, width, header_h),
            footer: Rect::new(0, height - footer_h, width, height),
            content: Rect::new(0, header_h, width, height - footer_h),
        }
    }
}
