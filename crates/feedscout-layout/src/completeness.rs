use std::fmt;

use feedscout_types::{PostCard, Rect};

use crate::LayoutConfig;

/// Why a card is not safe to open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Incomplete {
    Clipped { visible_ratio: f32 },
    MissingImage,
    MissingMeta,
    Gap,
    EdgeMismatch,
    ImageTooTall { image_height: i32, title_height: i32 },
    OutsideContent,
}

impl fmt::Display for Incomplete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Incomplete::Clipped { visible_ratio } => {
                write!(f, "clipped ({:.0}% visible)", visible_ratio * 100.0)
            }
            Incomplete::MissingImage => write!(f, "no image band"),
            Incomplete::MissingMeta => write!(f, "no meta band"),
            Incomplete::Gap => write!(f, "bands are not contiguous"),
            Incomplete::EdgeMismatch => write!(f, "band edges differ from card edges"),
            Incomplete::ImageTooTall {
                image_height,
                title_height,
            } => write!(f, "image {image_height}px dwarfs title {title_height}px"),
            Incomplete::OutsideContent => write!(f, "card straddles the content band"),
        }
    }
}

pub struct CompletenessValidator<'a> {
    config: &'a LayoutConfig,
}

impl<'a> CompletenessValidator<'a> {
    pub fn new(config: &'a LayoutConfig) -> Self {
        Self { config }
    }

    pub fn is_complete(&self, card: &PostCard, content: &Rect) -> bool {
        self.check(card, content).is_ok()
    }

    /// First failed condition, checked in a fixed order.
    pub fn check(&self, card: &PostCard, content: &Rect) -> Result<(), Incomplete> {
        let area = card.rect.area();
        let visible = if card.click_rect.is_empty() {
            0
        } else {
            card.click_rect.area()
        };
        let visible_ratio = if area > 0 {
            visible as f32 / area as f32
        } else {
            0.0
        };
        if visible_ratio < self.config.min_visible_ratio {
            return Err(Incomplete::Clipped { visible_ratio });
        }

        let image = card.image_rect.ok_or(Incomplete::MissingImage)?;
        let meta = card.meta_rect.ok_or(Incomplete::MissingMeta)?;
        let title = card.title_rect;

        if image.bottom != title.top || title.bottom != meta.top {
            return Err(Incomplete::Gap);
        }
        let same_edges = |r: &Rect| r.left == card.rect.left && r.right == card.rect.right;
        if !(same_edges(&image) && same_edges(&title) && same_edges(&meta)) {
            return Err(Incomplete::EdgeMismatch);
        }
        if image.height() as f32 > self.config.max_image_title_ratio * title.height() as f32 {
            return Err(Incomplete::ImageTooTall {
                image_height: image.height(),
                title_height: title.height(),
            });
        }
        if !card.rect.inside(content, self.config.content_margin) {
            return Err(Incomplete::OutsideContent);
        }
        Ok(())
    }
}
