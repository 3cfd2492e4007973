//! Page understanding for a two-column waterfall feed: safe-area bands,
//! card segmentation, card anatomy and completeness checks. Everything here
//! works on luminance statistics only; no OCR is involved.

pub mod anatomy;
pub mod cards;
pub mod completeness;
pub mod config;
pub mod ops;
pub mod safe_area;
pub mod segmenter;

use thiserror::Error;

pub use anatomy::{Anatomy, AnatomyOutcome, CardAnatomyResolver, DegradeReason};
pub use cards::{CardExtractor, PageLayout};
pub use completeness::{CompletenessValidator, Incomplete};
pub use config::LayoutConfig;
pub use safe_area::{SafeArea, SafeAreaCalculator};
pub use segmenter::{SegmentedBox, WaterfallSegmenter};

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("invalid layout setting '{field}': {value}")]
    InvalidConfig { field: &'static str, value: String },
}

impl LayoutError {
    pub(crate) fn invalid(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            value: value.into(),
        }
    }
}
