use feedscout_types::Rect;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("region {region} lies outside the {width}x{height} frame")]
    RegionOutOfBounds { region: Rect, width: u32, height: u32 },
    #[error("backend error: {message}")]
    Backend { message: String },
}

impl OcrError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}
