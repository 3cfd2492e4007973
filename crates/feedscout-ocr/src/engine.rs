use crate::error::OcrError;
use crate::request::OcrRequest;
use crate::response::OcrResult;

/// Common interface for OCR providers.
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn warm_up(&self) -> Result<(), OcrError> {
        Ok(())
    }

    fn recognize(&self, request: &OcrRequest<'_>) -> Result<OcrResult, OcrError>;
}

/// Engine that recognizes nothing; used for dry runs without a provider.
#[derive(Debug, Default)]
pub struct NoopOcrEngine;

impl OcrEngine for NoopOcrEngine {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn recognize(&self, _: &OcrRequest<'_>) -> Result<OcrResult, OcrError> {
        Ok(OcrResult::empty())
    }
}
