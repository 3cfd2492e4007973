//! Frame comparison for the feed loop: page stability between captures and
//! content signatures used to recognize items that were already processed.

pub mod ops;
pub mod signature;
pub mod stability;

pub use signature::{IMAGE_GRID, image_bits, image_signature, key_signature, text_signature};
pub use stability::{StabilityMonitor, StabilityReport, StabilityState, Thumbnail};
