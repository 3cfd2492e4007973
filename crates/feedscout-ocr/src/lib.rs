mod engine;
mod error;
mod locate;
mod request;
mod response;

pub use engine::{NoopOcrEngine, OcrEngine};
pub use error::OcrError;
pub use locate::locate_text;
pub use request::OcrRequest;
pub use response::{OcrResult, OcrToken};
