//! Keyword-driven automation of a two-column waterfall feed from
//! screenshots alone.

pub mod backend;
pub mod cli;
pub mod debounce;
pub mod decision;
pub mod gate;
pub mod matcher;
pub mod pipeline;
pub mod progress;
pub mod records;
pub mod settings;
pub mod store;

pub use pipeline::{Pipeline, PipelineError, RunEnd, RunSummary};
