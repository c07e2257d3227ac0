//! Sluice: one-shot uploader for dated CSV drops.
//!
//! Scans each configured watch directory for files whose name carries
//! today's date (in a fixed UTC offset) and the expected extension, then
//! copies them to a storage destination, overwriting earlier uploads of the
//! same name.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod selection;
pub mod upload;

pub use config::{UploaderConfig, WatchConfig, WatchKey};
pub use error::UploadError;
pub use pipeline::WatchPipeline;
pub use selection::{is_eligible, today};
pub use upload::{UploadSummary, Uploader};
