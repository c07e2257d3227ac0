//! Error types for the sluice uploader.

use snafu::prelude::*;

pub use sluice_core::error::{ConfigError, StorageError};

/// Errors that end an upload run.
///
/// A file that cannot be opened is not an error: it is skipped and counted.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum UploadError {
    /// The watch directory could not be listed.
    #[snafu(display("Failed to read watch directory {}: {source}", path.display()))]
    ReadDir {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    /// A file was opened but reading it failed.
    #[snafu(display("Failed to read {}: {source}", path.display()))]
    ReadFile {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    /// The destination could not be set up.
    #[snafu(display("Failed to open destination {url}: {source}"))]
    Destination { url: String, source: StorageError },

    /// Writing an object to the destination failed.
    #[snafu(display("Failed to upload {} to {url}: {source}", path.display()))]
    Upload {
        path: std::path::PathBuf,
        url: String,
        source: StorageError,
    },

    /// The configured UTC offset or date format is unusable.
    #[snafu(display("Invalid watch configuration: {source}"))]
    Config { source: ConfigError },
}
