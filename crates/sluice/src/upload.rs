//! Copies today's files from a watch directory to the destination.

use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use object_store::path::Path as ObjectPath;
use snafu::prelude::*;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use sluice_core::config::Mergeable;
use sluice_core::emit;
use sluice_core::error::ConfigError;
use sluice_core::metrics::events::{BytesUploaded, FileProcessed, FileStatus, FilesDiscovered};
use sluice_core::storage::StorageProvider;

use crate::config::{UploaderConfig, WatchConfig, WatchKey};
use crate::error::{DestinationSnafu, ReadDirSnafu, ReadFileSnafu, UploadError, UploadSnafu};
use crate::selection::{is_eligible, today};

/// Counts from one pass over a watch directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    /// Eligible files found.
    pub found: usize,
    /// Files written to the destination.
    pub uploaded: usize,
    /// Eligible files that could not be opened.
    pub skipped: usize,
    /// Bytes written to the destination.
    pub bytes: u64,
}

/// Uploader for a single watch directory.
pub struct Uploader {
    key: WatchKey,
    directory: PathBuf,
    extension: String,
    date_format: String,
    offset: FixedOffset,
    storage: StorageProvider,
}

impl Uploader {
    pub fn new(
        key: WatchKey,
        config: &WatchConfig,
        offset: FixedOffset,
        storage: StorageProvider,
    ) -> Self {
        Self {
            key,
            directory: config.directory.clone(),
            extension: config.extension.clone(),
            date_format: config.date_format.clone(),
            offset,
            storage,
        }
    }

    /// Build an uploader, connecting to the configured destination.
    pub async fn from_config(key: WatchKey, config: &WatchConfig) -> Result<Self, UploadError> {
        let offset = config.offset().ok_or_else(|| UploadError::Config {
            source: ConfigError::InvalidField {
                component: UploaderConfig::COMPONENT_NAME,
                key: key.to_string(),
                field: "utc_offset",
                message: format!("'{}' is not an offset like +05:30", config.utc_offset),
            },
        })?;

        let storage = StorageProvider::for_url_with_options(
            &config.destination,
            config.storage_options.clone(),
        )
        .await
        .context(DestinationSnafu {
            url: config.destination.clone(),
        })?;

        Ok(Self::new(key, config, offset, storage))
    }

    /// Upload every file in the watch directory that carries today's date.
    ///
    /// "Today" is evaluated once, at the start of the call.
    pub async fn upload_existing_files(&self) -> Result<UploadSummary, UploadError> {
        let today = today(self.offset, &self.date_format);
        info!(target = %self.key, date = %today, "Scanning existing files");
        self.upload_files_for(&today).await
    }

    /// Upload every file whose name contains `date`.
    pub async fn upload_files_for(&self, date: &str) -> Result<UploadSummary, UploadError> {
        let names = self.eligible_files(date).await?;
        let mut summary = UploadSummary {
            found: names.len(),
            ..Default::default()
        };

        emit!(FilesDiscovered {
            count: names.len() as u64,
            target: self.key.to_string(),
        });

        for name in names {
            info!(target = %self.key, "Found existing file: {name}");

            let status = match self.upload_file(&name).await? {
                Some(bytes) => {
                    summary.uploaded += 1;
                    summary.bytes += bytes;
                    FileStatus::Uploaded
                }
                None => {
                    summary.skipped += 1;
                    FileStatus::Skipped
                }
            };
            emit!(FileProcessed {
                status,
                target: self.key.to_string(),
            });
        }

        info!(
            target = %self.key,
            found = summary.found,
            uploaded = summary.uploaded,
            skipped = summary.skipped,
            "Upload pass complete"
        );
        Ok(summary)
    }

    /// Eligible file names in the watch directory, sorted.
    async fn eligible_files(&self, date: &str) -> Result<Vec<String>, UploadError> {
        let mut entries = tokio::fs::read_dir(&self.directory)
            .await
            .context(ReadDirSnafu {
                path: self.directory.clone(),
            })?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.context(ReadDirSnafu {
            path: self.directory.clone(),
        })? {
            let Ok(name) = entry.file_name().into_string() else {
                debug!(target = %self.key, path = ?entry.path(), "Skipping non UTF-8 file name");
                continue;
            };
            if is_eligible(&name, date, &self.extension) {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    /// Upload one file, overwriting any object of the same name.
    ///
    /// Returns `None` when the file could not be opened.
    async fn upload_file(&self, name: &str) -> Result<Option<u64>, UploadError> {
        let local = self.directory.join(name);

        let Some(contents) = self.read_if_ready(&local).await? else {
            warn!(target = %self.key, "File not ready: {}", local.display());
            return Ok(None);
        };

        let object = ObjectPath::from(name);
        let url = self.storage.object_url(&object);
        let bytes = contents.len() as u64;

        self.storage
            .put_bytes(&object, contents)
            .await
            .context(UploadSnafu {
                path: local.clone(),
                url: url.clone(),
            })?;

        emit!(BytesUploaded {
            bytes,
            target: self.key.to_string(),
        });
        info!(target = %self.key, bytes, "Uploaded: {} -> {url}", local.display());
        Ok(Some(bytes))
    }

    /// Read a file, or `None` if it cannot be opened or is not a regular file.
    async fn read_if_ready(&self, path: &Path) -> Result<Option<Vec<u8>>, UploadError> {
        let mut file = match tokio::fs::File::open(path).await {
            Ok(file) => file,
            Err(e) => {
                debug!(target = %self.key, error = %e, "Failed to open {}", path.display());
                return Ok(None);
            }
        };

        match file.metadata().await {
            Ok(metadata) if metadata.is_file() => {}
            _ => return Ok(None),
        }

        let mut contents = Vec::new();
        file.read_to_end(&mut contents)
            .await
            .context(ReadFileSnafu { path })?;
        Ok(Some(contents))
    }
}
